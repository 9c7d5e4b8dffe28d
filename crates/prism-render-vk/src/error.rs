// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use std::fmt;
use thiserror::Error;

use crate::frame::FrameState;

/// Construction steps, in build order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStep {
    Instance,
    Surface,
    DebugMessenger,
    Device,
    Swapchain,
    ImageViews,
    RenderPass,
    ShaderModules,
    PipelineLayout,
    Pipeline,
    Framebuffers,
    CommandPool,
    CommandBuffer,
    SyncObjects,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStep::Instance => "instance",
            BuildStep::Surface => "surface",
            BuildStep::DebugMessenger => "debug messenger",
            BuildStep::Device => "logical device",
            BuildStep::Swapchain => "swap chain",
            BuildStep::ImageViews => "image views",
            BuildStep::RenderPass => "render pass",
            BuildStep::ShaderModules => "shader modules",
            BuildStep::PipelineLayout => "pipeline layout",
            BuildStep::Pipeline => "graphics pipeline",
            BuildStep::Framebuffers => "framebuffers",
            BuildStep::CommandPool => "command pool",
            BuildStep::CommandBuffer => "command buffer",
            BuildStep::SyncObjects => "sync objects",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("shader {name}: {source}")]
    Shader {
        name: String,
        #[source]
        source: std::io::Error,
    },

    // negotiation
    #[error("no discrete GPU with geometry shaders and graphics+present queues")]
    NoSuitableDevice,
    #[error("surface reports no formats for this device")]
    NoSurfaceFormats,
    #[error("surface reports no present modes for this device")]
    NoPresentModes,
    #[error("required device extension {0} is not available")]
    MissingDeviceExtension(String),

    // resource creation
    #[error("creating {step} failed: {source}")]
    Create {
        step: BuildStep,
        #[source]
        source: vk::Result,
    },

    // frame loop
    #[error("{stage} failed: {source}")]
    Frame {
        stage: FrameState,
        #[source]
        source: vk::Result,
    },
    #[error("timed out in {0}")]
    Timeout(FrameState),
    #[error("acquired image index {index} but the swap chain has {count} framebuffers")]
    ImageIndexOutOfRange { index: u32, count: usize },
    #[error("in-flight fence was left unsignaled by an abandoned frame")]
    GateLost,
}

impl SessionError {
    pub(crate) fn create(step: BuildStep) -> impl FnOnce(vk::Result) -> SessionError {
        move |source| SessionError::Create { step, source }
    }

    pub(crate) fn frame(stage: FrameState) -> impl FnOnce(vk::Result) -> SessionError {
        move |source| match source {
            vk::Result::TIMEOUT | vk::Result::NOT_READY => SessionError::Timeout(stage),
            source => SessionError::Frame { stage, source },
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

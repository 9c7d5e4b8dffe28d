// SPDX-License-Identifier: CEPL-1.0
//! Vulkan rendering session for a single triangle with one frame in flight.
//!
//! [`SessionBuilder`] negotiates a device and builds every resource in
//! dependency order; the resulting [`Session`] runs frames and tears
//! everything down in reverse on drop.

mod builder;
mod config;
mod debug;
mod error;
mod frame;
mod gpu;
pub mod negotiate;
mod renderer;
mod session;
mod shader;
mod sync;
mod vulkan;

#[cfg(test)]
mod fake;

pub use builder::SessionBuilder;
pub use config::{SessionConfig, SWAPCHAIN_EXTENSION, VALIDATION_LAYER};
pub use error::{BuildStep, SessionError, SessionResult};
pub use frame::FrameState;
pub use gpu::{
    DeviceDesc, DeviceSummary, FramebufferDesc, Gpu, GpuObject, PipelineDesc, PresentDesc,
    RenderPassBegin, Sharing, SubmitDesc, SwapchainDesc,
};
pub use renderer::VkRenderer;
pub use session::{Ledger, Session, Swapchain};
pub use shader::{load_bytecode, ShaderBytecode, BUILTIN_SHADER_DIR, FRAGMENT_SHADER, VERTEX_SHADER};
pub use sync::SyncSet;
pub use vulkan::AshGpu;

// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use tracing::{debug, info, warn};

use crate::builder::SessionParts;
use crate::config::SessionConfig;
use crate::frame::FrameState;
use crate::gpu::{Gpu, GpuObject, Sharing};
use crate::negotiate::QueueFamilies;
use crate::sync::SyncSet;

/// Creation-ordered record of owned GPU objects.
#[derive(Debug, Default)]
pub struct Ledger {
    objects: Vec<GpuObject>,
}

impl Ledger {
    pub fn push(&mut self, object: GpuObject) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[GpuObject] {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Destroys everything, newest first. A dependent is always created after
    /// what it depends on, so it is always destroyed before it.
    pub fn unwind<G: Gpu + ?Sized>(&mut self, gpu: &mut G) {
        while let Some(object) = self.objects.pop() {
            debug!("destroying {object:?}");
            gpu.destroy(object);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub sharing: Sharing,
    pub images: Vec<vk::Image>,
}

/// A fully built rendering session. Only obtainable from
/// [`crate::SessionBuilder::build`], so every handle here is live.
pub struct Session<G: Gpu> {
    pub(crate) gpu: G,
    pub(crate) config: SessionConfig,
    pub(crate) device_name: String,
    pub(crate) families: QueueFamilies,
    pub(crate) device: vk::Device,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) swapchain: Swapchain,
    pub(crate) image_views: Vec<vk::ImageView>,
    pub(crate) render_pass: vk::RenderPass,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) framebuffers: Vec<vk::Framebuffer>,
    pub(crate) command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    pub(crate) sync: SyncSet,
    pub(crate) ledger: Ledger,
    pub(crate) state: FrameState,
    pub(crate) frames_presented: u64,
    pub(crate) gate_lost: bool,
}

impl<G: Gpu> Session<G> {
    pub(crate) fn from_parts(
        gpu: G,
        config: SessionConfig,
        ledger: Ledger,
        parts: SessionParts,
    ) -> Self {
        let SessionParts {
            device,
            swapchain,
            image_views,
            render_pass,
            pipeline_layout,
            pipeline,
            framebuffers,
            command_pool,
            command_buffer,
            sync,
        } = parts;
        Self {
            surface: gpu.surface(),
            gpu,
            config,
            device_name: device.name,
            families: device.families,
            device: device.device,
            graphics_queue: device.graphics_queue,
            present_queue: device.present_queue,
            swapchain,
            image_views,
            render_pass,
            pipeline_layout,
            pipeline,
            framebuffers,
            command_pool,
            command_buffer,
            sync,
            ledger,
            state: FrameState::Idle,
            frames_presented: 0,
            gate_lost: false,
        }
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn device(&self) -> vk::Device {
        self.device
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    pub fn queues(&self) -> (vk::Queue, vk::Queue) {
        (self.graphics_queue, self.present_queue)
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn pipeline(&self) -> (vk::PipelineLayout, vk::Pipeline) {
        (self.pipeline_layout, self.pipeline)
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn sync(&self) -> SyncSet {
        self.sync
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn wait_idle(&mut self) -> ash::prelude::VkResult<()> {
        self.gpu.device_wait_idle()
    }

    /// Drains the GPU and destroys every owned object in reverse creation
    /// order. Also runs on drop.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.ledger.is_empty() {
            return;
        }
        if let Err(e) = self.gpu.device_wait_idle() {
            warn!("device_wait_idle before teardown failed: {e}");
        }
        self.ledger.unwind(&mut self.gpu);
        info!(
            "session torn down after {} frame(s)",
            self.frames_presented
        );
    }
}

// STRICT TEARDOWN ORDER (the ledger's reverse creation order):
// fence + semaphores, command pool (frees the command buffer), framebuffers,
// pipeline, pipeline layout, render pass, image views, swap chain, device,
// surface, instance.
impl<G: Gpu> Drop for Session<G> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// SPDX-License-Identifier: CEPL-1.0
//! The Vulkan entry points a session drives.
//!
//! Create calls take small plain descriptors instead of raw `vk::*CreateInfo`
//! structs, so the decisions made by the builder stay inspectable; the fixed
//! parts of each create info live in the `ash` implementation
//! ([`crate::vulkan::AshGpu`]). Handles are ordinary `vk` handles.

use ash::prelude::VkResult;
use ash::vk;

/// What the negotiator needs to know about a physical device.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSummary {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub geometry_shader: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDesc {
    /// One queue (priority 1.0) is requested from each listed family.
    pub queue_families: Vec<u32>,
    pub extensions: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sharing {
    Exclusive,
    Concurrent([u32; 2]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing: Sharing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineDesc {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub extent: vk::Extent2D,
    pub vertex: vk::ShaderModule,
    pub fragment: vk::ShaderModule,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferDesc {
    pub render_pass: vk::RenderPass,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassBegin {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitDesc {
    pub command_buffer: vk::CommandBuffer,
    pub wait: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub signal: vk::Semaphore,
    pub fence: vk::Fence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentDesc {
    pub wait: vk::Semaphore,
    pub swapchain: vk::SwapchainKHR,
    pub image_index: u32,
}

/// Every long-lived object a session can own. Command buffers are absent:
/// they are freed together with their pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuObject {
    Instance(vk::Instance),
    Surface(vk::SurfaceKHR),
    Device(vk::Device),
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    RenderPass(vk::RenderPass),
    ShaderModule(vk::ShaderModule),
    PipelineLayout(vk::PipelineLayout),
    Pipeline(vk::Pipeline),
    Framebuffer(vk::Framebuffer),
    CommandPool(vk::CommandPool),
    Semaphore(vk::Semaphore),
    Fence(vk::Fence),
}

pub trait Gpu {
    // Instance level. The instance and the surface already exist when a
    // `Gpu` is handed to the builder.
    fn instance(&self) -> vk::Instance;
    fn surface(&self) -> vk::SurfaceKHR;
    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn device_summary(&self, device: vk::PhysicalDevice) -> DeviceSummary;
    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn surface_support(&self, device: vk::PhysicalDevice, family: u32) -> VkResult<bool>;
    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn present_modes(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>>;
    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<String>>;

    // Device level.
    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device>;
    fn device_queue(&self, family: u32) -> VkResult<vk::Queue>;
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn create_image_view(&mut self, image: vk::Image, format: vk::Format)
        -> VkResult<vk::ImageView>;
    fn create_render_pass(&mut self, color_format: vk::Format) -> VkResult<vk::RenderPass>;
    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule>;
    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout>;
    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> VkResult<vk::Pipeline>;
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer>;
    fn create_command_pool(&mut self, family: u32) -> VkResult<vk::CommandPool>;
    fn allocate_command_buffer(&mut self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer>;
    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore>;
    fn create_fence(&mut self, signaled: bool) -> VkResult<vk::Fence>;

    // Frame loop.
    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()>;
    fn reset_fence(&mut self, fence: vk::Fence) -> VkResult<()>;
    /// Returns the image index and whether the swap chain is suboptimal.
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    fn reset_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn begin_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn cmd_begin_render_pass(&mut self, cmd: vk::CommandBuffer, begin: &RenderPassBegin);
    fn cmd_bind_pipeline(&mut self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_draw(&mut self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32);
    fn cmd_end_render_pass(&mut self, cmd: vk::CommandBuffer);
    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn queue_submit(&mut self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()>;
    /// Submits no work: waits on `wait` and signals `fence` (if not null).
    /// Hands an acquired image back when its frame is abandoned.
    fn queue_release(
        &mut self,
        queue: vk::Queue,
        wait: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags,
        fence: vk::Fence,
    ) -> VkResult<()>;
    /// Returns whether the swap chain is suboptimal.
    fn queue_present(&mut self, queue: vk::Queue, present: &PresentDesc) -> VkResult<bool>;
    fn device_wait_idle(&mut self) -> VkResult<()>;

    fn destroy(&mut self, object: GpuObject);
}

impl<G: Gpu + ?Sized> Gpu for &mut G {
    fn instance(&self) -> vk::Instance {
        (**self).instance()
    }
    fn surface(&self) -> vk::SurfaceKHR {
        (**self).surface()
    }
    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        (**self).enumerate_physical_devices()
    }
    fn device_summary(&self, device: vk::PhysicalDevice) -> DeviceSummary {
        (**self).device_summary(device)
    }
    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        (**self).queue_families(device)
    }
    fn surface_support(&self, device: vk::PhysicalDevice, family: u32) -> VkResult<bool> {
        (**self).surface_support(device, family)
    }
    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        (**self).surface_capabilities(device)
    }
    fn surface_formats(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        (**self).surface_formats(device)
    }
    fn present_modes(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>> {
        (**self).present_modes(device)
    }
    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        (**self).device_extensions(device)
    }
    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        (**self).create_device(physical, desc)
    }
    fn device_queue(&self, family: u32) -> VkResult<vk::Queue> {
        (**self).device_queue(family)
    }
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        (**self).create_swapchain(desc)
    }
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        (**self).swapchain_images(swapchain)
    }
    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
    ) -> VkResult<vk::ImageView> {
        (**self).create_image_view(image, format)
    }
    fn create_render_pass(&mut self, color_format: vk::Format) -> VkResult<vk::RenderPass> {
        (**self).create_render_pass(color_format)
    }
    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        (**self).create_shader_module(code)
    }
    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        (**self).create_pipeline_layout()
    }
    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> VkResult<vk::Pipeline> {
        (**self).create_graphics_pipeline(desc)
    }
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer> {
        (**self).create_framebuffer(desc)
    }
    fn create_command_pool(&mut self, family: u32) -> VkResult<vk::CommandPool> {
        (**self).create_command_pool(family)
    }
    fn allocate_command_buffer(&mut self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        (**self).allocate_command_buffer(pool)
    }
    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        (**self).create_semaphore()
    }
    fn create_fence(&mut self, signaled: bool) -> VkResult<vk::Fence> {
        (**self).create_fence(signaled)
    }
    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()> {
        (**self).wait_for_fence(fence, timeout_ns)
    }
    fn reset_fence(&mut self, fence: vk::Fence) -> VkResult<()> {
        (**self).reset_fence(fence)
    }
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        (**self).acquire_next_image(swapchain, timeout_ns, signal)
    }
    fn reset_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        (**self).reset_command_buffer(cmd)
    }
    fn begin_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        (**self).begin_command_buffer(cmd)
    }
    fn cmd_begin_render_pass(&mut self, cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        (**self).cmd_begin_render_pass(cmd, begin)
    }
    fn cmd_bind_pipeline(&mut self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        (**self).cmd_bind_pipeline(cmd, pipeline)
    }
    fn cmd_draw(&mut self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        (**self).cmd_draw(cmd, vertex_count, instance_count)
    }
    fn cmd_end_render_pass(&mut self, cmd: vk::CommandBuffer) {
        (**self).cmd_end_render_pass(cmd)
    }
    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        (**self).end_command_buffer(cmd)
    }
    fn queue_submit(&mut self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        (**self).queue_submit(queue, submit)
    }
    fn queue_release(
        &mut self,
        queue: vk::Queue,
        wait: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags,
        fence: vk::Fence,
    ) -> VkResult<()> {
        (**self).queue_release(queue, wait, wait_stage, fence)
    }
    fn queue_present(&mut self, queue: vk::Queue, present: &PresentDesc) -> VkResult<bool> {
        (**self).queue_present(queue, present)
    }
    fn device_wait_idle(&mut self) -> VkResult<()> {
        (**self).device_wait_idle()
    }
    fn destroy(&mut self, object: GpuObject) {
        (**self).destroy(object)
    }
}

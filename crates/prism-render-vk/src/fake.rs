// SPDX-License-Identifier: CEPL-1.0
//! Scripted stand-in for a GPU. Records every call and completes submitted
//! work instantly unless told to stall.

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use std::collections::HashMap;

use crate::config::SWAPCHAIN_EXTENSION;
use crate::gpu::*;
use crate::negotiate::PREFERRED_FORMAT;

#[derive(Clone, Debug)]
pub(crate) struct FakeDevice {
    name: String,
    device_type: vk::PhysicalDeviceType,
    geometry_shader: bool,
    queue_flags: Vec<vk::QueueFlags>,
    present_families: Vec<u32>,
    capabilities: vk::SurfaceCapabilitiesKHR,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
    extensions: Vec<String>,
}

impl FakeDevice {
    pub(crate) fn discrete() -> Self {
        Self {
            name: "fake discrete".to_owned(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            geometry_shader: true,
            queue_flags: vec![vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER],
            present_families: vec![0],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![PREFERRED_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            extensions: vec![SWAPCHAIN_EXTENSION.to_owned()],
        }
    }

    pub(crate) fn integrated() -> Self {
        Self {
            name: "fake integrated".to_owned(),
            device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
            ..Self::discrete()
        }
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub(crate) fn geometry_shader(mut self, on: bool) -> Self {
        self.geometry_shader = on;
        self
    }

    pub(crate) fn families(mut self, flags: &[vk::QueueFlags], present: &[u32]) -> Self {
        self.queue_flags = flags.to_vec();
        self.present_families = present.to_vec();
        self
    }

    pub(crate) fn capabilities(mut self, caps: vk::SurfaceCapabilitiesKHR) -> Self {
        self.capabilities = caps;
        self
    }

    pub(crate) fn formats(mut self, formats: Vec<vk::SurfaceFormatKHR>) -> Self {
        self.formats = formats;
        self
    }

    pub(crate) fn present_modes(mut self, modes: Vec<vk::PresentModeKHR>) -> Self {
        self.present_modes = modes;
        self
    }

    pub(crate) fn extensions(mut self, names: &[&str]) -> Self {
        self.extensions = names.iter().map(|s| (*s).to_owned()).collect();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    WaitFence(vk::Fence),
    ResetFence(vk::Fence),
    Acquire { signal: vk::Semaphore },
    ResetCommandBuffer(vk::CommandBuffer),
    BeginCommandBuffer(vk::CommandBuffer),
    BeginRenderPass(vk::Framebuffer),
    BindPipeline(vk::Pipeline),
    Draw { vertices: u32, instances: u32 },
    EndRenderPass,
    EndCommandBuffer(vk::CommandBuffer),
    Submit(SubmitDesc),
    Release { wait: vk::Semaphore, fence: vk::Fence },
    Present(PresentDesc),
    WaitIdle,
}

#[derive(Debug, Default)]
pub(crate) struct FakeGpu {
    devices: Vec<FakeDevice>,
    selected: Option<usize>,
    next_handle: u64,
    /// Name of the create call that should fail.
    pub(crate) fail_on: Option<&'static str>,
    /// When set, submitted work never completes.
    pub(crate) stall: bool,
    pub(crate) fail_release: bool,
    /// When set, no swap chain image ever becomes available.
    pub(crate) starve_acquire: bool,
    pub(crate) acquire_suboptimal: bool,
    /// Result every present returns instead of `Ok(false)`.
    pub(crate) present_result: Option<VkResult<bool>>,
    pub(crate) acquire_timeout_ns: Option<u64>,

    pub(crate) calls: Vec<Call>,
    pub(crate) created: Vec<GpuObject>,
    pub(crate) destroyed: Vec<GpuObject>,
    pub(crate) device_desc: Option<DeviceDesc>,
    pub(crate) swapchain_desc: Option<SwapchainDesc>,
    pub(crate) pipeline_desc: Option<PipelineDesc>,
    pub(crate) framebuffer_descs: Vec<FramebufferDesc>,
    pub(crate) render_pass_format: Option<vk::Format>,
    pub(crate) pool_family: Option<u32>,
    pub(crate) fence_raises: usize,

    fences: HashMap<vk::Fence, bool>,
    swapchain_images: Vec<vk::Image>,
    next_image: u32,
    recording: bool,
    in_render_pass: bool,
}

impl FakeGpu {
    pub(crate) fn with_devices(devices: Vec<FakeDevice>) -> Self {
        let mut gpu = Self {
            devices,
            next_handle: 10_000,
            ..Default::default()
        };
        let (instance, surface) = (gpu.instance(), gpu.surface());
        gpu.created.push(GpuObject::Instance(instance));
        gpu.created.push(GpuObject::Surface(surface));
        gpu
    }

    pub(crate) fn physical(&self, index: usize) -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(1_000 + index as u64)
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub(crate) fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.fences.get(&fence).copied().unwrap_or(false)
    }

    fn device(&self, physical: vk::PhysicalDevice) -> &FakeDevice {
        &self.devices[(physical.as_raw() - 1_000) as usize]
    }

    fn check(&self, op: &'static str) -> VkResult<()> {
        if self.fail_on == Some(op) {
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        } else {
            Ok(())
        }
    }

    fn handle<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        H::from_raw(self.next_handle)
    }

    fn make<H: Handle + Copy>(
        &mut self,
        op: &'static str,
        wrap: fn(H) -> GpuObject,
    ) -> VkResult<H> {
        self.check(op)?;
        let h: H = self.handle();
        self.created.push(wrap(h));
        Ok(h)
    }
}

impl Gpu for FakeGpu {
    fn instance(&self) -> vk::Instance {
        vk::Instance::from_raw(1)
    }

    fn surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(2)
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((0..self.devices.len()).map(|i| self.physical(i)).collect())
    }

    fn device_summary(&self, device: vk::PhysicalDevice) -> DeviceSummary {
        let d = self.device(device);
        DeviceSummary {
            name: d.name.clone(),
            device_type: d.device_type,
            geometry_shader: d.geometry_shader,
        }
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.device(device)
            .queue_flags
            .iter()
            .map(|&queue_flags| vk::QueueFamilyProperties {
                queue_flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }

    fn surface_support(&self, device: vk::PhysicalDevice, family: u32) -> VkResult<bool> {
        Ok(self.device(device).present_families.contains(&family))
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.device(device).capabilities)
    }

    fn surface_formats(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.device(device).formats.clone())
    }

    fn present_modes(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.device(device).present_modes.clone())
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        Ok(self.device(device).extensions.clone())
    }

    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        let device = self.make("create_device", GpuObject::Device)?;
        self.selected = Some((physical.as_raw() - 1_000) as usize);
        self.device_desc = Some(desc.clone());
        Ok(device)
    }

    fn device_queue(&self, family: u32) -> VkResult<vk::Queue> {
        Ok(vk::Queue::from_raw(500 + u64::from(family)))
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let swapchain = self.make("create_swapchain", GpuObject::Swapchain)?;
        self.swapchain_desc = Some(*desc);
        let images: Vec<vk::Image> = (0..desc.min_image_count).map(|_| self.handle()).collect();
        self.swapchain_images = images;
        Ok(swapchain)
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        Ok(self.swapchain_images.clone())
    }

    fn create_image_view(
        &mut self,
        _image: vk::Image,
        _format: vk::Format,
    ) -> VkResult<vk::ImageView> {
        self.make("create_image_view", GpuObject::ImageView)
    }

    fn create_render_pass(&mut self, color_format: vk::Format) -> VkResult<vk::RenderPass> {
        self.render_pass_format = Some(color_format);
        self.make("create_render_pass", GpuObject::RenderPass)
    }

    fn create_shader_module(&mut self, _code: &[u32]) -> VkResult<vk::ShaderModule> {
        self.make("create_shader_module", GpuObject::ShaderModule)
    }

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        self.make("create_pipeline_layout", GpuObject::PipelineLayout)
    }

    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> VkResult<vk::Pipeline> {
        self.pipeline_desc = Some(*desc);
        self.make("create_graphics_pipeline", GpuObject::Pipeline)
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer> {
        self.framebuffer_descs.push(*desc);
        self.make("create_framebuffer", GpuObject::Framebuffer)
    }

    fn create_command_pool(&mut self, family: u32) -> VkResult<vk::CommandPool> {
        self.pool_family = Some(family);
        self.make("create_command_pool", GpuObject::CommandPool)
    }

    fn allocate_command_buffer(&mut self, _pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        self.check("allocate_command_buffer")?;
        Ok(self.handle())
    }

    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        self.make("create_semaphore", GpuObject::Semaphore)
    }

    fn create_fence(&mut self, signaled: bool) -> VkResult<vk::Fence> {
        let fence = self.make("create_fence", GpuObject::Fence)?;
        self.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()> {
        self.calls.push(Call::WaitFence(fence));
        if self.fence_signaled(fence) {
            Ok(())
        } else if timeout_ns == u64::MAX {
            panic!("unbounded wait on a fence that will never signal");
        } else {
            Err(vk::Result::TIMEOUT)
        }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> VkResult<()> {
        self.calls.push(Call::ResetFence(fence));
        self.fences.insert(fence, false);
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        _swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.check("acquire_next_image")?;
        self.acquire_timeout_ns = Some(timeout_ns);
        if self.starve_acquire {
            assert!(timeout_ns != u64::MAX, "unbounded acquire that will never complete");
            return Err(vk::Result::TIMEOUT);
        }
        self.calls.push(Call::Acquire { signal });
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.swapchain_images.len().max(1) as u32;
        Ok((index, self.acquire_suboptimal))
    }

    fn reset_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        assert!(!self.recording, "reset while recording");
        self.calls.push(Call::ResetCommandBuffer(cmd));
        Ok(())
    }

    fn begin_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        self.recording = true;
        self.calls.push(Call::BeginCommandBuffer(cmd));
        Ok(())
    }

    fn cmd_begin_render_pass(&mut self, _cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        assert!(self.recording && !self.in_render_pass);
        self.in_render_pass = true;
        self.calls.push(Call::BeginRenderPass(begin.framebuffer));
    }

    fn cmd_bind_pipeline(&mut self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        assert!(self.in_render_pass);
        self.calls.push(Call::BindPipeline(pipeline));
    }

    fn cmd_draw(&mut self, _cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        assert!(self.in_render_pass, "draw outside a render pass");
        self.calls.push(Call::Draw {
            vertices: vertex_count,
            instances: instance_count,
        });
    }

    fn cmd_end_render_pass(&mut self, _cmd: vk::CommandBuffer) {
        assert!(self.in_render_pass);
        self.in_render_pass = false;
        self.calls.push(Call::EndRenderPass);
    }

    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        assert!(self.recording && !self.in_render_pass);
        self.recording = false;
        self.calls.push(Call::EndCommandBuffer(cmd));
        Ok(())
    }

    fn queue_submit(&mut self, _queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        self.check("queue_submit")?;
        assert!(
            !self.fence_signaled(submit.fence),
            "submitted with a fence that was never reset"
        );
        self.calls.push(Call::Submit(*submit));
        if !self.stall {
            self.fences.insert(submit.fence, true);
            self.fence_raises += 1;
        }
        Ok(())
    }

    fn queue_release(
        &mut self,
        _queue: vk::Queue,
        wait: vk::Semaphore,
        _wait_stage: vk::PipelineStageFlags,
        fence: vk::Fence,
    ) -> VkResult<()> {
        if self.fail_release {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        self.calls.push(Call::Release { wait, fence });
        if fence != vk::Fence::null() && !self.stall {
            self.fences.insert(fence, true);
        }
        Ok(())
    }

    fn queue_present(&mut self, _queue: vk::Queue, present: &PresentDesc) -> VkResult<bool> {
        self.calls.push(Call::Present(*present));
        self.check("queue_present")?;
        self.present_result.unwrap_or(Ok(false))
    }

    fn device_wait_idle(&mut self) -> VkResult<()> {
        self.calls.push(Call::WaitIdle);
        Ok(())
    }

    fn destroy(&mut self, object: GpuObject) {
        self.destroyed.push(object);
    }
}

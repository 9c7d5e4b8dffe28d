// SPDX-License-Identifier: CEPL-1.0
//! [`Gpu`] over `ash`. Owns the loader tables; the session owns the handles.

use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr, CString};
use tracing::{debug, error, info, warn};

use crate::config::{SessionConfig, VALIDATION_LAYER};
use crate::debug::DebugMessenger;
use crate::error::{BuildStep, SessionError, SessionResult};
use crate::gpu::*;
use crate::negotiate::missing_names;

const SHADER_ENTRY: &CStr = c"main";

pub struct AshGpu {
    entry: Entry,
    instance: ash::Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
    device: Option<ash::Device>,
    swapchain_loader: Option<swapchain::Device>,
}

unsafe fn name_of(raw: &[c_char]) -> String {
    CStr::from_ptr(raw.as_ptr()).to_string_lossy().into_owned()
}

fn c_strings<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<CString> {
    names
        .into_iter()
        .filter_map(|n| match CString::new(n) {
            Ok(c) => Some(c),
            Err(_) => {
                warn!("ignoring name with an interior NUL: {n:?}");
                None
            }
        })
        .collect()
}

impl AshGpu {
    /// Loads Vulkan, creates the instance (plus the validation messenger when
    /// the layer is enabled) and the window surface.
    // STRICT ORDER:
    // 1) instance, with platform WSI extensions (+ debug utils under validation)
    // 2) messenger
    // 3) surface FROM THIS INSTANCE; devices are later judged against it
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        config: &SessionConfig,
    ) -> SessionResult<Self> {
        let dh = display.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();

        let entry = unsafe { Entry::load()? };

        let platform_exts = ash_window::enumerate_required_extensions(dh)
            .map_err(SessionError::create(BuildStep::Instance))?;
        log_instance_diagnostics(&entry, platform_exts);

        // --- Layers: missing ones are reported and left out ---
        let available: Vec<String> = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(SessionError::create(BuildStep::Instance))?
            .iter()
            .map(|l| unsafe { name_of(&l.layer_name) })
            .collect();
        let missing = missing_names(&config.required_layers, &available);
        for name in &missing {
            error!("required instance layer {name} is not available; continuing without it");
        }
        let enabled: Vec<&str> = config
            .required_layers
            .iter()
            .map(String::as_str)
            .filter(|n| !missing.contains(n))
            .collect();
        let validation = enabled.contains(&VALIDATION_LAYER);
        let layer_names = c_strings(enabled);
        let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|c| c.as_ptr()).collect();

        let mut ext_ptrs = platform_exts.to_vec();
        if validation {
            ext_ptrs.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let app = CString::new(config.app_name.as_str()).unwrap_or_else(|_| c"Hello Vulkan".into());
        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: app.as_ptr(),
            application_version: vk::make_api_version(0, 1, 0, 0),
            p_engine_name: c"No Engine".as_ptr(),
            engine_version: vk::make_api_version(0, 1, 0, 0),
            api_version: vk::API_VERSION_1_0,
            ..Default::default()
        };
        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_application_info: &app_info,
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            ..Default::default()
        };
        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(SessionError::create(BuildStep::Instance))?;
        info!("instance created ({} layer(s))", layer_ptrs.len());

        let debug = if validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(m) => Some(m),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(SessionError::create(BuildStep::DebugMessenger)(e));
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = match unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) } {
            Ok(s) => s,
            Err(e) => {
                unsafe {
                    if let Some(m) = debug {
                        m.destroy();
                    }
                    instance.destroy_instance(None);
                }
                return Err(SessionError::create(BuildStep::Surface)(e));
            }
        };
        info!("surface created");

        Ok(Self {
            entry,
            instance,
            debug,
            surface_loader,
            surface,
            device: None,
            swapchain_loader: None,
        })
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn swapchain_loader(&self) -> VkResult<&swapchain::Device> {
        self.swapchain_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }
}

fn log_instance_diagnostics(entry: &Entry, platform_exts: &[*const c_char]) {
    match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => {
            debug!("{} instance layer(s) available:", layers.len());
            for layer in &layers {
                debug!("\t{}", unsafe { name_of(&layer.layer_name) });
            }
        }
        Err(e) => warn!("enumerate_instance_layer_properties failed: {e}"),
    }
    match unsafe { entry.enumerate_instance_extension_properties(None) } {
        Ok(exts) => {
            debug!("{} instance extension(s) available:", exts.len());
            for ext in &exts {
                debug!("\t{}", unsafe { name_of(&ext.extension_name) });
            }
        }
        Err(e) => warn!("enumerate_instance_extension_properties failed: {e}"),
    }
    debug!("{} platform extension(s) required:", platform_exts.len());
    for &ptr in platform_exts {
        debug!("\t{}", unsafe { CStr::from_ptr(ptr) }.to_string_lossy());
    }
}

impl Gpu for AshGpu {
    fn instance(&self) -> vk::Instance {
        self.instance.handle()
    }

    fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
    }

    fn device_summary(&self, device: vk::PhysicalDevice) -> DeviceSummary {
        let (props, features) = unsafe {
            (
                self.instance.get_physical_device_properties(device),
                self.instance.get_physical_device_features(device),
            )
        };
        DeviceSummary {
            name: unsafe { name_of(&props.device_name) },
            device_type: props.device_type,
            geometry_shader: features.geometry_shader == vk::TRUE,
        }
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(device)
        }
    }

    fn surface_support(&self, device: vk::PhysicalDevice, family: u32) -> VkResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, family, self.surface)
        }
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(device, self.surface)
        }
    }

    fn surface_formats(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(device, self.surface)
        }
    }

    fn present_modes(&self, device: vk::PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(device, self.surface)
        }
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        let props = unsafe { self.instance.enumerate_device_extension_properties(device) }?;
        Ok(props
            .iter()
            .map(|e| unsafe { name_of(&e.extension_name) })
            .collect())
    }

    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = desc
            .queue_families
            .iter()
            .map(|&family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();
        let ext_names = c_strings(desc.extensions.iter().map(String::as_str));
        let ext_ptrs: Vec<*const c_char> = ext_names.iter().map(|c| c.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };
        let device = unsafe { self.instance.create_device(physical, &dinfo, None) }?;
        let handle = device.handle();
        self.swapchain_loader = Some(swapchain::Device::new(&self.instance, &device));
        self.device = Some(device);
        Ok(handle)
    }

    fn device_queue(&self, family: u32) -> VkResult<vk::Queue> {
        Ok(unsafe { self.device()?.get_device_queue(family, 0) })
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let (sharing_mode, families): (vk::SharingMode, &[u32]) = match &desc.sharing {
            Sharing::Exclusive => (vk::SharingMode::EXCLUSIVE, &[]),
            Sharing::Concurrent(families) => (vk::SharingMode::CONCURRENT, &families[..]),
        };
        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.surface,
            min_image_count: desc.min_image_count,
            image_format: desc.format.format,
            image_color_space: desc.format.color_space,
            image_extent: desc.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: families.len() as u32,
            p_queue_family_indices: families.as_ptr(),
            pre_transform: desc.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: desc.present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        unsafe { self.swapchain_loader()?.create_swapchain(&info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
    }

    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
    ) -> VkResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            components: vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            },
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        unsafe { self.device()?.create_image_view(&info, None) }
    }

    fn create_render_pass(&mut self, color_format: vk::Format) -> VkResult<vk::RenderPass> {
        // Single color attachment: cleared on load, handed to presentation.
        let attachment = vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            ..Default::default()
        };
        // The layout transition waits for the acquire semaphore's stage.
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &attachment,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        unsafe { self.device()?.create_render_pass(&info, None) }
    }

    fn create_shader_module(&mut self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: code.as_ptr(),
            code_size: std::mem::size_of_val(code),
            ..Default::default()
        };
        unsafe { self.device()?.create_shader_module(&info, None) }
    }

    fn create_pipeline_layout(&mut self) -> VkResult<vk::PipelineLayout> {
        // No descriptor sets, no push constants.
        let info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.device()?.create_pipeline_layout(&info, None) }
    }

    fn create_graphics_pipeline(&mut self, desc: &PipelineDesc) -> VkResult<vk::Pipeline> {
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: desc.vertex,
                p_name: SHADER_ENTRY.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: desc.fragment,
                p_name: SHADER_ENTRY.as_ptr(),
                ..Default::default()
            },
        ];

        // Vertices come from the vertex index; nothing is bound.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };
        // Static viewport/scissor: the swap chain never changes size.
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: desc.extent.width as f32,
            height: desc.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: desc.extent,
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: &viewport,
            scissor_count: 1,
            p_scissors: &scissor,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        // No blending; write all RGBA.
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::R
                | vk::ColorComponentFlags::G
                | vk::ColorComponentFlags::B
                | vk::ColorComponentFlags::A,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            logic_op_enable: vk::FALSE,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_color_blend_state: &color_blend,
            layout: desc.layout,
            render_pass: desc.render_pass,
            subpass: 0,
            ..Default::default()
        };

        let pipelines = unsafe {
            self.device()?.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        }
        .map_err(|(_, err)| err)?;
        pipelines
            .first()
            .copied()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> VkResult<vk::Framebuffer> {
        let info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass: desc.render_pass,
            attachment_count: 1,
            p_attachments: &desc.view,
            width: desc.extent.width,
            height: desc.extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device()?.create_framebuffer(&info, None) }
    }

    fn create_command_pool(&mut self, family: u32) -> VkResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: family,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        unsafe { self.device()?.create_command_pool(&info, None) }
    }

    fn allocate_command_buffer(&mut self, pool: vk::CommandPool) -> VkResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let bufs = unsafe { self.device()?.allocate_command_buffers(&info) }?;
        bufs.first()
            .copied()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn create_semaphore(&mut self) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::default();
        unsafe { self.device()?.create_semaphore(&info, None) }
    }

    fn create_fence(&mut self, signaled: bool) -> VkResult<vk::Fence> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device()?.create_fence(&info, None) }
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()> {
        unsafe { self.device()?.wait_for_fences(&[fence], true, timeout_ns) }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device()?.reset_fences(&[fence]) }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader()?
                .acquire_next_image(swapchain, timeout_ns, signal, vk::Fence::null())
        }
    }

    fn reset_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.device()?
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
    }

    fn begin_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        unsafe { self.device()?.begin_command_buffer(cmd, &info) }
    }

    fn cmd_begin_render_pass(&mut self, cmd: vk::CommandBuffer, begin: &RenderPassBegin) {
        let Some(device) = &self.device else {
            warn!("cmd_begin_render_pass with no device; skipped");
            return;
        };
        let clear = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: begin.clear_color,
            },
        };
        let info = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: begin.render_pass,
            framebuffer: begin.framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: begin.extent,
            },
            clear_value_count: 1,
            p_clear_values: &clear,
            ..Default::default()
        };
        unsafe { device.cmd_begin_render_pass(cmd, &info, vk::SubpassContents::INLINE) };
    }

    fn cmd_bind_pipeline(&mut self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        match &self.device {
            Some(device) => unsafe { device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline) },
            None => warn!("cmd_bind_pipeline with no device; skipped"),
        }
    }

    fn cmd_draw(&mut self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        match &self.device {
            Some(device) => unsafe { device.cmd_draw(cmd, vertex_count, instance_count, 0, 0) },
            None => warn!("cmd_draw with no device; skipped"),
        }
    }

    fn cmd_end_render_pass(&mut self, cmd: vk::CommandBuffer) {
        match &self.device {
            Some(device) => unsafe { device.cmd_end_render_pass(cmd) },
            None => warn!("cmd_end_render_pass with no device; skipped"),
        }
    }

    fn end_command_buffer(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.end_command_buffer(cmd) }
    }

    fn queue_submit(&mut self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &submit.wait,
            p_wait_dst_stage_mask: &submit.wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &submit.command_buffer,
            signal_semaphore_count: 1,
            p_signal_semaphores: &submit.signal,
            ..Default::default()
        };
        unsafe {
            self.device()?
                .queue_submit(queue, std::slice::from_ref(&info), submit.fence)
        }
    }

    fn queue_release(
        &mut self,
        queue: vk::Queue,
        wait: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags,
        fence: vk::Fence,
    ) -> VkResult<()> {
        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            p_wait_dst_stage_mask: &wait_stage,
            ..Default::default()
        };
        unsafe {
            self.device()?
                .queue_submit(queue, std::slice::from_ref(&info), fence)
        }
    }

    fn queue_present(&mut self, queue: vk::Queue, present: &PresentDesc) -> VkResult<bool> {
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &present.wait,
            swapchain_count: 1,
            p_swapchains: &present.swapchain,
            p_image_indices: &present.image_index,
            ..Default::default()
        };
        unsafe { self.swapchain_loader()?.queue_present(queue, &info) }
    }

    fn device_wait_idle(&mut self) -> VkResult<()> {
        match &self.device {
            Some(device) => unsafe { device.device_wait_idle() },
            None => Ok(()),
        }
    }

    fn destroy(&mut self, object: GpuObject) {
        unsafe {
            match object {
                GpuObject::Instance(_) => {
                    if let Some(messenger) = self.debug.take() {
                        messenger.destroy();
                    }
                    self.instance.destroy_instance(None);
                }
                GpuObject::Surface(s) => self.surface_loader.destroy_surface(s, None),
                GpuObject::Device(_) => {
                    self.swapchain_loader = None;
                    if let Some(device) = self.device.take() {
                        device.destroy_device(None);
                    }
                }
                GpuObject::Swapchain(s) => {
                    if let Some(loader) = &self.swapchain_loader {
                        loader.destroy_swapchain(s, None);
                    }
                }
                other => {
                    let Some(d) = &self.device else {
                        warn!("{other:?} outlived its device");
                        return;
                    };
                    match other {
                        GpuObject::ImageView(v) => d.destroy_image_view(v, None),
                        GpuObject::RenderPass(rp) => d.destroy_render_pass(rp, None),
                        GpuObject::ShaderModule(m) => d.destroy_shader_module(m, None),
                        GpuObject::PipelineLayout(l) => d.destroy_pipeline_layout(l, None),
                        GpuObject::Pipeline(p) => d.destroy_pipeline(p, None),
                        GpuObject::Framebuffer(fb) => d.destroy_framebuffer(fb, None),
                        GpuObject::CommandPool(p) => d.destroy_command_pool(p, None),
                        GpuObject::Semaphore(s) => d.destroy_semaphore(s, None),
                        GpuObject::Fence(f) => d.destroy_fence(f, None),
                        GpuObject::Instance(_)
                        | GpuObject::Surface(_)
                        | GpuObject::Device(_)
                        | GpuObject::Swapchain(_) => {}
                    }
                }
            }
        }
    }
}

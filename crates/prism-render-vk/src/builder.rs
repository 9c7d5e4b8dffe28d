// SPDX-License-Identifier: CEPL-1.0
//! The resource builder chain.
//!
//! STRICT ORDER: device, swap chain, image views, render pass, pipeline,
//! framebuffers, command pool + buffer, sync set. Each step only reads what
//! earlier steps returned and records what it creates in the ledger, so a
//! failure anywhere can release exactly what exists.

use ash::vk;
use prism_render::RenderSize;
use tracing::{error, info};

use crate::config::SessionConfig;
use crate::error::{BuildStep, SessionError, SessionResult};
use crate::gpu::{DeviceDesc, FramebufferDesc, Gpu, GpuObject, PipelineDesc, SwapchainDesc};
use crate::negotiate::{self, QueueFamilies, SurfaceNegotiation};
use crate::session::{Ledger, Session, Swapchain};
use crate::shader::ShaderBytecode;
use crate::sync::{self, SyncSet};

/// A session under construction. [`SessionBuilder::build`] either yields a
/// ready [`Session`] or releases everything it created.
pub struct SessionBuilder<G: Gpu> {
    gpu: G,
    config: SessionConfig,
    shaders: ShaderBytecode,
    framebuffer: RenderSize,
}

#[derive(Clone, Debug)]
pub(crate) struct DeviceParts {
    pub(crate) name: String,
    pub(crate) families: QueueFamilies,
    pub(crate) device: vk::Device,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
}

pub(crate) struct SessionParts {
    pub(crate) device: DeviceParts,
    pub(crate) swapchain: Swapchain,
    pub(crate) image_views: Vec<vk::ImageView>,
    pub(crate) render_pass: vk::RenderPass,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) framebuffers: Vec<vk::Framebuffer>,
    pub(crate) command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    pub(crate) sync: SyncSet,
}

impl<G: Gpu> SessionBuilder<G> {
    /// `framebuffer` is the window's pixel size, used when the surface lets
    /// the swap chain pick its own extent.
    pub fn new(
        gpu: G,
        config: SessionConfig,
        shaders: ShaderBytecode,
        framebuffer: RenderSize,
    ) -> Self {
        Self {
            gpu,
            config,
            shaders,
            framebuffer,
        }
    }

    pub fn build(self) -> SessionResult<Session<G>> {
        let Self {
            mut gpu,
            config,
            shaders,
            framebuffer,
        } = self;

        let mut ledger = Ledger::default();
        ledger.push(GpuObject::Instance(gpu.instance()));
        ledger.push(GpuObject::Surface(gpu.surface()));

        match build_parts(&mut gpu, &mut ledger, &config, &shaders, framebuffer) {
            Ok(parts) => Ok(Session::from_parts(gpu, config, ledger, parts)),
            Err(e) => {
                error!("session build failed: {e}");
                ledger.unwind(&mut gpu);
                Err(e)
            }
        }
    }
}

fn build_parts<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    config: &SessionConfig,
    shaders: &ShaderBytecode,
    framebuffer: RenderSize,
) -> SessionResult<SessionParts> {
    let (device, surface) = create_logical_device(gpu, ledger, config)?;
    let swapchain = create_swapchain(
        gpu,
        ledger,
        &surface.plan(framebuffer, device.families),
    )?;
    let image_views = create_image_views(gpu, ledger, &swapchain)?;
    let render_pass = create_render_pass(gpu, ledger, swapchain.format.format)?;
    let (pipeline_layout, pipeline) =
        create_pipeline(gpu, ledger, render_pass, swapchain.extent, shaders)?;
    let framebuffers =
        create_framebuffers(gpu, ledger, render_pass, &image_views, swapchain.extent)?;
    let (command_pool, command_buffer) =
        create_command_resources(gpu, ledger, device.families.graphics)?;
    let sync = sync::create_sync_set(gpu, ledger)?;
    info!("sync objects created");

    Ok(SessionParts {
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
    })
}

/// Negotiates a device, then creates it with one queue per unique family.
pub(crate) fn create_logical_device<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    config: &SessionConfig,
) -> SessionResult<(DeviceParts, SurfaceNegotiation)> {
    let selected = negotiate::pick_physical_device(gpu)?;
    let surface = negotiate::negotiate_surface(gpu, selected.physical)?;
    negotiate::check_device_extensions(gpu, selected.physical, &config.required_device_extensions)?;

    let desc = DeviceDesc {
        queue_families: selected.families.unique(),
        extensions: config.required_device_extensions.iter().cloned().collect(),
    };
    let device = gpu
        .create_device(selected.physical, &desc)
        .map_err(SessionError::create(BuildStep::Device))?;
    ledger.push(GpuObject::Device(device));

    let graphics_queue = gpu
        .device_queue(selected.families.graphics)
        .map_err(SessionError::create(BuildStep::Device))?;
    let present_queue = gpu
        .device_queue(selected.families.present)
        .map_err(SessionError::create(BuildStep::Device))?;
    info!(
        "logical device created ({} queue family/families)",
        desc.queue_families.len()
    );

    Ok((
        DeviceParts {
            name: selected.name,
            families: selected.families,
            device,
            graphics_queue,
            present_queue,
        },
        surface,
    ))
}

pub(crate) fn create_swapchain<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    desc: &SwapchainDesc,
) -> SessionResult<Swapchain> {
    let handle = gpu
        .create_swapchain(desc)
        .map_err(SessionError::create(BuildStep::Swapchain))?;
    ledger.push(GpuObject::Swapchain(handle));
    let images = gpu
        .swapchain_images(handle)
        .map_err(SessionError::create(BuildStep::Swapchain))?;
    info!(
        "swap chain created ({}x{}, {:?}/{:?}, {:?}, {} images, {:?})",
        desc.extent.width,
        desc.extent.height,
        desc.format.format,
        desc.format.color_space,
        desc.present_mode,
        images.len(),
        desc.sharing
    );
    Ok(Swapchain {
        handle,
        format: desc.format,
        extent: desc.extent,
        present_mode: desc.present_mode,
        sharing: desc.sharing,
        images,
    })
}

pub(crate) fn create_image_views<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    swapchain: &Swapchain,
) -> SessionResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(swapchain.images.len());
    for &image in &swapchain.images {
        let view = gpu
            .create_image_view(image, swapchain.format.format)
            .map_err(SessionError::create(BuildStep::ImageViews))?;
        ledger.push(GpuObject::ImageView(view));
        views.push(view);
    }
    info!("{} image views created", views.len());
    Ok(views)
}

pub(crate) fn create_render_pass<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    color_format: vk::Format,
) -> SessionResult<vk::RenderPass> {
    let render_pass = gpu
        .create_render_pass(color_format)
        .map_err(SessionError::create(BuildStep::RenderPass))?;
    ledger.push(GpuObject::RenderPass(render_pass));
    info!("render pass created");
    Ok(render_pass)
}

/// Shader modules only live for the duration of this call.
pub(crate) fn create_pipeline<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    shaders: &ShaderBytecode,
) -> SessionResult<(vk::PipelineLayout, vk::Pipeline)> {
    let vertex = gpu
        .create_shader_module(&shaders.vertex)
        .map_err(SessionError::create(BuildStep::ShaderModules))?;
    let fragment = match gpu.create_shader_module(&shaders.fragment) {
        Ok(m) => m,
        Err(e) => {
            gpu.destroy(GpuObject::ShaderModule(vertex));
            return Err(SessionError::create(BuildStep::ShaderModules)(e));
        }
    };

    let result = create_layout_and_pipeline(gpu, ledger, render_pass, extent, vertex, fragment);

    gpu.destroy(GpuObject::ShaderModule(fragment));
    gpu.destroy(GpuObject::ShaderModule(vertex));
    if result.is_ok() {
        info!("graphics pipeline created");
    }
    result
}

fn create_layout_and_pipeline<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    vertex: vk::ShaderModule,
    fragment: vk::ShaderModule,
) -> SessionResult<(vk::PipelineLayout, vk::Pipeline)> {
    let layout = gpu
        .create_pipeline_layout()
        .map_err(SessionError::create(BuildStep::PipelineLayout))?;
    ledger.push(GpuObject::PipelineLayout(layout));

    let pipeline = gpu
        .create_graphics_pipeline(&PipelineDesc {
            render_pass,
            layout,
            extent,
            vertex,
            fragment,
        })
        .map_err(SessionError::create(BuildStep::Pipeline))?;
    ledger.push(GpuObject::Pipeline(pipeline));
    Ok((layout, pipeline))
}

pub(crate) fn create_framebuffers<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    render_pass: vk::RenderPass,
    views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> SessionResult<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(views.len());
    for &view in views {
        let fb = gpu
            .create_framebuffer(&FramebufferDesc {
                render_pass,
                view,
                extent,
            })
            .map_err(SessionError::create(BuildStep::Framebuffers))?;
        ledger.push(GpuObject::Framebuffer(fb));
        framebuffers.push(fb);
    }
    info!("{} framebuffers created", framebuffers.len());
    Ok(framebuffers)
}

pub(crate) fn create_command_resources<G: Gpu>(
    gpu: &mut G,
    ledger: &mut Ledger,
    graphics_family: u32,
) -> SessionResult<(vk::CommandPool, vk::CommandBuffer)> {
    let pool = gpu
        .create_command_pool(graphics_family)
        .map_err(SessionError::create(BuildStep::CommandPool))?;
    ledger.push(GpuObject::CommandPool(pool));
    let cmd = gpu
        .allocate_command_buffer(pool)
        .map_err(SessionError::create(BuildStep::CommandBuffer))?;
    info!("command pool and command buffer created");
    Ok((pool, cmd))
}

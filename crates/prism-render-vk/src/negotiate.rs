// SPDX-License-Identifier: CEPL-1.0
//! Device, queue family and surface capability negotiation.

use ash::vk;
use prism_render::RenderSize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::error::{BuildStep, SessionError, SessionResult};
use crate::gpu::{Gpu, Sharing, SwapchainDesc};

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Result of scanning a device's queue families for the two roles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyChoice {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyChoice {
    pub fn ready(self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// A choice where both roles are filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Family indices to create queues on, without duplicates.
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    pub fn sharing(&self) -> Sharing {
        if self.graphics == self.present {
            Sharing::Exclusive
        } else {
            Sharing::Concurrent([self.graphics, self.present])
        }
    }
}

/// Forward scan over every family. The last qualifying index wins for each
/// role, and the roles are judged independently.
pub fn choose_queue_families<G: Gpu + ?Sized>(
    gpu: &G,
    device: vk::PhysicalDevice,
) -> QueueFamilyChoice {
    let mut choice = QueueFamilyChoice::default();
    for (index, props) in gpu.queue_families(device).iter().enumerate() {
        let index = index as u32;
        if props.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            choice.graphics = Some(index);
        }
        match gpu.surface_support(device, index) {
            Ok(true) => choice.present = Some(index),
            Ok(false) => {}
            Err(e) => debug!("surface support query for family {index} failed: {e}"),
        }
    }
    choice
}

#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub physical: vk::PhysicalDevice,
    pub name: String,
    pub families: QueueFamilies,
}

/// First discrete GPU with geometry shaders and both queue roles. There is no
/// scoring and no fallback.
pub fn pick_physical_device<G: Gpu + ?Sized>(gpu: &G) -> SessionResult<SelectedDevice> {
    let devices = gpu
        .enumerate_physical_devices()
        .map_err(SessionError::create(BuildStep::Device))?;
    if devices.is_empty() {
        warn!("no GPUs with Vulkan support");
    }

    for physical in devices {
        let summary = gpu.device_summary(physical);
        if summary.device_type != vk::PhysicalDeviceType::DISCRETE_GPU {
            debug!("skipping {}: {:?}", summary.name, summary.device_type);
            continue;
        }
        if !summary.geometry_shader {
            debug!("skipping {}: no geometry shader support", summary.name);
            continue;
        }
        let Some(families) = choose_queue_families(gpu, physical).ready() else {
            debug!("skipping {}: queue families not ready", summary.name);
            continue;
        };
        info!(
            "GPU: {} has been picked (graphics family {}, present family {})",
            summary.name, families.graphics, families.present
        );
        return Ok(SelectedDevice {
            physical,
            name: summary.name,
            families,
        });
    }
    Err(SessionError::NoSuitableDevice)
}

/// Required names absent from `available`, in sorted order.
pub fn missing_names<'a, S: AsRef<str>>(
    required: &'a BTreeSet<String>,
    available: &[S],
) -> Vec<&'a str> {
    required
        .iter()
        .map(String::as_str)
        .filter(|name| !available.iter().any(|a| a.as_ref() == *name))
        .collect()
}

pub fn check_device_extensions<G: Gpu + ?Sized>(
    gpu: &G,
    device: vk::PhysicalDevice,
    required: &BTreeSet<String>,
) -> SessionResult<()> {
    let available = gpu
        .device_extensions(device)
        .map_err(SessionError::create(BuildStep::Device))?;
    match missing_names(required, &available).first() {
        Some(name) => Err(SessionError::MissingDeviceExtension((*name).to_owned())),
        None => Ok(()),
    }
}

/// Surface capabilities as seen from one device. Both lists are non-empty.
#[derive(Clone, Debug)]
pub struct SurfaceNegotiation {
    capabilities: vk::SurfaceCapabilitiesKHR,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
    format: vk::SurfaceFormatKHR,
}

impl SurfaceNegotiation {
    pub fn new(
        capabilities: vk::SurfaceCapabilitiesKHR,
        formats: Vec<vk::SurfaceFormatKHR>,
        present_modes: Vec<vk::PresentModeKHR>,
    ) -> SessionResult<Self> {
        let Some(format) = choose_surface_format(&formats) else {
            return Err(SessionError::NoSurfaceFormats);
        };
        if present_modes.is_empty() {
            return Err(SessionError::NoPresentModes);
        }
        Ok(Self {
            capabilities,
            formats,
            present_modes,
            format,
        })
    }

    pub fn capabilities(&self) -> &vk::SurfaceCapabilitiesKHR {
        &self.capabilities
    }

    pub fn formats(&self) -> &[vk::SurfaceFormatKHR] {
        &self.formats
    }

    pub fn present_modes(&self) -> &[vk::PresentModeKHR] {
        &self.present_modes
    }

    /// The format the swap chain will use.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn plan(&self, framebuffer: RenderSize, families: QueueFamilies) -> SwapchainDesc {
        SwapchainDesc {
            min_image_count: choose_image_count(&self.capabilities),
            format: self.format,
            extent: choose_extent(&self.capabilities, framebuffer),
            present_mode: choose_present_mode(&self.present_modes),
            pre_transform: self.capabilities.current_transform,
            sharing: families.sharing(),
        }
    }
}

pub fn negotiate_surface<G: Gpu + ?Sized>(
    gpu: &G,
    device: vk::PhysicalDevice,
) -> SessionResult<SurfaceNegotiation> {
    let capabilities = gpu
        .surface_capabilities(device)
        .map_err(SessionError::create(BuildStep::Swapchain))?;
    let formats = gpu
        .surface_formats(device)
        .map_err(SessionError::create(BuildStep::Swapchain))?;
    let present_modes = gpu
        .present_modes(device)
        .map_err(SessionError::create(BuildStep::Swapchain))?;
    SurfaceNegotiation::new(capabilities, formats, present_modes)
}

/// BGRA8 sRGB when offered, otherwise whatever the surface lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| *f == PREFERRED_FORMAT)
        .or_else(|| formats.first().copied())
}

/// Always FIFO.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if !modes.contains(&vk::PresentModeKHR::FIFO) {
        warn!("surface does not list FIFO ({modes:?}); using it anyway");
    }
    vk::PresentModeKHR::FIFO
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        want.min(caps.max_image_count)
    } else {
        want
    }
}

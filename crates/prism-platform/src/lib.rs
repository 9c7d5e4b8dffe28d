// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use anyhow::{Context, Result};
use prism_render::RenderSize;
use tracing::info;
use winit::{dpi::PhysicalSize, event_loop::ActiveEventLoop, window::Window};

pub const WINDOW_TITLE: &str = "Hello Vulkan";
pub const WINDOW_SIZE: RenderSize = RenderSize::new(800, 600);

/// Creates the fixed-size window. Resizing is disabled because the swap chain
/// is never recreated.
pub fn create_window(event_loop: &ActiveEventLoop) -> Result<Window> {
    let attrs = Window::default_attributes()
        .with_title(WINDOW_TITLE)
        .with_inner_size(PhysicalSize::new(WINDOW_SIZE.width, WINDOW_SIZE.height))
        .with_resizable(false);
    let window = event_loop.create_window(attrs).context("create_window")?;
    let size = framebuffer_size(&window);
    info!("window created ({}x{})", size.width, size.height);
    Ok(window)
}

pub fn framebuffer_size(window: &Window) -> RenderSize {
    let size = window.inner_size();
    RenderSize {
        width: size.width,
        height: size.height,
    }
}

// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Framebuffer size in physical pixels, as reported by the window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

pub trait Renderer {
    type Config;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        config: &Self::Config,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Runs one full frame cycle.
    fn render(&mut self) -> Result<()>;

    /// Blocks until every submitted frame has retired on the GPU.
    fn wait_idle(&mut self) -> Result<()>;
}

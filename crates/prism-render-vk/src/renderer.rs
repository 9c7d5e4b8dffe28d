// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use prism_render::{RenderSize, Renderer};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

use crate::builder::SessionBuilder;
use crate::config::SessionConfig;
use crate::session::Session;
use crate::shader::ShaderBytecode;
use crate::vulkan::AshGpu;

/// The app-facing renderer: one [`Session`] over real Vulkan.
pub struct VkRenderer {
    session: Session<AshGpu>,
}

impl VkRenderer {
    pub fn session(&self) -> &Session<AshGpu> {
        &self.session
    }
}

impl Renderer for VkRenderer {
    type Config = SessionConfig;

    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        config: &SessionConfig,
    ) -> Result<Self> {
        // Shaders first: nothing GPU-side exists yet if they are missing.
        let shaders = ShaderBytecode::load(&config.shader_dir)
            .with_context(|| format!("loading shaders from {}", config.shader_dir.display()))?;
        let gpu = AshGpu::new(window, display, config).context("creating instance and surface")?;
        let session = SessionBuilder::new(gpu, config.clone(), shaders, size)
            .build()
            .context("building the rendering session")?;
        info!(
            "session ready on {} ({} swap chain images)",
            session.device_name(),
            session.swapchain().images.len()
        );
        Ok(Self { session })
    }

    fn render(&mut self) -> Result<()> {
        self.session.draw_frame()?;
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.session.wait_idle().context("device_wait_idle")?;
        Ok(())
    }
}

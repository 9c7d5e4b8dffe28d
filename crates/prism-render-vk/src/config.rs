// SPDX-License-Identifier: CEPL-1.0
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::shader::BUILTIN_SHADER_DIR;

pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Everything the negotiator and builder need to know up front. Read from the
/// `[session]` table of `prism.toml`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub app_name: String,
    pub required_layers: BTreeSet<String>,
    pub required_device_extensions: BTreeSet<String>,
    /// Unset means wait forever.
    pub gate_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub clear_color: [f32; 4],
    pub shader_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: "Hello Vulkan".to_owned(),
            required_layers: BTreeSet::from([VALIDATION_LAYER.to_owned()]),
            required_device_extensions: BTreeSet::from([SWAPCHAIN_EXTENSION.to_owned()]),
            gate_timeout_ms: None,
            acquire_timeout_ms: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shader_dir: PathBuf::from(BUILTIN_SHADER_DIR),
        }
    }
}

impl SessionConfig {
    pub fn gate_timeout_ns(&self) -> u64 {
        timeout_ns(self.gate_timeout_ms)
    }

    pub fn acquire_timeout_ns(&self) -> u64 {
        timeout_ns(self.acquire_timeout_ms)
    }
}

fn timeout_ns(ms: Option<u64>) -> u64 {
    match ms {
        Some(ms) => u64::try_from(Duration::from_millis(ms).as_nanos()).unwrap_or(u64::MAX),
        None => u64::MAX,
    }
}

// SPDX-License-Identifier: CEPL-1.0
//! Validation layer output, routed into `tracing`.

use ash::ext::debug_utils;
use ash::prelude::VkResult;
use ash::vk;
use std::ffi::CStr;
use tracing::Level;

/// Maps a message severity to the `tracing` level it is logged at.
pub(crate) fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::INFO
    } else {
        Level::DEBUG
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    match severity_level(severity) {
        Level::ERROR => tracing::error!(target: "vulkan", "{types:?} {msg}"),
        Level::WARN => tracing::warn!(target: "vulkan", "{types:?} {msg}"),
        Level::INFO => tracing::info!(target: "vulkan", "{types:?} {msg}"),
        _ => tracing::debug!(target: "vulkan", "{types:?} {msg}"),
    }
    vk::FALSE
}

pub(crate) struct DebugMessenger {
    loader: debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub(crate) unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> VkResult<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let handle = loader.create_debug_utils_messenger(&ci, None)?;
        Ok(Self { loader, handle })
    }

    /// Must run before the owning instance is destroyed.
    pub(crate) unsafe fn destroy(self) {
        self.loader.destroy_debug_utils_messenger(self.handle, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_map_to_matching_levels() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        assert_eq!(severity_level(S::ERROR), Level::ERROR);
        assert_eq!(severity_level(S::WARNING), Level::WARN);
        assert_eq!(severity_level(S::INFO), Level::INFO);
        assert_eq!(severity_level(S::VERBOSE), Level::DEBUG);
        assert_eq!(severity_level(S::WARNING | S::ERROR), Level::ERROR);
    }
}

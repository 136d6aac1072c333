// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
#[cfg(debug_assertions)]
use ash::ext::debug_utils;
use ash::{vk, Entry};
use cubic_render::RenderError;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr};
use tracing::info;

#[cfg(debug_assertions)]
const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[cfg(debug_assertions)]
type DebugState = Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>;
#[cfg(not(debug_assertions))]
type DebugState = ();

/// Loader entry + instance (+ validation messenger in debug builds).
/// Everything else in the backend is created from this and must drop first.
pub struct VkInstance {
    debug: DebugState,
    instance: ash::Instance,
    entry: Entry,
}

impl VkInstance {
    pub fn new(display: RawDisplayHandle) -> Result<Self> {
        // A missing loader is a capability failure, not a crash.
        let entry = unsafe { Entry::load() }.map_err(|e| {
            RenderError::DeviceSelection(format!("Vulkan loader unavailable: {e}"))
        })?;
        let (instance, debug_utils_enabled) = unsafe { create_instance(&entry, display) }
            .context("create_instance (WSI + optional debug utils)")?;
        let debug = unsafe { create_debug_messenger(&entry, &instance, debug_utils_enabled) };
        Ok(Self {
            debug,
            instance,
            entry,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }
}

impl Drop for VkInstance {
    fn drop(&mut self) {
        unsafe {
            destroy_debug_messenger(&mut self.debug);
            self.instance.destroy_instance(None);
        }
    }
}

pub(crate) fn has_name(names: &[[c_char; vk::MAX_EXTENSION_NAME_SIZE]], wanted: &CStr) -> bool {
    names
        .iter()
        .any(|n| unsafe { CStr::from_ptr(n.as_ptr()) } == wanted)
}

/// Returns the instance and whether `VK_EXT_debug_utils` was enabled on it.
unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
) -> Result<(ash::Instance, bool)> {
    let app = c"cubic-meshview";

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: c"cubic".as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    #[cfg_attr(not(debug_assertions), allow(unused_mut))]
    let mut extensions = ash_window::enumerate_required_extensions(display_raw)
        .map_err(|e| RenderError::DeviceSelection(format!("no WSI extensions for display: {e}")))?
        .to_vec();

    #[cfg(debug_assertions)]
    let (layers, debug_utils_enabled) = debug_layers(entry, &mut extensions)?;
    #[cfg(not(debug_assertions))]
    let (layers, debug_utils_enabled): (Vec<*const c_char>, bool) = (Vec::new(), false);

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    // No usable driver (ICD) surfaces here rather than at device enumeration.
    let instance = entry
        .create_instance(&create_info, None)
        .map_err(|e| RenderError::DeviceSelection(format!("vkCreateInstance failed: {e}")))?;
    info!(
        "vk instance: {} extension(s), {} layer(s)",
        extensions.len(),
        layers.len()
    );
    Ok((instance, debug_utils_enabled))
}

/// Enables debug utils and the Khronos validation layer when the loader
/// exposes them. The flag reports whether debug utils made it in.
#[cfg(debug_assertions)]
unsafe fn debug_layers(
    entry: &Entry,
    extensions: &mut Vec<*const c_char>,
) -> Result<(Vec<*const c_char>, bool)> {
    let available: Vec<_> = entry
        .enumerate_instance_extension_properties(None)
        .context("enumerate_instance_extension_properties")?
        .iter()
        .map(|e| e.extension_name)
        .collect();
    let enabled = has_name(&available, debug_utils::NAME);
    if enabled {
        extensions.push(debug_utils::NAME.as_ptr());
    }

    let layer_names: Vec<_> = entry
        .enumerate_instance_layer_properties()
        .unwrap_or_default()
        .iter()
        .map(|l| l.layer_name)
        .collect();
    if has_name(&layer_names, VALIDATION_LAYER) {
        Ok((vec![VALIDATION_LAYER.as_ptr()], enabled))
    } else {
        info!("validation layer not installed; continuing without it");
        Ok((Vec::new(), enabled))
    }
}

#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!("[vulkan] {msg}");
    } else {
        tracing::debug!("[vulkan] {msg}");
    }
    vk::FALSE
}

#[cfg(debug_assertions)]
unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
    enabled: bool,
) -> DebugState {
    if !enabled {
        return None;
    }
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
    match loader.create_debug_utils_messenger(&ci, None) {
        Ok(messenger) => Some((loader, messenger)),
        Err(e) => {
            tracing::debug!("debug messenger unavailable: {e:?}");
            None
        }
    }
}

#[cfg(not(debug_assertions))]
unsafe fn create_debug_messenger(
    _entry: &Entry,
    _instance: &ash::Instance,
    _enabled: bool,
) -> DebugState {
}

#[cfg(debug_assertions)]
unsafe fn destroy_debug_messenger(debug: &mut DebugState) {
    if let Some((loader, messenger)) = debug.take() {
        loader.destroy_debug_utils_messenger(messenger, None);
    }
}

#[cfg(not(debug_assertions))]
unsafe fn destroy_debug_messenger(_debug: &mut DebugState) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &CStr) -> [c_char; vk::MAX_EXTENSION_NAME_SIZE] {
        let mut out = [0 as c_char; vk::MAX_EXTENSION_NAME_SIZE];
        for (dst, src) in out.iter_mut().zip(s.to_bytes()) {
            *dst = *src as c_char;
        }
        out
    }

    #[test]
    fn extension_names_compare_as_c_strings() {
        let names = [name(c"VK_KHR_surface"), name(c"VK_EXT_debug_utils")];
        assert!(has_name(&names, c"VK_EXT_debug_utils"));
        assert!(!has_name(&names, c"VK_KHR_swapchain"));
    }
}

// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection and the capability snapshot taken from it.
use crate::instance::has_name;
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::vk;
use cubic_render::RenderError;
use std::ffi::CStr;
use tracing::info;

/// The only depth format the renderer uses.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Immutable capabilities of the selected GPU.
pub struct PhysicalDevice {
    handle: vk::PhysicalDevice,
    name: String,
    multisample: vk::SampleCountFlags,
    depth_format: vk::Format,
    memory: vk::PhysicalDeviceMemoryProperties,
    sample_rate_shading: bool,
    sampler_anisotropy: bool,
}

/// First device wins unless a later one is a discrete GPU, in which case the
/// first discrete GPU wins.
pub fn pick_preferred_device(types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    if types.is_empty() {
        return None;
    }
    Some(
        types
            .iter()
            .position(|t| *t == vk::PhysicalDeviceType::DISCRETE_GPU)
            .unwrap_or(0),
    )
}

/// Highest of 8/4/2 present in `counts`, else single sampling.
pub fn pick_sample_count(counts: vk::SampleCountFlags) -> vk::SampleCountFlags {
    [
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .find(|s| counts.contains(*s))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Lowest memory type allowed by `filter` whose flags include `required`.
pub fn find_memory_type(
    memory: &vk::PhysicalDeviceMemoryProperties,
    filter: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32)).find(|&i| {
        (filter & (1 << i)) != 0 && memory.memory_types[i as usize].property_flags.contains(required)
    })
}

pub fn supports_depth_attachment(props: &vk::FormatProperties) -> bool {
    props
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
}

fn device_type_name(t: vk::PhysicalDeviceType) -> &'static str {
    match t {
        vk::PhysicalDeviceType::DISCRETE_GPU => "discrete",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "integrated",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "virtual",
        vk::PhysicalDeviceType::CPU => "cpu",
        _ => "other",
    }
}

impl PhysicalDevice {
    pub unsafe fn select(instance: &ash::Instance) -> Result<Self> {
        let devices = instance
            .enumerate_physical_devices()
            .context("enumerate_physical_devices")?;
        let types: Vec<_> = devices
            .iter()
            .map(|&d| instance.get_physical_device_properties(d).device_type)
            .collect();
        let index = pick_preferred_device(&types)
            .ok_or_else(|| RenderError::DeviceSelection("no Vulkan physical devices".into()))?;
        let handle = devices[index];

        let props = instance.get_physical_device_properties(handle);
        let name = CStr::from_ptr(props.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        let extensions: Vec<_> = instance
            .enumerate_device_extension_properties(handle)
            .context("enumerate_device_extension_properties")?
            .iter()
            .map(|e| e.extension_name)
            .collect();
        if !has_name(&extensions, swapchain::NAME) {
            return Err(RenderError::DeviceSelection(format!(
                "'{name}' does not support VK_KHR_swapchain"
            ))
            .into());
        }

        let depth_props = instance.get_physical_device_format_properties(handle, DEPTH_FORMAT);
        if !supports_depth_attachment(&depth_props) {
            return Err(RenderError::DeviceSelection(format!(
                "'{name}' cannot use {DEPTH_FORMAT:?} as a depth attachment"
            ))
            .into());
        }

        let features = instance.get_physical_device_features(handle);
        let selected = Self {
            handle,
            multisample: pick_sample_count(props.limits.framebuffer_color_sample_counts),
            depth_format: DEPTH_FORMAT,
            memory: instance.get_physical_device_memory_properties(handle),
            sample_rate_shading: features.sample_rate_shading == vk::TRUE,
            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
            name,
        };

        info!(
            "physical device: {} ({}, {} candidate(s)), msaa {:?}, sample shading {}, anisotropy {}",
            selected.name,
            device_type_name(types[index]),
            devices.len(),
            selected.multisample,
            selected.sample_rate_shading,
            selected.sampler_anisotropy
        );
        Ok(selected)
    }

    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn multisample(&self) -> vk::SampleCountFlags {
        self.multisample
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn supports_sample_rate_shading(&self) -> bool {
        self.sample_rate_shading
    }

    pub fn supports_anisotropy(&self) -> bool {
        self.sampler_anisotropy
    }

    pub fn memory_type_index(&self, filter: u32, required: vk::MemoryPropertyFlags) -> Result<u32> {
        find_memory_type(&self.memory, filter, required).ok_or_else(|| {
            RenderError::ResourceCreation(format!(
                "no memory type in mask {filter:#b} with {required:?}"
            ))
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vk::PhysicalDeviceType as T;

    #[test]
    fn discrete_gpu_preferred_over_first() {
        assert_eq!(pick_preferred_device(&[]), None);
        assert_eq!(pick_preferred_device(&[T::INTEGRATED_GPU]), Some(0));
        assert_eq!(
            pick_preferred_device(&[T::INTEGRATED_GPU, T::CPU, T::DISCRETE_GPU, T::DISCRETE_GPU]),
            Some(2)
        );
        assert_eq!(
            pick_preferred_device(&[T::DISCRETE_GPU, T::DISCRETE_GPU]),
            Some(0)
        );
        assert_eq!(pick_preferred_device(&[T::CPU, T::VIRTUAL_GPU]), Some(0));
    }

    #[test]
    fn highest_supported_sample_count_wins() {
        use vk::SampleCountFlags as S;
        assert_eq!(pick_sample_count(S::TYPE_1), S::TYPE_1);
        assert_eq!(pick_sample_count(S::TYPE_1 | S::TYPE_2), S::TYPE_2);
        assert_eq!(
            pick_sample_count(S::TYPE_1 | S::TYPE_2 | S::TYPE_4 | S::TYPE_8 | S::TYPE_16),
            S::TYPE_8
        );
        assert_eq!(pick_sample_count(S::TYPE_1 | S::TYPE_4), S::TYPE_4);
        assert_eq!(pick_sample_count(S::empty()), S::TYPE_1);
    }

    fn memory(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut m = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in m.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        m
    }

    #[test]
    fn memory_type_is_lowest_match_within_filter() {
        use vk::MemoryPropertyFlags as M;
        let props = memory(&[
            M::DEVICE_LOCAL,
            M::HOST_VISIBLE | M::HOST_COHERENT,
            M::DEVICE_LOCAL | M::HOST_VISIBLE | M::HOST_COHERENT,
        ]);
        let host = M::HOST_VISIBLE | M::HOST_COHERENT;

        assert_eq!(find_memory_type(&props, 0b111, host), Some(1));
        assert_eq!(find_memory_type(&props, 0b100, host), Some(2));
        assert_eq!(find_memory_type(&props, 0b111, M::DEVICE_LOCAL), Some(0));
        assert_eq!(find_memory_type(&props, 0b001, host), None);
        // Bits past memory_type_count are ignored.
        assert_eq!(find_memory_type(&props, 0b1000, M::empty()), None);
    }

    #[test]
    fn depth_attachment_feature_required() {
        let yes = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
                | vk::FormatFeatureFlags::SAMPLED_IMAGE,
            ..Default::default()
        };
        let linear_only = vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        assert!(supports_depth_attachment(&yes));
        assert!(!supports_depth_attachment(&linear_only));
    }
}

// SPDX-License-Identifier: CEPL-1.0
use crate::command_pool::CommandPool;
use crate::physical_device::PhysicalDevice;
use anyhow::{Context, Result};
use ash::vk;
use cubic_render::RenderError;

/// Creation parameters for a 2D, single-layer image.
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub properties: vk::MemoryPropertyFlags,
}

/// Image plus bound memory. Starts in `UNDEFINED` layout; every layout change
/// is an explicit command.
pub struct Image {
    device: ash::Device,
    handle: vk::Image,
    memory: vk::DeviceMemory,
    desc: ImageDesc,
}

/// Access masks, stages and aspect for one supported layout transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub aspect: vk::ImageAspectFlags,
}

/// The closed set of layout transitions. Anything else is a configuration
/// error, reported rather than silently ignored.
pub fn transition_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> Result<TransitionMasks, RenderError> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                aspect: vk::ImageAspectFlags::COLOR,
            })
        }
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                aspect: vk::ImageAspectFlags::DEPTH,
            })
        }
        (old, new) => Err(RenderError::ResourceCreation(format!(
            "unsupported image layout transition {old:?} -> {new:?}"
        ))),
    }
}

impl Image {
    pub unsafe fn new(
        physical: &PhysicalDevice,
        device: &ash::Device,
        desc: ImageDesc,
    ) -> Result<Self> {
        let ci = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format: desc.format,
            extent: vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            },
            mip_levels: desc.mip_levels,
            array_layers: 1,
            samples: desc.samples,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: desc.usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let handle = device.create_image(&ci, None).context("create_image")?;
        let mut image = Self {
            device: device.clone(),
            handle,
            memory: vk::DeviceMemory::null(),
            desc,
        };

        let req = device.get_image_memory_requirements(handle);
        let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index: physical.memory_type_index(req.memory_type_bits, desc.properties)?,
            ..Default::default()
        };
        image.memory = device
            .allocate_memory(&mai, None)
            .context("allocate_memory(image)")?;
        device
            .bind_image_memory(handle, image.memory, 0)
            .context("bind_image_memory")?;
        Ok(image)
    }

    /// Records and waits for one of the supported layout transitions across
    /// every mip level.
    pub unsafe fn transition_layout(
        &self,
        pool: &CommandPool,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> Result<()> {
        let masks = transition_masks(old, new)?;
        let barrier = vk::ImageMemoryBarrier {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
            src_access_mask: masks.src_access,
            dst_access_mask: masks.dst_access,
            old_layout: old,
            new_layout: new,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image: self.handle,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: masks.aspect,
                base_mip_level: 0,
                level_count: self.desc.mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        pool.submit_one_shot(|cmd| {
            self.device.cmd_pipeline_barrier(
                cmd,
                masks.src_stage,
                masks.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&barrier),
            )
        })
    }

    pub unsafe fn create_view(&self, aspect: vk::ImageAspectFlags) -> Result<ImageView> {
        ImageView::new(
            &self.device,
            self.handle,
            self.desc.format,
            aspect,
            self.desc.mip_levels,
        )
    }

    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.handle, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// View over an image this wrapper does not own (swapchain images included).
pub struct ImageView {
    device: ash::Device,
    handle: vk::ImageView,
}

impl ImageView {
    pub unsafe fn new(
        device: &ash::Device,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> Result<Self> {
        let ci = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        let handle = device
            .create_image_view(&ci, None)
            .context("create_image_view")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe { self.device.destroy_image_view(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vk::ImageLayout as L;

    #[test]
    fn color_attachment_transition() {
        let m = transition_masks(L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL).unwrap();
        assert_eq!(m.aspect, vk::ImageAspectFlags::COLOR);
        assert_eq!(m.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(m.dst_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert!(m.dst_access.contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
    }

    #[test]
    fn depth_attachment_transition() {
        let m = transition_masks(L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL).unwrap();
        assert_eq!(m.aspect, vk::ImageAspectFlags::DEPTH);
        assert_eq!(m.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
        assert!(m
            .dst_access
            .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    }

    #[test]
    fn every_other_pair_is_rejected() {
        let layouts = [
            L::UNDEFINED,
            L::GENERAL,
            L::COLOR_ATTACHMENT_OPTIMAL,
            L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            L::SHADER_READ_ONLY_OPTIMAL,
            L::TRANSFER_SRC_OPTIMAL,
            L::TRANSFER_DST_OPTIMAL,
            L::PRESENT_SRC_KHR,
        ];
        let mut accepted = 0;
        for old in layouts {
            for new in layouts {
                match transition_masks(old, new) {
                    Ok(_) => accepted += 1,
                    Err(RenderError::ResourceCreation(msg)) => {
                        assert!(msg.contains("unsupported"), "{msg}")
                    }
                    Err(other) => panic!("unexpected error kind: {other}"),
                }
            }
        }
        assert_eq!(accepted, 2);
    }

    #[test]
    fn rejection_is_deterministic() {
        let a = transition_masks(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap_err();
        let b = transition_masks(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap_err();
        assert_eq!(a.to_string(), b.to_string());
    }
}

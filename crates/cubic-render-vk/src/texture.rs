// SPDX-License-Identifier: CEPL-1.0
use crate::buffer::Buffer;
use crate::command_pool::CommandPool;
use crate::image::{Image, ImageDesc, ImageView};
use crate::physical_device::PhysicalDevice;
use anyhow::{Context, Result};
use ash::vk;
use cubic_render::Bitmap;
use tracing::debug;

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
const MAX_ANISOTROPY: f32 = 8.0;

/// Full mip chain length: `floor(log2(max(w, h))) + 1`.
pub fn mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// One downsample step: level `level - 1` of `src` size is blitted into
/// `level` of `dst` size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipBlit {
    pub level: u32,
    pub src: (i32, i32),
    pub dst: (i32, i32),
}

/// Blits needed to fill levels `1..mip_levels`, halving each dimension and
/// never going below one texel.
pub fn blit_plan(width: u32, height: u32, mip_levels: u32) -> Vec<MipBlit> {
    let mut w = width.max(1) as i32;
    let mut h = height.max(1) as i32;
    (1..mip_levels)
        .map(|level| {
            let src = (w, h);
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            MipBlit {
                level,
                src,
                dst: (w, h),
            }
        })
        .collect()
}

pub fn sampler_info(anisotropy: bool, mip_levels: u32) -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo {
        s_type: vk::StructureType::SAMPLER_CREATE_INFO,
        mag_filter: vk::Filter::LINEAR,
        min_filter: vk::Filter::LINEAR,
        mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        address_mode_u: vk::SamplerAddressMode::REPEAT,
        address_mode_v: vk::SamplerAddressMode::REPEAT,
        address_mode_w: vk::SamplerAddressMode::REPEAT,
        mip_lod_bias: 0.0,
        anisotropy_enable: anisotropy.into(),
        max_anisotropy: if anisotropy { MAX_ANISOTROPY } else { 1.0 },
        compare_enable: vk::FALSE,
        compare_op: vk::CompareOp::NEVER,
        min_lod: 0.0,
        max_lod: mip_levels as f32,
        border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        unnormalized_coordinates: vk::FALSE,
        ..Default::default()
    }
}

/// Sampled, mipmapped texture. Field order is drop order.
pub struct Texture {
    device: ash::Device,
    sampler: vk::Sampler,
    view: ImageView,
    _image: Image,
}

impl Texture {
    /// Uploads `bitmap` through a staging buffer, generates the mip chain with
    /// linear blits and leaves every level in `SHADER_READ_ONLY_OPTIMAL`.
    pub unsafe fn new(
        physical: &PhysicalDevice,
        device: &ash::Device,
        pool: &CommandPool,
        bitmap: &Bitmap,
    ) -> Result<Self> {
        let (width, height) = (bitmap.width(), bitmap.height());
        let mips = mip_levels(width, height);

        let staging = Buffer::new(
            physical,
            device,
            bitmap.pixels().len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            Some(bitmap.pixels()),
        )
        .context("texture staging buffer")?;

        let image = Image::new(
            physical,
            device,
            ImageDesc {
                width,
                height,
                mip_levels: mips,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            },
        )?;

        pool.submit_one_shot(|cmd| {
            barrier(
                device,
                cmd,
                image.handle(),
                0,
                mips,
                (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
                (vk::AccessFlags::empty(), vk::AccessFlags::TRANSFER_WRITE),
                (
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                ),
            );
            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: color_layers(0),
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                },
            };
            device.cmd_copy_buffer_to_image(
                cmd,
                staging.handle(),
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&region),
            );
        })?;
        drop(staging);

        pool.submit_one_shot(|cmd| record_mipmaps(device, cmd, &image, mips))?;
        debug!("texture {width}x{height} uploaded with {mips} mip levels");

        let view = image.create_view(vk::ImageAspectFlags::COLOR)?;
        let sampler = device
            .create_sampler(&sampler_info(physical.supports_anisotropy(), mips), None)
            .context("create_sampler")?;

        Ok(Self {
            device: device.clone(),
            sampler,
            view,
            _image: image,
        })
    }

    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe { self.device.destroy_sampler(self.sampler, None) };
    }
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

#[allow(clippy::too_many_arguments)]
unsafe fn barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    base_mip_level: u32,
    level_count: u32,
    layouts: (vk::ImageLayout, vk::ImageLayout),
    access: (vk::AccessFlags, vk::AccessFlags),
    stages: (vk::PipelineStageFlags, vk::PipelineStageFlags),
) {
    let b = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: access.0,
        dst_access_mask: access.1,
        old_layout: layouts.0,
        new_layout: layouts.1,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level,
            level_count,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    device.cmd_pipeline_barrier(
        cmd,
        stages.0,
        stages.1,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        std::slice::from_ref(&b),
    );
}

/// STRICT ORDER per level: previous level DST->SRC, blit, previous level
/// SRC->SHADER_READ. The last level is never a blit source and goes straight
/// DST->SHADER_READ.
unsafe fn record_mipmaps(device: &ash::Device, cmd: vk::CommandBuffer, image: &Image, mips: u32) {
    let handle = image.handle();
    for step in blit_plan(image.width(), image.height(), mips) {
        let src_level = step.level - 1;
        barrier(
            device,
            cmd,
            handle,
            src_level,
            1,
            (
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ),
            (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_READ),
            (
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
            ),
        );

        let blit = vk::ImageBlit {
            src_subresource: color_layers(src_level),
            src_offsets: [
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: step.src.0,
                    y: step.src.1,
                    z: 1,
                },
            ],
            dst_subresource: color_layers(step.level),
            dst_offsets: [
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: step.dst.0,
                    y: step.dst.1,
                    z: 1,
                },
            ],
        };
        device.cmd_blit_image(
            cmd,
            handle,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            handle,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            std::slice::from_ref(&blit),
            vk::Filter::LINEAR,
        );

        barrier(
            device,
            cmd,
            handle,
            src_level,
            1,
            (
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            (vk::AccessFlags::TRANSFER_READ, vk::AccessFlags::SHADER_READ),
            (
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
        );
    }

    barrier(
        device,
        cmd,
        handle,
        mips - 1,
        1,
        (
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ),
        (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ),
        (
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_levels(1024, 512), 11);
        assert_eq!(mip_levels(512, 1024), 11);
        assert_eq!(mip_levels(1, 1), 1);
        assert_eq!(mip_levels(300, 200), 9);
        assert_eq!(mip_levels(0, 0), 1);
    }

    #[test]
    fn blit_plan_halves_and_clamps() {
        let plan = blit_plan(8, 2, mip_levels(8, 2));
        assert_eq!(
            plan,
            vec![
                MipBlit { level: 1, src: (8, 2), dst: (4, 1) },
                MipBlit { level: 2, src: (4, 1), dst: (2, 1) },
                MipBlit { level: 3, src: (2, 1), dst: (1, 1) },
            ]
        );
    }

    #[test]
    fn single_level_needs_no_blits() {
        assert!(blit_plan(1, 1, 1).is_empty());
    }

    #[test]
    fn plan_covers_every_level_but_the_first() {
        let mips = mip_levels(1024, 512);
        let plan = blit_plan(1024, 512, mips);
        assert_eq!(plan.len() as u32, mips - 1);
        assert_eq!(plan.last().map(|b| b.dst), Some((1, 1)));
    }

    #[test]
    fn sampler_anisotropy_follows_support() {
        let on = sampler_info(true, 11);
        assert_eq!(on.anisotropy_enable, vk::TRUE);
        assert_eq!(on.max_anisotropy, 8.0);
        assert_eq!(on.max_lod, 11.0);

        let off = sampler_info(false, 3);
        assert_eq!(off.anisotropy_enable, vk::FALSE);
        assert_eq!(off.max_anisotropy, 1.0);
        assert_eq!(off.address_mode_v, vk::SamplerAddressMode::REPEAT);
        assert_eq!(off.compare_op, vk::CompareOp::NEVER);
    }
}

// SPDX-License-Identifier: CEPL-1.0
use crate::device::DeviceContext;
use crate::mesh::VkMesh;
use crate::physical_device::PhysicalDevice;
use crate::render_context::RenderContext;
use crate::texture::Texture;
use anyhow::{Context, Result};
use ash::vk;
use cubic_render::{AssetLookup, RenderError, StaticMeshInstance, TextureId, Vertex};
use std::collections::HashMap;
use std::ffi::CStr;
use tracing::{debug, info};

/// Descriptor sets the pool can hand out; one per distinct texture.
pub const MAX_DESCRIPTOR_SETS: u32 = 64;
/// One column-major 4x4 f32 matrix.
pub const PUSH_CONSTANT_SIZE: u32 = 64;

const ENTRY_POINT: &CStr = c"main";

struct ShaderPair {
    vertex: &'static [u8],
    fragment: &'static [u8],
}

/// SPIR-V compiled by the build script, looked up by pipeline path.
fn shader_pair(name: &str) -> Result<ShaderPair, RenderError> {
    match name {
        "default" => Ok(ShaderPair {
            vertex: include_bytes!(concat!(env!("OUT_DIR"), "/default.vert.spv")),
            fragment: include_bytes!(concat!(env!("OUT_DIR"), "/default.frag.spv")),
        }),
        other => Err(RenderError::UnknownAsset {
            kind: "shader",
            id: other.to_string(),
        }),
    }
}

pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::ALL_GRAPHICS,
        offset: 0,
        size: PUSH_CONSTANT_SIZE,
    }
}

/// Interleaved position (vec3) and texture coordinate (vec2) on binding 0.
pub fn vertex_input() -> (
    vk::VertexInputBindingDescription,
    [vk::VertexInputAttributeDescription; 2],
) {
    let binding = vk::VertexInputBindingDescription {
        binding: 0,
        stride: Vertex::STRIDE as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    };
    let attributes = [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: Vertex::TEX_COORD_OFFSET as u32,
        },
    ];
    (binding, attributes)
}

/// Graphics pipeline plus its layouts and the per-texture descriptor sets
/// drawn from its own pool. Bound to one render pass and viewport; rebuilt
/// with the render context.
pub struct Pipeline {
    device: ash::Device,
    set_layout: vk::DescriptorSetLayout,
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    descriptor_pool: vk::DescriptorPool,
    descriptor_sets: HashMap<TextureId, vk::DescriptorSet>,
}

impl Pipeline {
    pub unsafe fn new(
        physical: &PhysicalDevice,
        device: &DeviceContext,
        target: &RenderContext,
        shader: &str,
    ) -> Result<Self> {
        let shaders = shader_pair(shader)?;
        let raw = device.raw();

        // Null handles are valid no-ops for Drop, so partial construction is safe.
        let mut p = Self {
            device: raw.clone(),
            set_layout: vk::DescriptorSetLayout::null(),
            layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_sets: HashMap::new(),
        };

        let sampler_binding = vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            ..Default::default()
        };
        let dslci = vk::DescriptorSetLayoutCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            binding_count: 1,
            p_bindings: &sampler_binding,
            ..Default::default()
        };
        p.set_layout = raw
            .create_descriptor_set_layout(&dslci, None)
            .context("create_descriptor_set_layout")?;

        let push_range = push_constant_range();
        let plci = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: 1,
            p_set_layouts: &p.set_layout,
            push_constant_range_count: 1,
            p_push_constant_ranges: &push_range,
            ..Default::default()
        };
        p.layout = raw
            .create_pipeline_layout(&plci, None)
            .context("create_pipeline_layout")?;

        let vs = device.create_shader_module(shaders.vertex)?;
        let fs = match device.create_shader_module(shaders.fragment) {
            Ok(fs) => fs,
            Err(e) => {
                raw.destroy_shader_module(vs, None);
                return Err(e);
            }
        };
        let created = p.create_graphics_pipeline(physical, target, vs, fs);
        raw.destroy_shader_module(vs, None);
        raw.destroy_shader_module(fs, None);
        p.pipeline = created?;

        let pool_size = vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: MAX_DESCRIPTOR_SETS,
        };
        let dpci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            flags: vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
            max_sets: MAX_DESCRIPTOR_SETS,
            pool_size_count: 1,
            p_pool_sizes: &pool_size,
            ..Default::default()
        };
        p.descriptor_pool = raw
            .create_descriptor_pool(&dpci, None)
            .context("create_descriptor_pool")?;

        info!("Pipeline '{shader}' created");
        Ok(p)
    }

    unsafe fn create_graphics_pipeline(
        &self,
        physical: &PhysicalDevice,
        target: &RenderContext,
        vs: vk::ShaderModule,
        fs: vk::ShaderModule,
    ) -> Result<vk::Pipeline> {
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
        ];

        let (binding, attributes) = vertex_input();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &binding,
            vertex_attribute_description_count: attributes.len() as u32,
            p_vertex_attribute_descriptions: attributes.as_ptr(),
            ..Default::default()
        };

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };

        let viewport = target.viewport();
        let scissor = target.scissor();
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: &viewport,
            scissor_count: 1,
            p_scissors: &scissor,
            ..Default::default()
        };

        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };

        let sample_shading = physical.supports_sample_rate_shading();
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: physical.multisample(),
            sample_shading_enable: sample_shading.into(),
            min_sample_shading: if sample_shading { 0.2 } else { 1.0 },
            ..Default::default()
        };

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: vk::TRUE,
            depth_write_enable: vk::TRUE,
            depth_compare_op: vk::CompareOp::LESS,
            depth_bounds_test_enable: vk::FALSE,
            stencil_test_enable: vk::FALSE,
            min_depth_bounds: 0.0,
            max_depth_bounds: 1.0,
            ..Default::default()
        };

        let blend_attachment = vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::TRUE,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        };
        let blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            logic_op_enable: vk::FALSE,
            attachment_count: 1,
            p_attachments: &blend_attachment,
            ..Default::default()
        };

        let ci = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth_stencil,
            p_color_blend_state: &blend,
            layout: self.layout,
            render_pass: target.render_pass(),
            subpass: 0,
            ..Default::default()
        };

        let pipelines = self
            .device
            .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&ci), None)
            .map_err(|(_, e)| RenderError::ResourceCreation(format!("create_graphics_pipelines: {e:?}")))?;
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::ResourceCreation("no pipeline returned".into()).into())
    }

    /// Cached descriptor set for `id`, allocating and writing it on first use.
    unsafe fn descriptor_set(&mut self, id: TextureId, texture: &Texture) -> Result<vk::DescriptorSet> {
        if let Some(&set) = self.descriptor_sets.get(&id) {
            return Ok(set);
        }
        check_descriptor_capacity(self.descriptor_sets.len())?;

        let ai = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.descriptor_pool,
            descriptor_set_count: 1,
            p_set_layouts: &self.set_layout,
            ..Default::default()
        };
        let set = self
            .device
            .allocate_descriptor_sets(&ai)
            .map_err(|e| RenderError::ResourceCreation(format!("allocate_descriptor_sets: {e:?}")))?
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::ResourceCreation("no descriptor set returned".into()))?;

        let image_info = vk::DescriptorImageInfo {
            sampler: texture.sampler(),
            image_view: texture.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        let write = vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: set,
            dst_binding: 0,
            dst_array_element: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            p_image_info: &image_info,
            ..Default::default()
        };
        self.device
            .update_descriptor_sets(std::slice::from_ref(&write), &[]);

        debug!("descriptor set allocated for texture {id:?}");
        self.descriptor_sets.insert(id, set);
        Ok(set)
    }

    /// Records one indexed draw per instance into an open render pass.
    pub unsafe fn render(
        &mut self,
        cmd: vk::CommandBuffer,
        assets: &AssetLookup<'_, VkMesh, Texture>,
        instances: &[StaticMeshInstance],
    ) -> Result<()> {
        self.device
            .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);

        for instance in instances {
            let mesh = assets.static_mesh(instance.mesh())?;
            let texture = assets.texture(instance.texture())?;
            let set = self.descriptor_set(instance.texture(), texture)?;

            let transform = instance.transform().to_cols_array();
            self.device.cmd_push_constants(
                cmd,
                self.layout,
                vk::ShaderStageFlags::ALL_GRAPHICS,
                0,
                bytemuck::cast_slice(&transform),
            );
            self.device
                .cmd_bind_vertex_buffers(cmd, 0, &[mesh.vertex_buffer()], &[0]);
            self.device
                .cmd_bind_index_buffer(cmd, mesh.index_buffer(), 0, vk::IndexType::UINT32);
            self.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout,
                0,
                &[set],
                &[],
            );
            self.device
                .cmd_draw_indexed(cmd, mesh.index_count(), 1, 0, 0, 0);
        }
        Ok(())
    }
}

/// Fails before touching the pool once every set is in use.
fn check_descriptor_capacity(in_use: usize) -> Result<(), RenderError> {
    if in_use >= MAX_DESCRIPTOR_SETS as usize {
        return Err(RenderError::ResourceCreation(format!(
            "descriptor pool exhausted: {MAX_DESCRIPTOR_SETS} textures already bound"
        )));
    }
    Ok(())
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees every set allocated from it.
            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
            self.device
                .destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constants_hold_one_matrix_for_all_stages() {
        let range = push_constant_range();
        assert_eq!(range.offset, 0);
        assert_eq!(range.size as usize, std::mem::size_of::<[f32; 16]>());
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::ALL_GRAPHICS);
    }

    #[test]
    fn vertex_layout_matches_vertex_struct() {
        let (binding, attrs) = vertex_input();
        assert_eq!(binding.stride as usize, std::mem::size_of::<Vertex>());
        assert_eq!(attrs[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[1].location, 1);
    }

    #[test]
    fn descriptor_capacity_fails_fast_on_the_65th_texture() {
        assert!(check_descriptor_capacity(0).is_ok());
        assert!(check_descriptor_capacity(63).is_ok());
        assert!(matches!(
            check_descriptor_capacity(64),
            Err(RenderError::ResourceCreation(_))
        ));
    }

    #[test]
    fn unknown_shader_is_reported() {
        assert!(shader_pair("default").is_ok());
        assert!(matches!(
            shader_pair("wireframe"),
            Err(RenderError::UnknownAsset { kind: "shader", .. })
        ));
    }
}

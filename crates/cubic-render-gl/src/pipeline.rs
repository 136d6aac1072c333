// SPDX-License-Identifier: CEPL-1.0
use crate::mesh::GlMesh;
use crate::texture::GlTexture;
use anyhow::{anyhow, Result};
use cubic_render::{AssetLookup, RenderError, StaticMeshInstance};
use glow::HasContext as _;
use std::rc::Rc;
use tracing::info;

struct ShaderSources {
    vertex: &'static str,
    fragment: &'static str,
}

fn shader_sources(name: &str) -> Result<ShaderSources, RenderError> {
    match name {
        "default" => Ok(ShaderSources {
            vertex: include_str!("../shaders/default.vert"),
            fragment: include_str!("../shaders/default.frag"),
        }),
        other => Err(RenderError::UnknownAsset {
            kind: "shader",
            id: other.to_string(),
        }),
    }
}

unsafe fn compile_shader(gl: &glow::Context, kind: u32, src: &str) -> Result<glow::Shader> {
    let shader = gl.create_shader(kind).map_err(anyhow::Error::msg)?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(RenderError::ResourceCreation(format!("GL shader compile: {log}")).into());
    }
    Ok(shader)
}

/// Linked program plus the uniform slots the draw loop writes.
pub struct GlPipeline {
    gl: Rc<glow::Context>,
    program: glow::Program,
    mvp: Option<glow::UniformLocation>,
}

impl GlPipeline {
    pub fn new(gl: &Rc<glow::Context>, name: &str) -> Result<Self> {
        let sources = shader_sources(name)?;
        unsafe {
            let vs = compile_shader(gl, glow::VERTEX_SHADER, sources.vertex)?;
            let fs = match compile_shader(gl, glow::FRAGMENT_SHADER, sources.fragment) {
                Ok(fs) => fs,
                Err(e) => {
                    gl.delete_shader(vs);
                    return Err(e);
                }
            };

            let program = gl.create_program().map_err(anyhow::Error::msg)?;
            gl.attach_shader(program, vs);
            gl.attach_shader(program, fs);
            gl.link_program(program);
            gl.detach_shader(program, vs);
            gl.detach_shader(program, fs);
            gl.delete_shader(vs);
            gl.delete_shader(fs);

            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(RenderError::ResourceCreation(format!("GL link: {log}")).into());
            }

            let mvp = gl.get_uniform_location(program, "mvp");
            if let Some(sampler) = gl.get_uniform_location(program, "texSampler") {
                gl.use_program(Some(program));
                gl.uniform_1_i32(Some(&sampler), 0);
                gl.use_program(None);
            }

            info!("GL pipeline '{name}' linked");
            Ok(Self {
                gl: Rc::clone(gl),
                program,
                mvp,
            })
        }
    }

    pub fn render(
        &self,
        assets: &AssetLookup<'_, GlMesh, GlTexture>,
        instances: &[StaticMeshInstance],
    ) -> Result<()> {
        let gl = &self.gl;
        unsafe {
            gl.use_program(Some(self.program));
            gl.active_texture(glow::TEXTURE0);
            for instance in instances {
                let mesh = assets.static_mesh(instance.mesh())?;
                let texture = assets.texture(instance.texture())?;
                let index_count = i32::try_from(mesh.index_count())
                    .map_err(|_| anyhow!("mesh index count overflows GLsizei"))?;

                gl.uniform_matrix_4_f32_slice(
                    self.mvp.as_ref(),
                    false,
                    &instance.transform().to_cols_array(),
                );
                gl.bind_texture(glow::TEXTURE_2D, Some(texture.handle()));
                gl.bind_vertex_array(Some(mesh.vertex_array()));
                gl.draw_elements(glow::TRIANGLES, index_count, glow::UNSIGNED_INT, 0);
            }
            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);
        }
        Ok(())
    }
}

impl Drop for GlPipeline {
    fn drop(&mut self) {
        unsafe { self.gl.delete_program(self.program) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sources_share_the_vertex_interface() {
        let s = shader_sources("default").unwrap();
        assert!(s.vertex.starts_with("#version 330 core"));
        assert!(s.vertex.contains("layout(location = 0) in vec3"));
        assert!(s.vertex.contains("layout(location = 1) in vec2"));
        assert!(s.vertex.contains("uniform mat4 mvp"));
        assert!(s.fragment.contains("uniform sampler2D texSampler"));
    }

    #[test]
    fn unknown_pipeline_name_is_rejected() {
        assert!(matches!(
            shader_sources("outline"),
            Err(RenderError::UnknownAsset { kind: "shader", .. })
        ));
    }
}

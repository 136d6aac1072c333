// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use cubic_render::{Mesh, Vertex};
use glow::HasContext as _;
use std::rc::Rc;

/// Vertex array with its own vertex and index buffers.
pub struct GlMesh {
    gl: Rc<glow::Context>,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ibo: glow::Buffer,
    index_count: u32,
}

impl GlMesh {
    pub fn new(gl: &Rc<glow::Context>, mesh: &Mesh) -> Result<Self> {
        unsafe {
            let vao = gl.create_vertex_array().map_err(anyhow::Error::msg)?;
            let vbo = gl.create_buffer().map_err(anyhow::Error::msg)?;
            let ibo = gl.create_buffer().map_err(anyhow::Error::msg)?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&mesh.vertices),
                glow::STATIC_DRAW,
            );
            // The element binding is VAO state; keep it bound until the VAO unbinds.
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(&mesh.indices),
                glow::STATIC_DRAW,
            );

            let stride = Vertex::STRIDE as i32;
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(
                1,
                2,
                glow::FLOAT,
                false,
                stride,
                Vertex::TEX_COORD_OFFSET as i32,
            );

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);

            Ok(Self {
                gl: Rc::clone(gl),
                vao,
                vbo,
                ibo,
                index_count: mesh.index_count(),
            })
        }
    }

    pub fn vertex_array(&self) -> glow::VertexArray {
        self.vao
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

impl Drop for GlMesh {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_vertex_array(self.vao);
            self.gl.delete_buffer(self.vbo);
            self.gl.delete_buffer(self.ibo);
        }
    }
}

// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Result};
use cubic_render::Bitmap;
use glow::HasContext as _;
use std::rc::Rc;
use tracing::debug;

/// RGBA8 2D texture with a generated mip chain.
pub struct GlTexture {
    gl: Rc<glow::Context>,
    handle: glow::Texture,
}

impl GlTexture {
    pub fn new(gl: &Rc<glow::Context>, bitmap: &Bitmap) -> Result<Self> {
        let width = i32::try_from(bitmap.width()).map_err(|_| anyhow!("texture too wide"))?;
        let height = i32::try_from(bitmap.height()).map_err(|_| anyhow!("texture too tall"))?;
        unsafe {
            let handle = gl.create_texture().map_err(anyhow::Error::msg)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(handle));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(bitmap.pixels())),
            );
            gl.generate_mipmap(glow::TEXTURE_2D);
            gl.bind_texture(glow::TEXTURE_2D, None);
            debug!("GL texture {width}x{height} uploaded");
            Ok(Self {
                gl: Rc::clone(gl),
                handle,
            })
        }
    }

    pub fn handle(&self) -> glow::Texture {
        self.handle
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        unsafe { self.gl.delete_texture(self.handle) };
    }
}

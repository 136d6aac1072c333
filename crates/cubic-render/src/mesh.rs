// SPDX-License-Identifier: CEPL-1.0
use anyhow::{ensure, Result};
use bytemuck::{Pod, Zeroable};

/// Interleaved vertex layout shared by both backends:
/// location 0 = position (3 x f32), location 1 = uv (2 x f32).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();
    pub const TEX_COORD_OFFSET: usize = std::mem::size_of::<[f32; 3]>();

    pub fn new(position: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            tex_coord,
        }
    }
}

/// Triangle list geometry with 32-bit indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Tightly packed RGBA8 pixels, row-major, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        ensure!(width > 0 && height > 0, "bitmap has zero extent");
        let expected = width as usize * height as usize * 4;
        ensure!(
            pixels.len() == expected,
            "bitmap {width}x{height} needs {expected} bytes, got {}",
            pixels.len()
        );
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(Vertex::STRIDE, 20);
        assert_eq!(Vertex::TEX_COORD_OFFSET, 12);
        let v = [Vertex::new([1.0, 2.0, 3.0], [0.5, 0.25])];
        let bytes: &[u8] = bytemuck::cast_slice(&v);
        assert_eq!(bytes.len(), 20);
    }

    #[test]
    fn bitmap_rejects_short_pixel_buffer() {
        assert!(Bitmap::from_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(Bitmap::from_rgba8(0, 2, vec![]).is_err());
        let ok = Bitmap::from_rgba8(2, 2, vec![255; 16]).unwrap();
        assert_eq!((ok.width(), ok.height()), (2, 2));
    }
}

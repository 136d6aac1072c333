// SPDX-License-Identifier: CEPL-1.0
//! File loaders feeding the asset factories. Everything here is CPU-side.
use crate::{Bitmap, Mesh, RenderError, Vertex};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

fn load_error(path: &Path, reason: impl ToString) -> anyhow::Error {
    RenderError::AssetLoad {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

pub fn load_text_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| load_error(path, e))
}

pub fn load_binary_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| load_error(path, e))
}

/// Loads a Wavefront OBJ file as a single triangle list.
pub fn load_obj_file(path: &Path) -> Result<Mesh> {
    let src = load_text_file(path)?;
    let mesh = parse_obj(&src).map_err(|e| load_error(path, format!("{e:#}")))?;
    debug!(
        "obj {}: {} vertices, {} indices",
        path.display(),
        mesh.vertices.len(),
        mesh.indices.len()
    );
    Ok(mesh)
}

/// Parses OBJ source, triangulating faces and merging corners that share
/// both position and uv. V is flipped so textures sample top row first.
pub fn parse_obj(src: &str) -> Result<Mesh> {
    let mut reader = src.as_bytes();
    let (models, _) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| Ok(Default::default()),
    )
    .context("parse obj")?;

    let mut mesh = Mesh::default();
    let mut unique: HashMap<([u32; 3], [u32; 2]), u32> = HashMap::new();

    for model in &models {
        let m = &model.mesh;
        for &index in &m.indices {
            let i = index as usize;
            let position = [m.positions[3 * i], m.positions[3 * i + 1], m.positions[3 * i + 2]];
            let tex_coord = if m.texcoords.len() >= 2 * i + 2 {
                [m.texcoords[2 * i], 1.0 - m.texcoords[2 * i + 1]]
            } else {
                [0.0, 0.0]
            };

            let key = (position.map(f32::to_bits), tex_coord.map(f32::to_bits));
            let next = mesh.vertices.len() as u32;
            let slot = *unique.entry(key).or_insert_with(|| {
                mesh.vertices.push(Vertex::new(position, tex_coord));
                next
            });
            mesh.indices.push(slot);
        }
    }

    Ok(mesh)
}

/// Loads any decodable image file and converts it to RGBA8.
pub fn load_bitmap(path: &Path) -> Result<Bitmap> {
    let bytes = load_binary_file(path)?;
    decode_bitmap(&bytes).map_err(|e| load_error(path, format!("{e:#}")))
}

pub fn decode_bitmap(bytes: &[u8]) -> Result<Bitmap> {
    let rgba = image::load_from_memory(bytes)
        .context("decode image")?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    Bitmap::from_rgba8(width, height, rgba.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
v -1.0 -1.0 0.0
v 1.0 -1.0 0.0
v 1.0 1.0 0.0
v -1.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn quad_is_triangulated_and_deduplicated() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn v_coordinate_is_flipped() {
        let mesh = parse_obj(QUAD).unwrap();
        let first = mesh.vertices[mesh.indices[0] as usize];
        assert_eq!(first.position, [-1.0, -1.0, 0.0]);
        assert_eq!(first.tex_coord, [0.0, 1.0]);
    }

    #[test]
    fn missing_file_is_an_asset_load_error() {
        let err = load_obj_file(Path::new("does/not/exist.obj")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::AssetLoad { .. })
        ));
    }

    #[test]
    fn png_decodes_to_rgba8() {
        let mut img = image::RgbaImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgba([10, 20, 30, 255]));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let bitmap = decode_bitmap(&png).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (3, 2));
        // pixel (2, 1) sits at row 1, column 2
        let last = &bitmap.pixels()[20..];
        assert_eq!(last, &[10, 20, 30, 255]);
    }
}

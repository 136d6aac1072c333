// SPDX-License-Identifier: CEPL-1.0
use std::{env, error::Error, fs, path::PathBuf};

/// Pipelines whose GLSL lives in `shaders/<name>.vert` and `shaders/<name>.frag`.
const PIPELINES: &[&str] = &["default"];

fn main() -> Result<(), Box<dyn Error>> {
    let out = PathBuf::from(env::var("OUT_DIR")?);
    let src = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?).join("shaders");

    let comp = shaderc::Compiler::new()?;
    let mut opts = shaderc::CompileOptions::new()?;
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    for name in PIPELINES {
        for (ext, kind) in [
            ("vert", shaderc::ShaderKind::Vertex),
            ("frag", shaderc::ShaderKind::Fragment),
        ] {
            let file = format!("{name}.{ext}");
            let path = src.join(&file);
            let glsl = fs::read_to_string(&path)?;
            let spv = comp.compile_into_spirv(&glsl, kind, &file, "main", Some(&opts))?;
            fs::write(out.join(format!("{file}.spv")), spv.as_binary_u8())?;
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}

// SPDX-License-Identifier: CEPL-1.0
use std::{env, fs, path::PathBuf};

fn compile(src_path: &str, stage: naga::ShaderStage) -> Vec<u8> {
    let src = fs::read_to_string(src_path).unwrap();
    let module = match naga::front::wgsl::parse_str(&src) {
        Ok(module) => module,
        Err(e) => panic!("{src_path}: {}", e.emit_to_string(&src)),
    };
    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .unwrap();

    // Vulkan 1.0. No y-flip: the pipeline's front face assumes Vulkan's
    // downward y.
    let options = naga::back::spv::Options {
        lang_version: (1, 0),
        flags: naga::back::spv::WriterFlags::empty(),
        ..Default::default()
    };
    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage: stage,
        entry_point: "main".to_owned(),
    };
    let words =
        naga::back::spv::write_vec(&module, &info, &options, Some(&pipeline_options)).unwrap();
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    for (src, stage, file) in [
        ("shaders/tri.vert.wgsl", naga::ShaderStage::Vertex, "tri.vert.spv"),
        ("shaders/tri.frag.wgsl", naga::ShaderStage::Fragment, "tri.frag.spv"),
    ] {
        fs::write(out.join(file), compile(src, stage)).unwrap();
        println!("cargo:rerun-if-changed={src}");
    }

    println!("cargo:rerun-if-changed=build.rs");
}

// SPDX-License-Identifier: CEPL-1.0
use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{SessionError, SessionResult};

/// Where `build.rs` leaves the compiled triangle shaders.
pub const BUILTIN_SHADER_DIR: &str = env!("OUT_DIR");
pub const VERTEX_SHADER: &str = "tri.vert.spv";
pub const FRAGMENT_SHADER: &str = "tri.frag.spv";

/// SPIR-V words for the two pipeline stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderBytecode {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderBytecode {
    pub fn load(dir: &Path) -> SessionResult<Self> {
        Ok(Self {
            vertex: load_bytecode(dir, VERTEX_SHADER)?,
            fragment: load_bytecode(dir, FRAGMENT_SHADER)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            vertex: vec![0x0723_0203, 1],
            fragment: vec![0x0723_0203, 2],
        }
    }
}

/// Reads one SPIR-V file. The contents are not validated beyond their size;
/// the driver rejects anything malformed at module creation.
pub fn load_bytecode(dir: &Path, name: &str) -> SessionResult<Vec<u32>> {
    let err = |source| SessionError::Shader {
        name: name.to_owned(),
        source,
    };
    let mut file = File::open(dir.join(name)).map_err(err)?;
    let words = ash::util::read_spv(&mut file).map_err(err)?;
    if words.is_empty() {
        return Err(err(io::Error::new(
            io::ErrorKind::InvalidData,
            "shader file is empty",
        )));
    }
    Ok(words)
}

//! Shader compilation, linking and reflection.
//!
//! Stages are written in WGSL and front-ended with `naga`, which gives us
//! compiler diagnostics and the reflected vertex inputs and uniforms that the
//! resource and pipeline layers resolve names against. Backends receive an
//! already-linked program and never see a program that failed to link.

mod error;
mod interface;
mod link;

pub use error::{ShaderError, StageKind};
pub use interface::{
    AttributeInfo, ProgramInterface, StageMask, UniformBlock, UniformInfo, UniformLocation,
    UniformType,
};
pub use link::{compile_stage, link, CompiledStage, LinkedProgram};

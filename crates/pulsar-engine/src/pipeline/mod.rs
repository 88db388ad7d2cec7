//! Draw-ready bundles of vertex array, buffer, program and topology.
//!
//! A [`Pipeline`] is generic over its vertex record type. Uploading and
//! drawing are only reachable through the [`ActivePipeline`] guard returned by
//! [`Pipeline::activate`], so a pipeline's bindings are always current when
//! its data moves.

mod bundle;
mod error;
mod layout;

pub use bundle::{ActivePipeline, Pipeline, PipelineDescriptor};
pub use error::PipelineError;
pub use layout::{AttributeSpec, Vertex, VertexLayout};

use crate::resource::LookupError;
use crate::shader::ShaderError;

/// Pipeline configuration failure. All variants are raised at construction.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error("vertex field `{0}` has no matching attribute in the program")]
    MissingAttribute(String),

    #[error("program has no uniform named `{0}`")]
    MissingUniform(String),

    #[error("vertex field `{name}` has {layout} component(s), the program declares {program}")]
    ComponentMismatch {
        name: String,
        layout: u32,
        program: u32,
    },

    #[error("program attribute `{0}` is not fed by any vertex field")]
    UncoveredAttribute(String),

    #[error("vertex field `{name}` ends at byte {end}, past the stride of {stride}")]
    AttributeOutOfStride { name: String, end: u32, stride: u32 },

    #[error("vertex fields `{first}` and `{second}` overlap")]
    OverlappingAttributes { first: String, second: String },
}

impl From<LookupError> for PipelineError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Attribute(name) => PipelineError::MissingAttribute(name),
            LookupError::Uniform(name) => PipelineError::MissingUniform(name),
        }
    }
}

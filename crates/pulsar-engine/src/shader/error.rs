use std::fmt;

/// Programmable stage of a shader program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Shader build failure. Every variant carries the diagnostic text that would
/// otherwise only be visible in a compiler or linker log.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: StageKind, log: String },

    #[error("{stage} shader has no @{stage} entry point")]
    MissingEntryPoint { stage: StageKind },

    #[error("program failed to link:\n{log}")]
    Link { log: String },

    #[error("{stage} shader declares `{name}`, which is not supported: {reason}")]
    Unsupported {
        stage: StageKind,
        name: String,
        reason: &'static str,
    },
}

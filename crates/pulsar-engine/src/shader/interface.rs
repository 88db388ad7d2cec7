/// A vertex input reflected from the vertex stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    /// Number of `f32` components (1..=4).
    pub components: u32,
}

/// Type of a uniform value. Only 32-bit float types are supported.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformType {
    F32,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformType {
    /// Size in bytes under WGSL uniform layout (mat3 columns are padded to 16).
    pub const fn size(self) -> u32 {
        match self {
            UniformType::F32 => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat3 => 48,
            UniformType::Mat4 => 64,
        }
    }
}

/// Where a uniform lives: binding slot in group 0, byte offset inside that
/// binding, and its declared type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformLocation {
    pub binding: u32,
    pub offset: u32,
    pub ty: UniformType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    pub location: UniformLocation,
}

/// Stages that reference a binding.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct StageMask {
    pub vertex: bool,
    pub fragment: bool,
}

/// A `var<uniform>` binding and its total size in bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformBlock {
    pub binding: u32,
    pub size: u32,
    pub visibility: StageMask,
}

/// Everything a linked program exposes to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub attributes: Vec<AttributeInfo>,
    pub uniforms: Vec<UniformInfo>,
    pub blocks: Vec<UniformBlock>,
}

impl ProgramInterface {
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.location)
    }

    pub fn block(&self, binding: u32) -> Option<&UniformBlock> {
        self.blocks.iter().find(|b| b.binding == binding)
    }
}

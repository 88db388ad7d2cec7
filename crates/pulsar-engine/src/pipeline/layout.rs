use crate::device::AttributeBinding;
use crate::resource::ShaderProgram;

use super::error::PipelineError;

/// One `f32` field of a vertex record.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttributeSpec {
    /// Name of the vertex-stage input this field feeds.
    pub name: &'static str,
    /// Number of `f32` components.
    pub components: u32,
    /// Byte offset inside the record.
    pub offset: u32,
}

impl AttributeSpec {
    pub const fn new(name: &'static str, components: u32, offset: u32) -> Self {
        Self {
            name,
            components,
            offset,
        }
    }

    fn end(&self) -> u32 {
        self.offset + self.components * 4
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: &'static [AttributeSpec],
}

/// A plain-data record a pipeline streams to the device.
pub trait Vertex: bytemuck::Pod {
    fn layout() -> VertexLayout;
}

/// Matches `layout` against the program's vertex inputs and resolves the
/// device bindings.
pub(crate) fn resolve_layout(
    layout: &VertexLayout,
    program: &mut ShaderProgram,
) -> Result<Vec<AttributeBinding>, PipelineError> {
    for field in layout.attributes {
        if field.end() > layout.stride {
            return Err(PipelineError::AttributeOutOfStride {
                name: field.name.to_owned(),
                end: field.end(),
                stride: layout.stride,
            });
        }
    }

    let mut by_offset: Vec<&AttributeSpec> = layout.attributes.iter().collect();
    by_offset.sort_by_key(|f| f.offset);
    for pair in by_offset.windows(2) {
        if pair[0].end() > pair[1].offset {
            return Err(PipelineError::OverlappingAttributes {
                first: pair[0].name.to_owned(),
                second: pair[1].name.to_owned(),
            });
        }
    }

    let mut bindings = Vec::with_capacity(layout.attributes.len());
    for field in layout.attributes {
        let location = program.require_attribute(field.name)?;
        let declared = program
            .attributes()
            .iter()
            .find(|a| a.location == location)
            .map(|a| a.components)
            .unwrap_or(0);
        if declared != field.components {
            return Err(PipelineError::ComponentMismatch {
                name: field.name.to_owned(),
                layout: field.components,
                program: declared,
            });
        }
        bindings.push(AttributeBinding {
            location,
            components: field.components,
            offset: field.offset,
        });
    }

    if let Some(uncovered) = program
        .attributes()
        .iter()
        .find(|a| !layout.attributes.iter().any(|f| f.name == a.name))
    {
        return Err(PipelineError::UncoveredAttribute(uncovered.name.clone()));
    }

    Ok(bindings)
}

use std::collections::BTreeMap;
use std::fmt::Write as _;

use naga::{AddressSpace, Binding, Handle, Module, Scalar, Type, TypeInner, VectorSize};

use super::error::{ShaderError, StageKind};
use super::interface::{
    AttributeInfo, ProgramInterface, StageMask, UniformBlock, UniformInfo, UniformLocation,
    UniformType,
};

/// A single stage that parsed, validated and has an entry point of its kind.
#[derive(Debug)]
pub struct CompiledStage {
    pub kind: StageKind,
    pub source: String,
    pub entry_point: String,
    module: Module,
}

/// A vertex + fragment pair whose interfaces agree.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub vertex_source: String,
    pub fragment_source: String,
    pub interface: ProgramInterface,
}

/// Parses and validates one WGSL stage.
pub fn compile_stage(kind: StageKind, source: &str) -> Result<CompiledStage, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        stage: kind,
        log: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| ShaderError::Compile {
            stage: kind,
            log: e.emit_to_string(source),
        })?;

    let wanted = match kind {
        StageKind::Vertex => naga::ShaderStage::Vertex,
        StageKind::Fragment => naga::ShaderStage::Fragment,
    };
    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .map(|ep| ep.name.clone())
        .ok_or(ShaderError::MissingEntryPoint { stage: kind })?;

    Ok(CompiledStage {
        kind,
        source: source.to_owned(),
        entry_point,
        module,
    })
}

/// Compiles both stages and links them into a program.
///
/// Linking checks that every fragment input has a vertex output at the same
/// location with the same type, and merges the uniform bindings of both stages.
pub fn link(vertex_source: &str, fragment_source: &str) -> Result<LinkedProgram, ShaderError> {
    let vertex = compile_stage(StageKind::Vertex, vertex_source)?;
    let fragment = compile_stage(StageKind::Fragment, fragment_source)?;

    check_varyings(&vertex, &fragment)?;

    let attributes = reflect_attributes(&vertex)?;

    let mut uniforms = Vec::new();
    let mut blocks: BTreeMap<u32, UniformBlock> = BTreeMap::new();
    let mut diagnostics = String::new();
    for stage in [&vertex, &fragment] {
        reflect_uniforms(stage, &mut uniforms, &mut blocks, &mut diagnostics)?;
    }
    if !diagnostics.is_empty() {
        return Err(ShaderError::Link { log: diagnostics });
    }

    log::debug!(
        "linked program ({} attributes, {} uniforms, {} bindings)",
        attributes.len(),
        uniforms.len(),
        blocks.len()
    );

    Ok(LinkedProgram {
        vertex_source: vertex.source,
        fragment_source: fragment.source,
        interface: ProgramInterface {
            vertex_entry: vertex.entry_point,
            fragment_entry: fragment.entry_point,
            attributes,
            uniforms,
            blocks: blocks.into_values().collect(),
        },
    })
}

// ── varyings ──────────────────────────────────────────────────────────────

struct Bound {
    name: String,
    location: u32,
    inner: TypeInner,
}

fn collect_bound(
    module: &Module,
    name: Option<&String>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Bound>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(Bound {
            name: name.cloned().unwrap_or_default(),
            location: *location,
            inner: module.types[ty].inner.clone(),
        }),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    collect_bound(module, m.name.as_ref(), m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

fn entry_inputs(stage: &CompiledStage) -> Vec<Bound> {
    let mut out = Vec::new();
    if let Some(ep) = stage
        .module
        .entry_points
        .iter()
        .find(|ep| ep.name == stage.entry_point)
    {
        for arg in &ep.function.arguments {
            collect_bound(&stage.module, arg.name.as_ref(), arg.ty, arg.binding.as_ref(), &mut out);
        }
    }
    out
}

fn entry_outputs(stage: &CompiledStage) -> Vec<Bound> {
    let mut out = Vec::new();
    let result = stage
        .module
        .entry_points
        .iter()
        .find(|ep| ep.name == stage.entry_point)
        .and_then(|ep| ep.function.result.as_ref());
    if let Some(result) = result {
        collect_bound(&stage.module, None, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn check_varyings(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<(), ShaderError> {
    let outputs = entry_outputs(vertex);
    let mut diagnostics = String::new();

    for input in entry_inputs(fragment) {
        match outputs.iter().find(|o| o.location == input.location) {
            None => {
                let _ = writeln!(
                    diagnostics,
                    "fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                );
            }
            Some(output) if output.inner != input.inner => {
                let _ = writeln!(
                    diagnostics,
                    "fragment input `{}` at location {} has type {:?}, vertex output has {:?}",
                    input.name, input.location, input.inner, output.inner
                );
            }
            Some(_) => {}
        }
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(ShaderError::Link { log: diagnostics })
    }
}

// ── attributes ────────────────────────────────────────────────────────────

fn float_components(inner: &TypeInner) -> Option<u32> {
    match *inner {
        TypeInner::Scalar(s) if s == Scalar::F32 => Some(1),
        TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => Some(size as u32),
        _ => None,
    }
}

fn reflect_attributes(vertex: &CompiledStage) -> Result<Vec<AttributeInfo>, ShaderError> {
    let mut attributes = Vec::new();
    for input in entry_inputs(vertex) {
        let components = float_components(&input.inner).ok_or_else(|| ShaderError::Unsupported {
            stage: StageKind::Vertex,
            name: input.name.clone(),
            reason: "vertex inputs must be f32 scalars or vectors",
        })?;
        attributes.push(AttributeInfo {
            name: input.name,
            location: input.location,
            components,
        });
    }
    attributes.sort_by_key(|a| a.location);
    Ok(attributes)
}

// ── uniforms ──────────────────────────────────────────────────────────────

fn uniform_type(inner: &TypeInner) -> Option<UniformType> {
    match *inner {
        TypeInner::Scalar(s) if s == Scalar::F32 => Some(UniformType::F32),
        TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => Some(match size {
            VectorSize::Bi => UniformType::Vec2,
            VectorSize::Tri => UniformType::Vec3,
            VectorSize::Quad => UniformType::Vec4,
        }),
        TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            scalar,
        } if scalar == Scalar::F32 => Some(UniformType::Mat3),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar == Scalar::F32 => Some(UniformType::Mat4),
        _ => None,
    }
}

fn reflect_uniforms(
    stage: &CompiledStage,
    uniforms: &mut Vec<UniformInfo>,
    blocks: &mut BTreeMap<u32, UniformBlock>,
    diagnostics: &mut String,
) -> Result<(), ShaderError> {
    let module = &stage.module;

    for (_, var) in module.global_variables.iter() {
        let name = var.name.clone().unwrap_or_default();

        if matches!(var.space, AddressSpace::Handle | AddressSpace::Storage { .. }) {
            return Err(ShaderError::Unsupported {
                stage: stage.kind,
                name,
                reason: "only uniform bindings are supported",
            });
        }
        if var.space != AddressSpace::Uniform {
            continue;
        }

        let Some(rb) = var.binding.as_ref() else { continue };
        if rb.group != 0 {
            return Err(ShaderError::Unsupported {
                stage: stage.kind,
                name,
                reason: "uniforms must live in @group(0)",
            });
        }

        let mut declared = Vec::new();
        let size = match &module.types[var.ty].inner {
            TypeInner::Struct { members, span } => {
                for m in members {
                    let member = m.name.clone().unwrap_or_default();
                    let ty = uniform_type(&module.types[m.ty].inner).ok_or_else(|| {
                        ShaderError::Unsupported {
                            stage: stage.kind,
                            name: member.clone(),
                            reason: "uniform members must be f32 scalars, vectors, mat3 or mat4",
                        }
                    })?;
                    declared.push((member, m.offset, ty));
                }
                *span
            }
            inner => {
                let ty = uniform_type(inner).ok_or_else(|| ShaderError::Unsupported {
                    stage: stage.kind,
                    name: name.clone(),
                    reason: "uniforms must be f32 scalars, vectors, mat3, mat4 or structs of those",
                })?;
                declared.push((name.clone(), 0, ty));
                ty.size()
            }
        };

        let block = blocks.entry(rb.binding).or_insert(UniformBlock {
            binding: rb.binding,
            size,
            visibility: StageMask::default(),
        });
        if block.size != size {
            let _ = writeln!(
                diagnostics,
                "binding {} is {} bytes in one stage and {} bytes in the {} stage",
                rb.binding, block.size, size, stage.kind
            );
            continue;
        }
        match stage.kind {
            StageKind::Vertex => block.visibility.vertex = true,
            StageKind::Fragment => block.visibility.fragment = true,
        }

        for (member, offset, ty) in declared {
            let location = UniformLocation {
                binding: rb.binding,
                offset,
                ty,
            };
            match uniforms.iter().find(|u| u.name == member) {
                Some(existing) if existing.location != location => {
                    let _ = writeln!(
                        diagnostics,
                        "uniform `{member}` is declared differently in the {} stage",
                        stage.kind
                    );
                }
                Some(_) => {}
                None => uniforms.push(UniformInfo {
                    name: member,
                    location,
                }),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
@group(0) @binding(0) var<uniform> transform: mat3x3<f32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(@location(0) v_pos: vec2<f32>, @location(1) v_col: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    let p = transform * vec3<f32>(v_pos, 1.0);
    out.clip_position = vec4<f32>(p.xy, 0.0, 1.0);
    out.color = v_col;
    return out;
}
"#;

    const FS: &str = r#"
@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;

    #[test]
    fn reflects_attributes_in_location_order() {
        let program = link(VS, FS).unwrap();
        let attrs = &program.interface.attributes;
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, "v_pos");
        assert_eq!(attrs[0].components, 2);
        assert_eq!(attrs[1].name, "v_col");
        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].components, 3);
    }

    #[test]
    fn reflects_entry_points_and_uniforms() {
        let program = link(VS, FS).unwrap();
        let iface = &program.interface;
        assert_eq!(iface.vertex_entry, "vs_main");
        assert_eq!(iface.fragment_entry, "fs_main");

        let loc = iface.uniform("transform").unwrap();
        assert_eq!(loc.binding, 0);
        assert_eq!(loc.offset, 0);
        assert_eq!(loc.ty, UniformType::Mat3);

        let block = iface.block(0).unwrap();
        assert_eq!(block.size, 48);
        assert!(block.visibility.vertex);
        assert!(!block.visibility.fragment);
    }

    #[test]
    fn struct_uniform_members_are_addressable() {
        let vs = r#"
struct Params {
    scale: f32,
    offset: vec2<f32>,
};
@group(0) @binding(0) var<uniform> params: Params;

@vertex
fn main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(p * params.scale + params.offset, 0.0, 1.0);
}
"#;
        let fs = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let program = link(vs, fs).unwrap();
        let iface = &program.interface;
        assert_eq!(iface.uniform("scale").unwrap().offset, 0);
        assert_eq!(iface.uniform("offset").unwrap().offset, 8);
        assert_eq!(iface.block(0).unwrap().size, 16);
    }

    #[test]
    fn syntax_error_carries_compiler_log() {
        let err = link("@vertex fn main( -> {", FS).unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, StageKind::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_fragment_entry_point_is_reported() {
        let err = link(VS, "fn helper() -> f32 { return 1.0; }").unwrap_err();
        assert!(matches!(
            err,
            ShaderError::MissingEntryPoint {
                stage: StageKind::Fragment
            }
        ));
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let fs = r#"
@fragment
fn fs_main(@location(3) tint: vec4<f32>) -> @location(0) vec4<f32> {
    return tint;
}
"#;
        let err = link(VS, fs).unwrap_err();
        match err {
            ShaderError::Link { log } => assert!(log.contains("location 3")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mismatched_varying_type_fails_to_link() {
        let fs = r#"
@fragment
fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color;
}
"#;
        assert!(matches!(link(VS, fs), Err(ShaderError::Link { .. })));
    }

    #[test]
    fn integer_attribute_is_unsupported() {
        let vs = r#"
@vertex
fn main(@location(0) id: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(id), 0.0, 0.0, 1.0);
}
"#;
        let fs = "@fragment fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        assert!(matches!(link(vs, fs), Err(ShaderError::Unsupported { .. })));
    }

    #[test]
    fn validation_error_reads_like_a_compiler_log() {
        let vs = "@vertex fn main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        match compile_stage(StageKind::Vertex, vs) {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, StageKind::Vertex);
                assert!(log.starts_with("error"), "{log}");
                assert!(!log.contains("WithSpan"), "{log}");
            }
            other => panic!("expected a compile error, got {:?}", other.err()),
        }
    }
}

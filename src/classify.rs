//! Parameter classifier.
//!
//! Walks a linked program's reflected uniforms and attributes and emits the
//! corresponding binding records. Classification happens once per program;
//! every failure here is per-parameter (logged, the parameter dropped) so a
//! single bad name never takes down the whole shader.

use crate::binding::{
    BindingTable, ColumnSemantic, MatrixBinding, PtrBinding, TextureBinding, VectorBinding,
    VertexStreamBinding,
};
use crate::descriptor;
use crate::grammar::{self, NameParse};
use crate::reflect::{ProgramReflection, ReflectedUniform};
use crate::types::{ComposeFn, MatrixPiece, MatrixSource, ParamType, Space, StateChange, TextureKind};

/// Engine-reserved prefix marking built-in uniforms and attributes.
pub const RESERVED_PREFIX: &str = "sb_";

/// Driver-reserved attribute prefix that falls back to the fixed-function
/// vertex format.
const DRIVER_PREFIX: &str = "gl_";

/// Output of classification: the binding table plus the parallel table of
/// native parameter handles, indexed by sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedProgram {
    pub table: BindingTable,
    pub locations: Vec<i32>,
}

/// Build the binding table for a linked program.
///
/// Deterministic: the same reflection always yields the same table content
/// and sequence numbering. Never fails as a whole; unusable parameters are
/// logged and skipped.
pub fn build_table(reflection: &dyn ProgramReflection) -> ClassifiedProgram {
    let mut table = BindingTable::default();
    let mut locations = Vec::new();
    let mut next_texture_unit = 0u32;

    for uniform in reflection.active_uniforms() {
        let location = reflection.uniform_location(&uniform.name);
        if location < 0 {
            continue;
        }
        let seqno = locations.len() as u32;
        locations.push(location);

        if let Some(rest) = uniform.name.strip_prefix(RESERVED_PREFIX) {
            classify_reserved_uniform(&mut table, seqno, &uniform.name, rest);
            continue;
        }

        match grammar::parse_transform_name(&uniform.name) {
            Ok(NameParse::Transform {
                piece,
                pieces,
                next,
            }) => {
                match descriptor::compile_transform(seqno, piece, &pieces, next, &uniform.name) {
                    Ok(mut binding) => {
                        binding.piece = narrow_piece(binding.piece, uniform.type_tag);
                        table.matrices.push(binding);
                    }
                    Err(err) => log::error!("{err}"),
                }
                continue;
            }
            Err(err) => {
                log::error!("{err}");
                continue;
            }
            Ok(NameParse::NotTransform) => {}
        }

        classify_by_type(&mut table, &mut next_texture_unit, seqno, &uniform);
    }

    for attribute in reflection.active_attributes() {
        let location = reflection.attribute_location(&attribute.name);
        if location < 0 || attribute.name.starts_with(DRIVER_PREFIX) {
            // The driver keeps these for itself; the standard vertex format
            // must be supplied alongside the shader's own streams.
            table.uses_fixed_function_arrays = true;
            continue;
        }
        let seqno = locations.len() as u32;
        locations.push(location);

        match classify_attribute(seqno, &attribute.name) {
            Some(binding) => table.streams.push(binding),
            None => log::error!("unrecognized vertex attribute '{}'", attribute.name),
        }
    }

    ClassifiedProgram { table, locations }
}

/// A position-style parameter declared narrower than vec4 only wants the
/// leading components of row 3.
fn narrow_piece(piece: MatrixPiece, type_tag: ParamType) -> MatrixPiece {
    if piece != MatrixPiece::Row3 {
        return piece;
    }
    match type_tag.float_cardinality() {
        Some(1) => MatrixPiece::Row3x1,
        Some(2) => MatrixPiece::Row3x2,
        Some(3) => MatrixPiece::Row3x3,
        _ => piece,
    }
}

/// Classify a uniform carrying the engine-reserved prefix: a built-in matrix
/// name (optional `Transpose` then `Inverse` suffix) or a `Texture<digits>`
/// render-state stage.
fn classify_reserved_uniform(table: &mut BindingTable, seqno: u32, name: &str, rest: &str) {
    let mut base = rest;
    let mut transpose = false;
    let mut inverse = false;
    if let Some(stripped) = base.strip_suffix("Transpose") {
        transpose = true;
        base = stripped;
    }
    if let Some(stripped) = base.strip_suffix("Inverse") {
        inverse = true;
        base = stripped;
    }

    if base.ends_with("Matrix") {
        match builtin_matrix(seqno, base, transpose, inverse) {
            Some(binding) => table.matrices.push(binding),
            None => log::error!("unrecognized uniform matrix name '{name}'"),
        }
        return;
    }

    if let Some(digits) = rest.strip_prefix("Texture") {
        if let Ok(stage) = digits.parse::<u32>() {
            table.textures.push(TextureBinding {
                seqno,
                input: None,
                stage,
                desired_kind: TextureKind::Tex2d,
                suffix: None,
            });
            return;
        }
    }

    log::error!("unrecognized reserved uniform name '{name}'");
}

/// The three built-in matrices. Inverse swaps the operand order; transpose
/// selects the transposed piece. The two are independently combinable.
fn builtin_matrix(
    seqno: u32,
    base: &str,
    transpose: bool,
    inverse: bool,
) -> Option<MatrixBinding> {
    let piece = if transpose {
        MatrixPiece::Transpose
    } else {
        MatrixPiece::Whole
    };
    let transform_deps = StateChange::GENERAL | StateChange::TRANSFORM;

    let (func, sources, deps) = match base {
        "ModelViewProjectionMatrix" => {
            let (a, b) = if inverse {
                (
                    MatrixSource::Transform {
                        from: Space::ApiClip,
                        to: Space::View,
                    },
                    MatrixSource::Transform {
                        from: Space::View,
                        to: Space::Model,
                    },
                )
            } else {
                (
                    MatrixSource::Transform {
                        from: Space::Model,
                        to: Space::View,
                    },
                    MatrixSource::Transform {
                        from: Space::View,
                        to: Space::ApiClip,
                    },
                )
            };
            (ComposeFn::Compose, [a, b], [transform_deps, transform_deps])
        }
        "ModelViewMatrix" => {
            let (from, to) = if inverse {
                (Space::View, Space::Model)
            } else {
                (Space::Model, Space::View)
            };
            (
                ComposeFn::First,
                [
                    MatrixSource::Transform { from, to },
                    MatrixSource::Identity,
                ],
                [transform_deps, StateChange::empty()],
            )
        }
        "ProjectionMatrix" => {
            let (from, to) = if inverse {
                (Space::ApiClip, Space::View)
            } else {
                (Space::View, Space::ApiClip)
            };
            (
                ComposeFn::First,
                [
                    MatrixSource::Transform { from, to },
                    MatrixSource::Identity,
                ],
                [transform_deps, StateChange::empty()],
            )
        }
        _ => return None,
    };

    Some(MatrixBinding {
        seqno,
        piece,
        func,
        sources,
        deps,
    })
}

/// Classify an unreserved uniform by its native type tag and array size.
fn classify_by_type(
    table: &mut BindingTable,
    next_texture_unit: &mut u32,
    seqno: u32,
    uniform: &ReflectedUniform,
) {
    let input_deps = StateChange::GENERAL | StateChange::SHADER_INPUTS;

    if uniform.array_size <= 1 {
        if let Some(kind) = uniform.type_tag.sampler_kind() {
            let unit = *next_texture_unit;
            *next_texture_unit += 1;
            table.textures.push(TextureBinding {
                seqno,
                input: Some(uniform.name.clone()),
                stage: unit,
                desired_kind: kind,
                suffix: None,
            });
        } else if uniform.type_tag == ParamType::Mat4 {
            table.matrices.push(MatrixBinding {
                seqno,
                piece: MatrixPiece::Whole,
                func: ComposeFn::First,
                sources: [
                    MatrixSource::NamedMatrix(uniform.name.clone()),
                    MatrixSource::Identity,
                ],
                deps: [input_deps, StateChange::empty()],
            });
        } else if uniform.type_tag.is_matrix() {
            log::warn!(
                "uniform '{}' has an unsupported matrix shape; only 4x4 float matrices are accepted",
                uniform.name
            );
        } else if let Some(cardinality) = uniform.type_tag.float_cardinality() {
            table.vectors.push(VectorBinding {
                seqno,
                input: uniform.name.clone(),
                cardinality,
                deps: input_deps,
            });
        } else if uniform.type_tag.is_integer() {
            log::warn!(
                "uniform '{}': integer parameters are not supported",
                uniform.name
            );
        } else {
            log::warn!("ignoring uniform '{}' of unrecognized type", uniform.name);
        }
        return;
    }

    // Array uniforms become pointer-array specs.
    if uniform.type_tag.is_matrix() {
        log::warn!(
            "uniform '{}': matrix arrays are not supported",
            uniform.name
        );
    } else if let Some(cardinality) = uniform.type_tag.float_cardinality() {
        table.pointers.push(PtrBinding {
            seqno,
            input: uniform.name.clone(),
            element_count: uniform.array_size,
            cardinality,
            deps: input_deps,
        });
    } else if uniform.type_tag.is_integer() {
        log::warn!(
            "uniform '{}': integer arrays are not supported",
            uniform.name
        );
    } else {
        log::warn!(
            "ignoring uniform array '{}' of unrecognized type",
            uniform.name
        );
    }
}

/// Map an attribute name to a vertex-stream binding.
///
/// Returns `None` for reserved-prefixed names that match no built-in
/// semantic. Unprefixed names become custom columns.
fn classify_attribute(seqno: u32, name: &str) -> Option<VertexStreamBinding> {
    let Some(rest) = name.strip_prefix(RESERVED_PREFIX) else {
        return Some(VertexStreamBinding {
            seqno,
            column: ColumnSemantic::Custom(name.to_string()),
            append_uv: None,
        });
    };

    let (column, append_uv) = match rest {
        "Vertex" => (ColumnSemantic::Position, None),
        "Normal" => (ColumnSemantic::Normal, None),
        "Color" => (ColumnSemantic::Color, None),
        _ => {
            if let Some(digits) = rest.strip_prefix("Tangent") {
                (ColumnSemantic::Tangent, parse_uv_suffix(digits)?)
            } else if let Some(digits) = rest.strip_prefix("Binormal") {
                (ColumnSemantic::Binormal, parse_uv_suffix(digits)?)
            } else if let Some(digits) = rest.strip_prefix("MultiTexCoord") {
                (ColumnSemantic::TexCoord, Some(digits.parse::<u32>().ok()?))
            } else {
                return None;
            }
        }
    };

    Some(VertexStreamBinding {
        seqno,
        column,
        append_uv,
    })
}

/// An empty suffix means "no texcoord set"; anything else must be digits.
/// The outer `Option` distinguishes malformed suffixes from the empty one.
fn parse_uv_suffix(digits: &str) -> Option<Option<u32>> {
    if digits.is_empty() {
        Some(None)
    } else {
        digits.parse::<u32>().ok().map(Some)
    }
}

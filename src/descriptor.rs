//! Transform descriptor compiler.
//!
//! Turns canonical transform tokens (see [`crate::grammar`]) into a fully
//! resolved [`MatrixBinding`]: two coordinate-space operands, the matrix
//! piece to extract, and the dependency bits that govern re-evaluation.
//! Malformed sequences produce a descriptive per-parameter error; the caller
//! drops that parameter and continues with the rest of the program.

use crate::binding::MatrixBinding;
use crate::error::BindError;
use crate::types::{ComposeFn, MatrixPiece, MatrixSource, Space, StateChange};

/// Compile the operand tokens at `pieces[next..]` into a matrix binding.
///
/// Grammar: `<space> [of <node>] to <space> [of <node>]`, with no trailing
/// tokens.
pub fn compile_transform(
    seqno: u32,
    piece: MatrixPiece,
    pieces: &[String],
    mut next: usize,
    name: &str,
) -> Result<MatrixBinding, BindError> {
    let src = parse_space(pieces, &mut next, name)?;
    expect_delimiter(pieces, &mut next, name)?;
    let dst = parse_space(pieces, &mut next, name)?;
    if next != pieces.len() {
        return Err(BindError::parameter(
            name,
            format!("unexpected token '{}' after transform", pieces[next]),
        ));
    }

    let source = MatrixSource::Transform { from: src, to: dst };
    let deps = source.dependencies();
    let mut binding = MatrixBinding {
        seqno,
        piece,
        func: ComposeFn::Compose,
        sources: [source, MatrixSource::Identity],
        deps: [deps, StateChange::empty()],
    };
    optimize(&mut binding);
    Ok(binding)
}

/// Consume one coordinate-space operand, with its optional `of` qualifier.
fn parse_space(pieces: &[String], next: &mut usize, name: &str) -> Result<Space, BindError> {
    let token = pieces
        .get(*next)
        .ok_or_else(|| BindError::parameter(name, "expected a coordinate space"))?;
    if token == "to" || token == "of" || token.is_empty() {
        return Err(BindError::parameter(
            name,
            format!("expected a coordinate space, found '{token}'"),
        ));
    }
    *next += 1;

    let qualifiable = matches!(token.as_str(), "model" | "view" | "clip");
    let qualifier = if qualifiable && pieces.get(*next).map(String::as_str) == Some("of") {
        *next += 1;
        let node = pieces
            .get(*next)
            .ok_or_else(|| BindError::parameter(name, "expected a node name after 'of'"))?;
        *next += 1;
        Some(node.clone())
    } else {
        None
    };

    Ok(match (token.as_str(), qualifier) {
        ("model", None) => Space::Model,
        ("world", None) => Space::World,
        ("view", None) => Space::View,
        ("clip", None) => Space::Clip,
        ("apiview", None) => Space::ApiView,
        ("apiclip", None) => Space::ApiClip,
        ("model", Some(node)) => Space::ModelOf(node),
        ("view", Some(node)) => Space::ViewOf(node),
        ("clip", Some(node)) => Space::ClipOf(node),
        (other, _) => Space::Node(other.to_string()),
    })
}

fn expect_delimiter(pieces: &[String], next: &mut usize, name: &str) -> Result<(), BindError> {
    match pieces.get(*next).map(String::as_str) {
        Some("to") => {
            *next += 1;
            Ok(())
        }
        Some(other) => Err(BindError::parameter(
            name,
            format!("expected 'to' delimiter, found '{other}'"),
        )),
        None => Err(BindError::parameter(name, "expected 'to' delimiter")),
    }
}

/// Collapse trivially-identity operands.
///
/// An operand whose source and destination name the same space is the
/// identity; when the second operand is (or becomes) the identity, the
/// compose function degenerates to "first operand only" so the update engine
/// never performs the multiply. A collapsed operand keeps the generic bit:
/// the identity never changes, but the parameter still needs its one write
/// when the shader is bound.
pub fn optimize(binding: &mut MatrixBinding) {
    for i in 0..2 {
        if let MatrixSource::Transform { from, to } = &binding.sources[i] {
            if from == to {
                binding.sources[i] = MatrixSource::Identity;
                binding.deps[i] = StateChange::GENERAL;
            }
        }
    }
    if binding.func == ComposeFn::Compose {
        if binding.sources[1] == MatrixSource::Identity {
            binding.func = ComposeFn::First;
        } else if binding.sources[0] == MatrixSource::Identity {
            binding.sources.swap(0, 1);
            binding.deps.swap(0, 1);
            binding.func = ComposeFn::First;
        }
    }
    if binding.func == ComposeFn::First {
        binding.sources[1] = MatrixSource::Identity;
        binding.deps[1] = StateChange::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{parse_transform_name, NameParse};

    fn compile(name: &str) -> Result<MatrixBinding, BindError> {
        match parse_transform_name(name).unwrap() {
            NameParse::Transform {
                piece,
                pieces,
                next,
            } => compile_transform(7, piece, &pieces, next, name),
            NameParse::NotTransform => panic!("{name} should be a transform name"),
        }
    }

    #[test]
    fn test_simple_transform() {
        let b = compile("trans_model_to_clip").unwrap();
        assert_eq!(b.seqno, 7);
        assert_eq!(b.piece, MatrixPiece::Whole);
        assert_eq!(b.func, ComposeFn::First);
        assert_eq!(
            b.sources[0],
            MatrixSource::Transform {
                from: Space::Model,
                to: Space::Clip,
            }
        );
        assert_eq!(b.sources[1], MatrixSource::Identity);
        assert_eq!(b.deps[0], StateChange::GENERAL | StateChange::TRANSFORM);
        assert_eq!(b.deps[1], StateChange::empty());
    }

    #[test]
    fn test_node_qualifiers() {
        let b = compile("trans_clip_of_light_to_view").unwrap();
        assert_eq!(
            b.sources[0],
            MatrixSource::Transform {
                from: Space::ClipOf("light".to_string()),
                to: Space::View,
            }
        );
        assert!(b.deps[0].contains(StateChange::SHADER_INPUTS));
    }

    #[test]
    fn test_named_node_space() {
        let b = compile("row3_light_to_model").unwrap();
        assert_eq!(b.piece, MatrixPiece::Row3);
        assert_eq!(
            b.sources[0],
            MatrixSource::Transform {
                from: Space::Node("light".to_string()),
                to: Space::Model,
            }
        );
    }

    #[test]
    fn test_same_space_degenerates_to_identity() {
        let b = compile("trans_view_to_view").unwrap();
        assert_eq!(b.func, ComposeFn::First);
        assert_eq!(b.sources[0], MatrixSource::Identity);
        // Written once at bind time, never re-evaluated after that.
        assert_eq!(b.total_deps(), StateChange::GENERAL);
    }

    #[test]
    fn test_shorthand_compiles_identically_to_long_form() {
        let shorthand = compile("mspos_light").unwrap();
        let long_form = compile("row3_light_to_model").unwrap();
        assert_eq!(shorthand, long_form);
    }

    #[test]
    fn test_malformed_sequences() {
        // Missing delimiter.
        assert!(compile("trans_model_view").is_err());
        // Missing second operand.
        assert!(compile("trans_model_to").is_err());
        // Trailing garbage.
        assert!(compile("trans_model_to_view_extra").is_err());
        // Dangling qualifier.
        assert!(compile("trans_model_of").is_err());
    }

    #[test]
    fn test_optimize_moves_second_operand_forward() {
        let mut b = MatrixBinding {
            seqno: 0,
            piece: MatrixPiece::Whole,
            func: ComposeFn::Compose,
            sources: [
                MatrixSource::Transform {
                    from: Space::World,
                    to: Space::World,
                },
                MatrixSource::Transform {
                    from: Space::World,
                    to: Space::View,
                },
            ],
            deps: [
                StateChange::GENERAL | StateChange::TRANSFORM,
                StateChange::GENERAL | StateChange::TRANSFORM,
            ],
        };
        optimize(&mut b);
        assert_eq!(b.func, ComposeFn::First);
        assert_eq!(
            b.sources[0],
            MatrixSource::Transform {
                from: Space::World,
                to: Space::View,
            }
        );
        assert_eq!(b.sources[1], MatrixSource::Identity);
        assert_eq!(b.deps[1], StateChange::empty());
    }
}

//! Name grammar parser for transform-style uniform names.
//!
//! Uniform names like `trans_model_to_clip` drive the transform descriptor
//! compiler. A set of legacy shorthand prefixes (`mspos_x` for "position of x
//! in model space" and friends) and canonical-matrix prefixes (`mat_`, `inv_`,
//! `tps_`, `itp_`) rewrite into the same canonical token form
//! `<piece>_<space>_to_<space>[_of_<node>]` before compilation.
//!
//! Parsing happens once, at table-construction time; no string work survives
//! into the per-frame path.

use crate::error::BindError;
use crate::types::MatrixPiece;

/// Result of parsing a uniform name against the transform grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameParse {
    /// The name is not a transform name. This is a legitimate non-match;
    /// the caller must fall back to the generic classifier.
    NotTransform,
    /// The name parsed; `pieces[next..]` holds the operand tokens.
    Transform {
        piece: MatrixPiece,
        pieces: Vec<String>,
        next: usize,
    },
}

/// Legacy shorthand prefixes: `(prefix, canonical piece token, dest space)`.
///
/// `mstrans_x` reads "full transform of x into model space" and `mspos_x`
/// reads "position of x in model space" (row 3 of the same matrix).
const SHORTHANDS: &[(&str, &str, &str)] = &[
    ("mstrans", "trans", "model"),
    ("wstrans", "trans", "world"),
    ("vstrans", "trans", "view"),
    ("cstrans", "trans", "clip"),
    ("mspos", "row3", "model"),
    ("wspos", "row3", "world"),
    ("vspos", "row3", "view"),
    ("cspos", "row3", "clip"),
];

/// Parse a reflected uniform name against the transform grammar.
///
/// Returns [`NameParse::NotTransform`] when the name does not start with a
/// recognized prefix or piece token — never an error. `Err` is returned only
/// for names that unambiguously claim a transform prefix but are malformed;
/// the caller must drop that single parameter and continue.
pub fn parse_transform_name(name: &str) -> Result<NameParse, BindError> {
    let mut pieces: Vec<String> = name.split('_').map(str::to_string).collect();

    for (prefix, piece, space) in SHORTHANDS {
        if pieces[0] == *prefix {
            pieces[0] = (*piece).to_string();
            pieces.push("to".to_string());
            pieces.push((*space).to_string());
            break;
        }
    }

    if matches!(pieces[0].as_str(), "mat" | "inv" | "tps" | "itp") {
        pieces = rewrite_canonical_matrix(name, &pieces)?;
    }

    let piece = match pieces[0].as_str() {
        "trans" => MatrixPiece::Whole,
        "tpose" => MatrixPiece::Transpose,
        "row0" => MatrixPiece::Row0,
        "row1" => MatrixPiece::Row1,
        "row2" => MatrixPiece::Row2,
        "row3" => MatrixPiece::Row3,
        "col0" => MatrixPiece::Col0,
        "col1" => MatrixPiece::Col1,
        "col2" => MatrixPiece::Col2,
        "col3" => MatrixPiece::Col3,
        _ => return Ok(NameParse::NotTransform),
    };

    Ok(NameParse::Transform {
        piece,
        pieces,
        next: 1,
    })
}

/// Expand `mat_`/`inv_`/`tps_`/`itp_` plus a built-in matrix name into the
/// canonical token form; `inv`/`itp` swap the two spaces, `tps`/`itp`
/// transpose the piece.
fn rewrite_canonical_matrix(name: &str, pieces: &[String]) -> Result<Vec<String>, BindError> {
    if pieces.len() != 2 {
        return Err(BindError::parameter(
            name,
            "matrix name must have two words: <prefix>_<matrix>",
        ));
    }
    let prefix = pieces[0].as_str();
    let canonical = match pieces[1].as_str() {
        "modelview" => "trans_model_to_apiview",
        "projection" => "trans_apiview_to_apiclip",
        "modelproj" => "trans_model_to_apiclip",
        _ => return Err(BindError::parameter(name, "unrecognized matrix name")),
    };

    let mut rewritten: Vec<String> = canonical.split('_').map(str::to_string).collect();
    if prefix == "inv" || prefix == "itp" {
        rewritten.swap(1, 3);
    }
    if prefix == "tps" || prefix == "itp" {
        rewritten[0] = "tpose".to_string();
    }
    Ok(rewritten)
}

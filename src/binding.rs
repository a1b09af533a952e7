//! Binding specs and the per-shader binding table.
//!
//! A binding spec is the resolved, typed description of how one program
//! parameter is fed a value. The table is built exactly once, when a program
//! is linked, and is immutable afterwards; per-frame work dispatches on the
//! spec variants, never on parameter names.
//!
//! Every spec carries the sequence number assigned during reflection, which
//! indexes a parallel table of native parameter handles owned by the context.

use crate::types::{ComposeFn, MatrixPiece, MatrixSource, StateChange, TextureKind};

/// A matrix-valued parameter: which two operands to combine, which piece of
/// the resulting 4x4 matrix to extract, and which change categories govern it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixBinding {
    pub seqno: u32,
    pub piece: MatrixPiece,
    pub func: ComposeFn,
    /// Operand matrices; `sources[1]` is [`MatrixSource::Identity`] when
    /// `func` is [`ComposeFn::First`].
    pub sources: [MatrixSource; 2],
    /// Per-operand dependency bits; an unused operand carries an empty mask.
    pub deps: [StateChange; 2],
}

impl MatrixBinding {
    /// Combined dependency mask of both operands.
    pub fn total_deps(&self) -> StateChange {
        self.deps[0] | self.deps[1]
    }
}

/// A scalar or vector parameter sourced from a single named shader input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorBinding {
    pub seqno: u32,
    /// Name of the engine-side vector input.
    pub input: String,
    /// Number of floats uploaded (1..=4).
    pub cardinality: u8,
    pub deps: StateChange,
}

/// An array parameter sourced from a caller-supplied contiguous buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtrBinding {
    pub seqno: u32,
    /// Name of the engine-side buffer input.
    pub input: String,
    /// Array length declared by the shader.
    pub element_count: u32,
    /// Floats per element (1..=4).
    pub cardinality: u8,
    pub deps: StateChange,
}

impl PtrBinding {
    /// Minimum number of scalars the supplied buffer must provide.
    pub fn required_len(&self) -> usize {
        self.element_count as usize * self.cardinality as usize
    }
}

/// A sampler parameter resolved from a named input or a render-state stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub seqno: u32,
    /// Named shader input supplying the texture, or `None` for a texture
    /// bound at a fixed render-state stage.
    pub input: Option<String>,
    /// Texture unit for named inputs; render-state stage index otherwise.
    pub stage: u32,
    /// Kind the sampler expects; mismatching textures are skipped.
    pub desired_kind: TextureKind,
    /// Optional variant suffix selecting a related texture loaded on demand.
    pub suffix: Option<String>,
}

/// Built-in per-vertex column semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSemantic {
    Position,
    Normal,
    Color,
    Tangent,
    Binormal,
    TexCoord,
    /// An arbitrarily named column.
    Custom(String),
}

impl ColumnSemantic {
    /// The geometry column name this semantic resolves to.
    pub fn column_name(&self) -> &str {
        match self {
            Self::Position => "position",
            Self::Normal => "normal",
            Self::Color => "color",
            Self::Tangent => "tangent",
            Self::Binormal => "binormal",
            Self::TexCoord => "texcoord",
            Self::Custom(name) => name,
        }
    }
}

/// A vertex attribute slot mapped to a named per-vertex column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexStreamBinding {
    pub seqno: u32,
    pub column: ColumnSemantic,
    /// Texture-coordinate-set index the column name is offset by, if any.
    pub append_uv: Option<u32>,
}

/// The per-shader ordered collection of resolved binding records.
///
/// Insertion order equals reflection order; sequence numbers are unique
/// across all record kinds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingTable {
    pub matrices: Vec<MatrixBinding>,
    pub vectors: Vec<VectorBinding>,
    pub pointers: Vec<PtrBinding>,
    pub textures: Vec<TextureBinding>,
    pub streams: Vec<VertexStreamBinding>,
    /// Set when an attribute resolved to a reserved name or to no native
    /// location: the caller must fall back to the fixed-function vertex
    /// format for those inputs.
    pub uses_fixed_function_arrays: bool,
}

impl BindingTable {
    /// Total number of binding records of all kinds.
    pub fn len(&self) -> usize {
        self.matrices.len()
            + self.vectors.len()
            + self.pointers.len()
            + self.textures.len()
            + self.streams.len()
    }

    /// Whether the table holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All sequence numbers, in record-kind order. Used to assert uniqueness.
    pub fn sequence_numbers(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.matrices.iter().map(|b| b.seqno));
        out.extend(self.vectors.iter().map(|b| b.seqno));
        out.extend(self.pointers.iter().map(|b| b.seqno));
        out.extend(self.textures.iter().map(|b| b.seqno));
        out.extend(self.streams.iter().map(|b| b.seqno));
        out
    }
}

// Tables are shared read-only with render threads once built.
static_assertions::assert_impl_all!(BindingTable: Send, Sync);

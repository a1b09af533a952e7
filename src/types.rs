//! Shared enums and bitmasks used across the binding engine.

use glam::DMat4;

bitflags::bitflags! {
    /// Render-state change categories that can invalidate a binding.
    ///
    /// Every binding spec carries a mask of these bits. Each frame the caller
    /// passes the set of categories that changed since the last draw, and only
    /// specs whose mask intersects it are re-evaluated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateChange: u32 {
        /// Fires on every render-state change. Issued once at bind time, so a
        /// spec depending only on this bit is still written at least once.
        const GENERAL = 1 << 0;
        /// The scene or camera transform changed.
        const TRANSFORM = 1 << 1;
        /// A named shader input changed.
        const SHADER_INPUTS = 1 << 2;
    }
}

/// Shader stage in the graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Fragment shader.
    Fragment,
    /// Geometry shader.
    Geometry,
}

/// Texture kind a sampler expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// One-dimensional texture.
    Tex1d,
    /// Two-dimensional texture.
    Tex2d,
    /// Three-dimensional (volume) texture.
    Tex3d,
    /// Cube map.
    CubeMap,
}

/// Numeric element kind of a pointer-array input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
}

/// Reflected type tag of a program parameter, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Sampler1d,
    Sampler1dShadow,
    Sampler2d,
    Sampler2dShadow,
    Sampler3d,
    SamplerCube,
    Bool,
    BVec2,
    BVec3,
    BVec4,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    Mat2,
    Mat3,
    Mat4,
    Mat2x3,
    Mat2x4,
    Mat3x2,
    Mat3x4,
    Mat4x2,
    Mat4x3,
}

impl ParamType {
    /// The texture kind this sampler type expects, if it is a sampler.
    /// Shadow samplers alias their non-shadow kind.
    pub fn sampler_kind(&self) -> Option<TextureKind> {
        match self {
            Self::Sampler1d | Self::Sampler1dShadow => Some(TextureKind::Tex1d),
            Self::Sampler2d | Self::Sampler2dShadow => Some(TextureKind::Tex2d),
            Self::Sampler3d => Some(TextureKind::Tex3d),
            Self::SamplerCube => Some(TextureKind::CubeMap),
            _ => None,
        }
    }

    /// Number of float components, if this is a bool/float scalar or vector.
    pub fn float_cardinality(&self) -> Option<u8> {
        match self {
            Self::Bool | Self::Float => Some(1),
            Self::BVec2 | Self::Vec2 => Some(2),
            Self::BVec3 | Self::Vec3 => Some(3),
            Self::BVec4 | Self::Vec4 => Some(4),
            _ => None,
        }
    }

    /// Whether this is an integer scalar or vector type.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int | Self::IVec2 | Self::IVec3 | Self::IVec4)
    }

    /// Whether this is any float matrix type.
    pub fn is_matrix(&self) -> bool {
        matches!(
            self,
            Self::Mat2
                | Self::Mat3
                | Self::Mat4
                | Self::Mat2x3
                | Self::Mat2x4
                | Self::Mat3x2
                | Self::Mat3x4
                | Self::Mat4x2
                | Self::Mat4x3
        )
    }
}

/// A coordinate space that a transform binding can reference.
///
/// `Model`, `View` and `Clip` have variants qualified by a named scene node
/// (the `of` clause of the transform grammar); `Node` is the space of a node
/// supplied directly as a shader input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Space {
    Model,
    World,
    View,
    Clip,
    ApiView,
    ApiClip,
    ModelOf(String),
    ViewOf(String),
    ClipOf(String),
    Node(String),
}

impl Space {
    /// The change categories that can invalidate a matrix involving this space.
    pub fn dependencies(&self) -> StateChange {
        match self {
            Self::Model | Self::World | Self::View | Self::Clip | Self::ApiView | Self::ApiClip => {
                StateChange::GENERAL | StateChange::TRANSFORM
            }
            Self::ModelOf(_) | Self::ViewOf(_) | Self::ClipOf(_) | Self::Node(_) => {
                StateChange::GENERAL | StateChange::TRANSFORM | StateChange::SHADER_INPUTS
            }
        }
    }
}

/// Which sub-piece of a 4x4 matrix feeds the parameter.
///
/// The piece fully determines the number of floats uploaded and the
/// extraction offset into the flattened parameter array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixPiece {
    /// All 16 floats of the parameter array.
    Whole,
    /// All 16 floats, transposed at upload.
    Transpose,
    Row0,
    Row1,
    Row2,
    Row3,
    Col0,
    Col1,
    Col2,
    Col3,
    /// First float of row 3 (scalar parameter).
    Row3x1,
    /// First two floats of row 3 (vec2 parameter).
    Row3x2,
    /// First three floats of row 3 (vec3 parameter).
    Row3x3,
}

impl MatrixPiece {
    /// Number of floats this piece extracts.
    pub fn float_count(&self) -> usize {
        match self {
            Self::Whole | Self::Transpose => 16,
            Self::Row0 | Self::Row1 | Self::Row2 | Self::Row3 => 4,
            Self::Col0 | Self::Col1 | Self::Col2 | Self::Col3 => 4,
            Self::Row3x1 => 1,
            Self::Row3x2 => 2,
            Self::Row3x3 => 3,
        }
    }
}

/// One operand of a matrix binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatrixSource {
    /// The identity matrix; carries no dependencies.
    Identity,
    /// The current transform from one coordinate space to another.
    Transform { from: Space, to: Space },
    /// A 4x4 matrix supplied as a named shader input.
    NamedMatrix(String),
}

impl MatrixSource {
    /// The change categories that can invalidate this operand.
    pub fn dependencies(&self) -> StateChange {
        match self {
            Self::Identity => StateChange::empty(),
            Self::Transform { from, to } => from.dependencies() | to.dependencies(),
            Self::NamedMatrix(_) => StateChange::GENERAL | StateChange::SHADER_INPUTS,
        }
    }
}

/// How the two operands of a matrix binding combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComposeFn {
    /// Use the first operand only; the second slot is unused.
    First,
    /// Apply the first operand, then the second.
    Compose,
}

/// A texture object resolved from the render state or a shader input.
///
/// The id is opaque to the engine; the device layer interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub id: u64,
    pub kind: TextureKind,
}

/// Element format of a vertex column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnNumeric {
    /// 32-bit floats.
    Float32,
    /// Normalized unsigned bytes.
    UNorm8,
}

/// A named per-vertex data column of the currently bound geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexColumn {
    /// Components per vertex (1..=4).
    pub num_components: u8,
    /// Element format.
    pub numeric: ColumnNumeric,
    /// Byte offset of the first element within `data`.
    pub start: usize,
    /// Byte stride between consecutive vertices.
    pub stride: usize,
    /// Raw interleaved vertex data.
    pub data: Vec<u8>,
}

impl VertexColumn {
    /// Build a tightly packed float column from typed data.
    pub fn from_f32(num_components: u8, values: &[f32]) -> Self {
        Self {
            num_components,
            numeric: ColumnNumeric::Float32,
            start: 0,
            stride: num_components as usize * 4,
            data: bytemuck::cast_slice(values).to_vec(),
        }
    }
}

/// Current value of a pointer-array shader input.
///
/// The numeric kind is part of the value, so a structurally impossible kind
/// cannot reach the update engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PtrData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl PtrData {
    /// Number of scalar elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The numeric kind of the stored elements.
    pub fn kind(&self) -> NumericKind {
        match self {
            Self::Float32(_) => NumericKind::Float32,
            Self::Float64(_) => NumericKind::Float64,
        }
    }
}

/// Flatten an engine-precision matrix to the single-precision parameter
/// array all piece extraction offsets are defined against.
///
/// The name grammar uses the row-vector convention, where row 3 of a
/// transform carries the translation. Under that convention the parameter
/// array is the row-major layout of the transposed matrix, which is exactly
/// glam's column-major element order; the device hands it to the driver
/// unmodified and shaders multiply column vectors as usual.
pub fn to_param_array(m: &DMat4) -> [f32; 16] {
    m.as_mat4().to_cols_array()
}

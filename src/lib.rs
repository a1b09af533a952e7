//! Reflection-driven shader parameter binding.
//!
//! A linked shader program exposes uniforms and attributes by name and type.
//! This crate classifies them once into a [`BindingTable`] of typed binding
//! records, then feeds them each frame through a [`ShaderContext`]: uniform
//! writes are filtered by a [`StateChange`] dependency mask so only the
//! parameters invalidated by what actually changed are re-issued.
//!
//! Uniform names follow a transform grammar (`trans_model_to_clip`,
//! `wspos_light`, `mat_modelview`) resolved against pluggable state
//! providers; the engine never talks to a driver except through the
//! [`Device`] trait.

pub mod binding;
pub mod classify;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod grammar;
pub mod provider;
pub mod reflect;
pub mod streams;
pub mod types;

pub use binding::{
    BindingTable, ColumnSemantic, MatrixBinding, PtrBinding, TextureBinding, VectorBinding,
    VertexStreamBinding,
};
pub use classify::{build_table, ClassifiedProgram, RESERVED_PREFIX};
pub use context::{ContextState, ShaderContext, StageSource};
pub use device::{Device, DeviceCall, ProgramHandle, RecordingDevice, StageHandle};
pub use error::BindError;
pub use provider::{GeometryProvider, RenderStateProvider, StaticState, TextureStateProvider};
pub use reflect::{ProgramReflection, ReflectedAttribute, ReflectedUniform, StaticReflection};
pub use types::{
    ComposeFn, MatrixPiece, MatrixSource, ParamType, PtrData, ShaderStage, Space, StateChange,
    TextureKind, TextureRef, VertexColumn,
};

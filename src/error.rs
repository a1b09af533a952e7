//! Error types for the binding engine.
//!
//! Failures fall into three tiers: per-parameter (the parameter is dropped,
//! construction continues), per-frame (the spec is skipped this frame), and
//! fatal-to-context (the shader context transitions to `Invalid` and all
//! subsequent operations fail). The tier is decided by the caller; this enum
//! only describes what went wrong.

use crate::types::ShaderStage;

/// Errors that can occur while building or driving a shader binding table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// A reflected parameter could not be classified or its name is malformed.
    #[error("parameter '{name}': {message}")]
    Parameter { name: String, message: String },

    /// A shader stage failed to compile.
    #[error("failed to compile {stage:?} stage: {log}")]
    StageCompile { stage: ShaderStage, log: String },

    /// The program failed to link.
    #[error("failed to link program: {log}")]
    Link { log: String },

    /// A pointer-array input supplied fewer elements than the shader declared.
    #[error("shader input '{name}': expected at least {expected} elements, got {actual}")]
    InputSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A shader input required for a structurally valid binding has no value.
    #[error("shader input '{name}' has no value")]
    MissingInput { name: String },

    /// The context is in the terminal `Invalid` state.
    #[error("shader context is invalid")]
    ContextInvalid,

    /// An operation was issued before the program was built and linked.
    #[error("program not linked")]
    NotLinked,

    /// A uniform write was issued while the program was not active.
    #[error("program not bound")]
    NotBound,

    /// The device call layer reported a failure.
    #[error("device: {0}")]
    Device(String),
}

impl BindError {
    /// Convenience constructor for per-parameter errors.
    pub fn parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

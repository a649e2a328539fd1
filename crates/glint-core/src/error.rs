//! Error types for resource and pipeline operations.

use crate::device::ShaderStage;
use crate::uniform::UniformKind;

/// Errors surfaced by resource and pipeline operations.
///
/// Validation and type-mismatch errors are rejected synchronously at the
/// call site and never clamped or coerced. Compile and link errors carry the
/// device diagnostic log; the offending device object is destroyed before
/// the error is returned, and nothing is retried. Device-level failures
/// outside the checked compile/link status are treated as fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An argument failed validation (negative size or count, out-of-range
    /// access).
    #[error("{0}")]
    Validation(String),

    /// A shader stage failed to compile. The device diagnostic log is
    /// attached; the stage object has been destroyed.
    #[error("failed to compile {stage:?} shader:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    /// A program failed to link. The device diagnostic log is attached; the
    /// program object has been destroyed.
    #[error("failed to link shader program:\n{log}")]
    Link { log: String },

    /// A value of the wrong kind was assigned to a uniform. No implicit
    /// numeric coercion is performed.
    #[error("uniform `{name}` holds {expected:?}, got {provided:?}")]
    TypeMismatch {
        name: String,
        expected: UniformKind,
        provided: UniformKind,
    },

    /// A named resource (uniform, include file, shader source file) does
    /// not exist.
    #[error("no resource named `{0}`")]
    ResourceNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

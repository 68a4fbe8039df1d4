//! Unified error types for the binding layer.
//!
//! Two layers: registration/install-time failures (a module description that
//! cannot be turned into glue) and call-time failures (a value that cannot
//! cross the boundary). Only `Raised` is part of the registered surface;
//! everything else stays on the native side or degrades to a host
//! `TypeError`.

use thiserror::Error;

/// Binding layer error type.
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("registration error: {0}")]
    Registration(String),

    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("script evaluation error: {0}")]
    Eval(String),

    #[error("unknown binding target: {0}")]
    UnknownTarget(String),

    #[error("unresolved type `{ty}` referenced by `{referrer}`")]
    UnresolvedType { ty: String, referrer: String },

    /// A registered exception type raised by native code. Translated into
    /// the host runtime's exception mechanism at the boundary.
    #[error("{exception}: {message}")]
    Raised { exception: String, message: String },
}

/// Value conversion errors at the boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: String },

    #[error("missing argument `{0}` and no default is declared")]
    MissingArgument(String),

    #[error("{value} is not a member of enum `{ty}`")]
    InvalidEnumValue { ty: String, value: i64 },

    #[error("stale or foreign handle {id} for class `{class}`")]
    BadHandle { class: String, id: u64 },

    #[error("unknown class `{0}` in value")]
    UnknownClass(String),
}

impl ConversionError {
    pub fn mismatch(expected: &'static str, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected,
            got: got.into(),
        }
    }
}

pub type BindingResult<T> = Result<T, BindingError>;

//! Types referenced by registrations but deliberately never registered.
//!
//! They exist to exercise the generator's degraded fallback path: the
//! record ends up behind a synthesized opaque binding, the enumeration
//! degrades to integer passthrough.

use crate::error::ConversionError;

/// Record with no binding of its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unbound;

/// Enumeration with no binding of its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForgottenEnum {
    #[default]
    One = 1,
    Two = 2,
}

impl TryFrom<i64> for ForgottenEnum {
    type Error = ConversionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(ConversionError::InvalidEnumValue {
                ty: "forgotten.Enum".to_string(),
                value: other,
            }),
        }
    }
}

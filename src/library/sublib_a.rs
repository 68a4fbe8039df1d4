//! Arithmetic helper and the two colour enumerations.
//!
//! The enumerations deliberately overlap in member names; both are exported
//! at the enclosing submodule scope to exercise export collision handling.

use crate::error::ConversionError;

/// Scoped colour enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ConsoleForegroundColor {
    Green = 32,
    Yellow = 33,
    Blue = 34,
    Magenta = 35,
}

impl ConsoleForegroundColor {
    pub const VARIANTS: [(&'static str, i64); 4] = [
        ("Green", 32),
        ("Yellow", 33),
        ("Blue", 34),
        ("Magenta", 35),
    ];

    pub const fn value(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for ConsoleForegroundColor {
    type Error = ConversionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            32 => Ok(Self::Green),
            33 => Ok(Self::Yellow),
            34 => Ok(Self::Blue),
            35 => Ok(Self::Magenta),
            other => Err(ConversionError::InvalidEnumValue {
                ty: "sublibA.ConsoleForegroundColor".to_string(),
                value: other,
            }),
        }
    }
}

/// Unscoped colour enumeration, member names colliding with
/// [`ConsoleForegroundColor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ConsoleBackgroundColor {
    Green = 42,
    Yellow = 43,
    Blue = 44,
    Magenta = 45,
}

impl ConsoleBackgroundColor {
    pub const VARIANTS: [(&'static str, i64); 4] = [
        ("Green", 42),
        ("Yellow", 43),
        ("Blue", 44),
        ("Magenta", 45),
    ];
}

/// 32-bit integer addition with fixed-width wraparound.
pub fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

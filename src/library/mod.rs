//! Native demonstration types exposed through the binding layer.
//!
//! Everything here is deliberately trivial: plain records, nested markers,
//! enumerations with explicit discriminants and one exception type. The
//! interesting part is never the type itself but the shape it forces the
//! binding generator to handle.

pub mod containers;
pub mod forgotten;
pub mod numeric;
pub mod sublib_a;

use std::collections::HashMap;

use thiserror::Error;

use crate::error::{BindingError, ConversionError};
use crate::value::ScriptValue;

/// Record with a single no-op method and a nested child record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Foo;

impl Foo {
    pub fn f(&self) {}
}

/// Nested child record of [`Foo`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FooChild;

impl FooChild {
    pub fn g(&self) {}
}

/// Base record holding a name, with an empty nested marker type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Base {
    pub name: String,
}

impl Base {
    pub fn to_fields(&self) -> HashMap<String, ScriptValue> {
        HashMap::from([("name".to_string(), ScriptValue::Str(self.name.clone()))])
    }
}

/// Empty marker nested in [`Base`]. Not constructible from the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseInner;

/// Derived record adding a count on top of [`Base`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Derived {
    pub base: Base,
    pub count: i32,
}

impl Derived {
    pub fn to_fields(&self) -> HashMap<String, ScriptValue> {
        let mut fields = self.base.to_fields();
        fields.insert("count".to_string(), ScriptValue::Int(i64::from(self.count)));
        fields
    }
}

/// Enumeration nested two levels deep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NestedEnum {
    #[default]
    One = 1,
    Two = 2,
}

impl NestedEnum {
    pub const fn value(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for NestedEnum {
    type Error = ConversionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(ConversionError::InvalidEnumValue {
                ty: "Outer.Inner.NestedEnum".to_string(),
                value: other,
            }),
        }
    }
}

/// Record nested in [`Outer`], carrying a [`NestedEnum`] value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inner {
    pub value: NestedEnum,
}

impl Inner {
    pub fn to_fields(&self) -> HashMap<String, ScriptValue> {
        HashMap::from([("value".to_string(), ScriptValue::Int(self.value.value()))])
    }
}

/// Record containing a nested record that itself contains an enum value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outer {
    pub inner: Inner,
}

/// The single error type registered for propagation across the boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExampleException {
    pub message: String,
}

impl ExampleException {
    /// Host-side class name this exception is registered under.
    pub const NAME: &'static str = "ExampleException";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ExampleException> for BindingError {
    fn from(e: ExampleException) -> Self {
        Self::Raised {
            exception: ExampleException::NAME.to_string(),
            message: e.message,
        }
    }
}

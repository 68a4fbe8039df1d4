//! Universal value model.
//!
//! Everything that crosses between native code and the host runtime is
//! expressed as a [`ScriptValue`]. Host adapters translate this model to and
//! from their runtime's object representation; native callbacks never see a
//! host value directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Plain complex-number record. Only ever carried across the boundary,
/// never computed with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Complex64 {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// Language-agnostic value crossing the binding boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ScriptValue>),
    Map(HashMap<String, ScriptValue>),
    Complex(Complex64),
    /// Plain-record instance of a registered class. Fields are copied by
    /// value; the adapter reattaches the class identity on its side.
    Instance {
        class: String,
        fields: HashMap<String, ScriptValue>,
    },
    /// Opaque native object, exchanged by reference through the adapter's
    /// handle table.
    Handle { class: String, id: u64 },
    /// Dense row-major integer buffer.
    IntBuffer { shape: Vec<usize>, data: Vec<i32> },
    /// Dense row-major float buffer.
    FloatBuffer { shape: Vec<usize>, data: Vec<f64> },
}

impl ScriptValue {
    /// Build a `Map` value from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an `Instance` value for a registered class path.
    pub fn instance<K, I>(class: impl Into<String>, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        Self::Instance {
            class: class.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Short type label for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Complex(_) => "complex",
            Self::Instance { .. } => "instance",
            Self::Handle { .. } => "handle",
            Self::IntBuffer { .. } => "ndarray<i32>",
            Self::FloatBuffer { .. } => "ndarray<f64>",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer view. Floats with no fractional part are accepted because the
    /// host runtime does not distinguish the two.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 2f64.powi(53) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ScriptValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Complex view, with the coercions the host runtime expects: a bare
    /// number becomes a real-only complex, and a `{ re, im }` map is read
    /// field-wise.
    pub fn as_complex(&self) -> Option<Complex64> {
        match self {
            Self::Complex(c) => Some(*c),
            Self::Int(v) => Some(Complex64::new(*v as f64, 0.0)),
            Self::Float(f) => Some(Complex64::new(*f, 0.0)),
            Self::Map(fields) => {
                let re = fields.get("re").and_then(ScriptValue::as_f64)?;
                let im = fields.get("im").and_then(ScriptValue::as_f64)?;
                Some(Complex64::new(re, im))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(ScriptValue::Null.type_name(), "null");
        assert_eq!(
            ScriptValue::IntBuffer {
                shape: vec![0],
                data: Vec::new()
            }
            .type_name(),
            "ndarray<i32>"
        );
    }

    #[test]
    fn test_as_i64_accepts_integral_floats() {
        assert_eq!(ScriptValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(ScriptValue::Float(3.5).as_i64(), None);
        assert_eq!(ScriptValue::Int(-7).as_i64(), Some(-7));
    }

    #[test]
    fn test_as_complex_coercions() {
        assert_eq!(
            ScriptValue::Int(2).as_complex(),
            Some(Complex64::new(2.0, 0.0))
        );
        let mapped = ScriptValue::object([
            ("re", ScriptValue::Float(1.5)),
            ("im", ScriptValue::Float(-2.0)),
        ]);
        assert_eq!(mapped.as_complex(), Some(Complex64::new(1.5, -2.0)));
        assert_eq!(ScriptValue::Str("no".to_string()).as_complex(), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let value = ScriptValue::instance(
            "Outer.Inner",
            [("value", ScriptValue::Int(2))],
        );
        let json = serde_json::to_string(&value).expect("serialize");
        let back: ScriptValue = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, value);
    }
}

//! Container types crossing the boundary two ways.
//!
//! The string-keyed containers are bound as opaque classes and exchanged by
//! reference through the handle table; the integer-keyed counterparts cross
//! by value, element by element.

use std::collections::BTreeMap;

use crate::error::ConversionError;
use crate::value::{Complex64, ScriptValue};

/// String-to-complex mapping, bound as an opaque container.
pub type ComplexMap = BTreeMap<String, Complex64>;

/// String/double pair sequence, bound as an opaque container.
pub type PairVec = Vec<(String, f64)>;

/// Integer-keyed complex mapping, copied by value across the boundary.
pub type IntComplexMap = BTreeMap<i64, Complex64>;

/// Integer/double pair sequence, copied by value across the boundary.
pub type IntPairVec = Vec<(i64, f64)>;

/// Render an integer-keyed complex map as a host value. Host object keys
/// are strings, so integer keys are rendered in decimal.
pub fn complex_map_to_value(map: &IntComplexMap) -> ScriptValue {
    ScriptValue::object(
        map.iter()
            .map(|(k, v)| (k.to_string(), ScriptValue::Complex(*v))),
    )
}

/// Parse a host value back into an integer-keyed complex map.
pub fn value_to_complex_map(value: &ScriptValue) -> Result<IntComplexMap, ConversionError> {
    let entries = match value {
        ScriptValue::Map(entries) => entries,
        other => return Err(ConversionError::mismatch("map<int, complex>", other.type_name())),
    };
    let mut map = IntComplexMap::new();
    for (key, v) in entries {
        let key: i64 = key
            .parse()
            .map_err(|_| ConversionError::mismatch("int key", "non-numeric key"))?;
        let c = v
            .as_complex()
            .ok_or_else(|| ConversionError::mismatch("complex", v.type_name()))?;
        map.insert(key, c);
    }
    Ok(map)
}

/// Render an integer/double pair sequence as a host value.
pub fn pairs_to_value(pairs: &IntPairVec) -> ScriptValue {
    ScriptValue::List(
        pairs
            .iter()
            .map(|(k, v)| ScriptValue::List(vec![ScriptValue::Int(*k), ScriptValue::Float(*v)]))
            .collect(),
    )
}

/// Parse a host value back into an integer/double pair sequence.
pub fn value_to_pairs(value: &ScriptValue) -> Result<IntPairVec, ConversionError> {
    let items = value
        .as_list()
        .ok_or_else(|| ConversionError::mismatch("list<(int, float)>", value.type_name()))?;
    let mut pairs = IntPairVec::with_capacity(items.len());
    for item in items {
        let pair = item
            .as_list()
            .ok_or_else(|| ConversionError::mismatch("(int, float)", item.type_name()))?;
        let (key, val) = match pair {
            [k, v] => (k, v),
            _ => return Err(ConversionError::mismatch("(int, float)", "wrong arity")),
        };
        let key = key
            .as_i64()
            .ok_or_else(|| ConversionError::mismatch("int", key.type_name()))?;
        let val = val
            .as_f64()
            .ok_or_else(|| ConversionError::mismatch("float", val.type_name()))?;
        pairs.push((key, val));
    }
    Ok(pairs)
}

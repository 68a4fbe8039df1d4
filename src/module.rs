//! Registration table for the demonstration module.
//!
//! This is the whole point of the crate: every registration below pokes at
//! one binding-generator edge case. Nested classes, single-level
//! inheritance, enum export collisions, defaulted parameters, opaque
//! containers, numeric buffers, and references to types that were never
//! registered.

use std::collections::HashMap;

use crate::bindings::protocol::{receiver, ClassDef, EnumDef, FunctionDef, ModuleDef, TypeRef};
use crate::error::ConversionError;
use crate::library::containers::{
    complex_map_to_value, pairs_to_value, value_to_complex_map, value_to_pairs, ComplexMap,
    IntComplexMap, IntPairVec, PairVec,
};
use crate::library::forgotten::{ForgottenEnum, Unbound};
use crate::library::numeric::NdBuffer;
use crate::library::sublib_a::{self, ConsoleBackgroundColor, ConsoleForegroundColor};
use crate::library::{Base, Derived, ExampleException, Foo, FooChild, Inner, Outer};
use crate::value::{Complex64, ScriptValue};

/// Host-visible name of the demonstration module.
pub const MODULE_NAME: &str = "example";

const COMPLEX_MAP_CLASS: &str = "opaque_types.MapStringComplex";
const PAIR_VEC_CLASS: &str = "opaque_types.VectorPairStringDouble";
const UNBOUND_TYPE: &str = "forgotten.Unbound";
const FORGOTTEN_ENUM: &str = "forgotten.Enum";

/// Build the full registration table.
pub fn example_module() -> ModuleDef {
    ModuleDef::new(MODULE_NAME)
        .doc("Binding layer example test plugin")
        .class(foo_class())
        .class(foo_child_class())
        .class(base_class())
        .class(base_inner_class())
        .class(derived_class())
        .class(outer_class())
        .class(inner_class())
        .enumeration(
            EnumDef::new("NestedEnum")
                .nested("Outer.Inner")
                .variant("ONE", 1)
                .variant("TWO", 2),
        )
        .exception(ExampleException::NAME)
        .function(raise_error_fn())
        .value("foovar", foo_instance())
        .value(
            "foolist",
            ScriptValue::List(vec![foo_instance(), foo_instance()]),
        )
        .value("none", ScriptValue::Null)
        .value(
            "list_with_none",
            ScriptValue::List(vec![
                ScriptValue::Null,
                ScriptValue::Int(2),
                ScriptValue::Map(HashMap::new()),
            ]),
        )
        .submodule(sublib_a_module())
        .submodule(numeric_module())
        .submodule(opaque_types_module())
        .submodule(copy_types_module())
        .submodule(invalid_signatures_module())
}

// ============================================================================
// Records
// ============================================================================

fn foo_class() -> ClassDef {
    ClassDef::record("Foo")
        .constructor(|_, _| Ok(ScriptValue::Map(HashMap::new())))
        .method(FunctionDef::new("f", |_, _| {
            Foo::default().f();
            Ok(ScriptValue::Null)
        }))
}

fn foo_child_class() -> ClassDef {
    ClassDef::record("FooChild")
        .nested("Foo")
        .constructor(|_, _| Ok(ScriptValue::Map(HashMap::new())))
        .method(FunctionDef::new("g", |_, _| {
            FooChild::default().g();
            Ok(ScriptValue::Null)
        }))
}

fn base_class() -> ClassDef {
    ClassDef::record("Base")
        .field("name", TypeRef::Str)
        .constructor(|_, _| Ok(ScriptValue::Map(Base::default().to_fields())))
}

// Empty marker type; has no constructor on purpose.
fn base_inner_class() -> ClassDef {
    ClassDef::record("Inner").nested("Base")
}

fn derived_class() -> ClassDef {
    ClassDef::record("Derived")
        .extends("Base")
        .field("count", TypeRef::Int)
        .constructor(|_, _| Ok(ScriptValue::Map(Derived::default().to_fields())))
}

fn outer_class() -> ClassDef {
    ClassDef::record("Outer")
        .field("inner", TypeRef::Class("Outer.Inner".to_string()))
        .constructor(|_, _| {
            let outer = Outer::default();
            Ok(ScriptValue::object([(
                "inner",
                ScriptValue::Instance {
                    class: "Outer.Inner".to_string(),
                    fields: outer.inner.to_fields(),
                },
            )]))
        })
}

fn inner_class() -> ClassDef {
    ClassDef::record("Inner")
        .nested("Outer")
        .field("value", TypeRef::Enum("Outer.Inner.NestedEnum".to_string()))
        .constructor(|_, _| Ok(ScriptValue::Map(Inner::default().to_fields())))
}

fn foo_instance() -> ScriptValue {
    ScriptValue::Instance {
        class: "Foo".to_string(),
        fields: HashMap::new(),
    }
}

fn raise_error_fn() -> FunctionDef {
    FunctionDef::new("raise_error", |_, args| {
        let message = args
            .first()
            .and_then(ScriptValue::as_str)
            .unwrap_or("error raised from native code");
        Err(ExampleException::new(message).into())
    })
    .doc("Raise the registered exception type with the given message")
    .param_default(
        "message",
        TypeRef::Str,
        ScriptValue::Str("error raised from native code".to_string()),
    )
    .returns(TypeRef::Unit)
}

// ============================================================================
// sublibA
// ============================================================================

fn sublib_a_module() -> ModuleDef {
    ModuleDef::new("sublibA")
        .function(
            FunctionDef::new("add", |_, args| {
                let a = expect_i32(args, 0)?;
                let b = expect_i32(args, 1)?;
                Ok(ScriptValue::Int(i64::from(sublib_a::add(a, b))))
            })
            .doc("Add two 32-bit integers with wraparound")
            .param("a", TypeRef::Int)
            .param("b", TypeRef::Int)
            .returns(TypeRef::Int),
        )
        .enumeration(colour_enum(
            "ConsoleForegroundColor",
            &ConsoleForegroundColor::VARIANTS,
        ))
        .enumeration(colour_enum(
            "ConsoleBackgroundColor",
            &ConsoleBackgroundColor::VARIANTS,
        ))
        .function(
            FunctionDef::new("accept_defaulted_enum", |_, args| {
                let raw = expect_i64(args, 0)?;
                let _ = ConsoleForegroundColor::try_from(raw)?;
                Ok(ScriptValue::Null)
            })
            .param_default(
                "color",
                TypeRef::Enum("sublibA.ConsoleForegroundColor".to_string()),
                ScriptValue::Int(ConsoleForegroundColor::Blue.value()),
            )
            .returns(TypeRef::Unit),
        )
}

fn colour_enum(name: &str, variants: &[(&str, i64)]) -> EnumDef {
    let mut def = EnumDef::new(name).export_values();
    for (variant, value) in variants {
        def = def.variant(variant, *value);
    }
    def
}

// ============================================================================
// numeric
// ============================================================================

fn numeric_module() -> ModuleDef {
    ModuleDef::new("numeric")
        .function(
            FunctionDef::new("get_ndarray_int", |_, _| {
                let buf = NdBuffer::<i32>::empty();
                Ok(ScriptValue::IntBuffer {
                    shape: buf.shape,
                    data: buf.data,
                })
            })
            .returns(TypeRef::IntArray),
        )
        .function(
            FunctionDef::new("get_ndarray_float64", |_, _| {
                let buf = NdBuffer::<f64>::empty();
                Ok(ScriptValue::FloatBuffer {
                    shape: buf.shape,
                    data: buf.data,
                })
            })
            .returns(TypeRef::FloatArray),
        )
        .function(
            FunctionDef::new("accept_ndarray_int", |_, args| match args.first() {
                Some(ScriptValue::IntBuffer { shape, data }) => {
                    tracing::debug!(
                        target: "bindings",
                        dims = shape.len(),
                        elements = data.len(),
                        "accepted i32 ndarray"
                    );
                    Ok(ScriptValue::Null)
                }
                other => Err(ConversionError::mismatch("ndarray<i32>", type_label(other)).into()),
            })
            .param("array", TypeRef::IntArray)
            .returns(TypeRef::Unit),
        )
        .function(
            FunctionDef::new("accept_ndarray_float64", |_, args| match args.first() {
                Some(ScriptValue::FloatBuffer { shape, data }) => {
                    tracing::debug!(
                        target: "bindings",
                        dims = shape.len(),
                        elements = data.len(),
                        "accepted f64 ndarray"
                    );
                    Ok(ScriptValue::Null)
                }
                other => Err(ConversionError::mismatch("ndarray<f64>", type_label(other)).into()),
            })
            .param("array", TypeRef::FloatArray)
            .returns(TypeRef::Unit),
        )
}

// ============================================================================
// opaque_types
// ============================================================================

fn opaque_types_module() -> ModuleDef {
    ModuleDef::new("opaque_types")
        .class(complex_map_class())
        .class(pair_vec_class())
        .function(
            FunctionDef::new("get_complex_map", |store, _| {
                let id = store.alloc(COMPLEX_MAP_CLASS, ComplexMap::new());
                Ok(ScriptValue::Handle {
                    class: COMPLEX_MAP_CLASS.to_string(),
                    id,
                })
            })
            .returns(TypeRef::Class(COMPLEX_MAP_CLASS.to_string())),
        )
        .function(
            FunctionDef::new("get_vector_of_pairs", |store, _| {
                let id = store.alloc(PAIR_VEC_CLASS, PairVec::new());
                Ok(ScriptValue::Handle {
                    class: PAIR_VEC_CLASS.to_string(),
                    id,
                })
            })
            .returns(TypeRef::Class(PAIR_VEC_CLASS.to_string())),
        )
}

fn complex_map_class() -> ClassDef {
    ClassDef::opaque("MapStringComplex")
        .doc("String-to-complex mapping exchanged by reference")
        .constructor(|store, _| {
            let id = store.alloc(COMPLEX_MAP_CLASS, ComplexMap::new());
            Ok(ScriptValue::Int(id as i64))
        })
        .method(
            FunctionDef::new("set", |store, args| {
                let key = expect_str(args, 1)?.to_string();
                let value = expect_complex(args, 2)?;
                let map: &mut ComplexMap = store.resolve_mut(COMPLEX_MAP_CLASS, receiver(args)?)?;
                map.insert(key, value);
                Ok(ScriptValue::Null)
            })
            .param("key", TypeRef::Str)
            .param("value", TypeRef::Complex),
        )
        .method(
            FunctionDef::new("get", |store, args| {
                let key = expect_str(args, 1)?.to_string();
                let map: &ComplexMap = store.resolve(COMPLEX_MAP_CLASS, receiver(args)?)?;
                Ok(match map.get(&key) {
                    Some(c) => ScriptValue::Complex(*c),
                    None => ScriptValue::Null,
                })
            })
            .param("key", TypeRef::Str)
            .returns(TypeRef::Complex),
        )
        .method(
            FunctionDef::new("len", |store, args| {
                let map: &ComplexMap = store.resolve(COMPLEX_MAP_CLASS, receiver(args)?)?;
                Ok(ScriptValue::Int(map.len() as i64))
            })
            .returns(TypeRef::Int),
        )
        .method(
            FunctionDef::new("keys", |store, args| {
                let map: &ComplexMap = store.resolve(COMPLEX_MAP_CLASS, receiver(args)?)?;
                Ok(ScriptValue::List(
                    map.keys()
                        .map(|k| ScriptValue::Str(k.clone()))
                        .collect(),
                ))
            })
            .returns(TypeRef::List(Box::new(TypeRef::Str))),
        )
        .method(
            FunctionDef::new("items", |store, args| {
                let map: &ComplexMap = store.resolve(COMPLEX_MAP_CLASS, receiver(args)?)?;
                Ok(ScriptValue::List(
                    map.iter()
                        .map(|(k, v)| {
                            ScriptValue::List(vec![
                                ScriptValue::Str(k.clone()),
                                ScriptValue::Complex(*v),
                            ])
                        })
                        .collect(),
                ))
            })
            .returns(TypeRef::List(Box::new(TypeRef::Pair(
                Box::new(TypeRef::Str),
                Box::new(TypeRef::Complex),
            )))),
        )
}

fn pair_vec_class() -> ClassDef {
    ClassDef::opaque("VectorPairStringDouble")
        .doc("String/double pair sequence exchanged by reference")
        .constructor(|store, _| {
            let id = store.alloc(PAIR_VEC_CLASS, PairVec::new());
            Ok(ScriptValue::Int(id as i64))
        })
        .method(
            FunctionDef::new("push", |store, args| {
                let key = expect_str(args, 1)?.to_string();
                let value = expect_f64(args, 2)?;
                let pairs: &mut PairVec = store.resolve_mut(PAIR_VEC_CLASS, receiver(args)?)?;
                pairs.push((key, value));
                Ok(ScriptValue::Null)
            })
            .param("key", TypeRef::Str)
            .param("value", TypeRef::Float),
        )
        .method(
            FunctionDef::new("get", |store, args| {
                let index = expect_usize(args, 1)?;
                let pairs: &PairVec = store.resolve(PAIR_VEC_CLASS, receiver(args)?)?;
                Ok(match pairs.get(index) {
                    Some((k, v)) => ScriptValue::List(vec![
                        ScriptValue::Str(k.clone()),
                        ScriptValue::Float(*v),
                    ]),
                    None => ScriptValue::Null,
                })
            })
            .param("index", TypeRef::Int)
            .returns(TypeRef::Pair(
                Box::new(TypeRef::Str),
                Box::new(TypeRef::Float),
            )),
        )
        .method(
            FunctionDef::new("len", |store, args| {
                let pairs: &PairVec = store.resolve(PAIR_VEC_CLASS, receiver(args)?)?;
                Ok(ScriptValue::Int(pairs.len() as i64))
            })
            .returns(TypeRef::Int),
        )
        .method(
            FunctionDef::new("items", |store, args| {
                let pairs: &PairVec = store.resolve(PAIR_VEC_CLASS, receiver(args)?)?;
                Ok(ScriptValue::List(
                    pairs
                        .iter()
                        .map(|(k, v)| {
                            ScriptValue::List(vec![
                                ScriptValue::Str(k.clone()),
                                ScriptValue::Float(*v),
                            ])
                        })
                        .collect(),
                ))
            })
            .returns(TypeRef::List(Box::new(TypeRef::Pair(
                Box::new(TypeRef::Str),
                Box::new(TypeRef::Float),
            )))),
        )
}

// ============================================================================
// copy_types
// ============================================================================

fn copy_types_module() -> ModuleDef {
    ModuleDef::new("copy_types")
        .function(
            FunctionDef::new("get_complex_map", |_, _| {
                Ok(complex_map_to_value(&IntComplexMap::new()))
            })
            .returns(TypeRef::MapOf(
                Box::new(TypeRef::Int),
                Box::new(TypeRef::Complex),
            )),
        )
        .function(
            FunctionDef::new("get_vector_of_pairs", |_, _| {
                Ok(pairs_to_value(&IntPairVec::new()))
            })
            .returns(TypeRef::List(Box::new(TypeRef::Pair(
                Box::new(TypeRef::Int),
                Box::new(TypeRef::Float),
            )))),
        )
        .function(
            FunctionDef::new("echo_complex_map", |_, args| {
                let value = args
                    .first()
                    .ok_or_else(|| ConversionError::MissingArgument("map".to_string()))?;
                let map = value_to_complex_map(value)?;
                Ok(complex_map_to_value(&map))
            })
            .doc("Round-trip an integer-keyed complex map by value")
            .param(
                "map",
                TypeRef::MapOf(Box::new(TypeRef::Int), Box::new(TypeRef::Complex)),
            )
            .returns(TypeRef::MapOf(
                Box::new(TypeRef::Int),
                Box::new(TypeRef::Complex),
            )),
        )
        .function(
            FunctionDef::new("echo_vector_of_pairs", |_, args| {
                let value = args
                    .first()
                    .ok_or_else(|| ConversionError::MissingArgument("pairs".to_string()))?;
                let pairs = value_to_pairs(value)?;
                Ok(pairs_to_value(&pairs))
            })
            .doc("Round-trip an integer/double pair sequence by value")
            .param(
                "pairs",
                TypeRef::List(Box::new(TypeRef::Pair(
                    Box::new(TypeRef::Int),
                    Box::new(TypeRef::Float),
                ))),
            )
            .returns(TypeRef::List(Box::new(TypeRef::Pair(
                Box::new(TypeRef::Int),
                Box::new(TypeRef::Float),
            )))),
        )
}

// ============================================================================
// invalid_signatures
// ============================================================================

// These registrations reference `forgotten.*` types on purpose; the adapter
// degrades them to an opaque fallback class and integer passthrough.
fn invalid_signatures_module() -> ModuleDef {
    ModuleDef::new("invalid_signatures")
        .function(
            FunctionDef::new("get_unbound_type", |store, _| {
                let id = store.alloc(UNBOUND_TYPE, Unbound);
                Ok(ScriptValue::Handle {
                    class: UNBOUND_TYPE.to_string(),
                    id,
                })
            })
            .returns(TypeRef::Class(UNBOUND_TYPE.to_string())),
        )
        .function(
            FunctionDef::new("accept_unbound_type", |store, args| {
                let pair = args
                    .first()
                    .and_then(ScriptValue::as_list)
                    .ok_or_else(|| ConversionError::mismatch("(Unbound, int)", type_label(args.first())))?;
                let (first, second) = match pair {
                    [a, b] => (a, b),
                    _ => {
                        return Err(
                            ConversionError::mismatch("(Unbound, int)", "wrong arity").into()
                        )
                    }
                };
                let _: &Unbound = store.resolve(UNBOUND_TYPE, first)?;
                second
                    .as_i64()
                    .ok_or_else(|| ConversionError::mismatch("int", second.type_name()))?;
                Ok(ScriptValue::Int(0))
            })
            .param(
                "pair",
                TypeRef::Pair(
                    Box::new(TypeRef::Class(UNBOUND_TYPE.to_string())),
                    Box::new(TypeRef::Int),
                ),
            )
            .returns(TypeRef::Int),
        )
        .function(
            FunctionDef::new("accept_unbound_enum", |_, args| {
                let raw = expect_i64(args, 0)?;
                let _ = ForgottenEnum::try_from(raw)?;
                Ok(ScriptValue::Int(0))
            })
            .param("value", TypeRef::Enum(FORGOTTEN_ENUM.to_string()))
            .returns(TypeRef::Int),
        )
        .function(
            FunctionDef::new("accept_unbound_type_defaulted", |store, args| {
                let value = args
                    .first()
                    .ok_or_else(|| ConversionError::MissingArgument("x".to_string()))?;
                let _: &Unbound = store.resolve(UNBOUND_TYPE, value)?;
                Ok(ScriptValue::Int(0))
            })
            .param_factory(
                "x",
                TypeRef::Class(UNBOUND_TYPE.to_string()),
                |store| {
                    let id = store.alloc(UNBOUND_TYPE, Unbound);
                    ScriptValue::Handle {
                        class: UNBOUND_TYPE.to_string(),
                        id,
                    }
                },
            )
            .returns(TypeRef::Int),
        )
        .function(
            FunctionDef::new("accept_unbound_enum_defaulted", |_, args| {
                let raw = expect_i64(args, 0)?;
                let _ = ForgottenEnum::try_from(raw)?;
                Ok(ScriptValue::Int(0))
            })
            .param_default(
                "x",
                TypeRef::Enum(FORGOTTEN_ENUM.to_string()),
                ScriptValue::Int(ForgottenEnum::One as i64),
            )
            .returns(TypeRef::Int),
        )
}

// ============================================================================
// Argument helpers
// ============================================================================

fn type_label(value: Option<&ScriptValue>) -> String {
    match value {
        Some(v) => v.type_name().to_string(),
        None => "missing".to_string(),
    }
}

fn expect_i64(args: &[ScriptValue], idx: usize) -> Result<i64, ConversionError> {
    args.get(idx)
        .and_then(ScriptValue::as_i64)
        .ok_or_else(|| ConversionError::mismatch("int", type_label(args.get(idx))))
}

fn expect_i32(args: &[ScriptValue], idx: usize) -> Result<i32, ConversionError> {
    // Truncating cast: host integers wider than 32 bits wrap, matching the
    // fixed-width arithmetic being demonstrated.
    expect_i64(args, idx).map(|v| v as i32)
}

fn expect_usize(args: &[ScriptValue], idx: usize) -> Result<usize, ConversionError> {
    let v = expect_i64(args, idx)?;
    usize::try_from(v).map_err(|_| ConversionError::mismatch("index", "negative index"))
}

fn expect_f64(args: &[ScriptValue], idx: usize) -> Result<f64, ConversionError> {
    args.get(idx)
        .and_then(ScriptValue::as_f64)
        .ok_or_else(|| ConversionError::mismatch("float", type_label(args.get(idx))))
}

fn expect_str<'a>(args: &'a [ScriptValue], idx: usize) -> Result<&'a str, ConversionError> {
    args.get(idx)
        .and_then(ScriptValue::as_str)
        .ok_or_else(|| ConversionError::mismatch("str", type_label(args.get(idx))))
}

fn expect_complex(args: &[ScriptValue], idx: usize) -> Result<Complex64, ConversionError> {
    args.get(idx)
        .and_then(ScriptValue::as_complex)
        .ok_or_else(|| ConversionError::mismatch("complex", type_label(args.get(idx))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_validates() {
        assert!(example_module().validate().is_ok());
    }

    #[test]
    fn test_module_shape() {
        let module = example_module();
        assert_eq!(module.name, MODULE_NAME);
        assert_eq!(module.submodules.len(), 5);
        assert_eq!(module.values.len(), 4);
        assert_eq!(module.exceptions.len(), 1);
    }

    #[test]
    fn test_invalid_signature_renders_native_path() {
        let module = invalid_signatures_module();
        let text = module.functions[0].signature_text(None);
        assert_eq!(text, "get_unbound_type() -> forgotten.Unbound");
    }

    #[test]
    fn test_defaulted_enum_signature() {
        let module = sublib_a_module();
        let accept = module
            .functions
            .iter()
            .find(|f| f.name == "accept_defaulted_enum")
            .expect("registered");
        assert_eq!(
            accept.signature_text(None),
            "accept_defaulted_enum(color: sublibA.ConsoleForegroundColor = 34) -> none"
        );
    }
}

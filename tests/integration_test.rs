use anyhow::Result;
use proptest::prelude::*;

use binding_example::{
    example_module, BindingError, InstallOptions, InstallReport, JsBindingAdapter,
};

fn installed() -> (JsBindingAdapter, InstallReport) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
    let adapter = JsBindingAdapter::new().expect("failed to create JS runtime");
    let report = adapter
        .install(&example_module(), &InstallOptions::default())
        .expect("failed to install example module");
    (adapter, report)
}

#[test]
fn test_add_returns_sum() -> Result<()> {
    let (adapter, _) = installed();
    assert_eq!(adapter.eval::<i32>("example.sublibA.add(2, 3)")?, 5);
    assert_eq!(adapter.eval::<i32>("example.sublibA.add(-2, 2)")?, 0);
    Ok(())
}

#[test]
fn test_add_wraps_like_fixed_width_arithmetic() -> Result<()> {
    let (adapter, _) = installed();
    assert_eq!(
        adapter.eval::<i32>("example.sublibA.add(2147483647, 1)")?,
        i32::MIN
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_add_matches_wrapping_arithmetic(a: i32, b: i32) {
        let (adapter, _) = installed();
        let sum: i32 = adapter
            .eval(&format!("example.sublibA.add({a}, {b})"))
            .expect("eval");
        prop_assert_eq!(sum, a.wrapping_add(b));
    }
}

#[test]
fn test_enum_members_and_exported_values() -> Result<()> {
    let (adapter, report) = installed();
    assert_eq!(
        adapter.eval::<i32>("example.sublibA.ConsoleForegroundColor.Blue")?,
        34
    );
    assert_eq!(
        adapter.eval::<i32>("example.sublibA.ConsoleBackgroundColor.Blue")?,
        44
    );
    // export_values puts members at submodule scope; the background enum is
    // registered last, so its exports win the name collision.
    assert_eq!(adapter.eval::<i32>("example.sublibA.Blue")?, 44);
    assert_eq!(adapter.eval::<i32>("example.sublibA.Magenta")?, 45);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("Blue") && w.contains("ConsoleBackgroundColor")));
    Ok(())
}

#[test]
fn test_enum_objects_are_frozen() -> Result<()> {
    let (adapter, _) = installed();
    let still_34: i32 = adapter.eval(
        "(function(){ \
             try { example.sublibA.ConsoleForegroundColor.Blue = 0; } catch (e) {} \
             return example.sublibA.ConsoleForegroundColor.Blue; \
         })()",
    )?;
    assert_eq!(still_34, 34);
    Ok(())
}

#[test]
fn test_accept_defaulted_enum() -> Result<()> {
    let (adapter, _) = installed();
    // Explicit member and declared default are both accepted.
    adapter.execute("example.sublibA.accept_defaulted_enum(example.sublibA.ConsoleForegroundColor.Green)")?;
    adapter.execute("example.sublibA.accept_defaulted_enum()")?;
    // A value outside the member set surfaces as a host TypeError.
    let rejected: bool = adapter.eval(
        "(function(){ \
             try { example.sublibA.accept_defaulted_enum(99); return false; } \
             catch (e) { return e instanceof TypeError; } \
         })()",
    )?;
    assert!(rejected);
    Ok(())
}

#[test]
fn test_derived_is_instance_of_base() -> Result<()> {
    let (adapter, _) = installed();
    adapter.execute("const d = new example.Derived();")?;
    assert!(adapter.eval::<bool>("d instanceof example.Base")?);
    assert!(adapter.eval::<bool>("d instanceof example.Derived")?);
    adapter.execute("d.name = 'renamed'; d.count = 7;")?;
    assert_eq!(adapter.eval::<String>("d.name")?, "renamed");
    assert_eq!(adapter.eval::<i32>("d.count")?, 7);
    Ok(())
}

#[test]
fn test_base_marker_type_is_not_constructible() -> Result<()> {
    let (adapter, _) = installed();
    let threw: bool = adapter.eval(
        "(function(){ \
             try { new example.Base.Inner(); return false; } \
             catch (e) { return e instanceof TypeError; } \
         })()",
    )?;
    assert!(threw);
    Ok(())
}

#[test]
fn test_nested_enum_value_round_trip() -> Result<()> {
    let (adapter, _) = installed();
    adapter.execute("const o = new example.Outer();")?;
    assert!(adapter.eval::<bool>("o.inner instanceof example.Outer.Inner")?);
    assert_eq!(
        adapter.eval::<i32>("o.inner.value")?,
        adapter.eval::<i32>("example.Outer.Inner.NestedEnum.ONE")?
    );
    adapter.execute("o.inner.value = example.Outer.Inner.NestedEnum.TWO;")?;
    assert_eq!(adapter.eval::<i32>("o.inner.value")?, 2);
    Ok(())
}

#[test]
fn test_exception_carries_exact_message() -> Result<()> {
    let (adapter, _) = installed();
    let message: String = adapter.eval(
        "(function(){ \
             try { example.raise_error('boom goes the dynamite'); return 'no throw'; } \
             catch (e) { \
                 if (!(e instanceof example.ExampleException)) return 'wrong class'; \
                 return e.message; \
             } \
         })()",
    )?;
    assert_eq!(message, "boom goes the dynamite");
    Ok(())
}

#[test]
fn test_module_values() -> Result<()> {
    let (adapter, _) = installed();
    assert!(adapter.eval::<bool>("example.foovar instanceof example.Foo")?);
    assert!(adapter.eval::<bool>(
        "example.foolist.length === 2 && example.foolist.every(f => f instanceof example.Foo)"
    )?);
    assert!(adapter.eval::<bool>("example.none === null")?);
    assert!(adapter.eval::<bool>(
        "example.list_with_none.length === 3 \
         && example.list_with_none[0] === null \
         && example.list_with_none[1] === 2 \
         && typeof example.list_with_none[2] === 'object' \
         && Object.keys(example.list_with_none[2]).length === 0"
    )?);
    assert_eq!(
        adapter.eval::<String>("example.__doc__")?,
        "Binding layer example test plugin"
    );
    Ok(())
}

#[test]
fn test_no_op_methods_are_callable() -> Result<()> {
    let (adapter, _) = installed();
    adapter.execute("new example.Foo().f();")?;
    adapter.execute("new example.Foo.FooChild().g();")?;
    adapter.execute("example.foovar.f();")?;
    Ok(())
}

#[test]
fn test_numeric_buffers() -> Result<()> {
    let (adapter, _) = installed();
    assert!(adapter.eval::<bool>(
        "(function(){ \
             const a = example.numeric.get_ndarray_int(); \
             return a.data instanceof Int32Array && a.data.length === 0 \
                 && a.shape.length === 1 && a.shape[0] === 0; \
         })()"
    )?);
    assert!(adapter.eval::<bool>(
        "example.numeric.get_ndarray_float64().data instanceof Float64Array"
    )?);
    // Wrapped buffers and raw typed arrays are both accepted.
    adapter.execute(
        "example.numeric.accept_ndarray_int({ shape: [2, 2], data: new Int32Array([1, 2, 3, 4]) });",
    )?;
    adapter.execute("example.numeric.accept_ndarray_int(new Int32Array(5));")?;
    adapter.execute("example.numeric.accept_ndarray_float64(new Float64Array(3));")?;
    // Element-type mismatches are rejected at the boundary.
    let rejected: bool = adapter.eval(
        "(function(){ \
             try { example.numeric.accept_ndarray_int(new Float64Array(3)); return false; } \
             catch (e) { return e instanceof TypeError; } \
         })()",
    )?;
    assert!(rejected);
    Ok(())
}

#[test]
fn test_opaque_map_round_trip() -> Result<()> {
    let (adapter, _) = installed();
    let snapshot: String = adapter.eval(
        "(function(){ \
             const m = new example.opaque_types.MapStringComplex(); \
             m.set('a', { re: 1.5, im: -2 }); \
             m.set('b', { re: 0, im: 1 }); \
             const a = m.get('a'); \
             return JSON.stringify({ len: m.len(), keys: m.keys(), are: a.re, aim: a.im }); \
         })()",
    )?;
    let parsed: serde_json::Value = serde_json::from_str(&snapshot)?;
    assert_eq!(parsed["len"], 2);
    assert_eq!(parsed["keys"], serde_json::json!(["a", "b"]));
    assert_eq!(parsed["are"], 1.5);
    assert_eq!(parsed["aim"], -2.0);
    Ok(())
}

#[test]
fn test_opaque_vector_round_trip() -> Result<()> {
    let (adapter, _) = installed();
    let snapshot: String = adapter.eval(
        "(function(){ \
             const v = example.opaque_types.get_vector_of_pairs(); \
             v.push('x', 2.5); \
             v.push('y', -0.25); \
             return JSON.stringify({ len: v.len(), first: v.get(0), all: v.items(), oob: v.get(9) }); \
         })()",
    )?;
    let parsed: serde_json::Value = serde_json::from_str(&snapshot)?;
    assert_eq!(parsed["len"], 2);
    assert_eq!(parsed["first"], serde_json::json!(["x", 2.5]));
    assert_eq!(
        parsed["all"],
        serde_json::json!([["x", 2.5], ["y", -0.25]])
    );
    assert_eq!(parsed["oob"], serde_json::Value::Null);
    Ok(())
}

#[test]
fn test_opaque_getters_return_fresh_empty_containers() -> Result<()> {
    let (adapter, _) = installed();
    assert_eq!(
        adapter.eval::<i32>("example.opaque_types.get_complex_map().len()")?,
        0
    );
    assert_eq!(
        adapter.eval::<i32>("example.opaque_types.get_vector_of_pairs().len()")?,
        0
    );
    // Two getters, two live handles: the containers are not shared.
    assert!(adapter.object_count() >= 2);
    Ok(())
}

#[test]
fn test_copy_types_preserve_content_not_identity() -> Result<()> {
    let (adapter, _) = installed();
    assert_eq!(
        adapter.eval::<String>("JSON.stringify(example.copy_types.get_complex_map())")?,
        "{}"
    );
    assert_eq!(
        adapter.eval::<String>("JSON.stringify(example.copy_types.get_vector_of_pairs())")?,
        "[]"
    );
    let echoed: String = adapter.eval(
        "JSON.stringify(example.copy_types.echo_complex_map({ '1': { re: 2, im: 3 } }))",
    )?;
    let parsed: serde_json::Value = serde_json::from_str(&echoed)?;
    assert_eq!(parsed, serde_json::json!({ "1": { "re": 2.0, "im": 3.0 } }));
    assert!(adapter.eval::<bool>(
        "(function(){ const o = { '1': { re: 2, im: 3 } }; \
             return example.copy_types.echo_complex_map(o) !== o; })()"
    )?);
    assert_eq!(
        adapter.eval::<String>(
            "JSON.stringify(example.copy_types.echo_vector_of_pairs([[1, 2.5], [-3, 0.5]]))"
        )?,
        "[[1,2.5],[-3,0.5]]"
    );
    Ok(())
}

#[test]
fn test_forgotten_types_degrade_to_usable_bindings() -> Result<()> {
    let (adapter, report) = installed();
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("forgotten.Unbound")));
    assert!(report.warnings.iter().any(|w| w.contains("forgotten.Enum")));

    let results: String = adapter.eval(
        "(function(){ \
             const u = example.invalid_signatures.get_unbound_type(); \
             return JSON.stringify([ \
                 example.invalid_signatures.accept_unbound_type([u, 3]), \
                 example.invalid_signatures.accept_unbound_enum(1), \
                 example.invalid_signatures.accept_unbound_type_defaulted(), \
                 example.invalid_signatures.accept_unbound_enum_defaulted(), \
                 u instanceof example.invalid_signatures.Unbound, \
             ]); \
         })()",
    )?;
    assert_eq!(results, "[0,0,0,0,true]");

    // The synthesized fallback class has no constructor of its own.
    let threw: bool = adapter.eval(
        "(function(){ \
             try { new example.invalid_signatures.Unbound(); return false; } \
             catch (e) { return e instanceof TypeError; } \
         })()",
    )?;
    assert!(threw);
    Ok(())
}

#[test]
fn test_strict_install_refuses_forgotten_types() {
    let adapter = JsBindingAdapter::new().expect("failed to create JS runtime");
    let options = InstallOptions {
        strict: true,
        ..InstallOptions::default()
    };
    let err = adapter
        .install(&example_module(), &options)
        .expect_err("strict install must fail");
    assert!(matches!(err, BindingError::UnresolvedType { .. }));
}

#[test]
fn test_signature_table_renders_unresolved_paths_verbatim() -> Result<()> {
    let (adapter, _) = installed();
    let json: String = adapter.eval("example.__signatures")?;
    let signatures: serde_json::Value = serde_json::from_str(&json)?;
    let entries = signatures.as_array().expect("signature array");
    let get_unbound = entries
        .iter()
        .find(|s| s["path"] == "invalid_signatures.get_unbound_type")
        .expect("signature present");
    assert_eq!(get_unbound["text"], "get_unbound_type() -> forgotten.Unbound");
    let add = entries
        .iter()
        .find(|s| s["path"] == "sublibA.add")
        .expect("signature present");
    assert_eq!(add["text"], "add(a: int, b: int) -> int");
    Ok(())
}

#[test]
fn test_call_function_bridges_native_arguments() -> Result<()> {
    use binding_example::ScriptValue;
    let (adapter, _) = installed();
    adapter.execute("function pickSecond(a, b) { return b; }")?;
    let picked = adapter.call_function(
        "pickSecond",
        &[ScriptValue::Int(1), ScriptValue::Str("two".to_string())],
    )?;
    assert_eq!(picked, ScriptValue::Str("two".to_string()));
    Ok(())
}

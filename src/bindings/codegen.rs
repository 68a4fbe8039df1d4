//! Host-glue generator.
//!
//! Turns a [`ModuleDef`] into JavaScript source: class declarations with
//! prototype-chain inheritance, frozen enum objects, function wrappers,
//! submodule objects and exception classes. Every generated wrapper funnels
//! through the single native entry point `__native_invoke` with a string
//! target (`new:<path>`, `call:<path>.<method>`, `fn:<path>`), so the
//! generated source carries no native state of its own.

use super::protocol::{join_path, ClassDef, ClassKind, EnumDef, ExceptionDef, FunctionDef, ModuleDef};

/// Shared helper glue, evaluated once before any module glue.
///
/// `__native_call` unwraps the raise envelope returned by the dispatcher and
/// rethrows it as the registered host exception class (falling back to the
/// runtime's own error classes, then to `Error`). `__native_new` and
/// `__native_wrap` rebuild class-tagged instances for values produced on the
/// native side without running user constructors.
pub(crate) const PRELUDE: &str = r#"(function(){
'use strict';
if (globalThis.__native_classes === undefined) { globalThis.__native_classes = {}; }
if (globalThis.__native_errors === undefined) { globalThis.__native_errors = {}; }
globalThis.__native_call = function(target, self, args) {
  const r = __native_invoke(target, self, args);
  if (r !== null && typeof r === 'object' && r.__raise !== undefined) {
    const C = globalThis.__native_errors[r.__raise.type] || globalThis[r.__raise.type];
    throw C ? new C(r.__raise.message) : new Error(r.__raise.message);
  }
  return r;
};
globalThis.__native_new = function(cls, fields) {
  const C = globalThis.__native_classes[cls];
  if (C === undefined) { throw new Error('unknown native class: ' + cls); }
  return Object.assign(Object.create(C.prototype), fields);
};
globalThis.__native_wrap = function(cls, handle) {
  const C = globalThis.__native_classes[cls];
  if (C === undefined) { throw new Error('unknown native class: ' + cls); }
  const o = Object.create(C.prototype);
  o.__handle = handle;
  return o;
};
})();
"#;

/// Generate the installable glue for one module tree.
pub(crate) fn module_glue(module: &ModuleDef) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("(function(){\n'use strict';\nconst __mod = {};\n");
    if let Some(doc) = &module.doc {
        out.push_str(&format!("__mod.__doc__ = {};\n", js_str(doc)));
    }
    emit_module(&mut out, module, "", "__mod");
    out.push_str(&format!(
        "globalThis[{}] = __mod;\n}})();\n",
        js_str(&module.name)
    ));
    out
}

fn emit_module(out: &mut String, module: &ModuleDef, prefix: &str, var: &str) {
    // Classes first: enums and functions may attach to them.
    for class in &module.classes {
        emit_class(out, class, prefix, var);
    }
    for def in &module.enums {
        emit_enum(out, def, prefix, var);
    }
    for func in &module.functions {
        emit_function(out, func, prefix, var);
    }
    for exc in &module.exceptions {
        emit_exception(out, exc, var);
    }
    for sub in &module.submodules {
        let sub_prefix = join_path(prefix, &sub.name);
        let sub_var = var_name(&sub_prefix);
        out.push_str(&format!("const {sub_var} = {{}};\n"));
        emit_module(out, sub, &sub_prefix, &sub_var);
        out.push_str(&format!("{var}.{} = {sub_var};\n", sub.name));
    }
}

fn emit_class(out: &mut String, class: &ClassDef, prefix: &str, module_var: &str) {
    let qpath = join_path(prefix, &class.local_path());
    let var = var_name(&qpath);
    let extends = match &class.base {
        Some(base) => format!(" extends {}", var_name(&join_path(prefix, base))),
        None => String::new(),
    };
    out.push_str(&format!("const {var} = class {}{extends} {{\n", class.name));

    if class.constructor.is_some() {
        let target = js_str(&format!("new:{qpath}"));
        match class.kind {
            ClassKind::Record => {
                let super_call = if class.base.is_some() { "super(); " } else { "" };
                out.push_str(&format!(
                    "  constructor(...args) {{ {super_call}Object.assign(this, __native_call({target}, null, args)); }}\n"
                ));
            }
            ClassKind::Opaque => {
                out.push_str(&format!(
                    "  constructor(...args) {{ this.__handle = __native_call({target}, null, args); }}\n"
                ));
            }
        }
    } else {
        out.push_str(&format!(
            "  constructor() {{ throw new TypeError('no constructor defined for ' + {}); }}\n",
            js_str(&qpath)
        ));
    }

    for method in &class.methods {
        out.push_str(&format!(
            "  {0}(...args) {{ return __native_call({1}, this, args); }}\n",
            method.name,
            js_str(&format!("call:{qpath}.{}", method.name))
        ));
    }
    out.push_str("};\n");

    out.push_str(&format!("{var}.prototype.__cls = {};\n", js_str(&qpath)));
    out.push_str(&format!(
        "globalThis.__native_classes[{}] = {var};\n",
        js_str(&qpath)
    ));
    for alias in &class.aliases {
        out.push_str(&format!(
            "globalThis.__native_classes[{}] = {var};\n",
            js_str(alias)
        ));
    }

    match &class.scope {
        Some(scope) => out.push_str(&format!(
            "{}.{} = {var};\n",
            var_name(&join_path(prefix, scope)),
            class.name
        )),
        None => out.push_str(&format!("{module_var}.{} = {var};\n", class.name)),
    }
}

fn emit_enum(out: &mut String, def: &EnumDef, prefix: &str, module_var: &str) {
    let qpath = join_path(prefix, &def.local_path());
    let var = var_name(&qpath);
    let members = def
        .variants
        .iter()
        .map(|v| format!("{}: {}", v.name, v.value))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("const {var} = Object.freeze({{ {members} }});\n"));

    let attach_target = match &def.scope {
        Some(scope) => var_name(&join_path(prefix, scope)),
        None => module_var.to_string(),
    };
    out.push_str(&format!("{attach_target}.{} = {var};\n", def.name));

    if def.export_values {
        for v in &def.variants {
            out.push_str(&format!("{attach_target}.{} = {};\n", v.name, v.value));
        }
    }
}

fn emit_function(out: &mut String, func: &FunctionDef, prefix: &str, module_var: &str) {
    let qpath = join_path(prefix, &func.name);
    out.push_str(&format!(
        "{module_var}.{0} = function {0}(...args) {{ return __native_call({1}, null, args); }};\n",
        func.name,
        js_str(&format!("fn:{qpath}"))
    ));
}

fn emit_exception(out: &mut String, exc: &ExceptionDef, module_var: &str) {
    let var = format!("__e_{}", exc.name);
    out.push_str(&format!(
        "const {var} = class {0} extends Error {{\n  constructor(message) {{ super(message); this.name = {1}; }}\n}};\n",
        exc.name,
        js_str(&exc.name)
    ));
    out.push_str(&format!("{module_var}.{} = {var};\n", exc.name));
    out.push_str(&format!(
        "globalThis.__native_errors[{}] = {var};\n",
        js_str(&exc.name)
    ));
}

fn var_name(path: &str) -> String {
    format!("__v_{}", path.replace('.', "_"))
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

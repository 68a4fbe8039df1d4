//! JavaScript binding adapter using rquickjs.
//!
//! Installs a [`ModuleDef`] into a QuickJS context: validates the
//! registration table, resolves type references (synthesizing opaque
//! fallback bindings for types the layer was never told about), evaluates
//! the generated glue, installs module-level values and exposes the
//! signature table. Every generated wrapper dispatches through the single
//! registered native function `__native_invoke`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rquickjs::{
    Array as JsArray, Context, Ctx, FromJs, Function, Object, Runtime, TypedArray, Value,
};
use serde::{Deserialize, Serialize};

use crate::error::{BindingError, BindingResult, ConversionError};
use crate::value::{Complex64, ScriptValue};

use super::codegen;
use super::protocol::{
    join_path, ClassDef, ClassKind, FunctionDef, ModuleDef, NativeFn, ObjectStore, ParamDefault,
    Signature, TypeRef,
};

/// Install-time configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstallOptions {
    /// Refuse modules that reference unregistered types instead of
    /// degrading them to opaque fallback bindings.
    #[serde(default)]
    pub strict: bool,
    /// Log every boundary crossing at trace level.
    #[serde(default)]
    pub trace_calls: bool,
}

/// Diagnostics produced while resolving and installing a module.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub warnings: Vec<String>,
}

/// Dispatch tables and handle storage shared with the JS context.
#[derive(Default)]
struct Shared {
    store: ObjectStore,
    callables: HashMap<String, InstalledFunction>,
    constructors: HashMap<String, InstalledFunction>,
    trace_calls: bool,
}

struct InstalledFunction {
    callback: NativeFn,
    params: Vec<InstalledParam>,
}

#[derive(Clone)]
struct InstalledParam {
    name: String,
    default: Option<ScriptValue>,
}

/// JavaScript host adapter.
pub struct JsBindingAdapter {
    #[allow(dead_code)]
    runtime: Runtime,
    context: Context,
    shared: Arc<Mutex<Shared>>,
}

impl JsBindingAdapter {
    pub fn new() -> BindingResult<Self> {
        let runtime = Runtime::new()
            .map_err(|e| BindingError::Eval(format!("failed to create JS runtime: {e:?}")))?;
        let context = Context::full(&runtime)
            .map_err(|e| BindingError::Eval(format!("failed to create JS context: {e:?}")))?;
        let shared = Arc::new(Mutex::new(Shared::default()));
        {
            let shared = Arc::clone(&shared);
            context
                .with(|ctx| register_dispatcher(&ctx, shared))
                .map_err(|e| BindingError::Eval(format!("{e:?}")))?;
        }
        Ok(Self {
            runtime,
            context,
            shared,
        })
    }

    /// Install a module under its registered name in the global scope.
    pub fn install(
        &self,
        module: &ModuleDef,
        options: &InstallOptions,
    ) -> BindingResult<InstallReport> {
        module.validate()?;
        let mut module = module.clone();
        let mut report = InstallReport::default();

        resolve_module_types(&mut module, options, &mut report)?;
        scan_enum_exports(&module, "", &mut report);
        for warning in &report.warnings {
            tracing::warn!(target: "bindings", "{warning}");
        }

        {
            let mut shared = self.shared.lock().unwrap();
            shared.trace_calls = options.trace_calls;
            let Shared {
                store,
                callables,
                constructors,
                ..
            } = &mut *shared;
            flatten_module(&module, "", store, callables, constructors);
        }

        let glue = format!("{}{}", codegen::PRELUDE, codegen::module_glue(&module));
        self.eval_glue(&glue)?;
        self.install_values(&module)?;
        self.install_signatures(&module)?;

        tracing::info!(
            target: "bindings",
            module = %module.name,
            warnings = report.warnings.len(),
            "module installed"
        );
        Ok(report)
    }

    /// Evaluate a script and convert its completion value.
    pub fn eval<T>(&self, source: &str) -> BindingResult<T>
    where
        T: for<'js> FromJs<'js>,
    {
        self.context
            .with(|ctx| ctx.eval::<T, _>(source).map_err(|e| catch_error(&ctx, e)))
    }

    /// Evaluate a script for its side effects.
    pub fn execute(&self, source: &str) -> BindingResult<()> {
        self.eval::<()>(source)
    }

    /// Call a global host function with native arguments.
    pub fn call_function(&self, name: &str, args: &[ScriptValue]) -> BindingResult<ScriptValue> {
        self.context.with(|ctx| {
            let func: Function = ctx
                .globals()
                .get(name)
                .map_err(|e| catch_error(&ctx, e))?;
            let js_args = JsArray::new(ctx.clone()).map_err(|e| catch_error(&ctx, e))?;
            for (i, arg) in args.iter().enumerate() {
                let value = to_js(&ctx, arg).map_err(|e| catch_error(&ctx, e))?;
                js_args.set(i, value).map_err(|e| catch_error(&ctx, e))?;
            }
            let apply: Function = ctx
                .eval("Reflect.apply")
                .map_err(|e| catch_error(&ctx, e))?;
            let result: Value = apply
                .call((func, Value::new_null(ctx.clone()), js_args))
                .map_err(|e| catch_error(&ctx, e))?;
            from_js(&ctx, &result).map_err(BindingError::from)
        })
    }

    /// Number of live opaque handles, for lifetime accounting.
    pub fn object_count(&self) -> usize {
        self.shared.lock().unwrap().store.len()
    }

    fn eval_glue(&self, glue: &str) -> BindingResult<()> {
        self.context
            .with(|ctx| ctx.eval::<(), _>(glue).map_err(|e| catch_error(&ctx, e)))
    }

    fn install_values(&self, module: &ModuleDef) -> BindingResult<()> {
        self.context.with(|ctx| {
            let root: Object = ctx
                .globals()
                .get(module.name.as_str())
                .map_err(|e| catch_error(&ctx, e))?;
            set_module_values(&ctx, &root, module)
        })
    }

    fn install_signatures(&self, module: &ModuleDef) -> BindingResult<()> {
        let mut signatures = Vec::new();
        collect_signatures(module, "", &mut signatures);
        let json = serde_json::to_string(&signatures)
            .map_err(|e| BindingError::Eval(format!("failed to serialize signature table: {e}")))?;
        self.context.with(|ctx| {
            let root: Object = ctx
                .globals()
                .get(module.name.as_str())
                .map_err(|e| catch_error(&ctx, e))?;
            root.set("__signatures", json.as_str())
                .map_err(|e| catch_error(&ctx, e))
        })
    }
}

// ============================================================================
// Type resolution
// ============================================================================

#[derive(Default)]
struct KnownTypes {
    classes: HashSet<String>,
    enums: HashSet<String>,
}

fn collect_known_types(module: &ModuleDef, prefix: &str, known: &mut KnownTypes) {
    for class in &module.classes {
        known
            .classes
            .insert(join_path(prefix, &class.local_path()));
        for alias in &class.aliases {
            known.classes.insert(alias.clone());
        }
    }
    for def in &module.enums {
        known.enums.insert(join_path(prefix, &def.local_path()));
    }
    for sub in &module.submodules {
        collect_known_types(sub, &join_path(prefix, &sub.name), known);
    }
}

struct TypeResolver<'a> {
    known: KnownTypes,
    strict: bool,
    report: &'a mut InstallReport,
    /// (module path of first referrer, native type path)
    missing: Vec<(String, String)>,
    seen: HashSet<String>,
}

impl TypeResolver<'_> {
    fn scan_module(&mut self, module: &ModuleDef, prefix: &str) -> BindingResult<()> {
        for func in &module.functions {
            let referrer = join_path(prefix, &func.name);
            self.scan_function(func, &referrer, prefix)?;
        }
        for class in &module.classes {
            let qpath = join_path(prefix, &class.local_path());
            for field in &class.fields {
                self.scan_type(&field.ty, &qpath, prefix)?;
            }
            for method in &class.methods {
                let referrer = format!("{qpath}.{}", method.name);
                self.scan_function(method, &referrer, prefix)?;
            }
        }
        for sub in &module.submodules {
            self.scan_module(sub, &join_path(prefix, &sub.name))?;
        }
        Ok(())
    }

    fn scan_function(
        &mut self,
        func: &FunctionDef,
        referrer: &str,
        module_path: &str,
    ) -> BindingResult<()> {
        for param in &func.params {
            self.scan_type(&param.ty, referrer, module_path)?;
        }
        self.scan_type(&func.returns, referrer, module_path)
    }

    fn scan_type(&mut self, ty: &TypeRef, referrer: &str, module_path: &str) -> BindingResult<()> {
        match ty {
            TypeRef::Class(path) if !self.known.classes.contains(path) => {
                if self.strict {
                    return Err(BindingError::UnresolvedType {
                        ty: path.clone(),
                        referrer: referrer.to_string(),
                    });
                }
                if self.seen.insert(path.clone()) {
                    let fallback = join_path(module_path, last_segment(path));
                    self.report.warnings.push(format!(
                        "unresolved type `{path}` referenced by `{referrer}`; \
                         emitting opaque fallback binding `{fallback}`"
                    ));
                    self.missing
                        .push((module_path.to_string(), path.clone()));
                }
                Ok(())
            }
            TypeRef::Enum(path) if !self.known.enums.contains(path) => {
                if self.strict {
                    return Err(BindingError::UnresolvedType {
                        ty: path.clone(),
                        referrer: referrer.to_string(),
                    });
                }
                if self.seen.insert(path.clone()) {
                    self.report.warnings.push(format!(
                        "unresolved enum `{path}` referenced by `{referrer}`; \
                         degrading to integer passthrough"
                    ));
                }
                Ok(())
            }
            TypeRef::Pair(a, b) | TypeRef::MapOf(a, b) => {
                self.scan_type(a, referrer, module_path)?;
                self.scan_type(b, referrer, module_path)
            }
            TypeRef::List(item) => self.scan_type(item, referrer, module_path),
            _ => Ok(()),
        }
    }
}

fn resolve_module_types(
    module: &mut ModuleDef,
    options: &InstallOptions,
    report: &mut InstallReport,
) -> BindingResult<()> {
    let mut known = KnownTypes::default();
    collect_known_types(module, "", &mut known);

    let mut resolver = TypeResolver {
        known,
        strict: options.strict,
        report,
        missing: Vec::new(),
        seen: HashSet::new(),
    };
    resolver.scan_module(module, "")?;
    let missing = resolver.missing;

    for (module_path, native_path) in missing {
        let name = last_segment(&native_path).to_string();
        let mut fallback = ClassDef::opaque(&name).doc(&format!(
            "Opaque fallback binding for unregistered native type `{native_path}`."
        ));
        fallback.aliases.push(native_path);
        if let Some(target) = submodule_mut(module, &module_path) {
            target.classes.push(fallback);
        }
    }
    Ok(())
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn submodule_mut<'a>(module: &'a mut ModuleDef, path: &str) -> Option<&'a mut ModuleDef> {
    let mut current = module;
    if path.is_empty() {
        return Some(current);
    }
    for seg in path.split('.') {
        current = current.submodules.iter_mut().find(|m| m.name == seg)?;
    }
    Some(current)
}

/// Detect member-name collisions between enums exported into the same
/// module scope. Later registrations win; the shadowing is reported.
fn scan_enum_exports(module: &ModuleDef, prefix: &str, report: &mut InstallReport) {
    let mut exported: HashMap<&str, &str> = HashMap::new();
    for def in module
        .enums
        .iter()
        .filter(|d| d.export_values && d.scope.is_none())
    {
        for variant in &def.variants {
            if let Some(prev) = exported.insert(variant.name.as_str(), def.name.as_str()) {
                let scope = if prefix.is_empty() {
                    module.name.as_str()
                } else {
                    prefix
                };
                report.warnings.push(format!(
                    "enum member `{}` exported by `{}` shadows the value exported by `{prev}` \
                     in `{scope}`",
                    variant.name, def.name
                ));
            }
        }
    }
    for sub in &module.submodules {
        scan_enum_exports(sub, &join_path(prefix, &sub.name), report);
    }
}

// ============================================================================
// Dispatch tables
// ============================================================================

fn flatten_module(
    module: &ModuleDef,
    prefix: &str,
    store: &mut ObjectStore,
    callables: &mut HashMap<String, InstalledFunction>,
    constructors: &mut HashMap<String, InstalledFunction>,
) {
    for func in &module.functions {
        let path = join_path(prefix, &func.name);
        callables.insert(path, install_function(func, store));
    }
    for class in &module.classes {
        let qpath = join_path(prefix, &class.local_path());
        if let Some(ctor) = &class.constructor {
            constructors.insert(
                qpath.clone(),
                InstalledFunction {
                    callback: Arc::clone(ctor),
                    params: Vec::new(),
                },
            );
        }
        for method in &class.methods {
            callables.insert(
                format!("{qpath}.{}", method.name),
                install_function(method, store),
            );
        }
    }
    for sub in &module.submodules {
        flatten_module(
            sub,
            &join_path(prefix, &sub.name),
            store,
            callables,
            constructors,
        );
    }
}

fn install_function(func: &FunctionDef, store: &mut ObjectStore) -> InstalledFunction {
    let params = func
        .params
        .iter()
        .map(|p| InstalledParam {
            name: p.name.clone(),
            default: match &p.default {
                ParamDefault::None => None,
                ParamDefault::Value(v) => Some(v.clone()),
                // Factories run once, against the adapter's handle table.
                ParamDefault::Factory(f) => Some(f(store)),
            },
        })
        .collect();
    InstalledFunction {
        callback: Arc::clone(&func.callback),
        params,
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

fn register_dispatcher<'js>(ctx: &Ctx<'js>, shared: Arc<Mutex<Shared>>) -> rquickjs::Result<()> {
    let dispatcher = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>,
              target: String,
              this: Value<'js>,
              args: Vec<Value<'js>>|
              -> rquickjs::Result<Value<'js>> {
            dispatch(&shared, ctx, &target, this, args)
        },
    )?;
    ctx.globals().set("__native_invoke", dispatcher)
}

fn dispatch<'js>(
    shared: &Mutex<Shared>,
    ctx: Ctx<'js>,
    target: &str,
    this: Value<'js>,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    let (kind, path) = match target.split_once(':') {
        Some(parts) => parts,
        None => {
            return raise_envelope(&ctx, "Error", &format!("malformed binding target `{target}`"))
        }
    };

    let looked_up = {
        let guard = shared.lock().unwrap();
        let table = if kind == "new" {
            &guard.constructors
        } else {
            &guard.callables
        };
        table
            .get(path)
            .map(|f| (Arc::clone(&f.callback), f.params.clone(), guard.trace_calls))
    };
    let (callback, params, trace_calls) = match looked_up {
        Some(entry) => entry,
        None => {
            return raise_envelope(&ctx, "Error", &format!("unknown binding target `{target}`"))
        }
    };

    let mut call_args: Vec<ScriptValue> = Vec::with_capacity(args.len() + 1);
    if kind == "call" {
        match from_js(&ctx, &this) {
            Ok(value) => call_args.push(value),
            Err(err) => return raise_envelope(&ctx, "TypeError", &err.to_string()),
        }
    }
    for value in &args {
        match from_js(&ctx, value) {
            Ok(value) => call_args.push(value),
            Err(err) => return raise_envelope(&ctx, "TypeError", &err.to_string()),
        }
    }
    if args.len() < params.len() {
        for param in params.iter().skip(args.len()) {
            match &param.default {
                Some(value) => call_args.push(value.clone()),
                None => {
                    let err = ConversionError::MissingArgument(param.name.clone());
                    return raise_envelope(&ctx, "TypeError", &err.to_string());
                }
            }
        }
    }

    if trace_calls {
        tracing::trace!(target: "bindings.js", %target, argc = call_args.len(), "boundary call");
    }

    let result = {
        let mut guard = shared.lock().unwrap();
        callback(&mut guard.store, &call_args)
    };

    match result {
        Ok(value) => to_js(&ctx, &value),
        Err(BindingError::Raised { exception, message }) => {
            raise_envelope(&ctx, &exception, &message)
        }
        Err(BindingError::Conversion(err)) => raise_envelope(&ctx, "TypeError", &err.to_string()),
        Err(other) => raise_envelope(&ctx, "Error", &other.to_string()),
    }
}

/// Build the raise envelope the generated glue rethrows as a host exception.
fn raise_envelope<'js>(
    ctx: &Ctx<'js>,
    exception: &str,
    message: &str,
) -> rquickjs::Result<Value<'js>> {
    let detail = Object::new(ctx.clone())?;
    detail.set("type", exception)?;
    detail.set("message", message)?;
    let envelope = Object::new(ctx.clone())?;
    envelope.set("__raise", detail)?;
    Ok(envelope.into_value())
}

// ============================================================================
// Value conversion
// ============================================================================

fn to_js<'js>(ctx: &Ctx<'js>, value: &ScriptValue) -> rquickjs::Result<Value<'js>> {
    match value {
        ScriptValue::Null => Ok(Value::new_null(ctx.clone())),
        ScriptValue::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        ScriptValue::Int(v) => Ok(match i32::try_from(*v) {
            Ok(small) => Value::new_int(ctx.clone(), small),
            Err(_) => Value::new_float(ctx.clone(), *v as f64),
        }),
        ScriptValue::Float(f) => Ok(Value::new_float(ctx.clone(), *f)),
        ScriptValue::Str(s) => {
            rquickjs::String::from_str(ctx.clone(), s).map(|s| s.into_value())
        }
        ScriptValue::List(items) => {
            let arr = JsArray::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                arr.set(i, to_js(ctx, item)?)?;
            }
            Ok(arr.into_value())
        }
        ScriptValue::Map(entries) => {
            let obj = Object::new(ctx.clone())?;
            for (k, v) in entries {
                obj.set(k.as_str(), to_js(ctx, v)?)?;
            }
            Ok(obj.into_value())
        }
        ScriptValue::Complex(c) => {
            let obj = Object::new(ctx.clone())?;
            obj.set("re", c.re)?;
            obj.set("im", c.im)?;
            Ok(obj.into_value())
        }
        ScriptValue::Instance { class, fields } => {
            let obj = Object::new(ctx.clone())?;
            for (k, v) in fields {
                obj.set(k.as_str(), to_js(ctx, v)?)?;
            }
            let rebuild: Function = ctx.globals().get("__native_new")?;
            rebuild.call((class.as_str(), obj))
        }
        ScriptValue::Handle { class, id } => {
            let wrap: Function = ctx.globals().get("__native_wrap")?;
            wrap.call((class.as_str(), *id as f64))
        }
        ScriptValue::IntBuffer { shape, data } => {
            let obj = Object::new(ctx.clone())?;
            obj.set("shape", shape_to_js(ctx, shape)?)?;
            obj.set("data", TypedArray::new(ctx.clone(), data.clone())?)?;
            Ok(obj.into_value())
        }
        ScriptValue::FloatBuffer { shape, data } => {
            let obj = Object::new(ctx.clone())?;
            obj.set("shape", shape_to_js(ctx, shape)?)?;
            obj.set("data", TypedArray::new(ctx.clone(), data.clone())?)?;
            Ok(obj.into_value())
        }
    }
}

fn shape_to_js<'js>(ctx: &Ctx<'js>, shape: &[usize]) -> rquickjs::Result<JsArray<'js>> {
    let arr = JsArray::new(ctx.clone())?;
    for (i, dim) in shape.iter().enumerate() {
        arr.set(i, *dim as f64)?;
    }
    Ok(arr)
}

fn from_js<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> Result<ScriptValue, ConversionError> {
    use rquickjs::Type;

    match value.type_of() {
        Type::Uninitialized | Type::Undefined | Type::Null => Ok(ScriptValue::Null),
        Type::Bool => Ok(ScriptValue::Bool(value.as_bool().unwrap_or(false))),
        Type::Int => Ok(ScriptValue::Int(i64::from(value.as_int().unwrap_or(0)))),
        Type::Float => Ok(ScriptValue::Float(value.as_float().unwrap_or(0.0))),
        Type::String => match value.as_string() {
            Some(s) => s
                .to_string()
                .map(ScriptValue::Str)
                .map_err(|_| ConversionError::mismatch("str", "unreadable string")),
            None => Err(ConversionError::mismatch("str", "string")),
        },
        Type::Array => {
            let arr = match value.as_array() {
                Some(arr) => arr,
                None => return Err(ConversionError::mismatch("list", "array")),
            };
            let mut items = Vec::with_capacity(arr.len());
            for item in arr.iter::<Value>() {
                let item =
                    item.map_err(|_| ConversionError::mismatch("list item", "unreadable value"))?;
                items.push(from_js(ctx, &item)?);
            }
            Ok(ScriptValue::List(items))
        }
        Type::Object | Type::Exception => object_from_js(ctx, value),
        Type::Function | Type::Constructor => {
            Err(ConversionError::mismatch("convertible value", "function"))
        }
        Type::Symbol => Err(ConversionError::mismatch("convertible value", "symbol")),
        Type::BigInt => Err(ConversionError::mismatch("convertible value", "bigint")),
        _ => Err(ConversionError::mismatch("convertible value", "unknown")),
    }
}

fn object_from_js<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> Result<ScriptValue, ConversionError> {
    // Typed arrays report as plain objects; check them first.
    if let Ok(ta) = TypedArray::<i32>::from_js(ctx, value.clone()) {
        let data = typed_array_i32(&ta)?;
        return Ok(ScriptValue::IntBuffer {
            shape: vec![data.len()],
            data,
        });
    }
    if let Ok(ta) = TypedArray::<f64>::from_js(ctx, value.clone()) {
        let data = typed_array_f64(&ta)?;
        return Ok(ScriptValue::FloatBuffer {
            shape: vec![data.len()],
            data,
        });
    }

    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return Err(ConversionError::mismatch("object", "non-object")),
    };

    let handle: Option<f64> = obj
        .get("__handle")
        .map_err(|_| ConversionError::mismatch("handle", "unreadable __handle"))?;
    let class: Option<String> = obj
        .get("__cls")
        .map_err(|_| ConversionError::mismatch("instance", "unreadable __cls"))?;

    if let (Some(id), Some(class)) = (handle, class.clone()) {
        return Ok(ScriptValue::Handle {
            class,
            id: id as u64,
        });
    }
    if let Some(class) = class {
        let fields = own_properties(ctx, obj)?
            .into_iter()
            .filter(|(key, _)| !key.starts_with("__"))
            .collect();
        return Ok(ScriptValue::Instance { class, fields });
    }

    // ndarray wrapper: { shape, data }
    let shape_val: Option<Value> = obj
        .get("shape")
        .map_err(|_| ConversionError::mismatch("ndarray", "unreadable shape"))?;
    let data_val: Option<Value> = obj
        .get("data")
        .map_err(|_| ConversionError::mismatch("ndarray", "unreadable data"))?;
    if let (Some(shape_val), Some(data_val)) = (shape_val, data_val) {
        let dims: Vec<f64> = Vec::<f64>::from_js(ctx, shape_val)
            .map_err(|_| ConversionError::mismatch("ndarray shape", "non-numeric shape"))?;
        let shape: Vec<usize> = dims.into_iter().map(|d| d as usize).collect();
        if let Ok(ta) = TypedArray::<i32>::from_js(ctx, data_val.clone()) {
            return Ok(ScriptValue::IntBuffer {
                shape,
                data: typed_array_i32(&ta)?,
            });
        }
        if let Ok(ta) = TypedArray::<f64>::from_js(ctx, data_val) {
            return Ok(ScriptValue::FloatBuffer {
                shape,
                data: typed_array_f64(&ta)?,
            });
        }
        return Err(ConversionError::mismatch(
            "ndarray data",
            "unsupported buffer element type",
        ));
    }

    // Duck-typed complex: { re, im }
    let re: Option<f64> = obj
        .get("re")
        .map_err(|_| ConversionError::mismatch("complex", "unreadable re"))?;
    let im: Option<f64> = obj
        .get("im")
        .map_err(|_| ConversionError::mismatch("complex", "unreadable im"))?;
    if let (Some(re), Some(im)) = (re, im) {
        return Ok(ScriptValue::Complex(Complex64::new(re, im)));
    }

    Ok(ScriptValue::Map(own_properties(ctx, obj)?))
}

fn own_properties<'js>(
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
) -> Result<HashMap<String, ScriptValue>, ConversionError> {
    let mut entries = HashMap::new();
    for prop in obj.props::<String, Value>() {
        let (key, value) =
            prop.map_err(|_| ConversionError::mismatch("object entry", "unreadable property"))?;
        entries.insert(key, from_js(ctx, &value)?);
    }
    Ok(entries)
}

fn typed_array_i32(ta: &TypedArray<'_, i32>) -> Result<Vec<i32>, ConversionError> {
    let bytes = ta
        .as_bytes()
        .ok_or_else(|| ConversionError::mismatch("ndarray<i32>", "detached buffer"))?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn typed_array_f64(ta: &TypedArray<'_, f64>) -> Result<Vec<f64>, ConversionError> {
    let bytes = ta
        .as_bytes()
        .ok_or_else(|| ConversionError::mismatch("ndarray<f64>", "detached buffer"))?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            f64::from_ne_bytes(raw)
        })
        .collect())
}

fn catch_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> BindingError {
    if matches!(err, rquickjs::Error::Exception) {
        let caught = ctx.catch();
        if let Some(exc) = caught.as_exception() {
            let message = exc
                .message()
                .unwrap_or_else(|| "unknown exception".to_string());
            return BindingError::Eval(message);
        }
        return BindingError::Eval(format!("{caught:?}"));
    }
    BindingError::Eval(format!("{err:?}"))
}

// ============================================================================
// Module metadata
// ============================================================================

fn set_module_values<'js>(
    ctx: &Ctx<'js>,
    obj: &Object<'js>,
    module: &ModuleDef,
) -> BindingResult<()> {
    for def in &module.values {
        let value = to_js(ctx, &def.value).map_err(|e| catch_error(ctx, e))?;
        obj.set(def.name.as_str(), value)
            .map_err(|e| catch_error(ctx, e))?;
    }
    for sub in &module.submodules {
        let sub_obj: Object = obj
            .get(sub.name.as_str())
            .map_err(|e| catch_error(ctx, e))?;
        set_module_values(ctx, &sub_obj, sub)?;
    }
    Ok(())
}

fn collect_signatures(module: &ModuleDef, prefix: &str, out: &mut Vec<Signature>) {
    for func in &module.functions {
        let path = join_path(prefix, &func.name);
        out.push(Signature {
            text: func.signature_text(None),
            path,
        });
    }
    for class in &module.classes {
        let qpath = join_path(prefix, &class.local_path());
        let display = match &class.base {
            Some(base) => format!("{}({base})", class.name),
            None => class.name.clone(),
        };
        let text = match class.kind {
            ClassKind::Record => {
                let fields = class
                    .fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, f.ty))
                    .collect::<Vec<_>>()
                    .join(", ");
                if fields.is_empty() {
                    format!("class {display}")
                } else {
                    format!("class {display} {{ {fields} }}")
                }
            }
            ClassKind::Opaque => format!("opaque class {display}"),
        };
        out.push(Signature {
            path: qpath.clone(),
            text,
        });
        for method in &class.methods {
            out.push(Signature {
                text: method.signature_text(Some(&qpath)),
                path: format!("{qpath}.{}", method.name),
            });
        }
    }
    for sub in &module.submodules {
        collect_signatures(sub, &join_path(prefix, &sub.name), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::protocol::receiver;

    fn tiny_module() -> ModuleDef {
        ModuleDef::new("tiny")
            .function(
                FunctionDef::new("double", |_, args| {
                    let v = args.first().and_then(ScriptValue::as_i64).unwrap_or(0);
                    Ok(ScriptValue::Int(v * 2))
                })
                .param("v", TypeRef::Int)
                .returns(TypeRef::Int),
            )
            .class(
                ClassDef::opaque("Box")
                    .constructor(|store, _| {
                        let id = store.alloc("Box", Vec::<i64>::new());
                        Ok(ScriptValue::Int(id as i64))
                    })
                    .method(
                        FunctionDef::new("push", |store, args| {
                            let value = args.get(1).and_then(ScriptValue::as_i64).unwrap_or(0);
                            let items: &mut Vec<i64> =
                                store.resolve_mut("Box", receiver(args)?)?;
                            items.push(value);
                            Ok(ScriptValue::Null)
                        })
                        .param("value", TypeRef::Int),
                    )
                    .method(
                        FunctionDef::new("len", |store, args| {
                            let items: &Vec<i64> = store.resolve("Box", receiver(args)?)?;
                            Ok(ScriptValue::Int(items.len() as i64))
                        })
                        .returns(TypeRef::Int),
                    ),
            )
    }

    #[test]
    fn test_install_and_call() {
        let adapter = JsBindingAdapter::new().expect("runtime");
        adapter
            .install(&tiny_module(), &InstallOptions::default())
            .expect("install");
        let doubled: i32 = adapter.eval("tiny.double(21)").expect("eval");
        assert_eq!(doubled, 42);
    }

    #[test]
    fn test_opaque_handles_live_in_the_store() {
        let adapter = JsBindingAdapter::new().expect("runtime");
        adapter
            .install(&tiny_module(), &InstallOptions::default())
            .expect("install");
        adapter
            .execute("const b = new tiny.Box(); b.push(7); b.push(9);")
            .expect("script");
        let len: i32 = adapter.eval("b.len()").expect("eval");
        assert_eq!(len, 2);
        assert_eq!(adapter.object_count(), 1);
    }

    #[test]
    fn test_default_parameters_fill_missing_args() {
        let module = ModuleDef::new("defaults").function(
            FunctionDef::new("or_seven", |_, args| {
                Ok(ScriptValue::Int(
                    args.first().and_then(ScriptValue::as_i64).unwrap_or(-1),
                ))
            })
            .param_default("v", TypeRef::Int, ScriptValue::Int(7))
            .returns(TypeRef::Int),
        );
        let adapter = JsBindingAdapter::new().expect("runtime");
        adapter
            .install(&module, &InstallOptions::default())
            .expect("install");
        let explicit: i32 = adapter.eval("defaults.or_seven(3)").expect("eval");
        let defaulted: i32 = adapter.eval("defaults.or_seven()").expect("eval");
        assert_eq!((explicit, defaulted), (3, 7));
    }

    #[test]
    fn test_unresolved_type_degrades_with_warning() {
        let module = ModuleDef::new("degraded").function(
            FunctionDef::new("make_ghost", |store, _| {
                let id = store.alloc("ghost.Thing", 0u8);
                Ok(ScriptValue::Handle {
                    class: "ghost.Thing".to_string(),
                    id,
                })
            })
            .returns(TypeRef::Class("ghost.Thing".to_string())),
        );
        let adapter = JsBindingAdapter::new().expect("runtime");
        let report = adapter
            .install(&module, &InstallOptions::default())
            .expect("install");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("ghost.Thing"));
        let is_instance: bool = adapter
            .eval("degraded.make_ghost() instanceof degraded.Thing")
            .expect("eval");
        assert!(is_instance);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: InstallOptions = serde_json::from_str("{\"strict\": true}").expect("parse");
        assert!(options.strict);
        assert!(!options.trace_calls);
    }

    #[test]
    fn test_strict_install_refuses_unresolved_types() {
        let module = ModuleDef::new("strict").function(
            FunctionDef::new("make_ghost", |_, _| Ok(ScriptValue::Null))
                .returns(TypeRef::Class("ghost.Thing".to_string())),
        );
        let adapter = JsBindingAdapter::new().expect("runtime");
        let options = InstallOptions {
            strict: true,
            ..InstallOptions::default()
        };
        assert!(matches!(
            adapter.install(&module, &options),
            Err(BindingError::UnresolvedType { .. })
        ));
    }
}

//! Declarative registration protocol.
//!
//! A module is described as plain data (classes, enums, functions, values,
//! exception types, submodules) and handed to a host adapter, which turns
//! the description into host-language glue. Type references are by name and
//! resolved only when the module is installed, so a registration may mention
//! types the layer was never told about; the adapter degrades those to
//! opaque fallback bindings instead of refusing the module.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{BindingError, BindingResult, ConversionError};
use crate::value::ScriptValue;

/// Native callback invoked when the host crosses the boundary.
///
/// Methods receive the receiver as `args[0]`. Constructors of
/// [`ClassKind::Record`] classes return a `Map` of initial field values;
/// constructors of [`ClassKind::Opaque`] classes return the raw handle id
/// as an `Int`.
pub type NativeFn =
    Arc<dyn Fn(&mut ObjectStore, &[ScriptValue]) -> BindingResult<ScriptValue> + Send + Sync>;

/// Factory for parameter defaults that must be materialized at install time,
/// e.g. a default instance of a type with no registered binding.
pub type DefaultFactory = Arc<dyn Fn(&mut ObjectStore) -> ScriptValue + Send + Sync>;

/// Type reference as written in a registration.
///
/// `Class` and `Enum` refer to registered paths; nothing checks them until
/// install time.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    Any,
    Complex,
    IntArray,
    FloatArray,
    Class(String),
    Enum(String),
    Pair(Box<TypeRef>, Box<TypeRef>),
    List(Box<TypeRef>),
    MapOf(Box<TypeRef>, Box<TypeRef>),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "none"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "str"),
            Self::Any => write!(f, "any"),
            Self::Complex => write!(f, "complex"),
            Self::IntArray => write!(f, "ndarray<i32>"),
            Self::FloatArray => write!(f, "ndarray<f64>"),
            Self::Class(path) | Self::Enum(path) => write!(f, "{path}"),
            Self::Pair(a, b) => write!(f, "({a}, {b})"),
            Self::List(item) => write!(f, "list<{item}>"),
            Self::MapOf(k, v) => write!(f, "map<{k}, {v}>"),
        }
    }
}

/// Default value of a declared parameter.
#[derive(Clone)]
pub enum ParamDefault {
    None,
    Value(ScriptValue),
    /// Evaluated once at install time against the adapter's handle table.
    Factory(DefaultFactory),
}

impl fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Value(v) => write!(f, "Value({v:?})"),
            Self::Factory(_) => write!(f, "Factory(..)"),
        }
    }
}

/// Declared parameter of a function or method.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: TypeRef,
    pub default: ParamDefault,
}

/// A registered free function or method.
#[derive(Clone)]
pub struct FunctionDef {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<ParamSpec>,
    pub returns: TypeRef,
    pub callback: NativeFn,
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

impl FunctionDef {
    pub fn new<F>(name: &str, callback: F) -> Self
    where
        F: Fn(&mut ObjectStore, &[ScriptValue]) -> BindingResult<ScriptValue>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.to_string(),
            doc: None,
            params: Vec::new(),
            returns: TypeRef::Unit,
            callback: Arc::new(callback),
        }
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn param(mut self, name: &str, ty: TypeRef) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            default: ParamDefault::None,
        });
        self
    }

    pub fn param_default(mut self, name: &str, ty: TypeRef, default: ScriptValue) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            default: ParamDefault::Value(default),
        });
        self
    }

    pub fn param_factory<F>(mut self, name: &str, ty: TypeRef, factory: F) -> Self
    where
        F: Fn(&mut ObjectStore) -> ScriptValue + Send + Sync + 'static,
    {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            default: ParamDefault::Factory(Arc::new(factory)),
        });
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = ty;
        self
    }

    /// Render a human-readable signature. Type names are emitted verbatim,
    /// including paths of types that end up with no binding of their own.
    pub fn signature_text(&self, receiver: Option<&str>) -> String {
        let mut parts = Vec::with_capacity(self.params.len() + 1);
        if let Some(class) = receiver {
            parts.push(format!("self: {class}"));
        }
        for p in &self.params {
            match &p.default {
                ParamDefault::None => parts.push(format!("{}: {}", p.name, p.ty)),
                ParamDefault::Value(v) => {
                    parts.push(format!("{}: {} = {}", p.name, p.ty, render_default(v)));
                }
                ParamDefault::Factory(_) => {
                    parts.push(format!("{}: {} = {}()", p.name, p.ty, p.ty));
                }
            }
        }
        format!("{}({}) -> {}", self.name, parts.join(", "), self.returns)
    }
}

fn render_default(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Null => "null".to_string(),
        ScriptValue::Bool(b) => b.to_string(),
        ScriptValue::Int(v) => v.to_string(),
        ScriptValue::Float(f) => f.to_string(),
        ScriptValue::Str(s) => format!("{s:?}"),
        ScriptValue::Complex(c) => format!("complex({}, {})", c.re, c.im),
        ScriptValue::Instance { class, .. } => format!("{class}(...)"),
        ScriptValue::Handle { class, .. } => format!("{class}()"),
        ScriptValue::List(_) => "[...]".to_string(),
        ScriptValue::Map(_) => "{...}".to_string(),
        ScriptValue::IntBuffer { .. } | ScriptValue::FloatBuffer { .. } => "ndarray".to_string(),
    }
}

/// How instances of a class cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Plain record: fields are copied by value, the host owns the instance.
    Record,
    /// Opaque: the value stays native and the host holds a handle.
    Opaque,
}

/// Declared read/write field of a record class.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeRef,
}

/// A registered class.
#[derive(Clone)]
pub struct ClassDef {
    pub name: String,
    /// Qualified path of the enclosing class, for nested registrations.
    pub scope: Option<String>,
    /// Qualified path of the base class, for derived registrations.
    pub base: Option<String>,
    pub kind: ClassKind,
    pub doc: Option<String>,
    pub fields: Vec<FieldSpec>,
    pub methods: Vec<FunctionDef>,
    /// Absent constructor means the host cannot instantiate the class.
    pub constructor: Option<NativeFn>,
    /// Additional native type paths this binding answers for. Used by
    /// synthesized fallbacks so values tagged with the unregistered path
    /// still find their degraded class.
    pub aliases: Vec<String>,
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("base", &self.base)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl ClassDef {
    pub fn record(name: &str) -> Self {
        Self::with_kind(name, ClassKind::Record)
    }

    pub fn opaque(name: &str) -> Self {
        Self::with_kind(name, ClassKind::Opaque)
    }

    fn with_kind(name: &str, kind: ClassKind) -> Self {
        Self {
            name: name.to_string(),
            scope: None,
            base: None,
            kind,
            doc: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructor: None,
            aliases: Vec::new(),
        }
    }

    /// Attach to an enclosing class path, e.g. `Outer` or `Outer.Inner`.
    pub fn nested(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Derive from a previously registered class path.
    pub fn extends(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn field(mut self, name: &str, ty: TypeRef) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn constructor<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut ObjectStore, &[ScriptValue]) -> BindingResult<ScriptValue>
            + Send
            + Sync
            + 'static,
    {
        self.constructor = Some(Arc::new(callback));
        self
    }

    pub fn method(mut self, def: FunctionDef) -> Self {
        self.methods.push(def);
        self
    }

    /// Scope-qualified name, relative to the owning module.
    pub fn local_path(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// One member of a registered enumeration.
#[derive(Debug, Clone, Serialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

/// A registered enumeration.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    /// Qualified path of the enclosing class, for nested registrations.
    pub scope: Option<String>,
    pub doc: Option<String>,
    pub variants: Vec<EnumVariant>,
    /// Also export every member at the enclosing scope, the way unscoped
    /// native enumerations leak their members. Colliding names resolve
    /// last-writer-wins with a warning.
    pub export_values: bool,
}

impl EnumDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: None,
            doc: None,
            variants: Vec::new(),
            export_values: false,
        }
    }

    pub fn nested(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn variant(mut self, name: &str, value: i64) -> Self {
        self.variants.push(EnumVariant {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn export_values(mut self) -> Self {
        self.export_values = true;
        self
    }

    pub fn local_path(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A registered exception class. Native errors raised with this name
/// surface in the host as catchable instances of it.
#[derive(Debug, Clone)]
pub struct ExceptionDef {
    pub name: String,
}

/// A module-level value, installed once at load.
#[derive(Debug, Clone)]
pub struct ValueDef {
    pub name: String,
    pub value: ScriptValue,
}

/// A module registration: the unit handed to a host adapter.
#[derive(Clone, Default)]
pub struct ModuleDef {
    pub name: String,
    pub doc: Option<String>,
    pub classes: Vec<ClassDef>,
    pub enums: Vec<EnumDef>,
    pub functions: Vec<FunctionDef>,
    pub values: Vec<ValueDef>,
    pub exceptions: Vec<ExceptionDef>,
    pub submodules: Vec<ModuleDef>,
}

impl fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDef")
            .field("name", &self.name)
            .field("classes", &self.classes.len())
            .field("enums", &self.enums.len())
            .field("functions", &self.functions.len())
            .field("submodules", &self.submodules.len())
            .finish_non_exhaustive()
    }
}

impl ModuleDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn class(mut self, def: ClassDef) -> Self {
        self.classes.push(def);
        self
    }

    pub fn enumeration(mut self, def: EnumDef) -> Self {
        self.enums.push(def);
        self
    }

    pub fn function(mut self, def: FunctionDef) -> Self {
        self.functions.push(def);
        self
    }

    pub fn value(mut self, name: &str, value: ScriptValue) -> Self {
        self.values.push(ValueDef {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn exception(mut self, name: &str) -> Self {
        self.exceptions.push(ExceptionDef {
            name: name.to_string(),
        });
        self
    }

    pub fn submodule(mut self, def: ModuleDef) -> Self {
        self.submodules.push(def);
        self
    }

    /// Check identifier hygiene, path uniqueness and scope/base references
    /// before any glue is generated. Unresolved *type references* are not an
    /// error (degrading those is the adapter's job), but a class deriving
    /// from or nesting inside a path that does not exist cannot be emitted
    /// at all.
    pub fn validate(&self) -> BindingResult<()> {
        let mut paths = Vec::new();
        self.collect_paths("", &mut paths)?;
        let mut seen: HashMap<&str, ()> = HashMap::with_capacity(paths.len());
        for path in &paths {
            if seen.insert(path.as_str(), ()).is_some() {
                return Err(BindingError::Registration(format!(
                    "duplicate registration path `{path}`"
                )));
            }
        }
        self.check_references("", &paths)
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) -> BindingResult<()> {
        for class in &self.classes {
            check_identifier(&class.name)?;
            for field in &class.fields {
                check_identifier(&field.name)?;
            }
            for method in &class.methods {
                check_identifier(&method.name)?;
            }
            out.push(join_path(prefix, &class.local_path()));
        }
        for def in &self.enums {
            check_identifier(&def.name)?;
            for variant in &def.variants {
                check_identifier(&variant.name)?;
            }
            out.push(join_path(prefix, &def.local_path()));
        }
        for func in &self.functions {
            check_identifier(&func.name)?;
            out.push(join_path(prefix, &func.name));
        }
        for value in &self.values {
            check_identifier(&value.name)?;
            out.push(join_path(prefix, &value.name));
        }
        for exc in &self.exceptions {
            check_identifier(&exc.name)?;
            out.push(join_path(prefix, &exc.name));
        }
        for sub in &self.submodules {
            check_identifier(&sub.name)?;
            out.push(join_path(prefix, &sub.name));
            sub.collect_paths(&join_path(prefix, &sub.name), out)?;
        }
        Ok(())
    }

    fn check_references(&self, prefix: &str, paths: &[String]) -> BindingResult<()> {
        for class in &self.classes {
            if let Some(scope) = &class.scope {
                let scope_path = join_path(prefix, scope);
                if !paths.contains(&scope_path) {
                    return Err(BindingError::Registration(format!(
                        "class `{}` is nested in unregistered scope `{scope_path}`",
                        class.name
                    )));
                }
            }
            if let Some(base) = &class.base {
                let base_path = join_path(prefix, base);
                if !paths.contains(&base_path) {
                    return Err(BindingError::Registration(format!(
                        "class `{}` derives from unregistered base `{base_path}`",
                        class.name
                    )));
                }
            }
        }
        for def in &self.enums {
            if let Some(scope) = &def.scope {
                let scope_path = join_path(prefix, scope);
                if !paths.contains(&scope_path) {
                    return Err(BindingError::Registration(format!(
                        "enum `{}` is nested in unregistered scope `{scope_path}`",
                        def.name
                    )));
                }
            }
        }
        for sub in &self.submodules {
            sub.check_references(&join_path(prefix, &sub.name), paths)?;
        }
        Ok(())
    }
}

/// Receiver of a method call, passed to the callback as `args[0]`.
pub fn receiver(args: &[ScriptValue]) -> BindingResult<&ScriptValue> {
    args.first()
        .ok_or_else(|| ConversionError::mismatch("receiver", "missing").into())
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn check_identifier(name: &str) -> BindingResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(BindingError::Registration(format!(
            "`{name}` is not a valid binding identifier"
        )))
    }
}

/// One entry of the host-visible signature table.
#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    pub path: String,
    pub text: String,
}

/// Handle table backing opaque instances.
///
/// Handles stay valid for the lifetime of the adapter that owns the store;
/// the embedded host has no finalization hook worth wiring for a test
/// plugin.
#[derive(Default)]
pub struct ObjectStore {
    next_id: u64,
    entries: HashMap<u64, StoredObject>,
}

struct StoredObject {
    class: String,
    value: Box<dyn Any + Send>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a native object and return its handle id. Ids start at 1 so a
    /// handle is never falsy on the host side.
    pub fn alloc<T: Any + Send>(&mut self, class: &str, value: T) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(
            id,
            StoredObject {
                class: class.to_string(),
                value: Box::new(value),
            },
        );
        id
    }

    pub fn class_of(&self, id: u64) -> Option<&str> {
        self.entries.get(&id).map(|e| e.class.as_str())
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a handle value to a shared reference of its native type.
    pub fn resolve<T: Any>(&self, class: &str, value: &ScriptValue) -> BindingResult<&T> {
        let id = self.check_handle(class, value)?;
        self.entries
            .get(&id)
            .and_then(|e| e.value.downcast_ref::<T>())
            .ok_or_else(|| {
                ConversionError::BadHandle {
                    class: class.to_string(),
                    id,
                }
                .into()
            })
    }

    /// Resolve a handle value to an exclusive reference of its native type.
    pub fn resolve_mut<T: Any>(&mut self, class: &str, value: &ScriptValue) -> BindingResult<&mut T> {
        let id = self.check_handle(class, value)?;
        self.entries
            .get_mut(&id)
            .and_then(|e| e.value.downcast_mut::<T>())
            .ok_or_else(|| {
                ConversionError::BadHandle {
                    class: class.to_string(),
                    id,
                }
                .into()
            })
    }

    fn check_handle(&self, class: &str, value: &ScriptValue) -> BindingResult<u64> {
        let id = match value {
            ScriptValue::Handle { id, .. } => *id,
            other => {
                return Err(ConversionError::mismatch("handle", other.type_name()).into());
            }
        };
        match self.class_of(id) {
            Some(stored) if stored == class => Ok(id),
            _ => Err(ConversionError::BadHandle {
                class: class.to_string(),
                id,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> FunctionDef {
        FunctionDef::new("noop", |_, _| Ok(ScriptValue::Null))
    }

    #[test]
    fn test_builder_paths() {
        let module = ModuleDef::new("m")
            .class(ClassDef::record("Foo"))
            .class(ClassDef::record("Child").nested("Foo"))
            .submodule(ModuleDef::new("sub").function(noop()));
        assert!(module.validate().is_ok());
        assert_eq!(module.classes[1].local_path(), "Foo.Child");
    }

    #[test]
    fn test_validate_rejects_bad_identifier() {
        let module = ModuleDef::new("m").function(FunctionDef::new("not valid", |_, _| {
            Ok(ScriptValue::Null)
        }));
        assert!(matches!(
            module.validate(),
            Err(BindingError::Registration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_path() {
        let module = ModuleDef::new("m")
            .class(ClassDef::record("Foo"))
            .function(FunctionDef::new("Foo", |_, _| Ok(ScriptValue::Null)));
        assert!(matches!(
            module.validate(),
            Err(BindingError::Registration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_base() {
        let module = ModuleDef::new("m").class(ClassDef::record("Derived").extends("Base"));
        assert!(matches!(
            module.validate(),
            Err(BindingError::Registration(_))
        ));
    }

    #[test]
    fn test_object_store_round_trip() {
        let mut store = ObjectStore::new();
        let id = store.alloc("m.Box", vec![1i32, 2, 3]);
        let handle = ScriptValue::Handle {
            class: "m.Box".to_string(),
            id,
        };
        {
            let items: &mut Vec<i32> = store.resolve_mut("m.Box", &handle).expect("resolve");
            items.push(4);
        }
        let items: &Vec<i32> = store.resolve("m.Box", &handle).expect("resolve");
        assert_eq!(items.len(), 4);
        assert!(store.remove(id));
        assert!(store.resolve::<Vec<i32>>("m.Box", &handle).is_err());
    }

    #[test]
    fn test_store_rejects_foreign_class() {
        let mut store = ObjectStore::new();
        let id = store.alloc("m.Box", 7i32);
        let handle = ScriptValue::Handle {
            class: "m.Other".to_string(),
            id,
        };
        assert!(store.resolve::<i32>("m.Other", &handle).is_err());
    }

    #[test]
    fn test_signature_text() {
        let def = noop()
            .param("a", TypeRef::Int)
            .param_default(
                "color",
                TypeRef::Enum("sublibA.ConsoleForegroundColor".to_string()),
                ScriptValue::Int(34),
            )
            .returns(TypeRef::Int);
        assert_eq!(
            def.signature_text(None),
            "noop(a: int, color: sublibA.ConsoleForegroundColor = 34) -> int"
        );
    }
}

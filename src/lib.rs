//! # Binding Example
//!
//! Demonstration/test plugin for the JavaScript binding layer: a handful of
//! deliberately trivial native types and free functions, each registered
//! through the declarative binding protocol and installed into an embedded
//! QuickJS host runtime via generated glue.
//!
//! There is no algorithm here worth reading; the module exists to exercise
//! binding-generator edge cases:
//!
//! - nested classes and single-level inheritance across the boundary
//! - enum export semantics with colliding member names
//! - defaulted parameters referencing enum and record values
//! - opaque container types exchanged by reference, with by-value-copy
//!   counterparts
//! - multidimensional numeric buffer exchange
//! - references to "forgotten" types the layer was never told about, which
//!   degrade to opaque fallback bindings with diagnostics
//!
//! ## Modules
//!
//! - [`bindings`]: the binding layer (protocol, glue generator, JS adapter)
//! - [`library`]: the native demonstration types
//! - [`module`]: the registration table tying the two together
//! - [`value`]: the universal value model crossing the boundary
//!
//! ### Example
//!
//! ```ignore
//! use binding_example::{example_module, InstallOptions, JsBindingAdapter};
//!
//! let adapter = JsBindingAdapter::new()?;
//! adapter.install(&example_module(), &InstallOptions::default())?;
//! assert_eq!(adapter.eval::<i32>("example.sublibA.add(2, 3)")?, 5);
//! ```

/// Unified error types
pub mod error;
/// Universal value model
pub mod value;
/// Language binding layer
pub mod bindings;
/// Native demonstration types
pub mod library;
/// Registration table for the demonstration module
pub mod module;

pub use bindings::{InstallOptions, InstallReport, JsBindingAdapter};
pub use error::{BindingError, BindingResult, ConversionError};
pub use module::{example_module, MODULE_NAME};
pub use value::{Complex64, ScriptValue};

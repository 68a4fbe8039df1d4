//! Language binding layer.
//!
//! This module turns a declarative registration table into host-language
//! glue so a dynamic-language runtime can call into native code.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Host Runtime (JS)                    │
//! │   generated glue: classes / enums / functions / errors  │
//! │                          │                              │
//! │                          v                              │
//! │                __native_invoke dispatch                 │
//! └──────────────────────────┬──────────────────────────────┘
//!                            │
//!                            v
//! ┌─────────────────────────────────────────────────────────┐
//! │        Registration protocol (ModuleDef + defs)         │
//! │     native callbacks over the universal value model     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Type references are resolved when a module is installed; references to
//! types the layer was never told about degrade to opaque fallback
//! bindings instead of failing the install.

pub mod codegen;
pub mod js;
pub mod protocol;

pub use js::{InstallOptions, InstallReport, JsBindingAdapter};
pub use protocol::*;

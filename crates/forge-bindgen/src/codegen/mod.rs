//! Code generation for the native and managed sides of a binding
//!
//! Every emitter takes a [`BoundSpec`](crate::model::BoundSpec), builds its
//! own [`JsView`](crate::passes::JsView) and returns the text of one output
//! file. Emitters never touch the filesystem; see [`crate::build`].
//!
//! - [`wasm`] / [`node`] - C++ native modules (emscripten, N-API)
//! - [`typescript`] - `core.ts` and `native.d.ts`
//! - [`wrapper`] - the JavaScript wrapper classes around the native table
//! - [`helpers`] - C++ headers the native modules include

pub mod convert;
pub mod cpp;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod helpers;
pub mod node;
pub mod typescript;
pub mod wasm;
pub mod wrapper;

pub use convert::{Converter, Direction, Embedding};
pub use node::NodeGenerator;
pub use typescript::{CoreGenerator, DeclarationGenerator};
pub use wasm::WasmGenerator;
pub use wrapper::{WrapperFlavor, WrapperGenerator};

use crate::model::Class;

/// Name of the generated per-module state class
pub(crate) const ADDON_CLASS: &str = "BindgenAddon";

/// Values handed to the native module by `injectInjectables`, besides the classes
pub(crate) const INJECTABLES: [&str; 9] = [
    "Int64",
    "ArrayBuffer",
    "Float",
    "Status",
    "UUID",
    "ObjectId",
    "Decimal128",
    "EJSON_parse",
    "EJSON_stringify",
];

pub(crate) fn ctor_member(name: &str) -> String {
    format!("m_cls_{}_ctor", name)
}

pub(crate) fn extractor_member(name: &str) -> String {
    format!("m_cls_{}_extractor", name)
}

/// Whether native code can hand out new instances of `class`
///
/// Only these classes get a `FROM_` helper and, on wasm, a deleter.
pub(crate) fn is_constructible(class: &Class) -> bool {
    class.is_shared() || !class.is_abstract
}

//! Forge-Bindgen: binding generator for the Forge native database layer
//!
//! Reads a declarative description of a C++ API and generates the code that
//! marshals values across the boundary between that API and JavaScript
//! hosts.
//!
//! # Architecture
//!
//! - `spec`: TOML specification documents, opt-in lists and type strings
//! - `model`: the bound model, a resolved graph of classes, records and types
//! - `passes`: managed-side naming views over the bound model
//! - `codegen`: conversion algebra and the per-target emitters
//! - `build`: writing, formatting and validating generated files
//!
//! # Usage
//!
//! ```rust,ignore
//! use forge_bindgen::{bind_model, BindingBuilder, OptInSpec, RawSpec, Target};
//!
//! let raw = RawSpec::load(&["spec.toml", "spec.extra.toml"])?;
//! let opt_in = OptInSpec::from_path("opt-in.toml".as_ref())?;
//! let spec = bind_model(&raw, Some(&opt_in))?;
//! BindingBuilder::new(&spec, "generated")
//!     .targets(&[Target::Typescript, Target::NodeWrapper, Target::Node])
//!     .build()?;
//! ```

pub mod build;
pub mod codegen;
pub mod error;
pub mod model;
pub mod passes;
pub mod spec;

pub use build::{
    check_typescript, BindingBuilder, BuildOutput, CommandFormatter, FormatError, Formatter,
    Target, GENERATED_HEADER,
};
pub use codegen::{
    CoreGenerator, DeclarationGenerator, NodeGenerator, WasmGenerator, WrapperFlavor,
    WrapperGenerator,
};
pub use error::{BindgenError, Result};
pub use model::{bind_model, BoundSpec};
pub use passes::JsView;
pub use spec::{OptInSpec, RawSpec};

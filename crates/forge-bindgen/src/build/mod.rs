//! Output utilities
//!
//! - [`BindingBuilder`] writes generated targets to an output directory
//! - [`Formatter`] / [`CommandFormatter`] post-process generated text
//! - [`check_typescript`] validates generated TypeScript via deno_ast

pub mod format;
pub mod generator;
pub mod syntax;

pub use format::{CommandFormatter, FormatError, Formatter};
pub use generator::{BindingBuilder, BuildOutput, Target, GENERATED_HEADER};
pub use syntax::{check_typescript, SyntaxError};

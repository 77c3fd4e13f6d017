//! Error types for binding generation
//!
//! Every variant of [`BindgenError`] is fatal: generation stops at the first
//! inconsistency rather than emitting marshaling code that might be wrong.

use crate::spec::TypeParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, binding or emitting a specification
#[derive(Debug, Error)]
pub enum BindgenError {
    /// IO error while reading specs or writing generated files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a spec file
    #[error("Failed to read {path}: {message}")]
    SpecFile { path: PathBuf, message: String },

    /// Structurally invalid spec document
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// Malformed type string in a signature or field
    #[error(transparent)]
    TypeParse(#[from] TypeParseError),

    /// Primitive name outside the supported set
    #[error("Unsupported primitive: {0}")]
    UnsupportedPrimitive(String),

    /// Template name outside the supported set
    #[error("Unsupported template: {0}")]
    UnsupportedTemplate(String),

    /// A template was declared or instantiated with the wrong number of arguments
    #[error("Template {name} takes {expected} argument(s), got {found}")]
    TemplateArity {
        name: String,
        expected: String,
        found: String,
    },

    /// Reference to a type name that was never declared
    #[error("No such type: {0}")]
    UnknownType(String),

    /// Reference to a template that was never declared in `templates`
    #[error("No such template: {0}")]
    UnknownTemplate(String),

    /// The same type name was declared twice
    #[error("Duplicate type name: {0}")]
    DuplicateType(String),

    /// A declaration appears in more than one merged spec file
    #[error("Duplicate {kind} '{name}' across spec files")]
    DuplicateDeclaration { kind: &'static str, name: String },

    /// Type names may not contain underscores
    #[error("Type names must not contain '_': {0}")]
    InvalidTypeName(String),

    /// Argument names starting with '_' are reserved for generated code
    #[error("Argument '{arg}' of {method} must not start with '_'")]
    ReservedArgName { method: String, arg: String },

    /// The base of a class is not a class
    #[error("Base of class {class} must be a class, got {base}")]
    BaseNotClass { class: String, base: String },

    /// Inheritance loop
    #[error("Base class loop detected at {0}")]
    BaseClassLoop(String),

    /// Shared-pointer wrapping combined with inheritance
    #[error("Class {0} is shared-pointer wrapped and cannot have a base class or subclasses")]
    SharedPtrHierarchy(String),

    /// Two methods of a class share the same id
    #[error("Duplicate method id: {0}")]
    DuplicateMethod(String),

    /// Two members of a class map onto the same display name
    #[error("Members of {class} collide on display name '{name}'")]
    DuplicateDisplayName { class: String, name: String },

    /// Signature that is structurally invalid for its position
    #[error("Invalid signature for {method}: {reason}")]
    InvalidSignature { method: String, reason: String },

    /// Callback argument that does not follow the completion protocol
    #[error("Invalid async callback in {method}: {reason}")]
    InvalidAsync { method: String, reason: String },

    /// Opt-in list references something that does not exist
    #[error("Opt-in list references unknown {kind}: {path}")]
    UnknownOptIn { kind: &'static str, path: String },

    /// `mixedInfo` missing from every spec file
    #[error("No spec file declares mixedInfo")]
    MissingMixedInfo,

    /// A struct field whose accessor is a method call
    #[error("Field {record}.{field} is bound to the method-shaped accessor '{cpp_name}'")]
    MethodShapedField {
        record: String,
        field: String,
        cpp_name: String,
    },

    /// No conversion exists for a type in the requested direction
    #[error("Cannot convert {ty} {direction} in the {embedding} embedding: {reason}")]
    Unconvertible {
        ty: String,
        direction: &'static str,
        embedding: &'static str,
        reason: String,
    },

    /// Generator-only type that never appears in emitted C++
    #[error("No C++ spelling for {0}")]
    NoCppType(String),

    /// Type that has no managed declaration
    #[error("No TypeScript declaration for {ty}: {reason}")]
    Undeclarable { ty: String, reason: String },
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BindgenError>;

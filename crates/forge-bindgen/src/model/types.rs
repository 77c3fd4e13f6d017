//! Type system of the bound model
//!
//! Every type referenced by a spec resolves to a [`Type`]. The sets of
//! supported primitives and templates are closed enums, so a new kind that
//! some emitter does not handle is a compile error rather than a runtime
//! surprise.
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `Primitive` | one of [`Primitive`] |
//! | `Pointer` / `Ref` / `RRef` / `Const` | C++ type modifiers |
//! | `KeyType` | strongly typed integer key (`ObjKey`, `TableKey`) |
//! | `Opaque` | native type passed through as an address |
//! | `Enum` / `Class` / `Struct` | declared named types |
//! | `Template` | one of [`TemplateKind`] applied to arguments |
//! | `Func` | a call signature |

use crate::error::{BindgenError, Result};
use crate::spec::Arity;
use std::fmt;

/// Supported primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Bool,
    Double,
    Float,
    Int32,
    Int64,
    UInt64,
    Count,
    Milliseconds,
    String,
    StringView,
    StringData,
    BinaryData,
    OwnedBinaryData,
    EncryptionKey,
    ObjectId,
    Uuid,
    Decimal128,
    Mixed,
    QueryArg,
    AppError,
    ExceptionPtr,
    ErrorCode,
    Status,
    EJson,
    EJsonObj,
    EJsonArray,
    BsonDocument,
    BsonArray,
    UIntFast16,
}

impl Primitive {
    pub const ALL: [Primitive; 30] = [
        Primitive::Void,
        Primitive::Bool,
        Primitive::Double,
        Primitive::Float,
        Primitive::Int32,
        Primitive::Int64,
        Primitive::UInt64,
        Primitive::Count,
        Primitive::Milliseconds,
        Primitive::String,
        Primitive::StringView,
        Primitive::StringData,
        Primitive::BinaryData,
        Primitive::OwnedBinaryData,
        Primitive::EncryptionKey,
        Primitive::ObjectId,
        Primitive::Uuid,
        Primitive::Decimal128,
        Primitive::Mixed,
        Primitive::QueryArg,
        Primitive::AppError,
        Primitive::ExceptionPtr,
        Primitive::ErrorCode,
        Primitive::Status,
        Primitive::EJson,
        Primitive::EJsonObj,
        Primitive::EJsonArray,
        Primitive::BsonDocument,
        Primitive::BsonArray,
        Primitive::UIntFast16,
    ];

    /// The spelling used both in specs and in generated C++
    pub fn cpp_name(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Double => "double",
            Primitive::Float => "float",
            Primitive::Int32 => "int32_t",
            Primitive::Int64 => "int64_t",
            Primitive::UInt64 => "uint64_t",
            Primitive::Count => "count_t",
            Primitive::Milliseconds => "std::chrono::milliseconds",
            Primitive::String => "std::string",
            Primitive::StringView => "std::string_view",
            Primitive::StringData => "StringData",
            Primitive::BinaryData => "BinaryData",
            Primitive::OwnedBinaryData => "OwnedBinaryData",
            Primitive::EncryptionKey => "EncryptionKey",
            Primitive::ObjectId => "ObjectId",
            Primitive::Uuid => "UUID",
            Primitive::Decimal128 => "Decimal128",
            Primitive::Mixed => "Mixed",
            Primitive::QueryArg => "QueryArg",
            Primitive::AppError => "AppError",
            Primitive::ExceptionPtr => "std::exception_ptr",
            Primitive::ErrorCode => "std::error_code",
            Primitive::Status => "Status",
            Primitive::EJson => "EJson",
            Primitive::EJsonObj => "EJsonObj",
            Primitive::EJsonArray => "EJsonArray",
            Primitive::BsonDocument => "bson::BsonDocument",
            Primitive::BsonArray => "bson::BsonArray",
            Primitive::UIntFast16 => "std::uint_fast16_t",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.cpp_name() == name)
    }

    /// String-like primitives usable as object keys
    pub fn is_string(self) -> bool {
        matches!(
            self,
            Primitive::String | Primitive::StringView | Primitive::StringData
        )
    }
}

/// Supported templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    SharedPtr,
    Vector,
    Optional,
    Nullable,
    Pair,
    Tuple,
    Map,
    UnorderedMap,
    UniqueFunction,
    Function,
    AsyncCallback,
    AsyncResult,
    IgnoreArgument,
}

impl TemplateKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "std::shared_ptr" => TemplateKind::SharedPtr,
            "std::vector" => TemplateKind::Vector,
            "std::optional" | "util::Optional" => TemplateKind::Optional,
            "Nullable" => TemplateKind::Nullable,
            "std::pair" => TemplateKind::Pair,
            "std::tuple" => TemplateKind::Tuple,
            "std::map" => TemplateKind::Map,
            "std::unordered_map" => TemplateKind::UnorderedMap,
            "util::UniqueFunction" => TemplateKind::UniqueFunction,
            "std::function" => TemplateKind::Function,
            "AsyncCallback" => TemplateKind::AsyncCallback,
            "AsyncResult" => TemplateKind::AsyncResult,
            "IgnoreArgument" => TemplateKind::IgnoreArgument,
            _ => return None,
        })
    }

    pub fn cpp_name(self) -> &'static str {
        match self {
            TemplateKind::SharedPtr => "std::shared_ptr",
            TemplateKind::Vector => "std::vector",
            TemplateKind::Optional => "std::optional",
            TemplateKind::Nullable => "Nullable",
            TemplateKind::Pair => "std::pair",
            TemplateKind::Tuple => "std::tuple",
            TemplateKind::Map => "std::map",
            TemplateKind::UnorderedMap => "std::unordered_map",
            TemplateKind::UniqueFunction => "util::UniqueFunction",
            TemplateKind::Function => "std::function",
            TemplateKind::AsyncCallback => "AsyncCallback",
            TemplateKind::AsyncResult => "AsyncResult",
            TemplateKind::IgnoreArgument => "IgnoreArgument",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            TemplateKind::Pair | TemplateKind::Map | TemplateKind::UnorderedMap => Arity::Fixed(2),
            TemplateKind::Tuple => Arity::Variadic,
            _ => Arity::Fixed(1),
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cpp_name())
    }
}

macro_rules! typed_id {
    ($($name:ident),*) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub usize);
        )*
    };
}

typed_id!(ClassId, StructId, EnumId, KeyTypeId, OpaqueId);

/// A resolved type
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primitive(Primitive),
    Pointer(Box<Type>),
    Ref(Box<Type>),
    RRef(Box<Type>),
    Const(Box<Type>),
    KeyType(KeyTypeId),
    Opaque(OpaqueId),
    Enum(EnumId),
    Class(ClassId),
    Struct(StructId),
    Template(Template),
    Func(Func),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub kind: TemplateKind,
    pub args: Vec<Type>,
}

/// A call signature
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    pub ret: Box<Type>,
    pub args: Vec<Arg>,
    pub is_const: bool,
    pub noexcept: bool,
    pub off_thread: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub ty: Type,
}

/// Result of rewriting a completion-callback signature into a promise
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncTransform {
    /// Signature returning `AsyncResult<value>` without the callback argument
    pub sig: Func,
    /// Type the promise resolves with
    pub value: Type,
    /// A null result is a legitimate value (`const EJson*` pointing at `null`)
    pub null_allowed: bool,
}

impl Type {
    pub fn template(kind: TemplateKind, args: Vec<Type>) -> Self {
        Type::Template(Template { kind, args })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Void))
    }

    pub fn is_primitive(&self, primitive: Primitive) -> bool {
        matches!(self, Type::Primitive(p) if *p == primitive)
    }

    pub fn is_template(&self, kind: TemplateKind) -> bool {
        matches!(self, Type::Template(t) if t.kind == kind)
    }

    /// The template node, if this is an instantiation of `kind`
    pub fn as_template(&self, kind: TemplateKind) -> Option<&Template> {
        match self {
            Type::Template(t) if t.kind == kind => Some(t),
            _ => None,
        }
    }

    /// Strip `const`, `&` and `&&` wrappers
    pub fn remove_const_ref(&self) -> &Type {
        match self {
            Type::Const(inner) | Type::Ref(inner) | Type::RRef(inner) => inner.remove_const_ref(),
            other => other,
        }
    }

    /// Whether a value of this type is, or contains, something callable
    pub fn is_function(&self) -> bool {
        match self {
            Type::Func(_) => true,
            Type::Const(inner) | Type::Ref(inner) | Type::RRef(inner) | Type::Pointer(inner) => {
                inner.is_function()
            }
            Type::Template(t) => t.args.iter().any(Type::is_function),
            _ => false,
        }
    }

    /// `Nullable<T>` or `std::optional<T>` at the top level
    pub fn is_nullable(&self) -> bool {
        let ty = self.remove_const_ref();
        ty.is_template(TemplateKind::Nullable) || ty.is_template(TemplateKind::Optional)
    }
}

fn strip_nullable(ty: &Type) -> &Type {
    match ty {
        Type::Template(t)
            if matches!(t.kind, TemplateKind::Nullable | TemplateKind::Optional) =>
        {
            &t.args[0]
        }
        other => other,
    }
}

fn is_error_carrier(ty: &Type) -> bool {
    if ty.is_primitive(Primitive::Status) {
        return true;
    }
    match ty {
        Type::Template(t) if t.kind == TemplateKind::Optional => {
            t.args[0].is_primitive(Primitive::AppError) || t.args[0].is_primitive(Primitive::Status)
        }
        Type::Template(t) if t.kind == TemplateKind::Nullable => {
            t.args[0].is_primitive(Primitive::ErrorCode)
                || t.args[0].is_primitive(Primitive::ExceptionPtr)
        }
        _ => false,
    }
}

impl Func {
    /// Arguments excluding `IgnoreArgument<T>` placeholders
    pub fn args_skipping_ignored(&self) -> impl Iterator<Item = &Arg> {
        self.args
            .iter()
            .filter(|a| !a.ty.is_template(TemplateKind::IgnoreArgument))
    }

    /// Rewrite a completion-callback signature into a promise-returning one
    ///
    /// Returns `Ok(None)` when the signature is not callback shaped, which
    /// includes every signature that was already transformed.
    pub fn async_transform(&self, context: &str) -> Result<Option<AsyncTransform>> {
        if !self.ret.is_void() {
            return Ok(None);
        }
        let Some(last) = self.args.last() else {
            return Ok(None);
        };
        let Some(callback) = last.ty.remove_const_ref().as_template(TemplateKind::AsyncCallback)
        else {
            return Ok(None);
        };

        let invalid = |reason: &str| BindgenError::InvalidAsync {
            method: context.to_string(),
            reason: reason.to_string(),
        };

        let Type::Func(cb) = &callback.args[0] else {
            return Err(invalid("AsyncCallback must wrap a function type"));
        };
        if !cb.ret.is_void() {
            return Err(invalid("the completion callback must return void"));
        }
        if cb.args.is_empty() || cb.args.len() > 2 {
            return Err(invalid("the completion callback must take 1 or 2 arguments"));
        }
        let error_arg = &cb.args[cb.args.len() - 1];
        if !is_error_carrier(error_arg.ty.remove_const_ref()) {
            return Err(invalid(
                "the last completion argument must be an optional AppError, a Status, or a nullable error code/exception",
            ));
        }

        let value = if cb.args.len() == 2 {
            strip_nullable(cb.args[0].ty.remove_const_ref()).clone()
        } else {
            Type::Primitive(Primitive::Void)
        };

        let null_allowed = matches!(
            &value,
            Type::Pointer(inner) if matches!(inner.as_ref(), Type::Const(c) if c.is_primitive(Primitive::EJson))
        );

        let sig = Func {
            ret: Box::new(Type::template(TemplateKind::AsyncResult, vec![value.clone()])),
            args: self.args[..self.args.len() - 1].to_vec(),
            is_const: self.is_const,
            noexcept: self.noexcept,
            off_thread: self.off_thread,
        };

        Ok(Some(AsyncTransform {
            sig,
            value,
            null_allowed,
        }))
    }
}

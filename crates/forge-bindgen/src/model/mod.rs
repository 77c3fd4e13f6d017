//! Bound model
//!
//! [`BoundSpec`] is the fully resolved object graph built from a
//! [`RawSpec`](crate::spec::RawSpec) by [`bind_model`]. Nodes refer to each
//! other through typed indexes ([`ClassId`], [`StructId`], ...), and
//! classes are stored roots first, so a base always precedes its
//! subclasses. Once built, the model is never mutated.

pub mod builder;
pub mod types;

pub use builder::bind_model;
pub use types::*;

use crate::error::{BindgenError, Result};
use indexmap::IndexMap;

/// The resolved specification
#[derive(Debug, Clone)]
pub struct BoundSpec {
    pub headers: Vec<String>,
    pub classes: Vec<Class>,
    pub records: Vec<Struct>,
    pub enums: Vec<Enum>,
    pub key_types: Vec<KeyType>,
    pub opaque_types: Vec<Opaque>,
    pub mixed_info: MixedInfo,
    /// Every type name in the spec, including aliases
    pub types: IndexMap<String, Type>,
}

#[derive(Debug, Clone)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub cpp_name: String,
    pub base: Option<ClassId>,
    pub subclasses: Vec<ClassId>,
    pub methods: Vec<Method>,
    pub iterable: Option<Type>,
    pub needs_deref: bool,
    /// Alias name for `std::shared_ptr<Self>`
    pub shared_ptr_wrapped: Option<String>,
    pub is_abstract: bool,
}

impl Class {
    pub fn iterator_method_id(&self) -> String {
        format!("{}_Symbol_iterator", self.name)
    }

    pub fn is_shared(&self) -> bool {
        self.shared_ptr_wrapped.is_some()
    }
}

/// Which class owns the native handle of a wrapper instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOwner {
    /// The class is a root and stores the handle itself
    Root,
    /// The handle lives on this root ancestor
    Delegated(ClassId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Instance,
    Static,
    Property,
    Constructor,
    Intrinsic(Intrinsic),
}

/// Members synthesized for shared-pointer-wrapped classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// Numeric identity of the native object
    Addr,
    /// Release the shared pointer early
    ResetSharedPtr,
}

impl Intrinsic {
    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Addr => "$addr",
            Intrinsic::ResetSharedPtr => "$resetSharedPtr",
        }
    }
}

/// Expressions a generated method body has in scope
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Dereferenced native object
    pub self_expr: String,
    /// The stored handle (the shared pointer for wrapped classes)
    pub handle_expr: String,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub class: ClassId,
    pub class_name: String,
    pub class_cpp_name: String,
    pub name: String,
    /// `name`, or `name_suffix` for overloads
    pub unique_name: String,
    pub cpp_name: String,
    pub kind: MethodKind,
    pub sig: Func,
    pub opted_in: bool,
    pub async_transform: Option<AsyncTransform>,
    /// Constructors of shared-pointer-wrapped classes use `make_shared`
    pub shared_ctor: bool,
}

impl Method {
    /// Stable identifier of the native function
    pub fn id(&self) -> String {
        format!("{}_{}", self.class_name, self.unique_name)
    }

    /// The id as a valid C++ identifier
    pub fn cpp_ident(&self) -> String {
        self.id().replace('$', "_dollar_")
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, MethodKind::Static | MethodKind::Constructor)
    }

    pub fn is_property(&self) -> bool {
        self.kind == MethodKind::Property
    }

    /// The signature a managed caller sees
    pub fn surface_sig(&self) -> &Func {
        self.async_transform
            .as_ref()
            .map(|t| &t.sig)
            .unwrap_or(&self.sig)
    }

    /// C++ expression invoking the method
    pub fn call(&self, site: &CallSite, args: &[String]) -> String {
        let args = args.join(", ");
        match self.kind {
            MethodKind::Instance => format!("{}.{}({})", site.self_expr, self.cpp_name, args),
            MethodKind::Property => format!("{}.{}()", site.self_expr, self.cpp_name),
            MethodKind::Static => format!("{}::{}({})", self.class_cpp_name, self.cpp_name, args),
            MethodKind::Constructor if self.shared_ctor => {
                format!("std::make_shared<{}>({})", self.class_cpp_name, args)
            }
            MethodKind::Constructor => format!("{}({})", self.class_cpp_name, args),
            MethodKind::Intrinsic(Intrinsic::Addr) => format!(
                "double(reinterpret_cast<std::uintptr_t>(&({})))",
                site.self_expr
            ),
            MethodKind::Intrinsic(Intrinsic::ResetSharedPtr) => format!("{}.reset()", site.handle_expr),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Struct {
    pub id: StructId,
    pub name: String,
    pub cpp_name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub cpp_name: String,
    pub ty: Type,
    pub required: bool,
    pub default: Option<String>,
    pub opted_in: bool,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub id: EnumId,
    pub name: String,
    pub cpp_name: String,
    pub enumerators: Vec<Enumerator>,
}

#[derive(Debug, Clone)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct KeyType {
    pub id: KeyTypeId,
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Opaque {
    pub id: OpaqueId,
    pub name: String,
}

/// Concrete types a `Mixed` value may hold
#[derive(Debug, Clone, Default)]
pub struct MixedInfo {
    pub getters: Vec<MixedGetter>,
    pub unused_data_types: Vec<String>,
    /// Types a `Mixed` can be constructed from
    pub ctors: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct MixedGetter {
    /// `DataType::Type` tag
    pub data_type: String,
    pub getter: String,
    pub ty: Type,
}

impl BoundSpec {
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn record(&self, id: StructId) -> &Struct {
        &self.records[id.0]
    }

    pub fn enumeration(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn key_type(&self, id: KeyTypeId) -> &KeyType {
        &self.key_types[id.0]
    }

    pub fn opaque(&self, id: OpaqueId) -> &Opaque {
        &self.opaque_types[id.0]
    }

    /// Topmost ancestor of a class
    pub fn root_base(&self, id: ClassId) -> ClassId {
        let mut current = id;
        while let Some(base) = self.class(current).base {
            current = base;
        }
        current
    }

    pub fn handle_owner(&self, id: ClassId) -> HandleOwner {
        match self.class(id).base {
            None => HandleOwner::Root,
            Some(_) => HandleOwner::Delegated(self.root_base(id)),
        }
    }

    /// Readable name of a type, for diagnostics
    pub fn describe(&self, ty: &Type) -> String {
        self.cpp_type(ty).unwrap_or_else(|_| format!("{:?}", ty))
    }

    /// C++ spelling of a type
    pub fn cpp_type(&self, ty: &Type) -> Result<String> {
        Ok(match ty {
            Type::Primitive(p) => p.cpp_name().to_string(),
            Type::Pointer(inner) => format!("{}*", self.cpp_type(inner)?),
            Type::Ref(inner) => format!("{}&", self.cpp_type(inner)?),
            Type::RRef(inner) => format!("{}&&", self.cpp_type(inner)?),
            Type::Const(inner) => format!("const {}", self.cpp_type(inner)?),
            Type::KeyType(id) => self.key_type(*id).name.clone(),
            Type::Opaque(id) => self.opaque(*id).name.clone(),
            Type::Enum(id) => self.enumeration(*id).cpp_name.clone(),
            Type::Class(id) => self.class(*id).cpp_name.clone(),
            Type::Struct(id) => self.record(*id).cpp_name.clone(),
            Type::Template(t) => match t.kind {
                // Markers for the generator; the C++ type is the wrapped one.
                TemplateKind::Nullable | TemplateKind::IgnoreArgument => self.cpp_type(&t.args[0])?,
                TemplateKind::AsyncCallback => {
                    format!("{}<{}>", TemplateKind::UniqueFunction.cpp_name(), self.cpp_type(&t.args[0])?)
                }
                TemplateKind::AsyncResult => {
                    return Err(BindgenError::NoCppType(format!("{:?}", ty)))
                }
                _ => {
                    let args = t
                        .args
                        .iter()
                        .map(|a| self.cpp_type(a))
                        .collect::<Result<Vec<_>>>()?;
                    format!("{}<{}>", t.kind.cpp_name(), args.join(", "))
                }
            },
            Type::Func(f) => {
                let args = f
                    .args
                    .iter()
                    .map(|a| self.cpp_type(&a.ty))
                    .collect::<Result<Vec<_>>>()?;
                format!("{}({})", self.cpp_type(&f.ret)?, args.join(", "))
            }
        })
    }
}

#[cfg(test)]
impl BoundSpec {
    pub fn class_by_name(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn record_by_name(&self, name: &str) -> Option<&Struct> {
        self.records.iter().find(|r| r.name == name)
    }
}

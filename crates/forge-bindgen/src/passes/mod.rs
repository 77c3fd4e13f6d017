//! Managed-surface naming passes
//!
//! [`JsView`] decorates a [`BoundSpec`] with display names for the managed
//! side (PascalCase types and enumerators, camelCase members) and adds the
//! intrinsic members of shared-pointer-wrapped root classes. The bound
//! model is only borrowed, so every emitter can build its own view and
//! repeated builds produce identical results.

use crate::error::{BindgenError, Result};
use crate::model::{
    BoundSpec, Class, ClassId, Enum, EnumId, Field, Func, Intrinsic, Method, MethodKind,
    Primitive, Struct, StructId, Type,
};
use heck::{ToLowerCamelCase, ToUpperCamelCase};
use std::borrow::Cow;
use std::collections::HashMap;

/// Display name of a type, class, record or enumerator
pub fn pascal_case(name: &str) -> String {
    name.to_upper_camel_case()
}

/// Display name of a method, property or field
///
/// A leading `get_` is dropped, so `get_schema` becomes `schema`.
pub fn member_name(name: &str) -> String {
    if name.starts_with('$') {
        return name.to_string();
    }
    let stripped = match name.strip_prefix("get_") {
        Some(rest) if !rest.is_empty() => rest,
        _ => name,
    };
    stripped.to_lower_camel_case()
}

/// A method with its managed name
#[derive(Debug, Clone)]
pub struct JsMethod<'s> {
    pub method: Cow<'s, Method>,
    pub js_name: String,
}

impl<'s> std::ops::Deref for JsMethod<'s> {
    type Target = Method;

    fn deref(&self) -> &Method {
        &self.method
    }
}

#[derive(Debug, Clone)]
pub struct JsClass<'s> {
    pub class: &'s Class,
    pub js_name: String,
    /// Declared methods followed by synthesized intrinsics
    pub methods: Vec<JsMethod<'s>>,
}

impl<'s> std::ops::Deref for JsClass<'s> {
    type Target = Class;

    fn deref(&self) -> &Class {
        self.class
    }
}

#[derive(Debug, Clone)]
pub struct JsField<'s> {
    pub field: &'s Field,
    pub js_name: String,
}

#[derive(Debug, Clone)]
pub struct JsRecord<'s> {
    pub record: &'s Struct,
    pub js_name: String,
    pub fields: Vec<JsField<'s>>,
}

#[derive(Debug, Clone)]
pub struct JsEnumerator {
    pub js_name: String,
    pub cpp_name: String,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct JsEnum<'s> {
    pub enumeration: &'s Enum,
    pub js_name: String,
    pub enumerators: Vec<JsEnumerator>,
}

/// Named view of a bound model for managed-side emitters
#[derive(Debug, Clone)]
pub struct JsView<'s> {
    pub spec: &'s BoundSpec,
    pub classes: Vec<JsClass<'s>>,
    pub records: Vec<JsRecord<'s>>,
    pub enums: Vec<JsEnum<'s>>,
}

fn intrinsic(class: &Class, which: Intrinsic) -> Method {
    let ret = match which {
        Intrinsic::Addr => Primitive::Double,
        Intrinsic::ResetSharedPtr => Primitive::Void,
    };
    Method {
        class: class.id,
        class_name: class.name.clone(),
        class_cpp_name: class.cpp_name.clone(),
        name: which.name().to_string(),
        unique_name: which.name().to_string(),
        cpp_name: which.name().to_string(),
        kind: MethodKind::Intrinsic(which),
        sig: Func {
            ret: Box::new(Type::Primitive(ret)),
            args: Vec::new(),
            is_const: which == Intrinsic::Addr,
            noexcept: false,
            off_thread: false,
        },
        opted_in: true,
        async_transform: None,
        shared_ctor: false,
    }
}

impl<'s> JsView<'s> {
    /// Decorate `spec` with managed names
    pub fn new(spec: &'s BoundSpec) -> Result<Self> {
        let mut classes = Vec::with_capacity(spec.classes.len());
        for class in &spec.classes {
            let mut methods: Vec<JsMethod<'s>> = class
                .methods
                .iter()
                .map(|m| JsMethod {
                    js_name: member_name(&m.unique_name),
                    method: Cow::Borrowed(m),
                })
                .collect();

            if class.is_shared() && class.base.is_none() {
                for which in [Intrinsic::Addr, Intrinsic::ResetSharedPtr] {
                    if !class.methods.iter().any(|m| m.unique_name == which.name()) {
                        methods.push(JsMethod {
                            js_name: which.name().to_string(),
                            method: Cow::Owned(intrinsic(class, which)),
                        });
                    }
                }
            }

            let mut seen: HashMap<(&str, bool), &str> = HashMap::new();
            for m in &methods {
                let key = (m.js_name.as_str(), m.is_static());
                if seen.insert(key, m.unique_name.as_str()).is_some() {
                    return Err(BindgenError::DuplicateDisplayName {
                        class: class.name.clone(),
                        name: m.js_name.clone(),
                    });
                }
            }

            classes.push(JsClass {
                class,
                js_name: pascal_case(&class.name),
                methods,
            });
        }

        let records = spec
            .records
            .iter()
            .map(|record| JsRecord {
                record,
                js_name: pascal_case(&record.name),
                fields: record
                    .fields
                    .iter()
                    .map(|field| JsField {
                        field,
                        js_name: member_name(&field.name),
                    })
                    .collect(),
            })
            .collect();

        let enums = spec
            .enums
            .iter()
            .map(|enumeration| JsEnum {
                enumeration,
                js_name: pascal_case(&enumeration.name),
                enumerators: enumeration
                    .enumerators
                    .iter()
                    .map(|e| JsEnumerator {
                        js_name: pascal_case(&e.name),
                        cpp_name: e.name.clone(),
                        value: e.value,
                    })
                    .collect(),
            })
            .collect();

        tracing::debug!(classes = spec.classes.len(), "managed naming view built");

        Ok(Self {
            spec,
            classes,
            records,
            enums,
        })
    }

    pub fn class(&self, id: ClassId) -> &JsClass<'s> {
        &self.classes[id.0]
    }

    pub fn record(&self, id: StructId) -> &JsRecord<'s> {
        &self.records[id.0]
    }

    pub fn enumeration(&self, id: EnumId) -> &JsEnum<'s> {
        &self.enums[id.0]
    }

    /// Managed name of the class owning the native handle
    pub fn handle_owner_name(&self, id: ClassId) -> &str {
        &self.class(self.spec.root_base(id)).js_name
    }

    /// Managed name of a named type (class, record, enum, key or opaque type)
    pub fn named_type(&self, ty: &Type) -> Option<String> {
        Some(match ty {
            Type::Class(id) => self.class(*id).js_name.clone(),
            Type::Struct(id) => self.record(*id).js_name.clone(),
            Type::Enum(id) => self.enumeration(*id).js_name.clone(),
            Type::KeyType(id) => pascal_case(&self.spec.key_type(*id).name),
            Type::Opaque(id) => pascal_case(&self.spec.opaque(*id).name),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bind_model;
    use crate::spec::RawSpec;
    use pretty_assertions::assert_eq;

    fn bound(toml: &str) -> BoundSpec {
        let base = "primitives = [\"void\", \"bool\", \"int32_t\", \"double\", \"std::string\"]\n[mixedInfo]\n";
        let raw = RawSpec::from_toml(&format!("{}{}", base, toml)).unwrap();
        bind_model(&raw, None).unwrap()
    }

    #[test]
    fn test_member_names() {
        assert_eq!(member_name("get_foo"), "foo");
        assert_eq!(member_name("get_schema_version"), "schemaVersion");
        assert_eq!(member_name("is_closed"), "isClosed");
        assert_eq!(member_name("get_"), "get");
        assert_eq!(member_name("$addr"), "$addr");
    }

    #[test]
    fn test_pascal_case_is_idempotent() {
        for name in ["FooBar", "foo_bar", "SHARED", "ObjectId", "x"] {
            let once = pascal_case(name);
            assert_eq!(pascal_case(&once), once);
        }
    }

    #[test]
    fn test_intrinsics_on_shared_roots() {
        let spec = bound(
            "[classes.Foo]\nsharedPtrWrapped = \"SharedFoo\"\nmethods = { get_bar = \"() -> bool\" }\n[classes.Plain]\n",
        );
        let view = JsView::new(&spec).unwrap();

        let foo = &view.classes[0];
        let names: Vec<&str> = foo.methods.iter().map(|m| m.js_name.as_str()).collect();
        assert_eq!(names, vec!["bar", "$addr", "$resetSharedPtr"]);
        assert_eq!(foo.methods[1].id(), "Foo_$addr");
        assert_eq!(foo.methods[1].cpp_ident(), "Foo__dollar_addr");
        assert!(matches!(
            foo.methods[2].kind,
            MethodKind::Intrinsic(Intrinsic::ResetSharedPtr)
        ));

        let plain = &view.classes[1];
        assert!(plain.methods.is_empty());
    }

    #[test]
    fn test_view_is_repeatable() {
        let spec = bound("[classes.Foo]\nsharedPtrWrapped = \"SharedFoo\"\n[enums.Color]\nvalues = [\"dark_red\", \"Blue\"]\n");
        let first = JsView::new(&spec).unwrap();
        let second = JsView::new(&spec).unwrap();
        assert_eq!(first.classes[0].methods.len(), second.classes[0].methods.len());
        assert_eq!(spec.classes[0].methods.len(), 0);

        let names: Vec<&str> = first.enums[0]
            .enumerators
            .iter()
            .map(|e| e.js_name.as_str())
            .collect();
        assert_eq!(names, vec!["DarkRed", "Blue"]);
    }

    #[test]
    fn test_display_name_collisions() {
        let spec = bound("[classes.Foo.methods]\nget_bar = \"() -> bool\"\nbar = \"() -> bool\"\n");
        assert!(matches!(
            JsView::new(&spec),
            Err(BindgenError::DuplicateDisplayName { ref name, .. }) if name == "bar"
        ));

        // A static and an instance member may share a name.
        let spec = bound(
            "[classes.Foo.methods]\nbar = \"() -> bool\"\n[classes.Foo.staticMethods]\nget_bar = \"() -> bool\"\n",
        );
        assert!(JsView::new(&spec).is_ok());
    }
}

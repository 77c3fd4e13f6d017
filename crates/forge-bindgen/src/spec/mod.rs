//! Interface model
//!
//! [`RawSpec`] is the declarative description of the native API surface:
//! primitives, templates, records, enums and classes, with every signature
//! already parsed into a [`TypeSpec`]. It carries no behavior; the bound
//! model builder in [`crate::model`] resolves it.

pub mod opt_in;
pub mod relaxed;
pub mod type_parser;

pub use opt_in::{ClassOptIn, OptInSpec, RecordOptIn};
pub use relaxed::{read_document, RelaxedSpec};
pub use type_parser::{parse_function, parse_type, ArgSpec, FunctionSpec, TypeParseError, TypeSpec};

use crate::error::{BindgenError, Result};
use indexmap::IndexMap;
use relaxed::{
    RelaxedArity, RelaxedClass, RelaxedEnumValues, RelaxedField, RelaxedMethod, RelaxedOverloads,
};
use std::path::Path;

/// Declared arity of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Variadic => write!(f, "*"),
        }
    }
}

/// The normalized interface specification
#[derive(Debug, Clone, Default)]
pub struct RawSpec {
    pub headers: Vec<String>,
    pub primitives: Vec<String>,
    pub templates: IndexMap<String, Arity>,
    pub opaque_types: Vec<String>,
    pub mixed_info: MixedInfoSpec,
    pub enums: IndexMap<String, EnumSpec>,
    pub records: IndexMap<String, RecordSpec>,
    pub classes: IndexMap<String, ClassSpec>,
    pub type_aliases: IndexMap<String, TypeSpec>,
    pub key_types: IndexMap<String, TypeSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct MixedInfoSpec {
    /// Data type tag -> stored type and the `Mixed` getter returning it
    pub data_types: IndexMap<String, MixedDataTypeSpec>,
    pub unused_data_types: Vec<String>,
    pub extra_ctors: Vec<TypeSpec>,
}

#[derive(Debug, Clone)]
pub struct MixedDataTypeSpec {
    pub ty: TypeSpec,
    pub getter: String,
}

#[derive(Debug, Clone)]
pub struct EnumSpec {
    pub cpp_name: String,
    pub values: Vec<(String, i64)>,
}

#[derive(Debug, Clone)]
pub struct RecordSpec {
    pub cpp_name: String,
    pub fields: IndexMap<String, FieldSpec>,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub ty: TypeSpec,
    pub cpp_name: String,
    /// C++ initializer text, if the field has a default
    pub default: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassSpec {
    pub cpp_name: String,
    pub iterable: Option<TypeSpec>,
    pub needs_deref: bool,
    /// Name of the `std::shared_ptr<Self>` alias, when instances are held by shared pointer
    pub shared_ptr_wrapped: Option<String>,
    pub is_abstract: bool,
    pub base: Option<String>,
    pub constructors: IndexMap<String, FunctionSpec>,
    pub methods: IndexMap<String, Vec<MethodSpec>>,
    pub static_methods: IndexMap<String, Vec<MethodSpec>>,
    pub properties: IndexMap<String, TypeSpec>,
}

#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub sig: FunctionSpec,
    pub suffix: Option<String>,
    pub cpp_name: Option<String>,
}

impl RawSpec {
    /// Load and merge spec files in order
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut merged = RelaxedSpec::default();
        for path in paths {
            tracing::debug!(path = %path.as_ref().display(), "reading spec");
            merged.merge(RelaxedSpec::from_path(path.as_ref())?)?;
        }
        Self::normalize(merged)
    }

    /// Parse a single TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        Self::normalize(RelaxedSpec::from_toml(text)?)
    }

    /// Normalize a relaxed document, parsing every type string
    pub fn normalize(relaxed: RelaxedSpec) -> Result<Self> {
        let mixed = relaxed.mixed_info.ok_or(BindgenError::MissingMixedInfo)?;

        let mut templates = IndexMap::new();
        for (name, arity) in relaxed.templates {
            let arity = match arity {
                RelaxedArity::Count(n) => Arity::Fixed(n),
                RelaxedArity::Variadic(star) if star == "*" => Arity::Variadic,
                RelaxedArity::Variadic(other) => {
                    return Err(BindgenError::InvalidSpec(format!(
                        "template {} has arity '{}', expected a count or '*'",
                        name, other
                    )))
                }
            };
            templates.insert(name, arity);
        }

        let mut data_types = IndexMap::new();
        for (tag, info) in mixed.data_types {
            data_types.insert(
                tag,
                MixedDataTypeSpec {
                    ty: parse_type(&info.ty)?,
                    getter: info.getter,
                },
            );
        }
        let mixed_info = MixedInfoSpec {
            data_types,
            unused_data_types: mixed.unused_data_types,
            extra_ctors: mixed
                .extra_ctors
                .iter()
                .map(|t| parse_type(t))
                .collect::<std::result::Result<Vec<_>, TypeParseError>>()?,
        };

        let mut enums = IndexMap::new();
        for (name, enm) in relaxed.enums {
            let values = match enm.values {
                RelaxedEnumValues::List(names) => names
                    .into_iter()
                    .enumerate()
                    .map(|(i, n)| (n, i as i64))
                    .collect(),
                RelaxedEnumValues::Map(map) => map.into_iter().collect(),
            };
            let cpp_name = enm.cpp_name.unwrap_or_else(|| name.clone());
            enums.insert(name, EnumSpec { cpp_name, values });
        }

        let mut records = IndexMap::new();
        for (name, record) in relaxed.records {
            let mut fields = IndexMap::new();
            for (field_name, field) in record.fields {
                let spec = match field {
                    RelaxedField::Type(ty) => FieldSpec {
                        ty: parse_type(&ty)?,
                        cpp_name: field_name.clone(),
                        default: None,
                    },
                    RelaxedField::Full(table) => FieldSpec {
                        ty: parse_type(&table.ty)?,
                        cpp_name: table.cpp_name.unwrap_or_else(|| field_name.clone()),
                        default: table.default.map(|value| match value {
                            serde_json::Value::String(text) => text,
                            other => other.to_string(),
                        }),
                    },
                };
                fields.insert(field_name, spec);
            }
            let cpp_name = record.cpp_name.unwrap_or_else(|| name.clone());
            records.insert(name, RecordSpec { cpp_name, fields });
        }

        let mut classes = IndexMap::new();
        for (name, class) in relaxed.classes {
            let spec = normalize_class(&name, class, false)?;
            classes.insert(name, spec);
        }
        for (name, interface) in relaxed.interfaces {
            if classes.contains_key(&name) {
                return Err(BindgenError::DuplicateType(name));
            }
            let spec = normalize_class(&name, interface, true)?;
            classes.insert(name, spec);
        }

        let type_aliases = relaxed
            .type_aliases
            .into_iter()
            .map(|(name, ty)| -> Result<(String, TypeSpec)> { Ok((name, parse_type(&ty)?)) })
            .collect::<Result<_>>()?;
        let key_types = relaxed
            .key_types
            .into_iter()
            .map(|(name, ty)| -> Result<(String, TypeSpec)> { Ok((name, parse_type(&ty)?)) })
            .collect::<Result<_>>()?;

        Ok(RawSpec {
            headers: relaxed.headers,
            primitives: relaxed.primitives,
            templates,
            opaque_types: relaxed.opaque_types,
            mixed_info,
            enums,
            records,
            classes,
            type_aliases,
            key_types,
        })
    }
}

fn normalize_methods(
    methods: IndexMap<String, RelaxedOverloads>,
) -> Result<IndexMap<String, Vec<MethodSpec>>> {
    let mut out = IndexMap::new();
    for (name, overloads) in methods {
        let mut specs = Vec::new();
        for overload in overloads.into_vec() {
            specs.push(match overload {
                RelaxedMethod::Sig(sig) => MethodSpec {
                    sig: parse_function(&sig)?,
                    suffix: None,
                    cpp_name: None,
                },
                RelaxedMethod::Full(table) => MethodSpec {
                    sig: parse_function(&table.sig)?,
                    suffix: table.suffix,
                    cpp_name: table.cpp_name,
                },
            });
        }
        out.insert(name, specs);
    }
    Ok(out)
}

fn normalize_class(name: &str, class: RelaxedClass, is_interface: bool) -> Result<ClassSpec> {
    if is_interface && class.shared_ptr_wrapped.is_none() {
        return Err(BindgenError::InvalidSpec(format!(
            "interface {} must declare sharedPtrWrapped",
            name
        )));
    }

    let mut constructors = IndexMap::new();
    for (ctor_name, sig) in class.constructors {
        let func = parse_function(&sig)?;
        if !func.ret.is_void() {
            return Err(BindgenError::InvalidSignature {
                method: format!("{}::{}", name, ctor_name),
                reason: "constructors must not declare a return type".to_string(),
            });
        }
        constructors.insert(ctor_name, func);
    }

    let properties = class
        .properties
        .into_iter()
        .map(|(prop, ty)| -> Result<(String, TypeSpec)> { Ok((prop, parse_type(&ty)?)) })
        .collect::<Result<_>>()?;

    Ok(ClassSpec {
        cpp_name: class.cpp_name.unwrap_or_else(|| name.to_string()),
        iterable: class.iterable.as_deref().map(parse_type).transpose()?,
        // Holding a shared_ptr means `self` needs one more dereference.
        needs_deref: class.needs_deref || class.shared_ptr_wrapped.is_some(),
        shared_ptr_wrapped: class.shared_ptr_wrapped,
        is_abstract: class.is_abstract,
        base: class.base,
        constructors,
        methods: normalize_methods(class.methods)?,
        static_methods: normalize_methods(class.static_methods)?,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = "[mixedInfo]\n";

    #[test]
    fn test_missing_mixed_info_is_an_error() {
        assert!(matches!(
            RawSpec::from_toml("primitives = [\"bool\"]"),
            Err(BindgenError::MissingMixedInfo)
        ));
    }

    #[test]
    fn test_enum_list_becomes_index_values() {
        let spec = RawSpec::from_toml(&format!(
            "{}[enums.Color]\nvalues = [\"Red\", \"Green\", \"Blue\"]\n",
            MINIMAL
        ))
        .unwrap();
        let color = &spec.enums["Color"];
        assert_eq!(color.cpp_name, "Color");
        assert_eq!(
            color.values,
            vec![("Red".into(), 0), ("Green".into(), 1), ("Blue".into(), 2)]
        );
    }

    #[test]
    fn test_field_defaults_become_initializer_text() {
        let spec = RawSpec::from_toml(&format!(
            "{}[records.Config.fields]\npath = \"std::string\"\ncount = {{ type = \"int32_t\", default = 3 }}\nmode = {{ type = \"Mode\", default = \"Mode::Auto\", cppName = \"schema_mode\" }}\n",
            MINIMAL
        ))
        .unwrap();
        let fields = &spec.records["Config"].fields;
        assert_eq!(fields["path"].default, None);
        assert_eq!(fields["count"].default.as_deref(), Some("3"));
        assert_eq!(fields["mode"].default.as_deref(), Some("Mode::Auto"));
        assert_eq!(fields["mode"].cpp_name, "schema_mode");
    }

    #[test]
    fn test_shared_ptr_wrapped_implies_deref() {
        let spec = RawSpec::from_toml(&format!(
            "{}[classes.Realm]\nsharedPtrWrapped = \"SharedRealm\"\n",
            MINIMAL
        ))
        .unwrap();
        assert!(spec.classes["Realm"].needs_deref);
    }

    #[test]
    fn test_constructor_must_return_void() {
        let err = RawSpec::from_toml(&format!(
            "{}[classes.Foo.constructors]\nmake = \"() -> int32_t\"\n",
            MINIMAL
        ))
        .unwrap_err();
        assert!(matches!(err, BindgenError::InvalidSignature { .. }));
    }

    #[test]
    fn test_interfaces_require_shared_ptr_alias() {
        let err = RawSpec::from_toml(&format!("{}[interfaces.Logger]\n", MINIMAL)).unwrap_err();
        assert!(err.to_string().contains("sharedPtrWrapped"));

        let spec = RawSpec::from_toml(&format!(
            "{}[interfaces.Logger]\nsharedPtrWrapped = \"SharedLogger\"\n",
            MINIMAL
        ))
        .unwrap();
        assert_eq!(
            spec.classes["Logger"].shared_ptr_wrapped.as_deref(),
            Some("SharedLogger")
        );
    }

    #[test]
    fn test_bad_template_arity_marker() {
        let err = RawSpec::from_toml(&format!("{}[templates]\n\"std::tuple\" = \"many\"\n", MINIMAL))
            .unwrap_err();
        assert!(matches!(err, BindgenError::InvalidSpec(_)));
    }
}

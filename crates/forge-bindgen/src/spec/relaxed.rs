//! The on-disk shape of a spec document
//!
//! Spec files are written for humans, so most entries accept a short form
//! (a bare signature string) and a long form (a table with extra options).
//! These types mirror that flexibility; [`super::RawSpec`] is the normalized
//! form the rest of the crate consumes.

use crate::error::{BindgenError, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A spec document exactly as written
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelaxedSpec {
    #[serde(default)]
    pub mixed_info: Option<RelaxedMixedInfo>,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub primitives: Vec<String>,
    #[serde(default)]
    pub templates: IndexMap<String, RelaxedArity>,
    #[serde(default)]
    pub opaque_types: Vec<String>,
    #[serde(default)]
    pub enums: IndexMap<String, RelaxedEnum>,
    #[serde(default)]
    pub records: IndexMap<String, RelaxedRecord>,
    #[serde(default)]
    pub classes: IndexMap<String, RelaxedClass>,
    #[serde(default)]
    pub interfaces: IndexMap<String, RelaxedClass>,
    #[serde(default)]
    pub type_aliases: IndexMap<String, String>,
    #[serde(default)]
    pub key_types: IndexMap<String, String>,
}

/// Template arity: a count, or `"*"` for variadic
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RelaxedArity {
    Count(usize),
    Variadic(String),
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelaxedMixedInfo {
    #[serde(default)]
    pub data_types: IndexMap<String, RelaxedMixedDataType>,
    #[serde(default)]
    pub unused_data_types: Vec<String>,
    #[serde(default)]
    pub extra_ctors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaxedMixedDataType {
    #[serde(rename = "type")]
    pub ty: String,
    pub getter: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelaxedEnum {
    #[serde(default)]
    pub cpp_name: Option<String>,
    pub values: RelaxedEnumValues,
}

/// Enumerators as a list (values are indexes) or as an ordered map
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RelaxedEnumValues {
    List(Vec<String>),
    Map(IndexMap<String, i64>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelaxedRecord {
    #[serde(default)]
    pub cpp_name: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, RelaxedField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RelaxedField {
    Type(String),
    Full(RelaxedFieldTable),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelaxedFieldTable {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub cpp_name: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelaxedClass {
    #[serde(default)]
    pub cpp_name: Option<String>,
    #[serde(default)]
    pub iterable: Option<String>,
    #[serde(default)]
    pub needs_deref: bool,
    #[serde(default)]
    pub shared_ptr_wrapped: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub constructors: IndexMap<String, String>,
    #[serde(default)]
    pub methods: IndexMap<String, RelaxedOverloads>,
    #[serde(default)]
    pub static_methods: IndexMap<String, RelaxedOverloads>,
    #[serde(default)]
    pub properties: IndexMap<String, String>,
}

/// One method or a list of overloads
///
/// `Many` comes first: serde will fill a struct from a sequence by
/// position, so a list of signatures would otherwise bind as one table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RelaxedOverloads {
    Many(Vec<RelaxedMethod>),
    One(RelaxedMethod),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RelaxedMethod {
    Sig(String),
    Full(RelaxedMethodTable),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelaxedMethodTable {
    pub sig: String,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub cpp_name: Option<String>,
}

impl RelaxedOverloads {
    pub fn into_vec(self) -> Vec<RelaxedMethod> {
        match self {
            RelaxedOverloads::One(method) => vec![method],
            RelaxedOverloads::Many(methods) => methods,
        }
    }
}

/// Read a TOML or JSON document, chosen by file extension
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| BindgenError::SpecFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let parsed = if is_json {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    } else {
        toml::from_str(&text).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| BindgenError::SpecFile {
        path: path.to_path_buf(),
        message,
    })
}

fn merge_map<V>(
    kind: &'static str,
    into: &mut IndexMap<String, V>,
    from: IndexMap<String, V>,
) -> Result<()> {
    for (name, value) in from {
        if into.contains_key(&name) {
            return Err(BindgenError::DuplicateDeclaration { kind, name });
        }
        into.insert(name, value);
    }
    Ok(())
}

fn merge_list(into: &mut Vec<String>, from: Vec<String>) {
    for item in from {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

impl RelaxedSpec {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BindgenError::InvalidSpec(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        read_document(path)
    }

    /// Merge another document into this one
    ///
    /// Named declarations must be unique across documents; lists are
    /// concatenated without duplicates.
    pub fn merge(&mut self, other: RelaxedSpec) -> Result<()> {
        match (&self.mixed_info, other.mixed_info) {
            (Some(_), Some(_)) => {
                return Err(BindgenError::DuplicateDeclaration {
                    kind: "mixedInfo",
                    name: "mixedInfo".to_string(),
                })
            }
            (None, Some(info)) => self.mixed_info = Some(info),
            _ => {}
        }

        merge_list(&mut self.headers, other.headers);
        merge_list(&mut self.primitives, other.primitives);
        merge_list(&mut self.opaque_types, other.opaque_types);
        merge_map("template", &mut self.templates, other.templates)?;
        merge_map("enum", &mut self.enums, other.enums)?;
        merge_map("record", &mut self.records, other.records)?;
        merge_map("class", &mut self.classes, other.classes)?;
        merge_map("interface", &mut self.interfaces, other.interfaces)?;
        merge_map("type alias", &mut self.type_aliases, other.type_aliases)?;
        merge_map("key type", &mut self.key_types, other.key_types)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_and_long_forms() {
        let spec = RelaxedSpec::from_toml(
            r#"
            primitives = ["bool", "int32_t"]

            [templates]
            "std::vector" = 1
            "std::tuple" = "*"

            [enums.Color]
            values = ["Red", "Green"]

            [enums.Mode]
            cppName = "realm::Mode"
            values = { Immutable = 1, ReadOnly = 4 }

            [records.Options.fields]
            count = "int32_t"
            flag = { type = "bool", default = true }

            [classes.Foo.methods]
            bar = "(x: int32_t) -> bool"
            baz = [{ sig = "()", suffix = "none" }, { sig = "(x: int32_t)", suffix = "int" }]
            "#,
        )
        .unwrap();

        assert_eq!(spec.templates["std::tuple"], RelaxedArity::Variadic("*".into()));
        assert!(matches!(spec.enums["Color"].values, RelaxedEnumValues::List(ref v) if v.len() == 2));
        assert!(matches!(spec.enums["Mode"].values, RelaxedEnumValues::Map(ref m) if m["ReadOnly"] == 4));
        assert!(matches!(spec.records["Options"].fields["flag"], RelaxedField::Full(_)));

        let foo = &spec.classes["Foo"];
        assert!(matches!(foo.methods["bar"], RelaxedOverloads::One(RelaxedMethod::Sig(_))));
        assert_eq!(foo.methods["baz"].clone().into_vec().len(), 2);
    }

    #[test]
    fn test_overloads_given_as_plain_signatures() {
        let spec = RelaxedSpec::from_toml(
            "[classes.Foo.methods]\nf = [\"()\", \"(x: bool)\"]\ng = [\"(a: bool, b: bool)\"]\n",
        )
        .unwrap();

        let foo = &spec.classes["Foo"];
        let sigs = |name: &str| -> Vec<String> {
            foo.methods[name]
                .clone()
                .into_vec()
                .into_iter()
                .map(|m| match m {
                    RelaxedMethod::Sig(sig) => sig,
                    RelaxedMethod::Full(table) => panic!("bound as a table: {:?}", table),
                })
                .collect()
        };
        assert_eq!(sigs("f"), vec!["()", "(x: bool)"]);
        assert_eq!(sigs("g"), vec!["(a: bool, b: bool)"]);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = RelaxedSpec::from_toml("[classes.Foo]\nbogus = true\n").unwrap_err();
        assert!(err.to_string().contains("Invalid spec"));
    }

    #[test]
    fn test_merge_rejects_duplicates() {
        let mut a = RelaxedSpec::from_toml("primitives = [\"bool\"]\n[classes.Foo]\n").unwrap();
        let b = RelaxedSpec::from_toml("primitives = [\"bool\", \"double\"]\n[classes.Bar]\n").unwrap();
        a.merge(b).unwrap();
        assert_eq!(a.primitives, vec!["bool", "double"]);
        assert_eq!(a.classes.len(), 2);

        let c = RelaxedSpec::from_toml("[classes.Foo]\n").unwrap();
        let err = a.merge(c).unwrap_err();
        assert!(matches!(err, BindgenError::DuplicateDeclaration { kind: "class", .. }));
    }

    #[test]
    fn test_read_document_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("spec.json");
        fs::write(
            &json,
            r#"{"headers": ["realm/object.hpp"], "typeAliases": {"Str": "std::string"}}"#,
        )
        .unwrap();
        let spec = RelaxedSpec::from_path(&json).unwrap();
        assert_eq!(spec.headers, vec!["realm/object.hpp"]);
        assert_eq!(spec.type_aliases["Str"], "std::string");

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            RelaxedSpec::from_path(&missing),
            Err(BindgenError::SpecFile { .. })
        ));
    }
}

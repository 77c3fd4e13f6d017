//! Per-target opt-in lists
//!
//! Members missing from the list are still declared (as deprecated) but get
//! no runtime binding.

use crate::error::Result;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptInSpec {
    #[serde(default)]
    pub classes: IndexMap<String, ClassOptIn>,
    #[serde(default)]
    pub records: IndexMap<String, RecordOptIn>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassOptIn {
    /// Unique method names (`name` or `name_suffix`)
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordOptIn {
    #[serde(default)]
    pub fields: Vec<String>,
}

impl OptInSpec {
    pub fn from_path(path: &Path) -> Result<Self> {
        super::read_document(path)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| crate::error::BindgenError::InvalidSpec(e.to_string()))
    }

    pub fn has_method(&self, class: &str, unique_name: &str) -> bool {
        self.classes
            .get(class)
            .map(|c| c.methods.iter().any(|m| m == unique_name))
            .unwrap_or(false)
    }

    pub fn has_field(&self, record: &str, field: &str) -> bool {
        self.records
            .get(record)
            .map(|r| r.fields.iter().any(|f| f == field))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let opt_in = OptInSpec::from_toml(
            "[classes.Realm]\nmethods = [\"open\", \"get_schema\"]\n[records.Config]\nfields = [\"path\"]\n",
        )
        .unwrap();
        assert!(opt_in.has_method("Realm", "open"));
        assert!(!opt_in.has_method("Realm", "close"));
        assert!(!opt_in.has_method("Results", "open"));
        assert!(opt_in.has_field("Config", "path"));
        assert!(!opt_in.has_field("Config", "schema"));
    }
}

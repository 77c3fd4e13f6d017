//! `bindgen.toml` project configuration
//!
//! ```toml
//! spec = ["spec.toml", "spec.extra.toml"]
//! opt_in = "opt-in.toml"
//! output = "generated"
//! targets = ["typescript", "node-wrapper", "node"]
//!
//! [formatters]
//! cpp = "clang-format --assume-filename={path}"
//! typescript = "prettier --stdin-filepath {path}"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use anyhow::{Context, Result};
use forge_bindgen::Target;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "bindgen.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub spec: Vec<PathBuf>,
    pub opt_in: Option<PathBuf>,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub formatters: Formatters,
}

/// Formatter command lines, by kind of generated file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Formatters {
    pub cpp: Option<String>,
    pub typescript: Option<String>,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("parsing config at {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolved_against(base))
    }

    /// Read `path` if given, otherwise `bindgen.toml` when it exists
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None if Path::new(DEFAULT_CONFIG).is_file() => Self::from_path(Path::new(DEFAULT_CONFIG)),
            None => Ok(Self::default()),
        }
    }

    fn resolved_against(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        self.spec = self.spec.into_iter().map(resolve).collect();
        self.opt_in = self.opt_in.map(resolve);
        self.output = self.output.map(resolve);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_paths_resolve_against_the_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindgen.toml");
        fs::write(
            &path,
            "spec = [\"spec.toml\"]\nopt_in = \"opt-in.toml\"\noutput = \"/abs/out\"\ntargets = [\"typescript\", \"wasm-wrapper\"]\n\n[formatters]\ncpp = \"clang-format\"\n",
        )
        .unwrap();

        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.spec, vec![dir.path().join("spec.toml")]);
        assert_eq!(config.opt_in, Some(dir.path().join("opt-in.toml")));
        assert_eq!(config.output, Some(PathBuf::from("/abs/out")));
        assert_eq!(config.targets, vec![Target::Typescript, Target::WasmWrapper]);
        assert_eq!(config.formatters.cpp.as_deref(), Some("clang-format"));
        assert_eq!(config.formatters.typescript, None);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindgen.toml");
        fs::write(&path, "targets = [\"python\"]\n").unwrap();
        assert!(Config::from_path(&path).is_err());

        fs::write(&path, "outputs = \"x\"\n").unwrap();
        assert!(Config::from_path(&path).is_err());
    }
}

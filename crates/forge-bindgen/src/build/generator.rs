//! Writing generated bindings to disk
//!
//! [`BindingBuilder`] runs the emitters for the requested targets, stamps
//! every file with the generated-file header, checks TypeScript syntax,
//! runs the configured formatters and writes the results.

use super::format::Formatter;
use super::syntax::check_typescript;
use crate::codegen::{
    helpers, CoreGenerator, DeclarationGenerator, NodeGenerator, WasmGenerator, WrapperFlavor,
    WrapperGenerator,
};
use crate::error::Result;
use crate::model::BoundSpec;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// First line of every generated file
pub const GENERATED_HEADER: &str =
    "// This file is generated: Update the spec instead of editing this file directly";

/// A set of output files produced together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    /// `core.ts` and `native.d.ts`
    Typescript,
    /// `native.node.ts`
    NodeWrapper,
    /// `native.wasm.ts`
    WasmWrapper,
    /// `node_init.cpp` and its helper headers
    Node,
    /// `wasm_init.cpp` and its helper headers
    Wasm,
}

impl Target {
    pub const ALL: [Target; 5] = [
        Target::Typescript,
        Target::NodeWrapper,
        Target::WasmWrapper,
        Target::Node,
        Target::Wasm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::Typescript => "typescript",
            Target::NodeWrapper => "node-wrapper",
            Target::WasmWrapper => "wasm-wrapper",
            Target::Node => "node",
            Target::Wasm => "wasm",
        }
    }

    /// Generate the files of this target as `(file name, text)` pairs
    pub fn generate(self, spec: &BoundSpec) -> Result<Vec<(&'static str, String)>> {
        Ok(match self {
            Target::Typescript => vec![
                ("core.ts", CoreGenerator::new(spec).generate()?),
                ("native.d.ts", DeclarationGenerator::new(spec).generate()?),
            ],
            Target::NodeWrapper => {
                let flavor = WrapperFlavor::Node;
                vec![(flavor.file_name(), WrapperGenerator::new(spec, flavor).generate()?)]
            }
            Target::WasmWrapper => {
                let flavor = WrapperFlavor::Wasm;
                vec![(flavor.file_name(), WrapperGenerator::new(spec, flavor).generate()?)]
            }
            Target::Node => {
                let mut files = vec![("node_init.cpp", NodeGenerator::new(spec).generate()?)];
                files.extend(helpers::node_headers());
                files
            }
            Target::Wasm => {
                let mut files = vec![("wasm_init.cpp", WasmGenerator::new(spec).generate()?)];
                files.extend(helpers::wasm_headers());
                files
            }
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Target::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Target::ALL.iter().map(|t| t.name()).collect();
                format!("unknown target '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

fn is_typescript(file_name: &str) -> bool {
    file_name.ends_with(".ts")
}

/// Builder for a generation run
///
/// # Example
/// ```ignore
/// let spec = bind_model(&RawSpec::load(&["spec.toml"])?, None)?;
/// BindingBuilder::new(&spec, "generated")
///     .targets(&[Target::Typescript, Target::Node])
///     .cpp_formatter(CommandFormatter::new("clang-format"))
///     .build()?;
/// ```
pub struct BindingBuilder<'a> {
    spec: &'a BoundSpec,
    output: PathBuf,
    targets: Vec<Target>,
    cpp_formatter: Option<Box<dyn Formatter + 'a>>,
    typescript_formatter: Option<Box<dyn Formatter + 'a>>,
}

impl<'a> BindingBuilder<'a> {
    /// Generate into `output`; every target is enabled until [`targets`](Self::targets) is called
    pub fn new(spec: &'a BoundSpec, output: impl AsRef<Path>) -> Self {
        Self {
            spec,
            output: output.as_ref().to_path_buf(),
            targets: Target::ALL.to_vec(),
            cpp_formatter: None,
            typescript_formatter: None,
        }
    }

    pub fn targets(mut self, targets: &[Target]) -> Self {
        self.targets = Vec::new();
        for target in targets {
            if !self.targets.contains(target) {
                self.targets.push(*target);
            }
        }
        self
    }

    pub fn cpp_formatter(mut self, formatter: impl Formatter + 'a) -> Self {
        self.cpp_formatter = Some(Box::new(formatter));
        self
    }

    pub fn typescript_formatter(mut self, formatter: impl Formatter + 'a) -> Self {
        self.typescript_formatter = Some(Box::new(formatter));
        self
    }

    /// Generate and write every enabled target
    ///
    /// All targets are generated before anything is written, so a
    /// specification error leaves the output directory untouched.
    pub fn build(self) -> Result<BuildOutput> {
        // Native targets share the common helper header; it is written once.
        let mut generated = Vec::new();
        let mut seen = HashSet::new();
        for target in &self.targets {
            for (file_name, text) in target.generate(self.spec)? {
                if seen.insert(file_name) {
                    generated.push((*target, file_name, text));
                }
            }
        }

        fs::create_dir_all(&self.output)?;
        let mut files = Vec::with_capacity(generated.len());
        for (target, file_name, text) in generated {
            let path = self.output.join(file_name);
            let text = format!("{}\n{}", GENERATED_HEADER, text);

            if is_typescript(file_name) {
                if let Err(err) = check_typescript(&text, &format!("file:///{}", file_name)) {
                    warn!(%target, file = file_name, error = %err, "generated TypeScript does not parse");
                }
            }
            let text = self.format(&path, file_name, text);

            fs::write(&path, &text)?;
            info!(%target, path = %path.display(), bytes = text.len(), "wrote");
            files.push(path);
        }

        Ok(BuildOutput { files })
    }

    fn format(&self, path: &Path, file_name: &str, text: String) -> String {
        let formatter = if is_typescript(file_name) {
            self.typescript_formatter.as_ref()
        } else {
            self.cpp_formatter.as_ref()
        };
        let Some(formatter) = formatter else {
            return text;
        };
        match formatter.format(path, &text) {
            Ok(formatted) => formatted,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "formatting failed, keeping unformatted output");
                text
            }
        }
    }
}

/// Files written by a successful build
#[derive(Debug)]
pub struct BuildOutput {
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::format::FormatError;
    use crate::codegen::fixtures::{bind, SPEC};
    use crate::error::BindgenError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_target_names_round_trip() {
        for target in Target::ALL {
            assert_eq!(target.name().parse::<Target>().unwrap(), target);
        }
        assert!("python".parse::<Target>().unwrap_err().contains("node-wrapper"));
    }

    #[test]
    fn test_writes_every_target() {
        let dir = tempfile::tempdir().unwrap();
        let spec = bind(SPEC);
        let output = BindingBuilder::new(&spec, dir.path()).build().unwrap();

        let names: Vec<String> = output
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "core.ts",
                "native.d.ts",
                "native.node.ts",
                "native.wasm.ts",
                "node_init.cpp",
                "bindgen_helpers.h",
                "bindgen_node_helpers.h",
                "wasm_init.cpp",
                "bindgen_wasm_helpers.h"
            ]
        );
        for path in &output.files {
            let text = fs::read_to_string(path).unwrap();
            assert!(text.starts_with(GENERATED_HEADER), "{}", path.display());
        }
    }

    #[test]
    fn test_formatters_apply_by_file_kind() {
        let dir = tempfile::tempdir().unwrap();
        let spec = bind(SPEC);
        BindingBuilder::new(&spec, dir.path())
            .targets(&[Target::Typescript, Target::Wasm])
            .cpp_formatter(|_: &Path, text: &str| -> std::result::Result<String, FormatError> {
                Ok(format!("{}// formatted as C++\n", text))
            })
            .typescript_formatter(|_: &Path, _: &str| -> std::result::Result<String, FormatError> {
                Err(FormatError::Failed {
                    program: "prettier".into(),
                    status: "exit status: 2".into(),
                    stderr: String::new(),
                })
            })
            .build()
            .unwrap();

        let cpp = fs::read_to_string(dir.path().join("wasm_init.cpp")).unwrap();
        assert!(cpp.ends_with("// formatted as C++\n"));
        // A failing formatter keeps the unformatted text.
        let core = fs::read_to_string(dir.path().join("core.ts")).unwrap();
        assert!(core.starts_with(GENERATED_HEADER));
        assert!(!dir.path().join("node_init.cpp").exists());
        let helpers = fs::read_to_string(dir.path().join("bindgen_wasm_helpers.h")).unwrap();
        assert!(helpers.contains("toBinaryData"));
        assert!(helpers.ends_with("// formatted as C++\n"));
    }

    #[test]
    fn test_spec_errors_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let toml = format!(
            "{}\n[classes.Bad.methods]\ntake = \"(m: std::map<int32_t, bool>) -> void\"\n",
            SPEC
        );
        let spec = bind(&toml);
        let result = BindingBuilder::new(&spec, &out).build();
        assert!(matches!(result, Err(BindgenError::Unconvertible { .. })));
        assert!(!out.exists());
    }
}

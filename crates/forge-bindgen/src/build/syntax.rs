//! Syntax validation of generated TypeScript using deno_ast

use deno_ast::{MediaType, ParseParams};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyntaxError {
    /// The specifier is not a valid module URL
    #[error("Invalid module specifier {specifier}: {message}")]
    Specifier { specifier: String, message: String },

    /// The text does not parse
    #[error("Failed to parse {specifier}: {message}")]
    Parse { specifier: String, message: String },
}

/// Parse `text` as a TypeScript module without transpiling it
///
/// Specifiers ending in `.d.ts` are parsed as declaration files.
///
/// # Example
/// ```ignore
/// check_typescript("export const x: number = 1;", "file:///core.ts")?;
/// ```
pub fn check_typescript(text: &str, specifier: &str) -> Result<(), SyntaxError> {
    let media_type = if specifier.ends_with(".d.ts") {
        MediaType::Dts
    } else {
        MediaType::TypeScript
    };

    let parsed = deno_ast::parse_module(ParseParams {
        specifier: deno_ast::ModuleSpecifier::parse(specifier).map_err(|e| {
            SyntaxError::Specifier {
                specifier: specifier.to_string(),
                message: e.to_string(),
            }
        })?,
        text: text.into(),
        media_type,
        capture_tokens: false,
        scope_analysis: false,
        maybe_syntax: None,
    })
    .map_err(|e| SyntaxError::Parse {
        specifier: specifier.to_string(),
        message: e.to_string(),
    })?;

    // Recoverable errors still mean the output is broken.
    if let Some(diagnostic) = parsed.diagnostics().first() {
        return Err(SyntaxError::Parse {
            specifier: specifier.to_string(),
            message: diagnostic.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_module() {
        check_typescript("export const enum Color {\n  Red = 0,\n}\n", "file:///core.ts").unwrap();
        check_typescript("export declare class Foo {\n  private brandForFoo;\n}\n", "file:///native.d.ts")
            .unwrap();
    }

    #[test]
    fn test_invalid_module() {
        let err = check_typescript("export class {", "file:///broken.ts").unwrap_err();
        assert!(matches!(err, SyntaxError::Parse { .. }));
        assert!(err.to_string().contains("file:///broken.ts"));
    }

    #[test]
    fn test_invalid_specifier() {
        assert!(matches!(
            check_typescript("", "not a url"),
            Err(SyntaxError::Specifier { .. })
        ));
    }
}

//! Pluggable formatting of generated sources
//!
//! A [`Formatter`] takes generated text and returns formatted text. Failures
//! never abort generation; the caller logs them and keeps the unformatted
//! output.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors from running a formatter
#[derive(Debug, Error)]
pub enum FormatError {
    /// The formatter executable is not on `PATH`
    #[error("Formatter {program} not found: {source}")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    /// Failed to run the formatter or talk to it
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The formatter exited with a failure status
    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The formatter wrote something that is not UTF-8
    #[error("Formatter output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Formats the text of one generated file
pub trait Formatter {
    fn format(&self, path: &Path, text: &str) -> Result<String, FormatError>;
}

impl<F> Formatter for F
where
    F: Fn(&Path, &str) -> Result<String, FormatError>,
{
    fn format(&self, path: &Path, text: &str) -> Result<String, FormatError> {
        self(path, text)
    }
}

/// Pipes text through an external program
///
/// The text is written to the program's stdin and its stdout is the result.
/// `{path}` in an argument is replaced with the path of the file being
/// formatted, for tools that pick their style from the file name.
///
/// # Example
/// ```ignore
/// let clang_format = CommandFormatter::parse("clang-format --assume-filename={path}")?;
/// let formatted = clang_format.format(Path::new("out/node_init.cpp"), &text)?;
/// ```
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
}

impl CommandFormatter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build from a whitespace separated command line
    pub fn parse(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace();
        let program = words.next()?;
        Some(words.fold(Self::new(program), |formatter, arg| formatter.arg(arg)))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Formatter for CommandFormatter {
    fn format(&self, path: &Path, text: &str) -> Result<String, FormatError> {
        let program = which::which(&self.program).map_err(|source| FormatError::NotFound {
            program: self.program.clone(),
            source,
        })?;
        let path_text = path.display().to_string();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{path}", &path_text))
            .collect();

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Write from another thread so a large output can't fill the pipe and deadlock.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "formatter stdin unavailable")
        })?;
        let input = text.to_string();
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| std::io::Error::other("formatter input thread panicked"))?;

        // A program that exits early also breaks the pipe; report its status instead.
        if !output.status.success() {
            return Err(FormatError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        tracing::debug!(program = %self.program, path = %path_text, "formatted");
        Ok(String::from_utf8(output.stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_command_line() {
        let formatter = CommandFormatter::parse("clang-format --assume-filename={path}").unwrap();
        assert_eq!(formatter.program(), "clang-format");
        assert_eq!(formatter.args, vec!["--assume-filename={path}".to_string()]);
        assert!(CommandFormatter::parse("   ").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_pipes_text_through_the_program() {
        let formatter = CommandFormatter::new("cat");
        let text = "int main() {}\n".repeat(10_000);
        assert_eq!(formatter.format(Path::new("a.cpp"), &text).unwrap(), text);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program() {
        let formatter = CommandFormatter::new("false");
        assert!(matches!(
            formatter.format(Path::new("a.cpp"), "x"),
            Err(FormatError::Failed { .. })
        ));
    }

    #[test]
    fn test_missing_program() {
        let formatter = CommandFormatter::new("bindgen-no-such-formatter");
        assert!(matches!(
            formatter.format(Path::new("a.cpp"), "x"),
            Err(FormatError::NotFound { .. })
        ));
    }

    #[test]
    fn test_closures_are_formatters() {
        let upper = |_: &Path, text: &str| -> Result<String, FormatError> { Ok(text.to_uppercase()) };
        assert_eq!(upper.format(Path::new("a.ts"), "abc").unwrap(), "ABC");
    }
}

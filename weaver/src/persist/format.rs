//! Optional source formatting through an external command (gofmt).

use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{trace, warn};

use crate::error::{WeaveError, WeaveResult};
use crate::syntax::TargetUnit;

/// Renders units to text, piping transformed ones through a formatter.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    command: Option<String>,
}

impl Formatter {
    /// No formatting: canonical render output is written as is.
    pub fn none() -> Self {
        Self { command: None }
    }

    /// Format with `command` (program plus arguments), reading stdin.
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.command.is_some()
    }

    /// The unit's final text. Untouched units bypass the formatter, and a
    /// failing formatter falls back to the unformatted text.
    pub fn render(&self, unit: &TargetUnit) -> String {
        let text = unit.render();
        let Some(command) = self.command.as_deref().filter(|_| unit.is_modified()) else {
            return text;
        };
        match run(command, &text) {
            Ok(formatted) => {
                trace!("Formatted {} with {}", unit.file_name(), command);
                formatted
            }
            Err(e) => {
                warn!("{}: {}, writing unformatted output", unit.file_name(), e);
                text
            }
        }
    }
}

fn run(command: &str, input: &str) -> WeaveResult<String> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| WeaveError::config("format command is empty"))?;

    let mut child = Command::new(program)
        .args(parts)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| WeaveError::command(command, e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(WeaveError::command(
            command,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    String::from_utf8(output.stdout).map_err(|e| WeaveError::command(command, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modified_unit() -> TargetUnit {
        let mut unit = TargetUnit::parse("x.go", "package x\n\nfunc F() {}\n").unwrap();
        let items = unit.take_items();
        unit.set_items(items, None);
        unit
    }

    #[test]
    fn test_no_formatter() {
        let unit = modified_unit();
        assert_eq!(Formatter::none().render(&unit), unit.render());
    }

    #[cfg(unix)]
    #[test]
    fn test_formatter_command_is_used() {
        let unit = modified_unit();
        let out = Formatter::command("tr a-z A-Z").render(&unit);
        assert!(out.starts_with("PACKAGE X"));
    }

    #[test]
    fn test_missing_formatter_falls_back() {
        let unit = modified_unit();
        let out = Formatter::command("definitely-not-a-formatter-binary").render(&unit);
        assert_eq!(out, unit.render());
    }

    #[cfg(unix)]
    #[test]
    fn test_untouched_unit_bypasses_formatter() {
        let unit = TargetUnit::parse("x.go", "package x\n").unwrap();
        assert_eq!(Formatter::command("tr a-z A-Z").render(&unit), "package x\n");
    }
}

//! Note editing through an external editor

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::process::Command;

/// Something that can edit a block of text
pub trait NoteEditor {
    /// Return the edited text, or the original when editing was abandoned
    fn edit(&mut self, text: &str) -> Result<String>;
}

/// Runs an editor command on a temporary file
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    command: String,
}

impl ExternalEditor {
    /// Editor run as `command <file>`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl NoteEditor for ExternalEditor {
    fn edit(&mut self, text: &str) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("orgmate-note-")
            .suffix(".md")
            .tempfile()?;
        file.write_all(text.as_bytes())?;
        file.flush()?;

        // allow "code --wait" style commands
        let mut parts = self.command.split_whitespace();
        let program = parts.next().context("Editor command is empty")?;
        let status = Command::new(program)
            .args(parts)
            .arg(file.path())
            .status()
            .with_context(|| format!("Failed to run editor '{}'", self.command))?;

        if !status.success() {
            log::warn!("Editor exited with {}, note unchanged", status);
            return Ok(text.to_string());
        }
        Ok(fs::read_to_string(file.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_editor_keeps_text() {
        let mut editor = ExternalEditor::new("false");
        assert_eq!(editor.edit("keep me").unwrap(), "keep me");
    }

    #[test]
    fn test_noop_editor_returns_file_content() {
        let mut editor = ExternalEditor::new("true");
        assert_eq!(editor.edit("same").unwrap(), "same");
    }

    #[test]
    fn test_empty_command() {
        let mut editor = ExternalEditor::new("  ");
        assert!(editor.edit("x").is_err());
    }
}

//! Opens a file at a line in the user's `$EDITOR`.
//!
//! The caller is responsible for handing the terminal over first.

use std::process::Command;

use crate::error::{AppError, Result};

/// Builds `<editor> [editor args...] <file> +<line>`. `editor` may carry its
/// own arguments, e.g. `"code -w"`.
pub fn editor_command(editor: Option<&str>, file_path: &str, line_no: Option<i64>) -> Result<Command> {
    let mut parts = editor.unwrap_or_default().split_whitespace();
    let Some(program) = parts.next() else {
        return Err(AppError::Editor("EDITOR is not set".to_string()));
    };

    let mut command = Command::new(program);
    command.args(parts).arg(file_path);
    if let Some(line_no) = line_no.filter(|n| *n > 0) {
        command.arg(format!("+{line_no}"));
    }
    Ok(command)
}

/// Runs `$EDITOR` and waits for it to exit.
pub fn open_in_editor(file_path: &str, line_no: Option<i64>) -> Result<()> {
    let editor = std::env::var("EDITOR").ok();
    let mut command = editor_command(editor.as_deref(), file_path, line_no)?;

    let status = command
        .status()
        .map_err(|e| AppError::Editor(format!("could not start {:?}: {e}", command.get_program())))?;
    if !status.success() {
        return Err(AppError::Editor(format!("editor exited with {status}")));
    }

    tracing::debug!(file_path, ?line_no, "returned from editor");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn file_comes_before_the_line_jump() {
        let command = editor_command(Some("vim"), "/src/main.rs", Some(42)).unwrap();
        assert_eq!(command.get_program(), "vim");
        assert_eq!(args(&command), vec!["/src/main.rs", "+42"]);
    }

    #[test]
    fn editor_arguments_are_kept() {
        let command = editor_command(Some("code -w"), "/a.py", Some(7)).unwrap();
        assert_eq!(command.get_program(), "code");
        assert_eq!(args(&command), vec!["-w", "/a.py", "+7"]);
    }

    #[test]
    fn unknown_line_opens_the_file_only() {
        let command = editor_command(Some("nano"), "/a.py", None).unwrap();
        assert_eq!(args(&command), vec!["/a.py"]);
    }

    #[test]
    fn missing_editor_is_recoverable() {
        for editor in [None, Some(""), Some("   ")] {
            let err = editor_command(editor, "/a.py", Some(1)).unwrap_err();
            assert!(matches!(err, AppError::Editor(_)));
            assert!(err.is_recoverable());
        }
    }

    #[test]
    fn failing_editor_is_reported() {
        let mut command = editor_command(Some("false"), "/a.py", None).unwrap();
        assert!(!command.status().unwrap().success());

        let err = editor_command(Some("definitely-not-an-editor-xyz"), "/a.py", None)
            .unwrap()
            .status()
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}

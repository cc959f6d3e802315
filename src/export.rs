//! Chat history export.
//!
//! Produces the plain-text transcript offered for download: one `Q:`/`A:`
//! block per turn, blocks separated by a blank line, in the order the
//! questions were asked.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::ChatTurn;

/// A ready-to-save transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryExport {
    pub file_name: String,
    pub contents: String,
}

/// Render the history as `Q: ...\nA: ...` blocks joined by blank lines.
pub fn format_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("Q: {}\nA: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `chat_history_YYYYMMDD_HHMMSS.txt` for the given instant.
pub fn export_file_name(at: DateTime<Local>) -> String {
    format!("chat_history_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// Build an export stamped with the current local time, or `None` when there
/// is nothing to export.
pub fn export_history(history: &[ChatTurn]) -> Option<HistoryExport> {
    if history.is_empty() {
        return None;
    }
    Some(HistoryExport {
        file_name: export_file_name(Local::now()),
        contents: format_history(history),
    })
}

/// Write an export into `dir`, creating the directory if needed.
pub fn write_export(export: &HistoryExport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(&export.file_name);
    std::fs::write(&path, &export.contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved chat history to {}", path.display());
    Ok(path)
}

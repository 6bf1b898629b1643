//! Markdown note files: windowed reads for `memory_get` and appends for `memory_write`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Path is outside the memory root: {0}")]
    OutsideRoot(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl NoteError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A clamped slice of a file's lines.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LineWindow {
    pub path: String,
    /// The requested start line, echoed back.
    pub from: usize,
    /// Last line returned (1-indexed, inclusive).
    pub to: usize,
    pub content: String,
}

/// Where `memory_write` puts new content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WriteTarget {
    /// Today's log, `memory/YYYY-MM-DD.md`.
    #[default]
    Daily,
    /// The long-term memory file.
    Longterm,
}

/// Result of an append.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WriteOutcome {
    pub success: bool,
    pub path: String,
    pub message: String,
}

/// Read up to `lines` lines starting at 1-indexed `from`, clamped to the file.
/// `to` is the last line returned; an empty window has `to == from - 1`.
///
/// `path` is resolved against `root`. Anything that resolves outside it is rejected.
pub fn read_lines(root: &Path, path: &str, from: usize, lines: usize) -> Result<LineWindow, NoteError> {
    let file = resolve_inside(root, path)?;
    let text = std::fs::read_to_string(&file)
        .map_err(|e| NoteError::io(format!("failed to read {path}"), e))?;

    let all: Vec<&str> = text.lines().collect();
    let start = from.max(1).saturating_sub(1).min(all.len());
    let end = all.len().min(start.saturating_add(lines));
    let to = if start < end { end } else { from.max(1) - 1 };

    Ok(LineWindow {
        path: path.to_string(),
        from,
        to,
        content: all[start..end].join("\n"),
    })
}

fn resolve_inside(root: &Path, path: &str) -> Result<PathBuf, NoteError> {
    let root = std::fs::canonicalize(root)
        .map_err(|e| NoteError::io(format!("failed to resolve root {}", root.display()), e))?;
    let candidate = root.join(path);

    let resolved = match std::fs::canonicalize(&candidate) {
        Ok(p) => p,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(NoteError::NotFound(path.to_string()))
        }
        Err(e) => return Err(NoteError::io(format!("failed to resolve {path}"), e)),
    };

    if !resolved.starts_with(&root) {
        return Err(NoteError::OutsideRoot(path.to_string()));
    }
    if !resolved.is_file() {
        return Err(NoteError::NotFound(path.to_string()));
    }
    Ok(resolved)
}

/// Paths `append_note` writes to.
#[derive(Debug, Clone)]
pub struct NoteFiles {
    pub root: PathBuf,
    pub memory_file: PathBuf,
    pub memory_dir: PathBuf,
}

impl NoteFiles {
    pub fn daily_log(&self, date: NaiveDate) -> PathBuf {
        self.memory_dir.join(format!("{}.md", date.format("%Y-%m-%d")))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Append `content` to today's log or to the long-term memory file.
pub fn append_note(
    files: &NoteFiles,
    target: WriteTarget,
    content: &str,
    today: NaiveDate,
) -> Result<WriteOutcome, NoteError> {
    let path = match target {
        WriteTarget::Daily => files.daily_log(today),
        WriteTarget::Longterm => files.memory_file.clone(),
    };

    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(NoteError::io(format!("failed to read {}", path.display()), e)),
    };

    let updated = match target {
        WriteTarget::Daily => append_daily(existing.as_deref(), content, today),
        WriteTarget::Longterm => insert_before_separator(existing.as_deref().unwrap_or(""), content),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| NoteError::io(format!("failed to create {}", parent.display()), e))?;
    }
    std::fs::write(&path, updated)
        .map_err(|e| NoteError::io(format!("failed to write {}", path.display()), e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::info!(path = %path.display(), target = ?target, "note written");

    Ok(WriteOutcome {
        success: true,
        path: files.relative(&path),
        message: format!("Written to {file_name}"),
    })
}

fn append_daily(existing: Option<&str>, content: &str, today: NaiveDate) -> String {
    match existing {
        Some(text) => format!("{}\n\n{content}\n", text.trim_end()),
        None => format!("# {}\n\n{content}\n", today.format("%Y-%m-%d")),
    }
}

/// Insert before the last line that is exactly `---`. Without one, append at the end.
pub fn insert_before_separator(existing: &str, content: &str) -> String {
    match last_separator(existing) {
        Some(at) => {
            let before = existing[..at].trim_end();
            let after = &existing[at + 3..];
            format!("{before}\n\n{content}\n\n---{after}")
        }
        None if existing.trim().is_empty() => format!("{content}\n"),
        None => format!("{}\n\n{content}\n", existing.trim_end()),
    }
}

/// Byte offset of the `---` on the last standalone separator line.
fn last_separator(text: &str) -> Option<usize> {
    let mut offset = 0;
    let mut found = None;
    for line in text.split_inclusive('\n') {
        if line.trim() == "---" {
            found = line.find("---").map(|i| offset + i);
        }
        offset += line.len();
    }
    found
}

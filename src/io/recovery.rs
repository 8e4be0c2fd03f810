use std::fs::OpenOptions;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tempfile::NamedTempFile;

/// Header written at the top of a new recovery log.
const FILE_HEADER: &str = "\
<!-- plog recovery log: rows that could not be written to their project file.
     Copy a row back into <project>.csv to restore it.
     Safe to delete once empty or stale. -->

---
";

/// What kind of store operation lost data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    Append,
    Merge,
}

impl RecoveryCategory {
    fn as_str(self) -> &'static str {
        match self {
            RecoveryCategory::Append => "append",
            RecoveryCategory::Merge => "merge",
        }
    }
}

/// One failed operation: when, what, key/value context and the CSV rows
/// that did not reach their project file.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

/// The recovery log lives in the data directory as a hidden file, so it is
/// never listed as a project.
pub fn recovery_log_path(datadir: &Path) -> PathBuf {
    datadir.join(".recovery.log")
}

/// Replace `path` with `content` through a synced temp file in the same
/// directory, so readers see either the old or the new file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(content)?;
    staged.as_file().sync_data()?;
    staged.persist(path)?;
    Ok(())
}

impl RecoveryEntry {
    fn render(&self) -> String {
        let stamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut out = format!(
            "## {} {}: {}\n\n",
            stamp,
            self.category.as_str(),
            self.description
        );
        for (key, value) in &self.fields {
            let _ = writeln!(out, "{}: {}", key, value);
        }

        let rows = self.body.trim_end_matches('\n');
        if !rows.is_empty() {
            let _ = write!(out, "\n```csv\n{}\n```\n", rows);
        }
        out.push_str("\n---\n");
        out
    }
}

/// Record lost data in the recovery log. The caller is already failing,
/// so a log that can not be written only produces a warning.
pub fn log_recovery(datadir: &Path, entry: RecoveryEntry) {
    let path = recovery_log_path(datadir);
    match append_entry(&path, &entry) {
        Ok(()) => tracing::warn!(path = %path.display(), "wrote recovery entry"),
        Err(e) => eprintln!("warning: could not write to recovery log: {}", e),
    }
}

fn append_entry(path: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut text = String::new();
    if file.metadata()?.len() == 0 {
        text.push_str(FILE_HEADER);
    }
    text.push_str(&entry.render());
    file.write_all(text.as_bytes())
}

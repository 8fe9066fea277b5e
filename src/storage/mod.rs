//! JSON-lines output log.

use crate::models::ProfileRecord;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Append-only record log, one JSON object per line.
///
/// Each record is flushed as soon as it is written, so a crash loses at most
/// the record in flight. Nothing already in the file is read or deduplicated.
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
    appended: usize,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output log {:?}", path))?;
        info!("Appending records to {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            file,
            appended: 0,
        })
    }

    pub fn append(&mut self, record: &ProfileRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)
            .with_context(|| format!("Failed to serialize {}", record.url))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .with_context(|| format!("Failed to append to {:?}", self.path))?;
        self.appended += 1;
        Ok(())
    }

    /// Records written through this sink (not the file's total).
    pub fn appended(&self) -> usize {
        self.appended
    }
}

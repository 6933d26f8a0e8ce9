//! Append-only NDJSON journal backing the store.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::events::LogEvent;
use crate::store::StoreError;

/// One JSON event per line, flushed on every append.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Journal {
    /// Open (creating if needed) and return the events already recorded.
    ///
    /// Unparseable lines, such as a record cut short by a crash, are skipped.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<LogEvent>), StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut events = Vec::new();
        let mut torn_tail = false;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            torn_tail = !content.is_empty() && !content.ends_with('\n');
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match LogEvent::from_json(line) {
                    Ok(event) => events.push(event),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        error = %e,
                        "Skipping unreadable journal record"
                    ),
                }
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if torn_tail {
            file.write_all(b"\n")?;
        }
        tracing::info!(path = %path.display(), events = events.len(), "Journal opened");
        Ok((
            Self {
                path,
                writer: BufWriter::new(file),
            },
            events,
        ))
    }

    pub fn append(&mut self, event: &LogEvent) -> Result<(), StoreError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

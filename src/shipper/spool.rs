//! On-disk overflow for batches the sink would not take.

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Append-only NDJSON file of undelivered events.
#[derive(Debug)]
pub struct OverflowSpool {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OverflowSpool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a batch.
    pub fn spill(&self, batch: &[String]) -> io::Result<()> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for line in batch {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }

    /// Remove and return everything spilled so far.
    pub fn take_all(&self) -> io::Result<Vec<String>> {
        let _guard = self.lock.lock();
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        fs::remove_file(&self.path)?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn has_pending(&self) -> bool {
        fs::metadata(&self.path).is_ok_and(|m| m.len() > 0)
    }
}

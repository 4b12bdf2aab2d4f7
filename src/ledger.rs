use crate::error::Result;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LEDGER_FILE_NAME: &str = "processedFiles.txt";

/// Append-only record of files already converted and uploaded.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    entries: HashSet<String>,
}

impl Ledger {
    /// Read `<data_dir>/processedFiles.txt`. A missing or unreadable ledger
    /// is treated as empty.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(LEDGER_FILE_NAME);

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No ledger at {} yet", path.display());
                HashSet::new()
            }
            Err(e) => {
                warn!("Unable to read ledger {}: {}", path.display(), e);
                HashSet::new()
            }
        };

        debug!("Ledger holds {} processed files", entries.len());
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains(file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `file_name`. Returns `false` without touching the file when it
    /// is already recorded.
    pub fn record(&mut self, file_name: &str) -> Result<bool> {
        if self.contains(file_name) {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", file_name)?;

        self.entries.insert(file_name.to_string());
        Ok(true)
    }
}

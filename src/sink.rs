//! Append-only persistence of confirmed matches.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::worker::Hit;

/// Separator line closing every record.
const RECORD_SEPARATOR: &str = "==================================================";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write result file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Destination for hits. Only the aggregator writes to it.
pub trait ResultSink {
    fn record(&mut self, hit: &Hit) -> Result<(), SinkError>;
}

/// Appends one text block per hit to a file.
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    /// Opens (or creates) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for FileSink {
    /// Writes the whole record with a single append, so records never interleave.
    fn record(&mut self, hit: &Hit) -> Result<(), SinkError> {
        let block = format_record(hit);
        self.file
            .write_all(block.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Renders the persisted form of a hit.
pub fn format_record(hit: &Hit) -> String {
    format!(
        "Address: {}\nPrivate Key: {}\nTime: {}\n{}\n\n",
        hit.address,
        hit.private_key_hex(),
        hit.found_at.format("%Y-%m-%d %H:%M:%S"),
        RECORD_SEPARATOR
    )
}

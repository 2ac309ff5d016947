//! Newline-delimited JSON streams ("pokemons" and "abilities").
//!
//! One JSON object per line. Readers are lenient: blank lines are ignored
//! and lines that do not deserialize are counted and skipped.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// File name of the raw creature stream inside the data directory.
pub const POKEMONS_RAW: &str = "pokemons_raw.jsonl";
/// File name of the raw ability stream inside the data directory.
pub const ABILITIES_RAW: &str = "abilities_raw.jsonl";
/// File name of the cleaned creature stream.
pub const POKEMONS_CLEAN: &str = "pokemons_clean.jsonl";
/// File name of the cleaned ability stream.
pub const ABILITIES_CLEAN: &str = "abilities_clean.jsonl";

/// Errors produced reading or writing JSONL files.
#[derive(Debug, Error)]
pub enum JsonlError {
    /// Opening, reading, or writing the file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A record could not be serialized.
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl JsonlError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Rows read from a JSONL file.
#[derive(Debug)]
pub struct JsonlRead<T> {
    pub rows: Vec<T>,
    /// Non-blank lines that failed to deserialize
    pub malformed: usize,
}

/// Reads every line of `path` as a `T`.
///
/// # Errors
///
/// Returns [`JsonlError::Io`] if the file cannot be opened or read.
#[instrument(fields(path = %path.display()))]
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<JsonlRead<T>, JsonlError> {
    let file = File::open(path).map_err(|e| JsonlError::io(path, e))?;
    let mut rows = Vec::new();
    let mut malformed = 0;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| JsonlError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(row) => rows.push(row),
            Err(err) => {
                malformed += 1;
                warn!(line = index + 1, error = %err, "Skipping malformed JSONL line");
            }
        }
    }

    debug!(rows = rows.len(), malformed, "Read JSONL file");
    Ok(JsonlRead { rows, malformed })
}

/// Buffered line writer; creates (truncating) the target file.
pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlWriter {
    /// Creates the file and any missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`JsonlError::Io`] if the directory or file cannot be created.
    pub fn create(path: &Path) -> Result<Self, JsonlError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| JsonlError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| JsonlError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Appends one record as a single line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<(), JsonlError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| JsonlError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes buffered lines and returns the number written.
    ///
    /// # Errors
    ///
    /// Returns [`JsonlError::Io`] if the flush fails.
    pub fn finish(mut self) -> Result<usize, JsonlError> {
        self.writer
            .flush()
            .map_err(|e| JsonlError::io(&self.path, e))?;
        debug!(path = %self.path.display(), written = self.written, "Closed JSONL file");
        Ok(self.written)
    }
}

/// Writes all `records` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_jsonl<'a, T, I>(path: &Path, records: I) -> Result<usize, JsonlError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut writer = JsonlWriter::create(path)?;
    for record in records {
        writer.write(record)?;
    }
    writer.finish()
}

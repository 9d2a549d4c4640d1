//! A store persisted as newline-delimited JSON.
//!
//! Each line is one [`StreamRecord`]. The file is only ever appended to, so it
//! is safe to `tail` while the store is running. On open the whole file is
//! scanned once to rebuild the in-memory index; reads are then served from
//! memory.

use std::fs::{self, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::log::Log;
use crate::record::{now_millis, StreamRecord, TimeRange};
use crate::store::AppendOnlyStore;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    sync: bool,
    file: Option<Mutex<LogFile>>,
    log: RwLock<Log>,
}

#[derive(Debug)]
struct LogFile {
    file: tokio::fs::File,
    /// Length of the file up to the last complete record.
    len: u64,
    /// Set when a partial write could not be truncated away.
    poisoned: bool,
}

impl LogFile {
    /// Truncates the file back to the last complete record.
    async fn roll_back(&mut self) -> std::io::Result<()> {
        self.file.set_len(self.len).await?;
        self.poisoned = false;
        Ok(())
    }
}

impl FileStore {
    /// Opens the log at `path`, creating it and its parent directories if missing.
    ///
    /// With `sync` enabled every append is flushed to disk before it returns.
    pub fn open(path: impl AsRef<Path>, sync: bool) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        // One writer per file for the lifetime of the store.
        file.try_lock_exclusive().map_err(|source| Error::Locked {
            path: path.to_path_buf(),
            source,
        })?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let (records, len) = parse_records(&contents)?;
        if len < contents.len() {
            warn!(
                path = %path.display(),
                discarded_bytes = contents.len() - len,
                "discarding incomplete trailing record"
            );
            file.set_len(len as u64)?;
        }

        let log = Log::from_records(records);
        info!(path = %path.display(), records = log.len(), "opened log file");

        Ok(FileStore {
            path: path.to_path_buf(),
            sync,
            file: Some(Mutex::new(LogFile {
                file: tokio::fs::File::from_std(file),
                len: len as u64,
                poisoned: false,
            })),
            log: RwLock::new(log),
        })
    }

    /// Opens an existing log for reading only.
    ///
    /// The file is left untouched, including any incomplete trailing record a
    /// concurrent writer may still be finishing. Appends fail with
    /// [`Error::ReadOnly`].
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path)?;
        let (records, _) = parse_records(&contents)?;
        let log = Log::from_records(records);
        debug!(path = %path.display(), records = log.len(), "opened log file read-only");

        Ok(FileStore {
            path: path.to_path_buf(),
            sync: false,
            file: None,
            log: RwLock::new(log),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parses every complete line, returning the records and the byte length they span.
///
/// A final line without a trailing newline was never fully written and is
/// left out. It may end inside a multi-byte character, so lines are parsed
/// as bytes.
fn parse_records(contents: &[u8]) -> Result<(Vec<StreamRecord>, usize)> {
    let mut records = Vec::new();
    let mut len = 0;
    for (index, line) in contents.split_inclusive(|byte| *byte == b'\n').enumerate() {
        if line.last() != Some(&b'\n') {
            break;
        }
        len += line.len();
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let record = serde_json::from_slice(line).map_err(|source| Error::DeserializeRecord {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok((records, len))
}

#[async_trait]
impl AppendOnlyStore for FileStore {
    async fn append(
        &self,
        stream_id: &str,
        data: Vec<Value>,
        expected_version: u64,
    ) -> Result<Vec<StreamRecord>> {
        debug!(stream_id, expected_version, count = data.len(), "appending records");

        // Writers are serialized by the file lock, so the index cannot change
        // between prepare and commit.
        let mut log_file = self.file.as_ref().ok_or(Error::ReadOnly)?.lock().await;
        if log_file.poisoned {
            if let Err(err) = log_file.roll_back().await {
                warn!(path = %self.path.display(), %err, "log file is still poisoned");
                return Err(Error::Poisoned {
                    path: self.path.clone(),
                });
            }
        }
        let records = self
            .log
            .read()
            .map_err(|_| Error::RwPoison)?
            .prepare(stream_id, data, expected_version, now_millis())?;
        if records.is_empty() {
            return Ok(records);
        }

        let mut buf = Vec::new();
        for record in &records {
            serde_json::to_writer(&mut buf, record).map_err(Error::SerializeRecord)?;
            buf.push(b'\n');
        }

        if let Err(err) = write_batch(&mut log_file.file, &buf, self.sync).await {
            log_file.poisoned = true;
            if let Err(truncate_err) = log_file.roll_back().await {
                warn!(path = %self.path.display(), %truncate_err, "failed to roll back partial write");
            }
            return Err(err);
        }
        log_file.len += buf.len() as u64;

        self.log
            .write()
            .map_err(|_| Error::RwPoison)?
            .commit(records.clone());

        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            info!(stream_id, first_id = first.id, last_id = last.id, version = last.version, "records written");
        }

        Ok(records)
    }

    async fn read_records(
        &self,
        stream_id: &str,
        after_version: u64,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let log = self.log.read().map_err(|_| Error::RwPoison)?;
        Ok(log.read_records(stream_id, after_version, limit))
    }

    async fn read_all_records(
        &self,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<StreamRecord>> {
        let log = self.log.read().map_err(|_| Error::RwPoison)?;
        Ok(log.read_all_records(skip, limit))
    }

    async fn read_all_records_in_range(&self, range: TimeRange) -> Result<Vec<StreamRecord>> {
        let log = self.log.read().map_err(|_| Error::RwPoison)?;
        Ok(log.read_all_records_in_range(range))
    }
}

async fn write_batch(file: &mut tokio::fs::File, buf: &[u8], sync: bool) -> Result<()> {
    file.write_all(buf).await?;
    file.flush().await?;
    if sync {
        file.sync_data().await?;
    }
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! JSON lines, one `{seq, op}` record per mutation, synced on every append.

use crate::op::StoreOp;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt record at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Append-only log of store operations
pub struct Wal {
    file: File,
    sequence: u64,
}

/// Records read from a log, and the byte length of its intact prefix
struct Scan {
    ops: Vec<StoreOp>,
    valid_len: u64,
    /// The intact prefix ends in a record without its newline
    unterminated: bool,
}

impl Wal {
    /// Open or create a WAL at the given path.
    ///
    /// A torn final record is cut off so that new records start on a
    /// clean line.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let scan = Self::scan(path)?;
        let len = file.metadata()?.len();
        if len > scan.valid_len {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = len - scan.valid_len,
                "truncating torn WAL tail"
            );
            file.set_len(scan.valid_len)?;
        }
        if scan.unterminated {
            file.write_all(b"\n")?;
        }
        file.sync_all()?;

        Ok(Self {
            file,
            sequence: scan.ops.len() as u64,
        })
    }

    /// Append an operation to the log.
    ///
    /// A failed write is rolled back so the log never keeps a partial line.
    pub fn append(&mut self, op: &StoreOp) -> Result<u64, WalError> {
        let entry = WalEntry {
            seq: self.sequence + 1,
            op: op.clone(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let len = self.file.metadata()?.len();
        if let Err(e) = self
            .file
            .write_all(&line)
            .and_then(|()| self.file.sync_all())
        {
            if let Err(undo) = self.file.set_len(len) {
                tracing::error!(error = %undo, "failed to roll back partial WAL record");
            }
            return Err(e.into());
        }
        self.sequence += 1;
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all operations from the log.
    ///
    /// A final line that fails to parse is a torn write from a crash and is
    /// dropped; a bad line anywhere else is corruption.
    pub fn replay(path: &Path) -> Result<Vec<StoreOp>, WalError> {
        Ok(Self::scan(path)?.ops)
    }

    fn scan(path: &Path) -> Result<Scan, WalError> {
        let mut scan = Scan {
            ops: Vec::new(),
            valid_len: 0,
            unterminated: false,
        };
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(scan),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut offset = 0u64;
        let mut line_no = 0usize;
        let mut buf = Vec::new();
        // A parse failure is only tolerated on the final line
        let mut torn: Option<(usize, serde_json::Error)> = None;

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            line_no += 1;
            offset += read as u64;

            let terminated = buf.last() == Some(&b'\n');
            let text = String::from_utf8_lossy(&buf);
            if text.trim().is_empty() {
                if terminated && torn.is_none() {
                    scan.valid_len = offset;
                }
                continue;
            }
            if let Some((line, source)) = torn.take() {
                return Err(WalError::Corrupt { line, source });
            }
            match serde_json::from_str::<WalEntry>(text.trim()) {
                Ok(entry) => {
                    scan.ops.push(entry.op);
                    scan.valid_len = offset;
                    scan.unterminated = !terminated;
                }
                Err(source) => torn = Some((line_no, source)),
            }
        }

        if let Some((line, source)) = torn {
            tracing::warn!(line, error = %source, "dropping torn WAL record");
        }
        Ok(scan)
    }

    /// Write `ops` as a fresh log at `path`, replacing whatever was there
    pub fn rewrite(path: &Path, ops: &[StoreOp]) -> Result<(), WalError> {
        let tmp = path.with_extension("wal.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            for (idx, op) in ops.iter().enumerate() {
                let entry = WalEntry {
                    seq: idx as u64 + 1,
                    op: op.clone(),
                };
                serde_json::to_writer(&mut writer, &entry)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct WalEntry {
    seq: u64,
    op: StoreOp,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;

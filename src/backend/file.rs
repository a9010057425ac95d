//! File-backed `Backend` (§4.4). Deliberately thin: it writes bytes to an
//! open file and tracks nothing about size or rotation — that bookkeeping
//! belongs to `Destination`/`rotation.rs`, which own the policy decisions
//! this backend just carries out.
//!
//! Grounded in the teacher's `backend/file.rs` `SimpleRollingWriter`, split
//! into "dumb writer" (here) plus "rotation policy" (`rotation.rs`) since
//! the teacher's version fused the two together.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::backend::Backend;
use crate::error::{Error, ErrorCode, Result};

pub struct FileBackend {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileBackend {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::from_io(ErrorCode::FileOpen, "file_backend_open", e).with_path(&path))?;
        Ok(FileBackend {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for FileBackend {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| Error::from_io(ErrorCode::FileWrite, "file_backend_write", e).with_path(&self.path))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::from_io(ErrorCode::FileFlush, "file_backend_flush", e).with_path(&self.path))
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

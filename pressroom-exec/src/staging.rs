//! Output staging: a write sink during execution, a bounded readable
//! artifact afterward.
//!
//! Staging keeps the producing thread's memory use bounded regardless of
//! output size; the artifact's retention (delete-after-read or otherwise)
//! is the caller's policy.

use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Errors from staging operations.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Underlying I/O failed.
    #[error("staging I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A write was attempted after the sink was closed.
    #[error("staging sink is closed")]
    SinkClosed,
}

/// A write sink during execution plus a bounded result afterward.
///
/// The sink is exclusively owned by the executing job for the duration of a
/// run; the staged content, once produced, is safe for concurrent read-only
/// access.
pub trait Staging: Send + Sync {
    /// Append output produced by the work.
    fn write(&self, buf: &[u8]) -> Result<(), StagingError>;

    /// Flush and close the write sink.
    ///
    /// Idempotent: closing an already-closed sink is not an error. The
    /// execution unit calls this on every exit path.
    fn close(&self) -> Result<(), StagingError>;

    /// The finite-length artifact. Closes the sink if it is still open.
    fn content(&self) -> Result<StagedContent, StagingError>;
}

// ============================================================================
// Staged Content
// ============================================================================

/// A bounded, repeatedly readable handle to staged output.
#[derive(Debug, Clone)]
pub enum StagedContent {
    /// Artifact staged on disk.
    File { path: PathBuf, len: u64 },
    /// Artifact held in memory.
    Memory(Arc<[u8]>),
}

impl StagedContent {
    /// Size of the artifact in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Self::File { len, .. } => *len,
            Self::Memory(bytes) => bytes.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a fresh reader over the artifact.
    pub fn reader(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::File { path, .. } => Ok(Box::new(File::open(path)?)),
            Self::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }

    /// Read the whole artifact into memory.
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.len() as usize);
        self.reader()?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

// ============================================================================
// File Staging
// ============================================================================

/// Stages output to a temp file under a caller-supplied directory.
pub struct FileStaging {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileStaging {
    /// Create a fresh staging file under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self, StagingError> {
        let staged = tempfile::Builder::new()
            .prefix("pressroom-")
            .suffix(".stage")
            .tempfile_in(dir)?;
        // Detach from tempfile's drop-deletion: the artifact must outlive
        // the sink so it can be served after the job finishes.
        let (file, path) = staged.keep().map_err(|e| StagingError::Io(e.error))?;

        Ok(Self {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Location of the staged artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged artifact from disk. Closes the sink first.
    pub fn discard(&self) -> Result<(), StagingError> {
        self.close()?;
        fs::remove_file(&self.path)?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<BufWriter<File>>> {
        // The sink must stay closable after a panicking writer.
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Staging for FileStaging {
    fn write(&self, buf: &[u8]) -> Result<(), StagingError> {
        match self.lock().as_mut() {
            Some(writer) => {
                writer.write_all(buf)?;
                Ok(())
            }
            None => Err(StagingError::SinkClosed),
        }
    }

    fn close(&self) -> Result<(), StagingError> {
        if let Some(mut writer) = self.lock().take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn content(&self) -> Result<StagedContent, StagingError> {
        self.close()?;
        let len = fs::metadata(&self.path)?.len();
        Ok(StagedContent::File {
            path: self.path.clone(),
            len,
        })
    }
}

// ============================================================================
// Memory Staging
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    buf: Vec<u8>,
    closed: bool,
    effective_closes: usize,
}

/// In-memory staging for tests and small outputs.
#[derive(Default)]
pub struct MemoryStaging {
    inner: Mutex<MemoryInner>,
}

impl MemoryStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the sink transitioned from open to closed.
    pub fn effective_closes(&self) -> usize {
        self.lock().effective_closes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Staging for MemoryStaging {
    fn write(&self, buf: &[u8]) -> Result<(), StagingError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(StagingError::SinkClosed);
        }
        inner.buf.extend_from_slice(buf);
        Ok(())
    }

    fn close(&self) -> Result<(), StagingError> {
        let mut inner = self.lock();
        if !inner.closed {
            inner.closed = true;
            inner.effective_closes += 1;
        }
        Ok(())
    }

    fn content(&self) -> Result<StagedContent, StagingError> {
        self.close()?;
        let inner = self.lock();
        Ok(StagedContent::Memory(Arc::from(inner.buf.as_slice())))
    }
}

// ============================================================================
// Tests
// ============================================================================

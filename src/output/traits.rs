//! Output sink trait and error types
//!
//! A sink receives each record exactly once, after its exhibit lookup has
//! finished.

use crate::crawler::Record;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink already finished")]
    Finished,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Consumer of completed records
pub trait RecordSink: Send {
    /// Persists one completed record
    fn accept(&mut self, record: &Record) -> OutputResult<()>;

    /// Flushes and closes the output; called on success and on abort
    fn finish(&mut self) -> OutputResult<()>;
}

/// Sink that keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
    pub finished: bool,
}

impl RecordSink for MemorySink {
    fn accept(&mut self, record: &Record) -> OutputResult<()> {
        if self.finished {
            return Err(OutputError::Finished);
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.finished = true;
        Ok(())
    }
}

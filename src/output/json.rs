//! JSON item feed
//!
//! Records are written and flushed one at a time so a run that stops early
//! still leaves every completed record on disk.

use crate::config::OutputFormat;
use crate::crawler::Record;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes records as a JSON array or as JSON Lines
pub struct JsonFeed<W: Write + Send> {
    writer: W,
    format: OutputFormat,
    written: usize,
    finished: bool,
}

impl JsonFeed<BufWriter<File>> {
    /// Creates (or truncates) the feed file at `path`
    pub fn create(path: &Path, format: OutputFormat) -> OutputResult<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), format)
    }
}

impl<W: Write + Send> JsonFeed<W> {
    /// Wraps a writer; for the array layout the opening bracket is written
    /// immediately
    pub fn new(mut writer: W, format: OutputFormat) -> OutputResult<Self> {
        if format == OutputFormat::Json {
            writer.write_all(b"[")?;
        }
        Ok(Self {
            writer,
            format,
            written: 0,
            finished: false,
        })
    }

    /// Number of records written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Returns the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RecordSink for JsonFeed<W> {
    fn accept(&mut self, record: &Record) -> OutputResult<()> {
        if self.finished {
            return Err(OutputError::Finished);
        }

        match self.format {
            OutputFormat::Json => {
                if self.written > 0 {
                    self.writer.write_all(b",")?;
                }
                self.writer.write_all(b"\n")?;
                serde_json::to_writer(&mut self.writer, record)?;
            }
            OutputFormat::Jsonl => {
                serde_json::to_writer(&mut self.writer, record)?;
                self.writer.write_all(b"\n")?;
            }
        }

        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        if self.format == OutputFormat::Json {
            self.writer.write_all(b"\n]\n")?;
        }
        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }
}

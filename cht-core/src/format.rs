//! Streams records out as CSV or as one JSON array.
//!
//! Nothing is buffered beyond the writer's own buffer: each record is
//! written as it is pulled. An error part-way through leaves what was
//! already written in place.

use std::io::Write;

use tracing::debug;

use crate::contract::Record;
use crate::error::{ConvertError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Writes every record of `records` to `out` in `format`; returns the record count.
pub fn write_records<I, W>(records: I, format: OutputFormat, out: W) -> Result<usize>
where
    I: IntoIterator<Item = Result<Record>>,
    W: Write,
{
    match format {
        OutputFormat::Csv => drain(records, CsvSink::new(out)),
        OutputFormat::Json => drain(records, JsonSink::new(out)),
    }
}

fn drain<I, S>(records: I, mut sink: S) -> Result<usize>
where
    I: IntoIterator<Item = Result<Record>>,
    S: RecordSink,
{
    for record in records {
        sink.write_record(&record?)?;
    }
    let written = sink.finish()?;
    debug!(records = written, "Finished writing records");
    Ok(written)
}

/// Destination for a record stream.
pub trait RecordSink {
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Writes any trailer, flushes, and returns how many records were written.
    fn finish(self) -> Result<usize>;
}

/// CSV output. The first record fixes the header; later records must have
/// exactly the same fields in the same order.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    header: Option<Vec<String>>,
    written: usize,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
            header: None,
            written: 0,
        }
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        match &self.header {
            None => {
                let header: Vec<String> = record.payload.keys().cloned().collect();
                self.writer.write_record(&header)?;
                self.header = Some(header);
            }
            Some(header) => {
                if !header.iter().eq(record.payload.keys()) {
                    return Err(ConvertError::ShapeMismatch {
                        index: self.written + 1,
                        expected: header.clone(),
                        found: record.payload.keys().cloned().collect(),
                    });
                }
            }
        }
        self.writer.write_record(record.payload.values())?;
        self.written += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

/// JSON output: a single array of payload objects, emitted element by element.
pub struct JsonSink<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }
}

impl<W: Write> RecordSink for JsonSink<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        self.out
            .write_all(if self.written == 0 { b"[" } else { b"," })?;
        serde_json::to_writer(&mut self.out, &record.payload)?;
        self.written += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<usize> {
        if self.written == 0 {
            self.out.write_all(b"[")?;
        }
        self.out.write_all(b"]\n")?;
        self.out.flush()?;
        Ok(self.written)
    }
}

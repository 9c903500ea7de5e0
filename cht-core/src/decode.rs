//! Header-driven delimited text decoder.
//!
//! The first row names the fields. The identity key is a configured column
//! (or the first column). An optional deletion marker column flags update
//! rows that remove their key; that column is dropped from the payload so
//! update rows carry the same fields as snapshot rows.

use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::contract::{Payload, Record, RecordDecoder, RecordStream};
use crate::error::{ConvertError, Result};
use crate::product::{DeletionMarker, ProductSettings};

#[derive(Debug, Clone)]
pub struct DelimitedDecoder {
    delimiter: u8,
    key_field: Option<String>,
    deletion_marker: Option<DeletionMarker>,
}

impl DelimitedDecoder {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            key_field: None,
            deletion_marker: None,
        }
    }

    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = Some(field.into());
        self
    }

    pub fn with_deletion_marker(mut self, marker: DeletionMarker) -> Self {
        self.deletion_marker = Some(marker);
        self
    }

    pub fn from_settings(settings: &ProductSettings) -> Self {
        Self {
            delimiter: settings.delimiter,
            key_field: settings.key_field.clone(),
            deletion_marker: settings.deletion_marker.clone(),
        }
    }
}

struct Columns {
    names: StringRecord,
    key: usize,
    marker: Option<(usize, String)>,
}

impl Columns {
    fn to_record(&self, row: &StringRecord) -> Record {
        let key = row.get(self.key).unwrap_or_default().to_string();
        if let Some((index, value)) = &self.marker {
            if row.get(*index) == Some(value.as_str()) {
                return Record::deletion(key);
            }
        }
        let payload: Payload = self
            .names
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(i, _)| self.marker.as_ref().map_or(true, |(m, _)| m != i))
            .map(|(_, (name, value))| (name.to_string(), value.to_string()))
            .collect();
        Record::upsert(key, payload)
    }
}

impl RecordDecoder for DelimitedDecoder {
    fn decode(&self, path: &Path, reader: Box<dyn Read + Send>) -> Result<RecordStream> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(reader);
        let names = csv_reader
            .headers()
            .map_err(|e| ConvertError::decode(path, e))?
            .clone();
        if names.is_empty() {
            debug!(path = %path.display(), "Empty file, no records");
            return Ok(Box::new(std::iter::empty()));
        }

        let key = match &self.key_field {
            Some(field) => names
                .iter()
                .position(|name| name == field)
                .ok_or_else(|| ConvertError::decode(path, format!("no \"{field}\" column")))?,
            None => 0,
        };
        let marker = self.deletion_marker.as_ref().and_then(|marker| {
            let index = names.iter().position(|name| name == marker.field);
            if index.is_none() {
                debug!(path = %path.display(), field = %marker.field, "Deletion marker column absent");
            }
            index.map(|i| (i, marker.value.clone()))
        });
        let columns = Columns { names, key, marker };

        let path = path.to_path_buf();
        Ok(Box::new(csv_reader.into_records().map(move |row| {
            row.map(|row| columns.to_record(&row))
                .map_err(|e| ConvertError::decode(&path, e))
        })))
    }
}

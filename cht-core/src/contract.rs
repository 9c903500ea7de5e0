//! # contract: shared data model and the decoder seam
//!
//! Plain data types passed between the pipeline stages, plus the one trait
//! ([`RecordDecoder`]) that separates this crate from product-specific
//! byte layouts.
//!
//! ## Mocking & Testing
//! - [`RecordDecoder`] is annotated for `mockall` so tests can observe exactly
//!   when (and for which file) the streaming reader asks for a decode.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Whether a path on disk is a single file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::File => f.write_str("file"),
            SourceKind::Directory => f.write_str("directory"),
        }
    }
}

/// Rule for choosing which files inside a directory take part in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSelection {
    All,
    Latest,
    /// Files whose timestamp is strictly later than the cutoff.
    After(NaiveDateTime),
}

/// A resolved input. A directory has no records of its own until the
/// selector expands it into files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File {
        path: PathBuf,
    },
    Directory {
        path: PathBuf,
        extension: String,
        file_selection: FileSelection,
    },
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::File { .. } => SourceKind::File,
            Source::Directory { .. } => SourceKind::Directory,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Source::File { path } | Source::Directory { path, .. } => path,
        }
    }
}

/// Known register data products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProductId {
    /// Full snapshot export.
    #[serde(rename = "183")]
    Prod183,
    /// Incremental update files against product 183.
    #[serde(rename = "101")]
    Prod101,
    /// Plain CSV export, used by `transform`.
    #[serde(rename = "217")]
    Prod217,
}

impl ProductId {
    pub fn code(&self) -> &'static str {
        match self {
            ProductId::Prod183 => "183",
            ProductId::Prod101 => "101",
            ProductId::Prod217 => "217",
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Identifies which decoder and default selection policy apply to a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDescriptor {
    pub product_id: ProductId,
    pub file_extension: String,
    pub default_file_selection: FileSelection,
}

/// Ordered field name -> value mapping of a decoded record.
pub type Payload = IndexMap<String, String>;

/// One decoded unit of data. The decoder decides what the identity key is;
/// the rest of the pipeline only compares keys and forwards payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub payload: Payload,
    /// Set on update records that remove `key` from the combined state.
    pub deleted: bool,
}

impl Record {
    pub fn upsert(key: impl Into<String>, payload: Payload) -> Self {
        Self {
            key: key.into(),
            payload,
            deleted: false,
        }
    }

    pub fn deletion(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: Payload::new(),
            deleted: true,
        }
    }
}

/// A lazy, pull-driven sequence of records. The first `Err` ends the stream.
pub type RecordStream = Box<dyn Iterator<Item = Result<Record, ConvertError>> + Send>;

/// Turns one open file into a stream of identified records.
///
/// The reader handed in is owned by the returned stream; dropping the stream
/// releases the file handle.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, path: &Path, reader: Box<dyn Read + Send>) -> Result<RecordStream>;
}

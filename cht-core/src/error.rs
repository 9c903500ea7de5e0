use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::contract::SourceKind;
use crate::product::ProductPair;

/// Every failure the conversion pipelines can surface.
///
/// All variants are fatal: nothing in the core retries or recovers. Callers
/// (the CLI boundary) print the message and exit non-zero.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("File or directory \"{}\" does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("Directory \"{}\" does not contain any {extension} files", path.display())]
    EmptyDirectory { path: PathBuf, extension: String },

    #[error(
        "Unknown product pair \"{0}\" (recognised: {recognised})",
        recognised = ProductPair::RECOGNISED.join(", ")
    )]
    InvalidProductPair(String),

    #[error("{label} path must be a {expected}, not a {found}: \"{}\"", path.display())]
    InvalidSourceKind {
        label: &'static str,
        path: PathBuf,
        expected: SourceKind,
        found: SourceKind,
    },

    #[error("failed to decode \"{}\": {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("record {index} has fields {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    pub fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ConvertError::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;

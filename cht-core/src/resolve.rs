use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::contract::{ProductDescriptor, Source, SourceKind};
use crate::error::{ConvertError, Result};

/// Classifies `path` as a file or directory source for the given product.
///
/// Only stats the path. A directory inherits the product's extension and
/// default file selection.
pub fn resolve(path: &Path, product: &ProductDescriptor) -> Result<Source> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Source path does not exist");
            return Err(ConvertError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(ConvertError::Io(e)),
    };

    let source = if metadata.is_dir() {
        Source::Directory {
            path: path.to_path_buf(),
            extension: product.file_extension.clone(),
            file_selection: product.default_file_selection,
        }
    } else {
        Source::File {
            path: path.to_path_buf(),
        }
    };

    info!(
        path = %path.display(),
        product = %product.product_id,
        kind = %source.kind(),
        "Resolved source"
    );
    Ok(source)
}

/// Like [`resolve`], but rejects a source of the wrong kind.
pub fn resolve_expecting(
    label: &'static str,
    path: &Path,
    product: &ProductDescriptor,
    expected: SourceKind,
) -> Result<Source> {
    let source = resolve(path, product)?;
    if source.kind() != expected {
        return Err(ConvertError::InvalidSourceKind {
            label,
            path: path.to_path_buf(),
            expected,
            found: source.kind(),
        });
    }
    Ok(source)
}

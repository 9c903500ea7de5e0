//! Turns a resolved [`Source`] into one lazy record stream.
//!
//! A directory is expanded by the selector up front (names only), then its
//! files are opened one at a time, strictly in order, and only when the
//! consumer pulls past the end of the previous file. At most one file handle
//! is live at any moment; dropping the stream closes it and opens nothing
//! further.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::contract::{Record, RecordDecoder, RecordStream, Source};
use crate::error::{ConvertError, Result};
use crate::selection::select_files;

/// Opens `source` as a single ordered stream of records.
///
/// File selection errors (e.g. an empty directory) are returned here,
/// before any file is opened. Decode errors surface as the stream's final item.
pub fn open(source: &Source, decoder: Arc<dyn RecordDecoder>) -> Result<SourceRecords> {
    let files = expand(source)?;
    Ok(SourceRecords::new(files, decoder))
}

/// The ordered list of files a source stands for.
pub fn expand(source: &Source) -> Result<Vec<PathBuf>> {
    match source {
        Source::File { path } => Ok(vec![path.clone()]),
        Source::Directory {
            path,
            extension,
            file_selection,
        } => select_files(path, extension, *file_selection),
    }
}

/// Total size in bytes of the files a source stands for.
pub fn estimate_size(source: &Source) -> Result<u64> {
    total_size(&expand(source)?)
}

pub fn total_size(files: &[PathBuf]) -> Result<u64> {
    let mut total = 0;
    for path in files {
        total += std::fs::metadata(path)?.len();
    }
    Ok(total)
}

/// Lazy flat-map over the decoded contents of a fixed list of files.
pub struct SourceRecords {
    pending: VecDeque<PathBuf>,
    current: Option<(PathBuf, RecordStream)>,
    decoder: Arc<dyn RecordDecoder>,
    files_opened: usize,
    finished: bool,
}

impl SourceRecords {
    pub fn new(files: Vec<PathBuf>, decoder: Arc<dyn RecordDecoder>) -> Self {
        Self {
            pending: files.into(),
            current: None,
            decoder,
            files_opened: 0,
            finished: false,
        }
    }

    /// Number of files opened so far.
    pub fn files_opened(&self) -> usize {
        self.files_opened
    }

    fn open_file(&self, path: &Path) -> Result<RecordStream> {
        let file = File::open(path).map_err(|e| {
            error!(error = ?e, path = %path.display(), "Failed to open source file");
            ConvertError::Io(e)
        })?;
        self.decoder.decode(path, Box::new(BufReader::new(file)))
    }

    fn abort(&mut self, e: ConvertError) -> Option<Result<Record>> {
        error!(error = %e, "Aborting record stream");
        self.finished = true;
        self.current = None;
        self.pending.clear();
        Some(Err(e))
    }
}

impl Iterator for SourceRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if let Some((path, stream)) = self.current.as_mut() {
                match stream.next() {
                    Some(Ok(record)) => return Some(Ok(record)),
                    Some(Err(e)) => return self.abort(e),
                    None => {
                        debug!(path = %path.display(), "Finished reading file");
                        self.current = None;
                    }
                }
            }

            let Some(path) = self.pending.pop_front() else {
                self.finished = true;
                return None;
            };
            debug!(path = %path.display(), "Opening file");
            match self.open_file(&path) {
                Ok(stream) => {
                    self.files_opened += 1;
                    self.current = Some((path, stream));
                }
                Err(e) => return self.abort(e),
            }
        }
    }
}

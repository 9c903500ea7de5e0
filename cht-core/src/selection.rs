//! Expands a directory source into the ordered list of files to stream.
//!
//! Selection only looks at names and metadata, never contents, so it always
//! completes before the first byte is decoded. Ordering never trusts the
//! directory listing: every file gets a timestamp (embedded in its name, or
//! its modification time when the name carries none) and files are sorted by
//! `(timestamp, path)`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::contract::FileSelection;
use crate::error::{ConvertError, Result};

/// A candidate file together with the key it is ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedFile {
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
}

/// Returns the files of `directory` that take part under `selection`, oldest first.
pub fn select_files(
    directory: &Path,
    extension: &str,
    selection: FileSelection,
) -> Result<Vec<PathBuf>> {
    Ok(select_dated_files(directory, extension, selection)?
        .into_iter()
        .map(|file| file.path)
        .collect())
}

/// Same as [`select_files`] but keeps each file's ordering timestamp.
pub fn select_dated_files(
    directory: &Path,
    extension: &str,
    selection: FileSelection,
) -> Result<Vec<DatedFile>> {
    let mut files = matching_files(directory, extension)?;
    if files.is_empty() {
        return Err(ConvertError::EmptyDirectory {
            path: directory.to_path_buf(),
            extension: extension.to_string(),
        });
    }
    files.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.path.cmp(&b.path))
    });

    let selected: Vec<DatedFile> = match selection {
        FileSelection::All => files,
        FileSelection::Latest => files.pop().into_iter().collect(),
        FileSelection::After(cutoff) => files
            .into_iter()
            .filter(|file| file.timestamp > cutoff)
            .collect(),
    };

    info!(
        directory = %directory.display(),
        extension,
        ?selection,
        selected = selected.len(),
        "Selected files from directory"
    );
    for file in &selected {
        debug!(path = %file.path.display(), timestamp = %file.timestamp, "Selected file");
    }
    Ok(selected)
}

fn matching_files(directory: &Path, extension: &str) -> Result<Vec<DatedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        let timestamp = match file_name_timestamp(path) {
            Some(ts) => ts,
            None => {
                let metadata = entry.metadata().map_err(io::Error::from)?;
                let modified = DateTime::<Utc>::from(metadata.modified()?).naive_utc();
                debug!(path = %path.display(), %modified, "No timestamp in file name, using modification time");
                modified
            }
        };
        files.push(DatedFile {
            path: path.to_path_buf(),
            timestamp,
        });
    }
    Ok(files)
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?:^|\D)(\d{4})-?(\d{2})-?(\d{2})(?:[T_-]?(\d{2}):?(\d{2}):?(\d{2}))?(?:\D|$)",
        )
        .expect("timestamp pattern is valid")
    })
}

/// Extracts the first valid `YYYYMMDD[HHMMSS]` style timestamp from a file name.
pub fn file_name_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_str()?;
    timestamp_pattern().captures_iter(name).find_map(|caps| {
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let date = NaiveDate::from_ymd_opt(caps[1].parse().ok()?, number(2)?, number(3)?)?;
        let time = match (number(4), number(5), number(6)) {
            (Some(h), Some(m), Some(s)) => NaiveTime::from_hms_opt(h, m, s)?,
            _ => NaiveTime::MIN,
        };
        Some(date.and_time(time))
    })
}

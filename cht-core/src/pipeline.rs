//! High-level pipelines: `transform` and `snapshot`.
//!
//! Both pipelines resolve and validate every input before the first record is
//! decoded, then stream records from source to sink in a single pull-driven
//! pass:
//!   - `transform` re-encodes one file, or every matching file beneath a
//!     directory, each file independently and concatenated in selection order.
//!   - `snapshot` folds a baseline snapshot with every selected update file
//!     (oldest first) and writes the resulting current state.
//!
//! # Major Types
//! - [`SnapshotRequest`] / [`SnapshotPlan`]: user input, and the validated,
//!   fully-resolved form of it.
//! - [`TransformRequest`] / [`TransformPlan`]: input path, product and
//!   output format, and the files they select.
//! - [`ConversionReport`]: how many files were read and records written.
//!
//! # Error Handling
//! Validation failures (unknown product pair, missing path, wrong source kind,
//! empty directory) are returned by [`plan_snapshot`] / [`plan_transform`]
//! before any output is produced. A failure mid-stream aborts the run; bytes
//! already handed to the writer stay there.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::combine::combine;
use crate::contract::{FileSelection, ProductId, RecordDecoder, Source, SourceKind};
use crate::error::Result;
use crate::format::{write_records, OutputFormat};
use crate::product::{ProductCatalog, ProductPair};
use crate::reader::{expand, open, total_size, SourceRecords};
use crate::resolve::{resolve, resolve_expecting};

/// Summary of a finished conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub files: usize,
    pub records: usize,
}

/// Input to the snapshot pipeline, as given by the user.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub product_pair: String,
    pub snapshot_path: PathBuf,
    pub updates_path: PathBuf,
    pub updates_after: Option<NaiveDateTime>,
    pub format: OutputFormat,
}

/// A validated snapshot run: sources resolved and their files selected.
pub struct SnapshotPlan {
    pub pair: ProductPair,
    pub snapshot: Source,
    pub updates: Source,
    pub snapshot_files: Vec<PathBuf>,
    pub update_files: Vec<PathBuf>,
    pub format: OutputFormat,
    snapshot_decoder: Arc<dyn RecordDecoder>,
    updates_decoder: Arc<dyn RecordDecoder>,
}

impl std::fmt::Debug for SnapshotPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotPlan")
            .field("pair", &self.pair)
            .field("snapshot", &self.snapshot)
            .field("updates", &self.updates)
            .field("snapshot_files", &self.snapshot_files)
            .field("update_files", &self.update_files)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Validates a snapshot request and selects every file it will read.
pub fn plan_snapshot(request: &SnapshotRequest, catalog: &ProductCatalog) -> Result<SnapshotPlan> {
    let pair: ProductPair = request.product_pair.parse()?;
    let (snapshot_product, updates_product) = pair.descriptors(catalog, request.updates_after);

    let snapshot = resolve(&request.snapshot_path, &snapshot_product)?;
    let updates = resolve_expecting(
        "Updates",
        &request.updates_path,
        &updates_product,
        SourceKind::Directory,
    )?;

    let snapshot_files = expand(&snapshot)?;
    let update_files = expand(&updates)?;
    debug!(
        snapshot_bytes = total_size(&snapshot_files)?,
        update_bytes = total_size(&update_files)?,
        "Estimated input size"
    );

    info!(
        pair = %pair.file_stem(),
        snapshot_files = snapshot_files.len(),
        update_files = update_files.len(),
        "Planned snapshot"
    );
    Ok(SnapshotPlan {
        pair,
        snapshot,
        updates,
        snapshot_files,
        update_files,
        format: request.format,
        snapshot_decoder: catalog.decoder(pair.snapshot),
        updates_decoder: catalog.decoder(pair.updates),
    })
}

/// Folds the planned snapshot and updates, writing the current state to `out`.
///
/// Update files become separate streams applied oldest first; each is opened
/// only once the previous one has been fully applied.
pub fn run_snapshot<W: Write>(plan: SnapshotPlan, out: W) -> Result<ConversionReport> {
    let files = plan.snapshot_files.len() + plan.update_files.len();

    let updates_decoder = plan.updates_decoder;
    let updates = plan.update_files.into_iter().map(move |path| {
        debug!(path = %path.display(), "Applying update file");
        SourceRecords::new(vec![path], updates_decoder.clone())
    });
    let combined = combine(
        SourceRecords::new(plan.snapshot_files, plan.snapshot_decoder),
        updates,
    )?;

    let records = write_records(combined.map(Ok), plan.format, out)?;
    info!(files, records, "Snapshot written");
    Ok(ConversionReport { files, records })
}

/// Input to the transform pipeline.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub input: PathBuf,
    /// `None` detects the product from the input path.
    pub product: Option<ProductId>,
    pub format: OutputFormat,
}

/// Picks the product whose file extension matches `input`, falling back to product 217.
pub fn detect_product(input: &Path, catalog: &ProductCatalog) -> ProductId {
    let detected = input
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| {
            [ProductId::Prod217, ProductId::Prod183, ProductId::Prod101]
                .into_iter()
                .find(|id| catalog.settings(*id).extension == ext)
        })
        .unwrap_or(ProductId::Prod217);
    debug!(input = %input.display(), product = %detected, "Detected product");
    detected
}

/// A validated transform run: the files to convert, in order.
pub struct TransformPlan {
    pub product: ProductId,
    pub source: Source,
    pub files: Vec<PathBuf>,
    pub format: OutputFormat,
    decoder: Arc<dyn RecordDecoder>,
}

impl std::fmt::Debug for TransformPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPlan")
            .field("product", &self.product)
            .field("source", &self.source)
            .field("files", &self.files)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Resolves the transform input and selects every file it will read.
///
/// Rows are re-encoded as read: deletion markers are not interpreted.
pub fn plan_transform(request: &TransformRequest, catalog: &ProductCatalog) -> Result<TransformPlan> {
    let product = request
        .product
        .unwrap_or_else(|| detect_product(&request.input, catalog));
    let descriptor = catalog.descriptor(product, FileSelection::All);
    let source = resolve(&request.input, &descriptor)?;
    let files = expand(&source)?;
    if source.kind() == SourceKind::Directory {
        info!(
            directory = %source.path().display(),
            files = files.len(),
            "Directory provided, processing all files within it"
        );
    }
    Ok(TransformPlan {
        product,
        source,
        files,
        format: request.format,
        decoder: catalog.transform_decoder(product),
    })
}

/// Re-encodes each planned file to `out`, one after another. Every file is
/// converted on its own: CSV output repeats the header, JSON output is one
/// array per file.
pub fn run_transform<W: Write>(plan: TransformPlan, mut out: W) -> Result<ConversionReport> {
    let mut report = ConversionReport::default();
    for path in plan.files {
        let records = open(&Source::File { path: path.clone() }, plan.decoder.clone())?;
        let written = write_records(records, plan.format, &mut out)?;
        debug!(path = %path.display(), records = written, "Transformed file");
        report.files += 1;
        report.records += written;
    }
    info!(files = report.files, records = report.records, "Transform complete");
    Ok(report)
}

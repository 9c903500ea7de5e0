//! Product catalog: which extension, decoder settings and default file
//! selection belong to each data product, and which products pair up for
//! the snapshot pipeline.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::contract::{FileSelection, ProductDescriptor, ProductId, RecordDecoder};
use crate::decode::DelimitedDecoder;
use crate::error::ConvertError;

/// Marks an update row as a deletion when `field` holds `value`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeletionMarker {
    pub field: String,
    pub value: String,
}

/// Per-product file and decoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductSettings {
    pub extension: String,
    #[serde(default = "default_delimiter", deserialize_with = "deserialize_delimiter")]
    pub delimiter: u8,
    #[serde(default)]
    pub key_field: Option<String>,
    #[serde(default)]
    pub deletion_marker: Option<DeletionMarker>,
}

fn default_delimiter() -> u8 {
    b','
}

fn deserialize_delimiter<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let c = char::deserialize(deserializer)?;
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(serde::de::Error::custom(format!(
            "delimiter must be a single ASCII character, got {c:?}"
        )))
    }
}

impl ProductSettings {
    fn with_extension(extension: &str) -> Self {
        Self {
            extension: extension.to_string(),
            delimiter: default_delimiter(),
            key_field: None,
            deletion_marker: None,
        }
    }
}

/// Settings for every known product. Entries missing from a config keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCatalog {
    products: BTreeMap<ProductId, ProductSettings>,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        let mut updates = ProductSettings::with_extension("txt");
        updates.deletion_marker = Some(DeletionMarker {
            field: "action".into(),
            value: "D".into(),
        });
        let products = BTreeMap::from([
            (ProductId::Prod183, ProductSettings::with_extension("dat")),
            (ProductId::Prod101, updates),
            (ProductId::Prod217, ProductSettings::with_extension("csv")),
        ]);
        Self { products }
    }
}

impl ProductCatalog {
    /// Default catalog with the given entries replaced.
    pub fn with_overrides(overrides: BTreeMap<ProductId, ProductSettings>) -> Self {
        let mut catalog = Self::default();
        for (id, settings) in overrides {
            debug!(product = %id, ?settings, "Overriding product settings");
            catalog.products.insert(id, settings);
        }
        catalog
    }

    pub fn settings(&self, id: ProductId) -> &ProductSettings {
        // every ProductId is seeded by Default
        &self.products[&id]
    }

    pub fn descriptor(&self, id: ProductId, default_file_selection: FileSelection) -> ProductDescriptor {
        ProductDescriptor {
            product_id: id,
            file_extension: self.settings(id).extension.clone(),
            default_file_selection,
        }
    }

    /// Decoder for folding: honours the key column and deletion marker.
    pub fn decoder(&self, id: ProductId) -> Arc<dyn RecordDecoder> {
        Arc::new(DelimitedDecoder::from_settings(self.settings(id)))
    }

    /// Decoder for re-encoding: only the delimiter applies, so every column
    /// and every row (deletion rows included) passes through unchanged.
    pub fn transform_decoder(&self, id: ProductId) -> Arc<dyn RecordDecoder> {
        Arc::new(DelimitedDecoder::new(self.settings(id).delimiter))
    }
}

/// A snapshot product together with the product that carries its updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductPair {
    pub snapshot: ProductId,
    pub updates: ProductId,
}

impl ProductPair {
    pub const RECOGNISED: [&'static str; 1] = ["183,101"];

    /// Descriptors for the snapshot and the updates inputs.
    ///
    /// A snapshot directory selects its latest file. Updates use every file,
    /// or only those after `updates_after` when given.
    pub fn descriptors(
        &self,
        catalog: &ProductCatalog,
        updates_after: Option<chrono::NaiveDateTime>,
    ) -> (ProductDescriptor, ProductDescriptor) {
        let updates_selection = updates_after.map_or(FileSelection::All, FileSelection::After);
        (
            catalog.descriptor(self.snapshot, FileSelection::Latest),
            catalog.descriptor(self.updates, updates_selection),
        )
    }

    /// Token used in output file names, e.g. `183_101`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.snapshot, self.updates)
    }
}

impl FromStr for ProductPair {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "183,101" => Ok(ProductPair {
                snapshot: ProductId::Prod183,
                updates: ProductId::Prod101,
            }),
            _ => Err(ConvertError::InvalidProductPair(s.to_string())),
        }
    }
}

//! A metadata catalog backed by a YAML file.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use printspec_core::legend::CatalogRecord;
use printspec_core::registry::{MetadataError, MetadataService};
use tracing::debug;

use crate::{PrintCliError, PrintCliResult};

/// Catalog records keyed by record id.
///
/// ```yaml
/// rec-dop:
///   date: 2024-05-01
///   owner: Landesbetrieb Geoinformation und Vermessung
///   city: Hamburg
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileCatalog {
    records: HashMap<String, CatalogRecord>,
}

impl FileCatalog {
    pub async fn load(path: &Path) -> PrintCliResult<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PrintCliError::CatalogLoadError(e, path.to_path_buf()))?;
        let records: HashMap<String, CatalogRecord> = serde_yaml::from_str(&contents)
            .map_err(|e| PrintCliError::CatalogParseError(e, path.to_path_buf()))?;
        debug!("Loaded {} catalog records from {}", records.len(), path.display());
        Ok(Self { records })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(String, CatalogRecord)> for FileCatalog {
    fn from_iter<T: IntoIterator<Item = (String, CatalogRecord)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl MetadataService for FileCatalog {
    async fn fetch(&self, record_id: &str) -> Result<CatalogRecord, MetadataError> {
        self.records
            .get(record_id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(record_id.to_string()))
    }
}

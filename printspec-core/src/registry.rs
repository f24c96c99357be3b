//! Collaborators the compiler reads from or hands results to.
//!
//! The live map, the legend registry, the metadata catalog and the print
//! transport are all owned elsewhere. They are passed in at call time so that
//! compilation never reaches for process-wide state.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::legend::{CatalogRecord, LegendEntry};
use crate::model::{Extent, Feature, Layer, ViewState};
use crate::spec::PrintJobSpec;

/// Read-only access to the interactive map.
pub trait LayerRegistry: Debug {
    /// The visible layer stack, bottom-most layer first.
    fn layers(&self) -> &[Layer];

    /// Features of a vector layer intersecting `extent`.
    fn features_in_extent(&self, layer_id: &str, extent: &Extent) -> Vec<Feature>;

    /// The current view.
    fn view(&self) -> ViewState;
}

/// Read-only access to per-layer legend entries.
pub trait LegendRegistry: Debug {
    /// The legend entry registered for a layer, if any.
    fn legend_entry(&self, layer_id: &str) -> Option<LegendEntry>;
}

/// Errors returned by a [`MetadataService`].
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    /// The catalog has no record with this id.
    #[error("Catalog record {0} does not exist")]
    NotFound(String),

    /// The catalog could not be reached or answered garbage.
    #[error("Catalog request for {0} failed: {1}")]
    Unavailable(String, String),
}

/// The catalog service legend metadata is enriched from.
#[async_trait]
pub trait MetadataService: Send + Sync + Debug {
    /// Looks up one catalog record.
    async fn fetch(&self, record_id: &str) -> Result<CatalogRecord, MetadataError>;
}

/// Errors returned by a [`PrintTransport`].
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The service refused the job
    #[error("Rendering service rejected the print job: {0}")]
    Rejected(String),

    /// Writing the job failed
    #[error("IO error while handing over the print job: {0}")]
    Io(#[from] std::io::Error),

    /// The job could not be encoded
    #[error("Unable to serialize the print job: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reference to a rendered print, e.g. a download URL or a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintArtifact {
    /// Path or URL of the result
    pub location: String,
}

/// Hands a finished job to the rendering service.
#[async_trait]
pub trait PrintTransport: Send + Sync + Debug {
    /// Submits the job and returns where the result can be found.
    async fn submit(&self, job: &PrintJobSpec) -> Result<PrintArtifact, TransportError>;
}

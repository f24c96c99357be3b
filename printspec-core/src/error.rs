use crate::legend::MetadataRequest;
use crate::registry::{MetadataError, TransportError};
use crate::rules::RuleKeyError;
use crate::style::StyleError;

/// Errors that can occur while compiling or dispatching a print job.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum PrintError {
    /// A style function failed for one feature of a vector layer.
    #[error("Style of feature {feature} in layer {layer} could not be resolved: {source}")]
    Style {
        /// Id of the layer being compiled
        layer: String,
        /// Id (or internal handle) of the offending feature
        feature: String,
        /// The underlying style function error
        #[source]
        source: StyleError,
    },

    /// A rule key could not be parsed.
    #[error(transparent)]
    RuleKey(#[from] RuleKeyError),

    /// Catalog metadata could not be fetched.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The rendering service rejected or failed the job.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The job was never finalized because some metadata responses are missing.
    #[error("Print job was not dispatched, {} metadata response(s) never arrived: {}", .0.len(), pending_layers(.0))]
    MetadataIncomplete(Vec<MetadataRequest>),

    /// The candidate scale list is empty.
    #[error("No print scales are configured")]
    NoScales,
}

fn pending_layers(requests: &[MetadataRequest]) -> String {
    requests
        .iter()
        .map(|r| r.layer_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A convenience [`Result`] for print compilation.
pub type PrintResult<T> = Result<T, PrintError>;

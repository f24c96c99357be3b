use std::io;
use std::path::PathBuf;

use printspec_core::PrintError;

/// A convenience [`Result`] for the command line tool.
pub type PrintCliResult<T> = Result<T, PrintCliError>;

#[derive(thiserror::Error, Debug)]
pub enum PrintCliError {
    #[error("Unable to load config file {1}: {0}")]
    ConfigLoadError(#[source] io::Error, PathBuf),

    #[error("Unable to parse config file {1}: {0}")]
    ConfigParseError(#[source] subst::yaml::Error, PathBuf),

    #[error("Unable to write config file {1}: {0}")]
    ConfigWriteError(#[source] io::Error, PathBuf),

    #[error("Unable to serialize the configuration: {0}")]
    ConfigSerializeError(#[source] serde_yaml::Error),

    #[error("Unable to load map snapshot {1}: {0}")]
    SnapshotLoadError(#[source] io::Error, PathBuf),

    #[error("Unable to parse map snapshot {1}: {0}")]
    SnapshotParseError(#[source] serde_json::Error, PathBuf),

    #[error("Unable to load metadata catalog {1}: {0}")]
    CatalogLoadError(#[source] io::Error, PathBuf),

    #[error("Unable to parse metadata catalog {1}: {0}")]
    CatalogParseError(#[source] serde_yaml::Error, PathBuf),

    #[error("Unable to parse feature info file {1}: {0}")]
    GfiParseError(#[source] serde_json::Error, PathBuf),

    #[error("Unable to load feature info file {1}: {0}")]
    GfiLoadError(#[source] io::Error, PathBuf),

    #[error("Layout '{0}' is not configured. Available layouts: {layouts}", layouts = .1.join(", "))]
    UnknownLayout(String, Vec<String>),

    #[error("No print layouts are configured. Add at least one entry to 'layouts'")]
    NoLayouts,

    #[error(transparent)]
    PrintError(#[from] PrintError),
}

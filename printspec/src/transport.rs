//! Hands finished print jobs over as JSON documents.

use std::path::PathBuf;

use async_trait::async_trait;
use printspec_core::registry::{PrintArtifact, PrintTransport, TransportError};
use printspec_core::spec::PrintJobSpec;
use tokio::io::AsyncWriteExt as _;
use tracing::info;

/// Writes the job to a file, or to stdout.
///
/// The rendering service picks the documents up from there; submitting them
/// over HTTP is left to the deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTransport {
    /// `None` for stdout
    target: Option<PathBuf>,
}

impl FileTransport {
    #[must_use]
    pub fn new(target: Option<PathBuf>) -> Self {
        Self { target }
    }
}

#[async_trait]
impl PrintTransport for FileTransport {
    async fn submit(&self, job: &PrintJobSpec) -> Result<PrintArtifact, TransportError> {
        let mut json = serde_json::to_vec_pretty(job)?;
        json.push(b'\n');
        let location = match &self.target {
            Some(path) => {
                tokio::fs::write(path, &json).await?;
                path.display().to_string()
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&json).await?;
                stdout.flush().await?;
                "stdout".to_string()
            }
        };
        info!("Wrote print job ({} bytes) to {location}", json.len());
        Ok(PrintArtifact { location })
    }
}

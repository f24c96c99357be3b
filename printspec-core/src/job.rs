//! Gating a print job on its outstanding catalog metadata.

use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt as _};
use tracing::{debug, info, warn};

use crate::legend::{CatalogRecord, MetadataRequest, PrintWarning};
use crate::registry::{MetadataError, MetadataService, PrintArtifact, PrintTransport};
use crate::spec::PrintJobSpec;
use crate::{PrintError, PrintResult};

/// An assembled job waiting for its metadata responses.
///
/// The job is released exactly once: by [`take_if_ready`](Self::take_if_ready)
/// when nothing is pending, or by the response that clears the last pending
/// request. Responses for unknown or already answered requests change nothing.
#[derive(Debug)]
pub struct PendingJob {
    spec: Option<PrintJobSpec>,
    pending: Vec<MetadataRequest>,
    warnings: Vec<PrintWarning>,
}

impl PendingJob {
    /// Wraps an assembled job and the metadata requests it waits for.
    #[must_use]
    pub fn new(
        spec: PrintJobSpec,
        pending: Vec<MetadataRequest>,
        warnings: Vec<PrintWarning>,
    ) -> Self {
        Self {
            spec: Some(spec),
            pending,
            warnings,
        }
    }

    /// Requests still waiting for a response.
    #[must_use]
    pub fn pending(&self) -> &[MetadataRequest] {
        &self.pending
    }

    /// Warnings collected so far.
    #[must_use]
    pub fn warnings(&self) -> &[PrintWarning] {
        &self.warnings
    }

    /// The job as assembled so far, unless it was already released.
    #[must_use]
    pub fn spec(&self) -> Option<&PrintJobSpec> {
        self.spec.as_ref()
    }

    /// Releases the job if no request is pending.
    pub fn take_if_ready(&mut self) -> Option<PrintJobSpec> {
        if self.pending.is_empty() {
            self.spec.take()
        } else {
            None
        }
    }

    /// Applies the response to request `id`.
    ///
    /// Returns the job when this response cleared the last pending request. A
    /// failed fetch leaves its request pending.
    pub fn on_response(
        &mut self,
        id: u64,
        response: Result<CatalogRecord, MetadataError>,
    ) -> Option<PrintJobSpec> {
        let Some(position) = self.pending.iter().position(|r| r.id == id) else {
            warn!("Ignoring metadata response #{id}, no such request is pending");
            return None;
        };
        let record = match response {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    "Metadata for {} could not be loaded: {e}",
                    self.pending[position].layer_name
                );
                return None;
            }
        };
        let mut request = self.pending.remove(position);
        request.pending = false;
        debug!(
            "Metadata #{id} for {} arrived, {} pending",
            request.layer_name,
            self.pending.len()
        );
        self.patch(&request, &record);
        self.take_if_ready()
    }

    /// Gives up on all pending requests and releases the job with the
    /// metadata of those layers marked as missing.
    pub fn expire(&mut self) -> Option<PrintJobSpec> {
        let expired = std::mem::take(&mut self.pending);
        if !expired.is_empty() {
            for request in &expired {
                self.patch(request, &CatalogRecord::default());
            }
            let layers: Vec<String> = expired.into_iter().map(|r| r.layer_name).collect();
            warn!("Metadata of {} did not arrive in time", layers.join(", "));
            self.warnings.push(PrintWarning::MetadataTimedOut { layers });
        }
        self.spec.take()
    }

    fn patch(&mut self, request: &MetadataRequest, record: &CatalogRecord) {
        let layer = self
            .spec
            .as_mut()
            .and_then(|spec| spec.attributes.legend.layers.get_mut(request.legend_index));
        if let Some(layer) = layer {
            layer.apply_record(record);
        }
    }
}

/// How [`gather_metadata`] ended.
#[derive(Debug)]
pub enum GatherOutcome {
    /// Every request was answered.
    Ready(PrintJobSpec),
    /// The timeout expired, missing metadata is marked as such.
    TimedOut(PrintJobSpec),
    /// All fetches finished but some failed; the job was not released.
    Stalled(Vec<MetadataRequest>),
}

/// Fetches all pending metadata of `job` concurrently and applies the
/// responses in arrival order.
///
/// Without a `timeout` this waits for as long as the service takes.
pub async fn gather_metadata(
    job: &mut PendingJob,
    service: &dyn MetadataService,
    timeout: Option<Duration>,
) -> GatherOutcome {
    if let Some(spec) = job.take_if_ready() {
        return GatherOutcome::Ready(spec);
    }

    let mut fetches: FuturesUnordered<_> = job
        .pending()
        .iter()
        .map(|request| {
            let id = request.id;
            let record_id = request.record_id.clone();
            async move { (id, service.fetch(&record_id).await) }
        })
        .collect();
    info!("Waiting for {} metadata response(s)", fetches.len());

    let drain = async {
        while let Some((id, response)) = fetches.next().await {
            if let Some(spec) = job.on_response(id, response) {
                return Some(spec);
            }
        }
        None
    };
    let finished = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, drain).await.ok(),
        None => Some(drain.await),
    };

    match finished {
        Some(Some(spec)) => GatherOutcome::Ready(spec),
        Some(None) => GatherOutcome::Stalled(job.pending().to_vec()),
        None => match job.expire() {
            Some(spec) => GatherOutcome::TimedOut(spec),
            None => GatherOutcome::Stalled(Vec::new()),
        },
    }
}

/// Outcome of a dispatched print job.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintReport {
    /// Where the rendering service put the job
    pub artifact: PrintArtifact,
    /// Things the user should be told about
    pub warnings: Vec<PrintWarning>,
}

/// Gathers the metadata of `job` and hands the finished job to `transport`.
///
/// A job whose metadata never completes is not dispatched and reported as
/// [`PrintError::MetadataIncomplete`].
pub async fn run_print_job(
    mut job: PendingJob,
    catalog: &dyn MetadataService,
    transport: &dyn PrintTransport,
    timeout: Option<Duration>,
) -> PrintResult<PrintReport> {
    let spec = match gather_metadata(&mut job, catalog, timeout).await {
        GatherOutcome::Ready(spec) | GatherOutcome::TimedOut(spec) => spec,
        GatherOutcome::Stalled(pending) => return Err(PrintError::MetadataIncomplete(pending)),
    };
    let artifact = transport.submit(&spec).await?;
    info!("Print job {:?} dispatched to {}", spec.layout, artifact.location);
    Ok(PrintReport {
        artifact,
        warnings: job.warnings,
    })
}

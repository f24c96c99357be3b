use printspec_core::spec::PrintSpecAssembler;
use printspec_core::{PrintReport, run_print_job};
use tracing::{info, warn};

use crate::PrintCliResult;
use crate::args::PrintArgs;
use crate::catalog::FileCatalog;
use crate::config::Config;
use crate::snapshot::MapSnapshot;
use crate::transport::FileTransport;

/// Compiles the snapshot named in `args` into a print job and writes it out.
///
/// `config` must have been finalized.
pub async fn print(args: &PrintArgs, config: &Config) -> PrintCliResult<PrintReport> {
    let snapshot = MapSnapshot::load(&args.snapshot)?;
    let mut request = args.to_request(config)?;

    let catalog = match &config.metadata.catalog {
        Some(path) => FileCatalog::load(path).await?,
        None => {
            if request.with_metadata {
                warn!("No metadata catalog is configured, printing the legend without metadata");
                request.with_metadata = false;
            }
            FileCatalog::default()
        }
    };

    let job = PrintSpecAssembler::new(&snapshot, &snapshot, config.graphic_resolver())
        .assemble(&request)?;
    let transport = FileTransport::new(args.output.clone());
    let report = run_print_job(job, &catalog, &transport, config.metadata.timeout).await?;

    for warning in &report.warnings {
        warn!("{warning}");
    }
    info!("Print job for layout {:?} is at {}", request.layout, report.artifact.location);
    Ok(report)
}

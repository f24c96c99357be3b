use std::env;

use clap::Parser;
use log::log_enabled;
use printspec::PrintCliResult;
use printspec::args::Args;
use printspec::config::{Config, read_config};
use printspec::logging::{ensure_core_log_level_matches, init_tracing};
use subst::Env;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn start(args: Args) -> PrintCliResult<()> {
    info!("Starting printspec v{VERSION}");

    let mut config = if let Some(ref cfg_filename) = args.meta.config {
        info!("Using {}", cfg_filename.display());
        read_config(cfg_filename, &Env)?
    } else {
        info!("Config file is not specified, using defaults");
        Config::default()
    };

    args.merge_into_config(&mut config);
    config.finalize()?;

    if let Some(file_name) = &args.meta.save_config {
        config.save_to_file(file_name)?;
    } else {
        info!("Use --save-config to save or print the configuration.");
    }

    printspec::print(&args.print, &config).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = ensure_core_log_level_matches(env::var("RUST_LOG").ok());
    init_tracing(&filter, env::var("PRINTSPEC_FORMAT").ok());

    let args = Args::parse();
    if let Err(e) = start(args).await {
        // Ensure the message is printed, even if the logging is disabled
        if log_enabled!(log::Level::Error) {
            error!("{e}");
        } else {
            eprintln!("{e}");
        }
        std::process::exit(1);
    }
}

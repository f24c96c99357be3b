use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use printspec_core::spec::{Gfi, PrintRequest};

use crate::config::Config;
use crate::{PrintCliError, PrintCliResult};

/// Defines the styles used for the CLI help output.
const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug, PartialEq, Default)]
#[command(
    about,
    version,
    after_help = "Use RUST_LOG environment variable to control logging level, e.g. RUST_LOG=debug or RUST_LOG=printspec=debug. Use PRINTSPEC_FORMAT to pick the log format.",
    styles = HELP_STYLES
)]
pub struct Args {
    #[command(flatten)]
    pub meta: MetaArgs,
    #[command(flatten)]
    pub print: PrintArgs,
}

// None of these params will be transferred to the config
#[derive(Parser, Debug, Clone, PartialEq, Default)]
pub struct MetaArgs {
    /// Path to config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Save resulting config to a file or use "-" to print to stdout.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone, PartialEq, Default)]
pub struct PrintArgs {
    /// Map snapshot to print, a JSON file with view, layers and legends.
    pub snapshot: PathBuf,
    /// Write the print job to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Print layout. Defaults to the first configured layout.
    #[arg(short, long)]
    pub layout: Option<String>,
    /// Title printed on the page.
    #[arg(short, long, default_value = "")]
    pub title: String,
    /// Output format, e.g. pdf or png. Overrides the config file.
    #[arg(short, long)]
    pub format: Option<String>,
    /// File name the rendering service should give the result.
    #[arg(long)]
    pub output_filename: Option<String>,
    /// Target DPI. Overrides the config file.
    #[arg(long)]
    pub dpi: Option<u32>,
    /// Print at this scale denominator instead of the best fitting configured scale.
    #[arg(long)]
    pub scale: Option<u32>,
    /// Leave the legend out.
    #[arg(long)]
    pub no_legend: bool,
    /// Enrich the legend with metadata from the configured catalog.
    #[arg(long)]
    pub metadata: bool,
    /// Stop waiting for metadata after this long, e.g. "30s". Overrides the config file.
    #[arg(long, value_parser = parse_duration)]
    pub metadata_timeout: Option<Duration>,
    /// JSON file with feature info to print next to the map.
    #[arg(long)]
    pub gfi: Option<PathBuf>,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

impl Args {
    /// Applies command line overrides to the configuration.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(dpi) = self.print.dpi {
            config.dpi = Some(dpi);
        }
        if let Some(format) = &self.print.format {
            config.output_format = Some(format.clone());
        }
        if let Some(timeout) = self.print.metadata_timeout {
            config.metadata.timeout = Some(timeout);
        }
    }
}

impl PrintArgs {
    /// Builds the print request from these arguments and a finalized config.
    pub fn to_request(&self, config: &Config) -> PrintCliResult<PrintRequest> {
        let (layout, layout_config) = config.layout(self.layout.as_deref())?;
        let gfi = self.gfi.as_deref().map(read_gfi).transpose()?;
        let defaults = PrintRequest::default();
        Ok(PrintRequest {
            layout: layout.to_string(),
            map_size: layout_config.map_size,
            output_format: config
                .output_format
                .clone()
                .unwrap_or(defaults.output_format),
            output_filename: self.output_filename.clone(),
            title: self.title.clone(),
            dpi: config.dpi.unwrap_or(defaults.dpi),
            scale: self.scale,
            scales: config.scales.clone(),
            show_legend: !self.no_legend,
            with_metadata: self.metadata,
            gfi,
        })
    }
}

fn read_gfi(path: &Path) -> PrintCliResult<Gfi> {
    let contents = fs::read_to_string(path)
        .map_err(|e| PrintCliError::GfiLoadError(e, path.to_path_buf()))?;
    serde_json::from_str(&contents).map_err(|e| PrintCliError::GfiParseError(e, path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::LayoutConfig;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("printspec").chain(args.iter().copied())).unwrap()
    }

    fn config() -> Config {
        let mut config = Config {
            layouts: BTreeMap::from([(
                "A4 landscape".to_string(),
                LayoutConfig {
                    map_size: [770.0, 451.0],
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };
        config.finalize().unwrap();
        config
    }

    #[test]
    fn minimal_arguments() {
        let args = parse(&["map.json"]);
        assert_eq!(args.print.snapshot, PathBuf::from("map.json"));
        assert_eq!(args.meta, MetaArgs::default());

        let request = args.print.to_request(&config()).unwrap();
        assert_eq!(request.layout, "A4 landscape");
        assert_eq!(request.dpi, 200);
        assert_eq!(request.output_format, "pdf");
        assert!(request.show_legend);
        assert!(!request.with_metadata);
        assert_eq!(request.scale, None);
    }

    #[test]
    fn overrides() {
        let args = parse(&[
            "--config",
            "printspec.yaml",
            "--dpi",
            "96",
            "-f",
            "png",
            "--metadata-timeout",
            "2s",
            "--scale",
            "2500",
            "--no-legend",
            "--metadata",
            "-t",
            "Schools",
            "map.json",
        ]);
        assert_eq!(args.meta.config, Some(PathBuf::from("printspec.yaml")));

        let mut config = config();
        args.merge_into_config(&mut config);
        assert_eq!(config.metadata.timeout, Some(Duration::from_secs(2)));

        let request = args.print.to_request(&config).unwrap();
        assert_eq!(request.dpi, 96);
        assert_eq!(request.output_format, "png");
        assert_eq!(request.scale, Some(2500));
        assert_eq!(request.title, "Schools");
        assert!(!request.show_legend);
        assert!(request.with_metadata);
    }

    #[test]
    fn gfi_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gfi.json");
        fs::write(
            &path,
            r#"{"layers": [{"layerName": "Schools", "values": [{"key": "name", "value": "School 1"}]}]}"#,
        )
        .unwrap();
        let args = parse(&["--gfi", path.to_str().unwrap(), "map.json"]);
        let request = args.print.to_request(&config()).unwrap();
        assert_eq!(request.gfi.unwrap().layers[0].values[0].value, "School 1");
    }
}

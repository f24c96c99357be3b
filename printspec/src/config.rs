//! The configuration file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use printspec_core::style::GraphicResolver;
use serde::{Deserialize, Serialize};
use subst::VariableMap;
use tracing::{info, warn};
use url::Url;

use crate::{PrintCliError, PrintCliResult};

pub const DEFAULT_DPI: u32 = 200;
pub const DEFAULT_OUTPUT_FORMAT: &str = "pdf";
pub const DEFAULT_SCALES: [u32; 10] = [
    250, 500, 1000, 2500, 5000, 10_000, 20_000, 40_000, 60_000, 100_000,
];

pub type UnrecognizedValues = HashMap<String, serde_yaml::Value>;
pub type UnrecognizedKeys = HashSet<String>;

fn copy_unrecognized_keys(result: &mut UnrecognizedKeys, prefix: &str, values: &UnrecognizedValues) {
    result.extend(values.keys().map(|k| format!("{prefix}{k}")));
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Target DPI of raster layers
    pub dpi: Option<u32>,
    /// Output format requested from the rendering service
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layouts: BTreeMap<String, LayoutConfig>,
    /// Candidate scale denominators
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scales: Vec<u32>,
    #[serde(default)]
    pub graphics: GraphicsConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

/// A print layout of the rendering service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Size of the map frame in points (1/72 inch)
    pub map_size: [f64; 2],

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

/// Where relative graphic paths in styles and legends are served from.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// Base URL for `/`-prefixed paths
    pub origin: Option<Url>,
    /// Prefix for bare image names
    pub legacy_path: Option<String>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// YAML file with catalog records keyed by record id
    pub catalog: Option<PathBuf>,
    /// Give up waiting for metadata after this long, e.g. `30s`.
    /// Without it, a job waits for every response.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl Config {
    /// Applies defaults and reports keys that were not understood.
    pub fn finalize(&mut self) -> PrintCliResult<UnrecognizedKeys> {
        let mut res = UnrecognizedKeys::new();
        copy_unrecognized_keys(&mut res, "", &self.unrecognized);
        copy_unrecognized_keys(&mut res, "graphics.", &self.graphics.unrecognized);
        copy_unrecognized_keys(&mut res, "metadata.", &self.metadata.unrecognized);
        for (name, layout) in &self.layouts {
            copy_unrecognized_keys(&mut res, &format!("layouts.{name}."), &layout.unrecognized);
        }
        for key in &res {
            warn!(
                "Ignoring unrecognized configuration key '{key}'. Please check your configuration file for typos."
            );
        }

        self.dpi.get_or_insert(DEFAULT_DPI);
        self.output_format
            .get_or_insert_with(|| DEFAULT_OUTPUT_FORMAT.to_string());
        if self.scales.is_empty() {
            self.scales = DEFAULT_SCALES.to_vec();
        }
        if self.layouts.is_empty() {
            return Err(PrintCliError::NoLayouts);
        }
        Ok(res)
    }

    /// Looks up a layout, or the first one by name if `name` is `None`.
    pub fn layout(&self, name: Option<&str>) -> PrintCliResult<(&str, &LayoutConfig)> {
        let found = match name {
            Some(name) => self.layouts.get_key_value(name),
            None => self.layouts.iter().next(),
        };
        found.map(|(k, v)| (k.as_str(), v)).ok_or_else(|| match name {
            Some(name) => {
                PrintCliError::UnknownLayout(name.to_string(), self.layouts.keys().cloned().collect())
            }
            None => PrintCliError::NoLayouts,
        })
    }

    #[must_use]
    pub fn graphic_resolver(&self) -> GraphicResolver {
        GraphicResolver::new(
            self.graphics.origin.clone(),
            self.graphics.legacy_path.clone().unwrap_or_default(),
        )
    }

    pub fn save_to_file(&self, file_name: &Path) -> PrintCliResult<()> {
        let yaml = serde_yaml::to_string(&self).map_err(PrintCliError::ConfigSerializeError)?;
        if file_name.as_os_str() == OsStr::new("-") {
            info!("Current configuration:");
            println!("\n\n{yaml}\n");
            Ok(())
        } else {
            info!(
                "Saving config to {}, use --config to load it",
                file_name.display()
            );
            File::create(file_name)
                .map_err(|e| PrintCliError::ConfigWriteError(e, file_name.to_path_buf()))?
                .write_all(yaml.as_bytes())
                .map_err(|e| PrintCliError::ConfigWriteError(e, file_name.to_path_buf()))?;
            Ok(())
        }
    }
}

/// Read config from a file
pub fn read_config<'a, M>(file_name: &Path, env: &'a M) -> PrintCliResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    let mut file =
        File::open(file_name).map_err(|e| PrintCliError::ConfigLoadError(e, file_name.into()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| PrintCliError::ConfigLoadError(e, file_name.into()))?;
    parse_config(&contents, env, file_name)
}

pub fn parse_config<'a, M>(contents: &str, env: &'a M, file_name: &Path) -> PrintCliResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    subst::yaml::from_str(contents, env)
        .map_err(|e| PrintCliError::ConfigParseError(e, file_name.into()))
}

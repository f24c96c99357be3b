//! Legend block of a print job and its catalog metadata requests.

use std::fmt::{Display, Formatter};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::registry::LegendRegistry;
use crate::style::GraphicResolver;

/// Printed in place of a metadata field the catalog did not provide.
pub const MISSING_METADATA: &str = "n.N.";

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// A per-layer legend description, as registered for the on-screen legend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    /// Name shown above the legend graphics
    pub layer_name: String,
    /// Graphics in display order
    #[serde(default)]
    pub items: Vec<LegendGraphic>,
    /// Catalog record enriching the legend with metadata
    pub metadata_id: Option<String>,
}

/// One swatch of a legend entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegendGraphic {
    /// Label next to the graphic
    #[serde(default)]
    pub name: String,
    /// Inline SVG, an image URL or a path
    pub graphic: String,
}

/// How the rendering service draws a legend value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LegendType {
    /// A polygon drawn by the rendering service in the extracted color
    Geometry,
    /// A legend image requested from the WMS
    WmsGetLegendGraphic,
    /// Any other image
    WfsImage,
}

/// One legend row.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendValue {
    /// How the value is drawn
    pub legend_type: LegendType,
    /// Shape drawn for a geometry legend
    pub geometry_type: Option<String>,
    /// Absolute URL of the legend image
    pub image_url: Option<String>,
    /// Fill color of a geometry legend
    pub color: Option<String>,
    /// Text next to the graphic
    pub label: String,
}

/// Legend of one printed layer, with catalog metadata once it arrived.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendLayer {
    /// Layer name as shown in the legend
    pub layer_name: String,
    /// Legend rows
    pub values: Vec<LegendValue>,
    /// Date of the dataset
    pub meta_date: Option<String>,
    /// Owning organisation
    pub meta_owner: Option<String>,
    /// Postal address of the owner
    pub meta_address: Option<String>,
    /// Contact e-mail of the owner
    pub meta_email: Option<String>,
    /// Contact phone number of the owner
    pub meta_tel: Option<String>,
    /// Web page of the owner
    pub meta_url: Option<String>,
}

impl LegendLayer {
    /// Copies the metadata of `record` into this layer.
    ///
    /// Every field the record lacks, or leaves blank, is set to [`MISSING_METADATA`].
    pub fn apply_record(&mut self, record: &CatalogRecord) {
        self.meta_date = Some(or_missing(record.date.as_deref()));
        self.meta_owner = Some(or_missing(record.owner.as_deref()));
        self.meta_address = Some(or_missing(Some(&record.address())));
        self.meta_email = Some(or_missing(record.email.as_deref()));
        self.meta_tel = Some(or_missing(record.phone.as_deref()));
        self.meta_url = Some(or_missing(record.url.as_deref()));
    }
}

fn or_missing(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => MISSING_METADATA.to_string(),
    }
}

/// The legend block, top-most layer first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Legend {
    /// Legend layers, top-most first
    pub layers: Vec<LegendLayer>,
}

/// Metadata of a dataset as returned by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRecord {
    /// Publication or revision date
    pub date: Option<String>,
    /// Responsible organisation
    pub owner: Option<String>,
    /// Street name
    pub street: Option<String>,
    /// House number, may contain letters
    pub house_number: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// City
    pub city: Option<String>,
    /// Contact e-mail
    pub email: Option<String>,
    /// Contact phone number
    pub phone: Option<String>,
    /// Web page of the dataset or its owner
    pub url: Option<String>,
}

impl CatalogRecord {
    /// Postal address as `street number, postal code city`, skipping blank parts.
    #[must_use]
    pub fn address(&self) -> String {
        let join = |a: &Option<String>, b: &Option<String>| {
            [a, b]
                .into_iter()
                .filter_map(|v| v.as_deref().map(str::trim))
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        };
        [
            join(&self.street, &self.house_number),
            join(&self.postal_code, &self.city),
        ]
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// An outstanding catalog lookup for one legend layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    /// Correlation id, unique within the process
    pub id: u64,
    /// Legend layer waiting for the record
    pub layer_name: String,
    /// Id of the catalog record
    pub record_id: String,
    /// Position of the layer in [`Legend::layers`]
    pub legend_index: usize,
    /// Cleared once the response has been applied
    pub pending: bool,
}

/// Something the user should be told about a finished job.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintWarning {
    /// A legend graphic was a PDF, which cannot be embedded.
    LegendPdfExcluded {
        /// Name of the legend layer
        layer: String,
        /// The excluded graphic
        graphic: String,
    },
    /// The catalog did not answer in time, metadata was printed as missing.
    MetadataTimedOut {
        /// Names of the legend layers without metadata
        layers: Vec<String>,
    },
}

impl Display for PrintWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegendPdfExcluded { layer, graphic } => write!(
                f,
                "The legend of {layer} is a PDF document ({graphic}) and cannot be printed"
            ),
            Self::MetadataTimedOut { layers } => write!(
                f,
                "Metadata of {} could not be loaded and is printed as {MISSING_METADATA}",
                layers.join(", ")
            ),
        }
    }
}

/// Result of assembling the legend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledLegend {
    /// The legend block
    pub legend: Legend,
    /// Metadata requests the legend waits for
    pub requests: Vec<MetadataRequest>,
    /// Graphics that were left out
    pub warnings: Vec<PrintWarning>,
}

/// Builds the legend block for the printed layers.
#[derive(Debug)]
pub struct LegendAssembler<'a> {
    registry: &'a dyn LegendRegistry,
    graphics: &'a GraphicResolver,
}

impl<'a> LegendAssembler<'a> {
    /// Creates an assembler reading entries from `registry`.
    #[must_use]
    pub fn new(registry: &'a dyn LegendRegistry, graphics: &'a GraphicResolver) -> Self {
        Self { registry, graphics }
    }

    /// Builds legend layers for `layer_ids`, given bottom-most first.
    ///
    /// The legend lists the top-most layer first. With `with_metadata`, every
    /// layer whose entry names a catalog record gets a pending request.
    #[must_use]
    pub fn assemble(&self, layer_ids: &[String], with_metadata: bool) -> AssembledLegend {
        let mut result = AssembledLegend::default();
        for layer_id in layer_ids.iter().rev() {
            let Some(entry) = self.registry.legend_entry(layer_id) else {
                continue;
            };
            let mut values = Vec::with_capacity(entry.items.len());
            for item in &entry.items {
                match self.classify(item) {
                    Some(value) => values.push(value),
                    None => {
                        warn!(
                            "Legend graphic {} of {} is a PDF and was left out",
                            item.graphic, entry.layer_name
                        );
                        result.warnings.push(PrintWarning::LegendPdfExcluded {
                            layer: entry.layer_name.clone(),
                            graphic: item.graphic.clone(),
                        });
                    }
                }
            }
            if values.is_empty() {
                debug!("Legend of {layer_id} has no printable graphics");
                continue;
            }

            if with_metadata && let Some(record_id) = entry.metadata_id {
                let request = MetadataRequest {
                    id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
                    layer_name: entry.layer_name.clone(),
                    record_id,
                    legend_index: result.legend.layers.len(),
                    pending: true,
                };
                debug!(
                    "Requesting metadata {} for {} as #{}",
                    request.record_id, request.layer_name, request.id
                );
                result.requests.push(request);
            }
            result.legend.layers.push(LegendLayer {
                layer_name: entry.layer_name,
                values,
                ..Default::default()
            });
        }
        result
    }

    /// Classifies one graphic, or returns `None` for a PDF.
    #[must_use]
    pub fn classify(&self, item: &LegendGraphic) -> Option<LegendValue> {
        let graphic = item.graphic.as_str();
        let (legend_type, image_url, color) = if graphic.contains("<svg") {
            (LegendType::Geometry, None, svg_fill(graphic))
        } else if is_pdf(graphic) {
            return None;
        } else if graphic.to_ascii_uppercase().contains("GETLEGENDGRAPHIC") {
            (LegendType::WmsGetLegendGraphic, Some(graphic.to_string()), None)
        } else {
            (LegendType::WfsImage, Some(self.graphics.resolve(graphic)), None)
        };
        Some(LegendValue {
            legend_type,
            geometry_type: (legend_type == LegendType::Geometry).then(|| "polygon".to_string()),
            image_url,
            color,
            label: item.name.clone(),
        })
    }
}

fn is_pdf(graphic: &str) -> bool {
    let path = graphic.split(['?', '#']).next().unwrap_or_default();
    path.to_ascii_lowercase().ends_with(".pdf")
}

fn svg_fill(svg: &str) -> Option<String> {
    static FILL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"fill:\s*(rgba?\([^)]*\)|[^;"'\s>/]+)"#).expect("regex pattern is valid")
    });
    FILL.captures(svg).map(|caps| caps[1].to_string())
}

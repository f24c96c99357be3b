//! The print job document and its assembly from the live map.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::PrintResult;
use crate::job::PendingJob;
use crate::layers::{LayerDescriptor, LayerDescriptorBuilder};
use crate::legend::{AssembledLegend, Legend, LegendAssembler};
use crate::model::Position;
use crate::registry::{LayerRegistry, LegendRegistry};
use crate::scale::ScaleResolver;
use crate::style::GraphicResolver;

/// What the user asked to print.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintRequest {
    /// Layout template name known to the rendering service
    pub layout: String,
    /// Map frame of the layout in points
    pub map_size: [f64; 2],
    /// `pdf`, `png`, ...
    pub output_format: String,
    /// File name for the rendered result
    pub output_filename: Option<String>,
    /// Title printed on the page
    pub title: String,
    /// Target DPI of the print
    pub dpi: u32,
    /// Fixed scale denominator; picked from [`scales`](Self::scales) when unset
    pub scale: Option<u32>,
    /// Candidate scale denominators
    pub scales: Vec<u32>,
    /// Print the legend block
    pub show_legend: bool,
    /// Enrich legend layers with catalog metadata
    pub with_metadata: bool,
    /// Feature info shown next to the map
    pub gfi: Option<Gfi>,
}

impl Default for PrintRequest {
    fn default() -> Self {
        Self {
            layout: String::new(),
            map_size: [0.0, 0.0],
            output_format: "pdf".to_string(),
            output_filename: None,
            title: String::new(),
            dpi: 200,
            scale: None,
            scales: Vec::new(),
            show_legend: true,
            with_metadata: false,
            gfi: None,
        }
    }
}

/// GetFeatureInfo results printed with the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gfi {
    /// Queried layers
    pub layers: Vec<GfiLayer>,
}

/// Feature info of one layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GfiLayer {
    /// Name of the queried layer
    pub layer_name: String,
    /// Attributes of the queried feature
    #[serde(default)]
    pub values: Vec<GfiValue>,
}

/// One attribute of a feature info result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GfiValue {
    /// Attribute name
    pub key: String,
    /// Attribute value as text
    pub value: String,
}

/// The document handed to the rendering service.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJobSpec {
    /// Layout template name
    pub layout: String,
    /// `pdf`, `png`, ...
    pub output_format: String,
    /// File name for the rendered result
    pub output_filename: Option<String>,
    /// Values filled into the layout
    pub attributes: PrintAttributes,
}

/// Attributes filled into the print layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintAttributes {
    /// Title printed on the page
    pub title: String,
    /// The map frame
    pub map: MapAttributes,
    /// Whether the layout shows the legend
    pub show_legend: bool,
    /// Legend block, top-most layer first
    pub legend: Legend,
    /// Set if there is feature info to print
    pub show_gfi: bool,
    /// Feature info block
    pub gfi: Gfi,
    /// Scale as printed on the page, e.g. `1:5000`
    pub scale: String,
}

/// The map frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapAttributes {
    /// Target DPI
    pub dpi: u32,
    /// Projection code, e.g. `EPSG:25832`
    pub projection: String,
    /// Center of the map frame in map units
    pub center: Position,
    /// Scale denominator
    pub scale: u32,
    /// Top-most layer first
    pub layers: Vec<LayerDescriptor>,
}

/// Compiles the live map into print jobs.
///
/// Each call to [`assemble`](Self::assemble) builds a fresh job; nothing is
/// carried over between calls.
#[derive(Debug)]
pub struct PrintSpecAssembler<'a> {
    map: &'a dyn LayerRegistry,
    legends: &'a dyn LegendRegistry,
    graphics: GraphicResolver,
}

impl<'a> PrintSpecAssembler<'a> {
    /// Creates an assembler reading from the given registries.
    #[must_use]
    pub fn new(
        map: &'a dyn LayerRegistry,
        legends: &'a dyn LegendRegistry,
        graphics: GraphicResolver,
    ) -> Self {
        Self {
            map,
            legends,
            graphics,
        }
    }

    /// Builds the job for `request`.
    ///
    /// The returned job is only ready for dispatch once all of its metadata
    /// requests have been answered, see [`PendingJob`].
    pub fn assemble(&self, request: &PrintRequest) -> PrintResult<PendingJob> {
        let view = self.map.view();
        let layers = LayerDescriptorBuilder::new(self.map, &self.graphics, request.dpi).build()?;

        let scale = match request.scale {
            Some(scale) => scale,
            None => ScaleResolver::new(request.scales.clone())?.optimal_scale(
                request.map_size,
                view.size,
                view.resolution,
                view.meters_per_unit,
            ),
        };

        let AssembledLegend {
            legend,
            requests,
            warnings,
        } = if request.show_legend {
            LegendAssembler::new(self.legends, &self.graphics)
                .assemble(&layers.layer_ids, request.with_metadata)
        } else {
            AssembledLegend::default()
        };

        let gfi = request.gfi.clone().unwrap_or_default();
        let spec = PrintJobSpec {
            layout: request.layout.clone(),
            output_format: request.output_format.clone(),
            output_filename: request.output_filename.clone(),
            attributes: PrintAttributes {
                title: request.title.clone(),
                map: MapAttributes {
                    dpi: request.dpi,
                    projection: view.projection,
                    center: view.center,
                    scale,
                    layers: layers.descriptors,
                },
                show_legend: request.show_legend,
                legend,
                show_gfi: !gfi.layers.is_empty(),
                gfi,
                scale: format!("1:{scale}"),
            },
        };
        info!(
            "Assembled print job {:?} at 1:{scale} with {} layers, {} metadata request(s) pending",
            spec.layout,
            spec.attributes.map.layers.len(),
            requests.len()
        );
        Ok(PendingJob::new(spec, requests, warnings))
    }
}

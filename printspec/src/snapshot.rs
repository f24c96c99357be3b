//! A saved map view read from a JSON file.
//!
//! The file holds the view, the layer stack bottom-most first, and the legend
//! entries keyed by layer id. Vector layers embed their features as a `GeoJSON`
//! feature collection and describe their style declaratively:
//!
//! ```json
//! {
//!   "type": "vector", "id": "schools", "style_attributes": ["kind"],
//!   "style": {
//!     "label": "name",
//!     "rules": [{ "filter": { "kind": "primary" }, "styles": [{ "image": { "type": "circle", "radius": 5 } }] }]
//!   },
//!   "features": { "type": "FeatureCollection", "features": [] }
//! }
//! ```
//!
//! A feature with a `circle` foreign member (`{"center": [x, y], "radius": r}`)
//! is a circle, one with a `cluster` foreign member (an array of features) is a
//! cluster wrapper.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use printspec_core::legend::LegendEntry;
use printspec_core::model::{
    Extent, Feature, FeatureGeometry, Layer, LayerKind, Position, RasterSource, Style,
    StyleFunction, StyleSource, TileMatrixSource, VectorSource, ViewState, scalar_text,
};
use printspec_core::registry::{LayerRegistry, LegendRegistry};
use printspec_core::style::StyleError;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::{PrintCliError, PrintCliResult};

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    view: ViewState,
    #[serde(default)]
    layers: Vec<LayerFile>,
    #[serde(default)]
    legends: HashMap<String, LegendEntry>,
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    id: String,
    name: Option<String>,
    #[serde(default = "full_opacity")]
    opacity: f64,
    min_resolution: Option<f64>,
    max_resolution: Option<f64>,
    #[serde(flatten)]
    kind: LayerKindFile,
}

fn full_opacity() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LayerKindFile {
    Group {
        layers: Vec<LayerFile>,
    },
    Wms {
        url: String,
        #[serde(default)]
        params: BTreeMap<String, JsonValue>,
        sld_body: Option<String>,
        tile_size: Option<[u32; 2]>,
        /// Request the WMS tile by tile
        #[serde(default)]
        tiled: bool,
    },
    Wmts(TileMatrixSource),
    Vector {
        #[serde(default)]
        features: Option<geojson::FeatureCollection>,
        style: Option<DeclarativeStyle>,
        #[serde(default)]
        style_attributes: Vec<String>,
    },
}

/// A style function picking styles by attribute filters.
///
/// The first rule whose filter matches the feature wins; features matching
/// no rule are hidden. Text styles without a text get the value of the
/// [`label`](Self::label) attribute, or the member count of a cluster.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclarativeStyle {
    pub label: Option<String>,
    #[serde(default)]
    pub rules: Vec<StyleRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyleRule {
    /// Attribute values a feature must have, all of them
    #[serde(default)]
    pub filter: BTreeMap<String, JsonValue>,
    pub styles: Vec<Style>,
}

impl StyleRule {
    fn matches(&self, feature: &Feature) -> bool {
        self.filter
            .iter()
            .all(|(key, value)| feature.property_text(key).is_some_and(|v| Some(v) == scalar_text(value)))
    }
}

impl StyleFunction for DeclarativeStyle {
    fn styles(&self, feature: &Feature, _resolution: f64) -> Result<Vec<Style>, StyleError> {
        let subject = feature.representative();
        let Some(rule) = self.rules.iter().find(|rule| rule.matches(subject)) else {
            return Ok(Vec::new());
        };
        let label = match feature.cluster_size() {
            Some(size) if size > 1 => Some(size.to_string()),
            _ => self
                .label
                .as_deref()
                .and_then(|attribute| subject.property_text(attribute)),
        };
        Ok(rule
            .styles
            .iter()
            .cloned()
            .map(|mut style| {
                if let (Some(text), Some(label)) = (style.text.as_mut(), &label)
                    && text.text.is_none()
                {
                    text.text = Some(label.clone());
                }
                style
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct CircleMember {
    center: Position,
    radius: f64,
}

/// A map view loaded from a file, serving as layer and legend registry.
#[derive(Debug)]
pub struct MapSnapshot {
    view: ViewState,
    layers: Vec<Layer>,
    features: HashMap<String, Vec<Feature>>,
    legends: HashMap<String, LegendEntry>,
}

impl MapSnapshot {
    pub fn load(path: &Path) -> PrintCliResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PrintCliError::SnapshotLoadError(e, path.to_path_buf()))?;
        Self::parse(&contents, path)
    }

    pub fn parse(contents: &str, path: &Path) -> PrintCliResult<Self> {
        let file: SnapshotFile = serde_json::from_str(contents)
            .map_err(|e| PrintCliError::SnapshotParseError(e, path.to_path_buf()))?;
        let mut features = HashMap::new();
        let mut next_uid = 1;
        let layers: Vec<Layer> = file
            .layers
            .into_iter()
            .map(|layer| convert_layer(layer, &mut features, &mut next_uid))
            .collect();
        debug!(
            "Loaded map snapshot {} with {} layers and {} features",
            path.display(),
            layers.len(),
            features.values().map(Vec::len).sum::<usize>()
        );
        Ok(Self {
            view: file.view,
            layers,
            features,
            legends: file.legends,
        })
    }
}

fn convert_layer(
    layer: LayerFile,
    features: &mut HashMap<String, Vec<Feature>>,
    next_uid: &mut u64,
) -> Layer {
    let kind = match layer.kind {
        LayerKindFile::Group { layers } => LayerKind::Group(
            layers
                .into_iter()
                .map(|child| convert_layer(child, features, next_uid))
                .collect(),
        ),
        LayerKindFile::Wms {
            url,
            params,
            sld_body,
            tile_size,
            tiled,
        } => {
            let source = RasterSource {
                url,
                params,
                sld_body,
                tile_size,
            };
            if tiled {
                LayerKind::RasterTiled(source)
            } else {
                LayerKind::RasterImage(source)
            }
        }
        LayerKindFile::Wmts(source) => LayerKind::TileMatrix(source),
        LayerKindFile::Vector {
            features: collection,
            style,
            style_attributes,
        } => {
            let layer_features = collection
                .map(|collection| collection.features)
                .unwrap_or_default()
                .into_iter()
                .map(|feature| convert_feature(feature, next_uid))
                .collect();
            features.insert(layer.id.clone(), layer_features);
            LayerKind::Vector(VectorSource {
                style: style.map(|style| StyleSource::Function(Arc::new(style))),
                style_attributes,
            })
        }
    };
    let mut result = Layer::new(layer.id, kind)
        .with_opacity(layer.opacity)
        .with_resolution_range(layer.min_resolution, layer.max_resolution);
    if let Some(name) = layer.name {
        result = result.with_name(name);
    }
    result
}

fn convert_feature(feature: geojson::Feature, next_uid: &mut u64) -> Feature {
    let uid = *next_uid;
    *next_uid += 1;

    let mut foreign = feature.foreign_members.unwrap_or_default();
    let circle = foreign
        .remove("circle")
        .and_then(|value| match serde_json::from_value::<CircleMember>(value) {
            Ok(circle) => Some(circle),
            Err(e) => {
                warn!("Ignoring malformed circle of feature {uid}: {e}");
                None
            }
        });
    let geometry = match circle {
        Some(CircleMember { center, radius }) => Some(FeatureGeometry::Circle { center, radius }),
        None => feature.geometry.map(|g| FeatureGeometry::Simple(g.value)),
    };
    let cluster_members = match foreign.remove("cluster") {
        Some(JsonValue::Array(members)) => Some(
            members
                .into_iter()
                .filter_map(|member| match serde_json::from_value::<geojson::Feature>(member) {
                    Ok(member) => Some(convert_feature(member, next_uid)),
                    Err(e) => {
                        warn!("Ignoring malformed member of cluster {uid}: {e}");
                        None
                    }
                })
                .collect(),
        ),
        _ => None,
    };

    Feature {
        id: feature.id,
        uid,
        geometry,
        properties: feature.properties.unwrap_or_default(),
        cluster_members,
        ..Default::default()
    }
}

fn feature_extent(feature: &Feature) -> Extent {
    match &feature.geometry {
        Some(FeatureGeometry::Simple(value)) => Extent::of_geometry(value),
        Some(FeatureGeometry::Circle { center, radius }) => {
            Extent::around(*center, radius * 2.0, radius * 2.0)
        }
        None => Extent::default(),
    }
}

impl LayerRegistry for MapSnapshot {
    fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn features_in_extent(&self, layer_id: &str, extent: &Extent) -> Vec<Feature> {
        self.features
            .get(layer_id)
            .into_iter()
            .flatten()
            .filter(|feature| {
                // empty geometries are kept, the compiler drops them
                let bounds = feature_extent(feature);
                bounds.is_empty() || bounds.intersects(extent)
            })
            .cloned()
            .collect()
    }

    fn view(&self) -> ViewState {
        self.view.clone()
    }
}

impl LegendRegistry for MapSnapshot {
    fn legend_entry(&self, layer_id: &str) -> Option<LegendEntry> {
        self.legends.get(layer_id).cloned()
    }
}

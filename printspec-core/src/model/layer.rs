use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::model::{Extent, Position, StyleSource};

/// A layer of the live map.
///
/// The layer kind is decided once, when the registry builds the layer, and
/// matched exhaustively by the descriptor builder.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Unique id within the map
    pub id: String,
    /// Human-readable name, used in legends
    pub name: String,
    /// Opacity in `0.0..=1.0`
    pub opacity: f64,
    /// Layer is hidden below this view resolution
    pub min_resolution: Option<f64>,
    /// Layer is hidden above this view resolution
    pub max_resolution: Option<f64>,
    /// What the layer draws
    pub kind: LayerKind,
}

impl Layer {
    /// Creates a visible, opaque layer named after its id.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            opacity: 1.0,
            min_resolution: None,
            max_resolution: None,
            kind,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the opacity.
    #[must_use]
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Limits the view resolutions the layer is drawn at.
    #[must_use]
    pub fn with_resolution_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_resolution = min;
        self.max_resolution = max;
        self
    }

    /// Whether the layer is drawn at `resolution` (bounds are inclusive).
    #[must_use]
    pub fn is_visible_at(&self, resolution: f64) -> bool {
        self.min_resolution.is_none_or(|min| min <= resolution)
            && self.max_resolution.is_none_or(|max| resolution <= max)
    }
}

/// The kinds of layers the print service can reproduce.
#[derive(Debug, Clone)]
pub enum LayerKind {
    /// A group of layers, ordered bottom-most first
    Group(Vec<Layer>),
    /// WMS requested tile by tile
    RasterTiled(RasterSource),
    /// WMS requested as a single image
    RasterImage(RasterSource),
    /// WMTS
    TileMatrix(TileMatrixSource),
    /// Client-side features
    Vector(VectorSource),
}

/// A WMS endpoint with its request parameters.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterSource {
    /// Service URL without request parameters
    pub url: String,
    /// Request parameters such as `LAYERS`, `STYLES`, `FORMAT`, `TRANSPARENT` (case-insensitive)
    #[serde(default)]
    pub params: BTreeMap<String, JsonValue>,
    /// An SLD document replacing the named styles
    pub sld_body: Option<String>,
    /// Tile size in pixels of a tiled source
    pub tile_size: Option<[u32; 2]>,
}

impl RasterSource {
    /// Looks up a request parameter, ignoring the case of its name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&JsonValue> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

/// How tiles of a WMTS are requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestEncoding {
    /// Tiles addressed by a URL template
    #[default]
    Rest,
    /// Tiles requested with `GetTile` query parameters
    Kvp,
}

/// The tiling scheme of a WMTS layer.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    /// Top-left corner shared by all levels, unless [`origins`](Self::origins) is set
    pub origin: Position,
    /// Per-level top-left corners
    pub origins: Option<Vec<Position>>,
    /// Resolutions in map units per pixel, one per level
    pub resolutions: Vec<f64>,
    /// Matrix identifiers, one per level; defaults to the level index
    #[serde(default)]
    pub matrix_ids: Vec<String>,
    /// Tile size in pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: [u32; 2],
    /// Extent covered by the grid
    pub extent: Extent,
}

fn default_tile_size() -> [u32; 2] {
    [256, 256]
}

/// A WMTS endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrixSource {
    /// URL template (`REST`) or service URL (`KVP`)
    pub url: String,
    /// WMTS layer identifier
    pub layer: String,
    /// WMTS style identifier
    #[serde(default)]
    pub style: String,
    /// MIME type of the tiles
    #[serde(default = "default_image_format")]
    pub format: String,
    /// Identifier of the tile matrix set
    pub matrix_set: String,
    /// How tiles are requested
    #[serde(default)]
    pub request_encoding: RequestEncoding,
    /// Tiling scheme
    pub grid: TileGrid,
}

pub(crate) fn default_image_format() -> String {
    "image/png".to_string()
}

/// A layer of client-side features.
#[derive(Debug, Clone, Default)]
pub struct VectorSource {
    /// Style applied to features without a style of their own
    pub style: Option<StyleSource>,
    /// Attributes whose values distinguish feature styles
    pub style_attributes: Vec<String>,
}

/// The current map view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Map units per pixel
    pub resolution: f64,
    /// Center in map units
    pub center: Position,
    /// Visible extent in map units
    pub extent: Extent,
    /// Viewport size in pixels
    pub size: [f64; 2],
    /// Projection code, e.g. `EPSG:25832`
    pub projection: String,
    /// Meters per map unit, `1.0` for projected systems in meters
    #[serde(default = "default_meters_per_unit")]
    pub meters_per_unit: f64,
}

fn default_meters_per_unit() -> f64 {
    1.0
}

//! Wire descriptors for every printable layer.
//!
//! Layers are visited in stack order, bottom-most first, with groups flattened
//! in place. The resulting descriptor list is reversed: the rendering service
//! expects the top-most layer first.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::geometry::WireFeature;
use crate::model::{
    Layer, LayerKind, Position, RasterSource, RequestEncoding, TileMatrixSource, VectorSource,
    ViewState, default_image_format,
};
use crate::rules::StyleRules;
use crate::scale::scale_for_resolution;
use crate::PrintResult;
use crate::registry::LayerRegistry;
use crate::style::{GraphicResolver, StyleRuleCompiler};

/// Style name sent instead of named styles when an SLD body is attached.
pub const SLD_STYLE_NAME: &str = "style";

/// Normalized, wire-ready representation of one map layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum LayerDescriptor {
    /// A WMS requested in tiles
    #[serde(rename = "tiledwms")]
    RasterTiled(RasterDescriptor),
    /// A WMS requested as one image
    #[serde(rename = "WMS")]
    RasterImage(RasterDescriptor),
    /// A WMTS
    #[serde(rename = "WMTS")]
    TileMatrix(TileMatrixDescriptor),
    /// Inline features
    #[serde(rename = "geojson")]
    Vector(VectorDescriptor),
}

impl LayerDescriptor {
    /// Effective opacity of the printed layer.
    #[must_use]
    pub fn opacity(&self) -> f64 {
        match self {
            Self::RasterTiled(d) | Self::RasterImage(d) => d.opacity,
            Self::TileMatrix(d) => d.opacity,
            Self::Vector(d) => d.opacity,
        }
    }
}

/// A WMS layer, requested whole or in tiles.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterDescriptor {
    /// Service URL without request parameters
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Effective opacity, including that of enclosing groups
    pub opacity: f64,
    /// Values of the `LAYERS` parameter
    pub layers: Vec<String>,
    /// Values of the `STYLES` parameter, unless an SLD replaces them
    pub styles: Option<Vec<String>>,
    /// MIME type of the requested images
    pub image_format: String,
    /// Extra request parameters
    pub custom_params: CustomParams,
    /// Tile size in pixels, tiled requests only
    pub tile_size: Option<[u32; 2]>,
}

/// Vendor parameters forwarded to the WMS.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CustomParams {
    /// Requests images with a transparent background
    pub transparent: bool,
    /// Target resolution of the requested images
    pub dpi: u32,
    /// Inline SLD document styling the layers
    pub sld_body: Option<String>,
}

/// A WMTS layer with the matrices of its tile grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrixDescriptor {
    /// URL template (`REST`) or service URL (`KVP`)
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Effective opacity, including that of enclosing groups
    pub opacity: f64,
    /// WMTS layer identifier
    pub layer: String,
    /// WMTS style identifier
    pub style: String,
    /// MIME type of the tiles
    pub image_format: String,
    /// Identifier of the tile matrix set
    pub matrix_set: String,
    /// One entry per zoom level
    pub matrices: Vec<TileMatrix>,
    /// How tiles are requested
    pub request_encoding: RequestEncoding,
}

/// One zoom level of a tile matrix set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMatrix {
    /// Matrix identifier as used in tile requests
    pub identifier: String,
    /// Number of tiles along each axis
    pub matrix_size: [u64; 2],
    /// Top-left corner in map units
    pub top_left_corner: Position,
    /// Scale of the level at the standard pixel size
    pub scale_denominator: f64,
    /// Tile size in pixels
    pub tile_size: [u32; 2],
}

/// Inline features with their compiled style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorDescriptor {
    /// Effective opacity, including that of enclosing groups
    pub opacity: f64,
    /// Rules matching the features
    pub style: StyleRules,
    /// Features tagged with their rule attributes
    pub geojson: Vec<WireFeature>,
}

/// Descriptors in wire order plus the ids of the layers that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerDescriptors {
    /// Top-most layer first
    pub descriptors: Vec<LayerDescriptor>,
    /// Ids of printed leaf layers, bottom-most first
    pub layer_ids: Vec<String>,
}

/// Builds descriptors for the visible layers of a map.
#[derive(Debug)]
pub struct LayerDescriptorBuilder<'a> {
    registry: &'a dyn LayerRegistry,
    graphics: &'a GraphicResolver,
    dpi: u32,
}

impl<'a> LayerDescriptorBuilder<'a> {
    /// Creates a builder reading from `registry`, requesting rasters at `dpi`.
    #[must_use]
    pub fn new(registry: &'a dyn LayerRegistry, graphics: &'a GraphicResolver, dpi: u32) -> Self {
        Self {
            registry,
            graphics,
            dpi,
        }
    }

    /// Builds descriptors for the whole layer stack of the registry.
    ///
    /// Layers outside their resolution range are left out silently.
    pub fn build(&self) -> PrintResult<LayerDescriptors> {
        let view = self.registry.view();
        let mut result = LayerDescriptors::default();
        for layer in self.registry.layers() {
            self.visit(layer, 1.0, &view, &mut result)?;
        }
        result.descriptors.reverse();
        Ok(result)
    }

    fn visit(
        &self,
        layer: &Layer,
        parent_opacity: f64,
        view: &ViewState,
        result: &mut LayerDescriptors,
    ) -> PrintResult<()> {
        if !layer.is_visible_at(view.resolution) {
            debug!(
                "Skipping layer {} outside its resolution range at {}",
                layer.id, view.resolution
            );
            return Ok(());
        }
        let opacity = parent_opacity * layer.opacity;
        let descriptor = match &layer.kind {
            LayerKind::Group(children) => {
                for child in children {
                    self.visit(child, opacity, view, result)?;
                }
                return Ok(());
            }
            LayerKind::RasterTiled(source) => {
                LayerDescriptor::RasterTiled(self.raster(source, opacity, true))
            }
            LayerKind::RasterImage(source) => {
                LayerDescriptor::RasterImage(self.raster(source, opacity, false))
            }
            LayerKind::TileMatrix(source) => {
                LayerDescriptor::TileMatrix(tile_matrix(source, opacity, view.meters_per_unit))
            }
            LayerKind::Vector(source) => match self.vector(layer, source, opacity, view)? {
                Some(descriptor) => LayerDescriptor::Vector(descriptor),
                None => {
                    debug!("Skipping vector layer {} without printable features", layer.id);
                    return Ok(());
                }
            },
        };
        debug!("Printing layer {}", layer.id);
        result.descriptors.push(descriptor);
        result.layer_ids.push(layer.id.clone());
        Ok(())
    }

    fn raster(&self, source: &RasterSource, opacity: f64, tiled: bool) -> RasterDescriptor {
        let layers = source.param("LAYERS").map(list_param).unwrap_or_default();
        let sld_body = source.sld_body.clone().or_else(|| {
            source
                .param("SLD_BODY")
                .and_then(JsonValue::as_str)
                .map(ToString::to_string)
        });
        let styles = if sld_body.is_some() {
            Some(vec![SLD_STYLE_NAME.to_string()])
        } else {
            source
                .param("STYLES")
                .map(list_param)
                .filter(|styles| styles.iter().any(|s| !s.is_empty()))
        };
        RasterDescriptor {
            base_url: source.url.clone(),
            opacity,
            layers,
            styles,
            image_format: source
                .param("FORMAT")
                .and_then(JsonValue::as_str)
                .map_or_else(default_image_format, ToString::to_string),
            custom_params: CustomParams {
                transparent: source.param("TRANSPARENT").is_none_or(bool_param),
                dpi: self.dpi,
                sld_body,
            },
            tile_size: if tiled {
                Some(source.tile_size.unwrap_or([512, 512]))
            } else {
                None
            },
        }
    }

    fn vector(
        &self,
        layer: &Layer,
        source: &VectorSource,
        opacity: f64,
        view: &ViewState,
    ) -> PrintResult<Option<VectorDescriptor>> {
        let features = self.registry.features_in_extent(&layer.id, &view.extent);
        let compiled = StyleRuleCompiler::new(view.resolution, self.graphics)
            .compile(layer, source, &features)?;
        if compiled.features.is_empty() {
            return Ok(None);
        }
        Ok(Some(VectorDescriptor {
            opacity,
            style: compiled.rules,
            geojson: compiled.features,
        }))
    }
}

/// Reads a WMS list parameter given as `"a,b"` or `["a", "b"]`.
fn list_param(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::String(s) if s.is_empty() => Vec::new(),
        JsonValue::String(s) => s.split(',').map(|v| v.trim().to_string()).collect(),
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn bool_param(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn tile_matrix(source: &TileMatrixSource, opacity: f64, meters_per_unit: f64) -> TileMatrixDescriptor {
    let grid = &source.grid;
    let [tile_w, tile_h] = grid.tile_size;
    let matrices = grid
        .resolutions
        .iter()
        .enumerate()
        .map(|(level, resolution)| {
            let top_left_corner = grid
                .origins
                .as_ref()
                .and_then(|origins| origins.get(level).copied())
                .unwrap_or(grid.origin);
            let tiles = |length: f64, tile: u32| tile_count(length, resolution * f64::from(tile));
            TileMatrix {
                identifier: grid
                    .matrix_ids
                    .get(level)
                    .cloned()
                    .unwrap_or_else(|| level.to_string()),
                matrix_size: [
                    tiles(grid.extent.max_x - top_left_corner[0], tile_w),
                    tiles(top_left_corner[1] - grid.extent.min_y, tile_h),
                ],
                top_left_corner,
                scale_denominator: scale_for_resolution(*resolution, meters_per_unit),
                tile_size: grid.tile_size,
            }
        })
        .collect();

    TileMatrixDescriptor {
        base_url: normalize_url_template(&source.url),
        opacity,
        layer: source.layer.clone(),
        style: source.style.clone(),
        image_format: source.format.clone(),
        matrix_set: source.matrix_set.clone(),
        matrices,
        request_encoding: source.request_encoding,
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tile_count(length: f64, tile_span: f64) -> u64 {
    (length / tile_span).ceil().max(1.0) as u64
}

static TEMPLATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{(tilematrixset|tilematrix|tilerow|tilecol|style)\}")
        .expect("template token regex is valid")
});

/// Rewrites WMTS URL template placeholders to the casing of the OGC standard,
/// e.g. `{tilematrix}` to `{TileMatrix}`.
#[must_use]
pub fn normalize_url_template(url: &str) -> String {
    TEMPLATE_TOKEN
        .replace_all(url, |caps: &regex::Captures<'_>| {
            let canonical = match caps[1].to_ascii_lowercase().as_str() {
                "tilematrixset" => "TileMatrixSet",
                "tilematrix" => "TileMatrix",
                "tilerow" => "TileRow",
                "tilecol" => "TileCol",
                _ => "Style",
            };
            format!("{{{canonical}}}")
        })
        .into_owned()
}

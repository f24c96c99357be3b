//! Compilation of per-feature styles into deduplicated wire rules.
//!
//! Every (feature, style) pair gets a [`RuleKey`] built from the attributes
//! that distinguish its look. The first pair registering a key defines the
//! symbolizers; later pairs with the same key only contribute their feature,
//! tagged so that it matches the key.

use geojson::JsonObject;
use itertools::Itertools as _;
use serde_json::Value as JsonValue;
use tracing::{debug, trace};
use url::Url;

use crate::geometry::{WireFeature, encode_feature};
use crate::model::{
    Color, ColorLike, Feature, Fill, GeometryKind, Layer, PointSymbol, Stroke, Style, Text,
    VectorSource, scalar_text,
};
use crate::rules::{
    LineSymbolizer, PointSymbolizer, PolygonSymbolizer, RuleKey, StyleRules, Symbolizer,
    TextSymbolizer,
};
use crate::{PrintError, PrintResult};

/// Synthetic attribute distinguishing clusters with different content.
pub const CLUSTER_ATTRIBUTE: &str = "_cluster";

/// Synthetic attribute distinguishing the styles of a multi-style feature.
pub const STYLE_INDEX_ATTRIBUTE: &str = "_style_index";

/// Synthetic attribute separating points, lines and polygons of one layer.
pub const GEOMETRY_ATTRIBUTE: &str = "_geometry";

/// Expression text symbolizers use to read the label property.
pub const LABEL_EXPRESSION: &str = "[label]";

const DEFAULT_STROKE_WIDTH: f64 = 1.25;
const DEFAULT_FONT_SIZE: &str = "10px";
const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// Errors a [`StyleFunction`](crate::model::StyleFunction) may return.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum StyleError {
    /// The style function reported an error
    #[error("Style function failed: {0}")]
    Function(String),

    /// The style function needed an attribute the feature lacks
    #[error("Style attribute {0} is required but missing")]
    MissingAttribute(String),
}

/// Turns graphic paths found in styles and legends into absolute URLs.
///
/// Absolute URLs pass through, `/`-prefixed paths are resolved against the
/// origin, and bare names against the legacy image path. Resolution never
/// fails; an unusable path is returned unchanged.
#[derive(Debug, Clone, Default)]
pub struct GraphicResolver {
    origin: Option<Url>,
    legacy_path: String,
}

impl GraphicResolver {
    /// Creates a resolver for `/`-prefixed paths below `origin` and bare names below `legacy_path`.
    #[must_use]
    pub fn new(origin: Option<Url>, legacy_path: impl Into<String>) -> Self {
        Self {
            origin,
            legacy_path: legacy_path.into(),
        }
    }

    /// Turns a graphic path from a style or legend into an absolute URL.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("data:") || Url::parse(path).is_ok_and(|u| u.has_host()) {
            return path.to_string();
        }
        let relative = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}{path}", self.legacy_path)
        };
        match &self.origin {
            Some(origin) => origin
                .join(&relative)
                .map_or(relative, |url| url.to_string()),
            None => relative,
        }
    }
}

/// The compiled form of one vector layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledLayer {
    /// Deduplicated rules
    pub rules: StyleRules,
    /// Features tagged with the attributes of their rule
    pub features: Vec<WireFeature>,
}

/// Compiles the features of a vector layer into rules and wire features.
#[derive(Debug, Clone, Copy)]
pub struct StyleRuleCompiler<'a> {
    resolution: f64,
    graphics: &'a GraphicResolver,
}

impl<'a> StyleRuleCompiler<'a> {
    /// Creates a compiler for the given view resolution.
    #[must_use]
    pub fn new(resolution: f64, graphics: &'a GraphicResolver) -> Self {
        Self {
            resolution,
            graphics,
        }
    }

    /// Compiles `features` of `layer`.
    ///
    /// When a feature resolves to several styles, a [`STYLE_INDEX_ATTRIBUTE`]
    /// comparison is appended to its keys. The index follows the order the
    /// style function returned, so keys are not stable if that order changes.
    /// When the layer mixes points, lines and polygons, every key also gets a
    /// [`GEOMETRY_ATTRIBUTE`] comparison so that each class has its own rule.
    pub fn compile(
        &self,
        layer: &Layer,
        source: &VectorSource,
        features: &[Feature],
    ) -> PrintResult<CompiledLayer> {
        let mut encoded = Vec::new();
        for feature in features {
            let styles = self.resolve_styles(layer, source, feature)?;
            let multi = styles.len() > 1;
            for (index, style) in styles.into_iter().enumerate() {
                let Some(wire) = encode_feature(feature, &style) else {
                    continue;
                };
                let mut key = rule_key(feature, source, &style);
                if multi {
                    key.push(STYLE_INDEX_ATTRIBUTE, index.to_string());
                }
                let kind = wire
                    .geometry
                    .as_ref()
                    .map_or(GeometryKind::Point, |g| GeometryKind::of(&g.value));
                encoded.push((wire, key, style, kind));
            }
        }

        let mixed = encoded
            .iter()
            .map(|(.., kind)| kind.class())
            .unique()
            .nth(1)
            .is_some();

        let mut compiled = CompiledLayer::default();
        for (mut wire, mut key, style, kind) in encoded {
            if mixed {
                key.push(GEOMETRY_ATTRIBUTE, kind.class());
            }
            tag_feature(&mut wire, &key);

            if !compiled.rules.contains(&key) {
                let symbolizers = self.symbolizers(&style, kind);
                trace!(
                    "Layer {}: new rule {key} with {} symbolizers",
                    layer.id,
                    symbolizers.len()
                );
                compiled.rules.insert(key, symbolizers);
            }
            compiled.features.push(wire);
        }
        debug!(
            "Layer {} compiled {} features into {} rules",
            layer.id,
            compiled.features.len(),
            compiled.rules.len()
        );
        Ok(compiled)
    }

    fn resolve_styles(
        &self,
        layer: &Layer,
        source: &VectorSource,
        feature: &Feature,
    ) -> PrintResult<Vec<Style>> {
        let Some(style) = feature.style.as_ref().or(source.style.as_ref()) else {
            return Ok(Vec::new());
        };
        style
            .resolve(feature, self.resolution)
            .map_err(|source| PrintError::Style {
                layer: layer.id.clone(),
                feature: feature.id_text(),
                source,
            })
    }

    /// Derives the symbolizers drawing `style` on a geometry of `kind`.
    #[must_use]
    pub fn symbolizers(&self, style: &Style, kind: GeometryKind) -> Vec<Symbolizer> {
        let mut symbolizers = Vec::new();
        if kind.is_point() {
            if let Some(image) = &style.image {
                symbolizers.push(Symbolizer::Point(self.point_symbolizer(image)));
            }
        } else if kind.is_line() {
            if style.has_geometry_symbol() {
                symbolizers.push(Symbolizer::Line(line_symbolizer(style.stroke.as_ref())));
            }
        } else if kind.is_polygon() && style.has_geometry_symbol() {
            symbolizers.push(Symbolizer::Polygon(polygon_symbolizer(
                style.fill.as_ref(),
                style.stroke.as_ref(),
            )));
        }
        if let Some(text) = &style.text {
            symbolizers.push(Symbolizer::Text(text_symbolizer(text)));
        }
        symbolizers
    }

    fn point_symbolizer(&self, image: &PointSymbol) -> PointSymbolizer {
        match image {
            PointSymbol::Circle {
                radius,
                fill,
                stroke,
            } => {
                let (fill_color, fill_opacity) = fill_color(fill.as_ref());
                let (stroke_color, stroke_opacity) = stroke_color(stroke.as_ref());
                PointSymbolizer {
                    point_radius: Some(*radius),
                    fill_color: Some(fill_color),
                    fill_opacity: Some(fill_opacity),
                    stroke_color: Some(stroke_color),
                    stroke_opacity: Some(stroke_opacity),
                    stroke_width: Some(stroke_width(stroke.as_ref())),
                    graphic_name: Some("circle".to_string()),
                    ..Default::default()
                }
            }
            PointSymbol::Shape {
                points,
                radius,
                fill,
                stroke,
                rotation,
            } => {
                let (fill_color, fill_opacity) = fill_color(fill.as_ref());
                let (stroke_color, stroke_opacity) = stroke_color(stroke.as_ref());
                let graphic_name = match points {
                    0..=3 => "triangle",
                    4 => "square",
                    _ => "star",
                };
                PointSymbolizer {
                    point_radius: Some(*radius),
                    fill_color: Some(fill_color),
                    fill_opacity: Some(fill_opacity),
                    stroke_color: Some(stroke_color),
                    stroke_opacity: Some(stroke_opacity),
                    stroke_width: Some(stroke_width(stroke.as_ref())),
                    graphic_name: Some(graphic_name.to_string()),
                    rotation: rotation.map(f64::to_degrees),
                    ..Default::default()
                }
            }
            PointSymbol::Icon {
                src,
                scale,
                size,
                opacity,
                rotation,
            } => {
                let scale = scale.unwrap_or(1.0);
                PointSymbolizer {
                    external_graphic: Some(self.graphics.resolve(src)),
                    graphic_width: size.map(|[w, _]| w * scale),
                    graphic_height: size.map(|[_, h]| h * scale),
                    graphic_opacity: Some(opacity.unwrap_or(1.0)),
                    rotation: rotation.map(f64::to_degrees),
                    ..Default::default()
                }
            }
        }
    }
}

/// Builds the key of one (feature, style) pair, without the style index.
///
/// The distinguishing attributes are the feature's own, else the layer's.
/// Values are read from the representative member of a cluster. Clusters
/// with several members additionally get a [`CLUSTER_ATTRIBUTE`] made of the
/// representative's id and the label text, or the member count if unlabelled.
#[must_use]
pub fn rule_key(feature: &Feature, source: &VectorSource, style: &Style) -> RuleKey {
    let subject = feature.representative();
    let attributes = feature
        .style_attributes
        .as_deref()
        .or(subject.style_attributes.as_deref())
        .unwrap_or(&source.style_attributes);

    let mut key = RuleKey::wildcard();
    for attribute in attributes {
        key.push(
            attribute.as_str(),
            subject.property_text(attribute).unwrap_or_default(),
        );
    }

    if let Some(size) = feature.cluster_size().filter(|size| *size > 1) {
        let variant = match style.label() {
            "" => size.to_string(),
            label => label.to_string(),
        };
        key.push(
            CLUSTER_ATTRIBUTE,
            format!("{}_{variant}", subject.id_text()),
        );
    }
    key
}

/// Sets the key's attributes on the wire feature so that it matches the key.
///
/// Existing values whose text already matches are kept with their JSON type.
fn tag_feature(wire: &mut WireFeature, key: &RuleKey) {
    let properties = wire.properties.get_or_insert_with(JsonObject::new);
    for (attribute, value) in key.pairs() {
        let matches = properties
            .get(attribute)
            .and_then(scalar_text)
            .is_some_and(|existing| existing == *value);
        if !matches {
            properties.insert(attribute.clone(), JsonValue::String(value.clone()));
        }
    }
}

fn resolve_color(color: Option<&ColorLike>, default: Color) -> (String, f64) {
    let color = color.and_then(ColorLike::resolve).unwrap_or(default);
    (color.to_hex(), color.a)
}

fn fill_color(fill: Option<&Fill>) -> (String, f64) {
    resolve_color(fill.and_then(|f| f.color.as_ref()), Color::DEFAULT_FILL)
}

fn stroke_color(stroke: Option<&Stroke>) -> (String, f64) {
    resolve_color(stroke.and_then(|s| s.color.as_ref()), Color::DEFAULT_STROKE)
}

fn stroke_width(stroke: Option<&Stroke>) -> f64 {
    stroke
        .and_then(|s| s.width)
        .filter(|w| w.is_finite() && *w >= 0.0)
        .unwrap_or(DEFAULT_STROKE_WIDTH)
}

fn dash_style(stroke: Option<&Stroke>) -> Option<String> {
    stroke
        .and_then(|s| s.line_dash.as_ref())
        .filter(|dash| !dash.is_empty())
        .map(|dash| dash.iter().join(" "))
}

fn line_symbolizer(stroke: Option<&Stroke>) -> LineSymbolizer {
    let (stroke_color, stroke_opacity) = stroke_color(stroke);
    LineSymbolizer {
        stroke_color,
        stroke_opacity,
        stroke_width: stroke_width(stroke),
        stroke_linecap: stroke.and_then(|s| s.line_cap.clone()),
        stroke_dashstyle: dash_style(stroke),
    }
}

fn polygon_symbolizer(fill: Option<&Fill>, stroke: Option<&Stroke>) -> PolygonSymbolizer {
    let (fill_color, fill_opacity) = fill_color(fill);
    let (stroke_color, stroke_opacity) = stroke_color(stroke);
    PolygonSymbolizer {
        fill_color,
        fill_opacity,
        stroke_color,
        stroke_opacity,
        stroke_width: stroke_width(stroke),
        stroke_dashstyle: dash_style(stroke),
    }
}

fn text_symbolizer(text: &Text) -> TextSymbolizer {
    let font = ParsedFont::parse(text.font.as_deref().unwrap_or_default());
    let (font_color, font_opacity) = resolve_color(
        text.fill.as_ref().and_then(|f| f.color.as_ref()),
        Color::DEFAULT_TEXT,
    );
    let halo = text.stroke.as_ref().map(|stroke| {
        let (color, opacity) = stroke_color(Some(stroke));
        (color, opacity, stroke_width(Some(stroke)))
    });
    let horizontal = match text.text_align.as_deref() {
        Some("left" | "start") => 'l',
        Some("right" | "end") => 'r',
        _ => 'c',
    };
    TextSymbolizer {
        label: LABEL_EXPRESSION.to_string(),
        font_color,
        font_opacity,
        font_family: font.family,
        font_size: font.size,
        font_weight: font.weight,
        label_align: format!("{horizontal}m"),
        label_x_offset: text.offset_x,
        // screen offsets grow downwards, print offsets upwards
        label_y_offset: text.offset_y.map(|y| -y),
        halo_color: halo.as_ref().map(|(color, _, _)| color.clone()),
        halo_opacity: halo.as_ref().map(|(_, opacity, _)| *opacity),
        halo_radius: halo.as_ref().map(|(_, _, width)| *width),
    }
}

/// The parts of a CSS font shorthand the print service understands.
#[derive(Debug, PartialEq)]
struct ParsedFont {
    weight: String,
    size: String,
    family: String,
}

impl ParsedFont {
    fn parse(font: &str) -> Self {
        let mut weight = "normal".to_string();
        let mut size = None;
        let mut family = Vec::new();
        for token in font.split_whitespace() {
            if size.is_none() {
                match token {
                    "bold" | "bolder" | "lighter" | "normal" => weight = token.to_string(),
                    t if t.len() == 3 && t.chars().all(|c| c.is_ascii_digit()) => {
                        weight = t.to_string();
                    }
                    t => {
                        // drop a line height as in `12px/1.2`
                        let head = t.split('/').next().unwrap_or(t);
                        if head.ends_with("px") || head.ends_with("pt") {
                            size = Some(head.to_string());
                        }
                    }
                }
            } else {
                family.push(token.trim_matches(|c| c == '"' || c == '\''));
            }
        }
        Self {
            weight,
            size: size.unwrap_or_else(|| DEFAULT_FONT_SIZE.to_string()),
            family: if family.is_empty() {
                DEFAULT_FONT_FAMILY.to_string()
            } else {
                family.join(" ")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use geojson::Value;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::model::{FeatureGeometry, LayerKind, StyleSource};

    fn point_feature(uid: u64) -> Feature {
        Feature::new(uid, FeatureGeometry::Simple(Value::Point(vec![1.0, 1.0])))
    }

    fn circle_style(color: &str) -> Style {
        Style {
            image: Some(PointSymbol::Circle {
                radius: 5.0,
                fill: Some(Fill {
                    color: Some(color.into()),
                }),
                stroke: None,
            }),
            ..Default::default()
        }
    }

    fn vector_layer(source: &VectorSource) -> Layer {
        Layer::new("schools", LayerKind::Vector(source.clone()))
    }

    fn compile(source: &VectorSource, features: &[Feature]) -> CompiledLayer {
        let graphics = GraphicResolver::default();
        StyleRuleCompiler::new(1.0, &graphics)
            .compile(&vector_layer(source), source, features)
            .unwrap()
    }

    #[test]
    fn identical_discriminators_share_one_rule() {
        let source = VectorSource {
            style: Some(circle_style("#ff0000").into()),
            style_attributes: vec!["kind".to_string()],
        };
        let features: Vec<_> = (0..5)
            .map(|uid| point_feature(uid).with_property("kind", "primary"))
            .collect();

        let compiled = compile(&source, &features);
        assert_eq!(compiled.rules.len(), 1);
        assert_eq!(compiled.features.len(), 5);
        let key: RuleKey = "[kind='primary']".parse().unwrap();
        assert!(compiled.rules.contains(&key));
        for wire in &compiled.features {
            assert_eq!(wire.properties.as_ref().unwrap()["kind"], "primary");
        }
    }

    #[test]
    fn different_values_get_their_own_rules() {
        let source = VectorSource {
            style: Some(StyleSource::function(|feature, _| {
                let color = match feature.property_text("kind").as_deref() {
                    Some("primary") => "#ff0000",
                    _ => "#0000ff",
                };
                Ok(vec![circle_style(color)])
            })),
            style_attributes: vec!["kind".to_string()],
        };
        let features = vec![
            point_feature(1).with_property("kind", "primary"),
            point_feature(2).with_property("kind", "secondary"),
            point_feature(3).with_property("kind", "primary"),
        ];
        let compiled = compile(&source, &features);
        let keys: Vec<_> = compiled.rules.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["[kind='primary']", "[kind='secondary']"]);
        assert_eq!(compiled.features.len(), 3);
    }

    #[test]
    fn no_discriminator_is_wildcard() {
        let source = VectorSource {
            style: Some(circle_style("#ff0000").into()),
            style_attributes: vec![],
        };
        let compiled = compile(&source, &[point_feature(1), point_feature(2)]);
        assert_eq!(compiled.rules.keys().collect::<Vec<_>>(), vec![&RuleKey::wildcard()]);
    }

    #[test]
    fn feature_discriminator_overrides_layer() {
        let source = VectorSource {
            style: Some(circle_style("#ff0000").into()),
            style_attributes: vec!["kind".to_string()],
        };
        let mut feature = point_feature(1)
            .with_property("kind", "a")
            .with_property("size", 3);
        feature.style_attributes = Some(vec!["kind".to_string(), "size".to_string()]);

        let compiled = compile(&source, &[feature]);
        let key = compiled.rules.keys().next().unwrap();
        assert_eq!(key.to_string(), "[kind='a' AND size='3']");
        // numeric value matches textually and keeps its type
        assert_eq!(compiled.features[0].properties.as_ref().unwrap()["size"], 3);
    }

    #[test]
    fn multi_style_features_are_indexed() {
        let shadow = circle_style("#000000");
        let icon = circle_style("#ffffff");
        let source = VectorSource {
            style: Some(StyleSource::Static(vec![shadow, icon])),
            style_attributes: vec![],
        };
        let compiled = compile(&source, &[point_feature(1), point_feature(2)]);
        let keys: Vec<_> = compiled.rules.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["[_style_index='0']", "[_style_index='1']"]);
        assert_eq!(compiled.features.len(), 4);
        assert_eq!(
            compiled.features[1].properties.as_ref().unwrap()[STYLE_INDEX_ATTRIBUTE],
            "1"
        );
    }

    #[test]
    fn clusters_with_different_content_do_not_collide() {
        let source = VectorSource {
            style: Some(StyleSource::function(|feature, _| {
                let mut style = circle_style("#ff0000");
                if let Some(size) = feature.cluster_size().filter(|s| *s > 1) {
                    style.text = Some(Text {
                        text: Some(size.to_string()),
                        ..Default::default()
                    });
                }
                Ok(vec![style])
            })),
            style_attributes: vec!["kind".to_string()],
        };
        let member = |uid| point_feature(uid).with_property("kind", "tree");
        let two = Feature::cluster(10, point_feature(0).geometry.unwrap(), vec![member(1), member(2)]);
        let three = Feature::cluster(
            11,
            point_feature(0).geometry.unwrap(),
            vec![member(3), member(4), member(5)],
        );
        let single = Feature::cluster(12, point_feature(0).geometry.unwrap(), vec![member(6)]);

        let compiled = compile(&source, &[two, three, single]);
        let keys: Vec<_> = compiled.rules.keys().map(ToString::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "[kind='tree' AND _cluster='1_2']",
                "[kind='tree' AND _cluster='3_3']",
                "[kind='tree']",
            ]
        );
        assert_eq!(compiled.features[0].properties.as_ref().unwrap()[CLUSTER_ATTRIBUTE], "1_2");
    }

    #[rstest]
    #[case::null(Some(JsonValue::Null))]
    #[case::missing(None)]
    fn absent_discriminator_is_tagged_as_empty(#[case] kind: Option<JsonValue>) {
        let source = VectorSource {
            style: Some(circle_style("#ff0000").into()),
            style_attributes: vec!["kind".to_string()],
        };
        let mut feature = point_feature(1);
        if let Some(kind) = kind {
            feature = feature.with_property("kind", kind);
        }

        let compiled = compile(&source, &[feature]);
        let keys: Vec<_> = compiled.rules.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["[kind='']"]);
        assert_eq!(
            compiled.features[0].properties.as_ref().unwrap()["kind"],
            JsonValue::String(String::new())
        );
    }

    #[test]
    fn mixed_geometries_get_a_rule_per_class() {
        let style = Style {
            fill: Some(Fill {
                color: Some("#ff0000".into()),
            }),
            stroke: Some(Stroke {
                color: Some("#000000".into()),
                ..Default::default()
            }),
            ..circle_style("#00ff00")
        };
        let source = VectorSource {
            style: Some(style.into()),
            style_attributes: vec![],
        };
        let square = Feature::new(
            2,
            FeatureGeometry::Simple(Value::Polygon(vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]])),
        );
        let circle = Feature::new(
            3,
            FeatureGeometry::Circle {
                center: [5.0, 5.0],
                radius: 2.0,
            },
        );

        let compiled = compile(&source, &[point_feature(1), square, circle]);
        let keys: Vec<_> = compiled.rules.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["[_geometry='point']", "[_geometry='polygon']"]);

        let point_key: RuleKey = "[_geometry='point']".parse().unwrap();
        assert!(matches!(
            compiled.rules.get(&point_key).unwrap(),
            [Symbolizer::Point(_)]
        ));
        let polygon_key: RuleKey = "[_geometry='polygon']".parse().unwrap();
        let [Symbolizer::Polygon(polygon)] = compiled.rules.get(&polygon_key).unwrap() else {
            panic!("expected a single polygon symbolizer");
        };
        assert_eq!(polygon.fill_color, "#ff0000");
        assert_eq!(polygon.stroke_color, "#000000");

        let classes: Vec<_> = compiled
            .features
            .iter()
            .map(|wire| wire.properties.as_ref().unwrap()[GEOMETRY_ATTRIBUTE].clone())
            .collect();
        assert_eq!(classes, vec!["point", "polygon", "polygon"]);
    }

    #[test]
    fn single_class_layers_have_no_geometry_discriminator() {
        let source = VectorSource {
            style: Some(circle_style("#ff0000").into()),
            style_attributes: vec![],
        };
        let multi = Feature::new(
            2,
            FeatureGeometry::Simple(Value::MultiPoint(vec![vec![0.0, 0.0], vec![1.0, 1.0]])),
        );
        let compiled = compile(&source, &[point_feature(1), multi]);
        assert_eq!(compiled.rules.keys().collect::<Vec<_>>(), vec![&RuleKey::wildcard()]);
    }

    #[test]
    fn hidden_and_empty_features_are_skipped() {
        let source = VectorSource {
            style: Some(StyleSource::function(|feature, _| {
                Ok(if feature.uid == 1 {
                    vec![]
                } else {
                    vec![circle_style("#ff0000")]
                })
            })),
            style_attributes: vec![],
        };
        let empty = Feature::new(2, FeatureGeometry::Simple(Value::MultiPoint(vec![])));
        let compiled = compile(&source, &[point_feature(1), empty, point_feature(3)]);
        assert_eq!(compiled.features.len(), 1);
        assert_eq!(compiled.rules.len(), 1);
    }

    #[test]
    fn failing_style_function_is_surfaced() {
        let source = VectorSource {
            style: Some(StyleSource::function(|_, _| {
                Err(StyleError::MissingAttribute("kind".to_string()))
            })),
            style_attributes: vec![],
        };
        let graphics = GraphicResolver::default();
        let err = StyleRuleCompiler::new(1.0, &graphics)
            .compile(&vector_layer(&source), &source, &[point_feature(4)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Style of feature 4 in layer schools could not be resolved: Style attribute kind is required but missing"
        );
    }

    #[test]
    fn compiling_twice_is_identical() {
        let source = VectorSource {
            style: Some(circle_style("#ff0000").into()),
            style_attributes: vec!["kind".to_string()],
        };
        let features = vec![
            point_feature(1).with_property("kind", "a"),
            Feature::new(2, FeatureGeometry::Simple(Value::Point(vec![]))),
            point_feature(3).with_property("kind", "b"),
        ];
        let first = compile(&source, &features);
        assert_eq!(first, compile(&source, &features));
        assert_eq!(first.features.len(), 2);
    }

    #[test]
    fn polygon_and_text_symbolizers() {
        let graphics = GraphicResolver::default();
        let compiler = StyleRuleCompiler::new(1.0, &graphics);
        let style = Style {
            fill: Some(Fill {
                color: Some("rgba(0, 128, 0, 0.5)".into()),
            }),
            stroke: Some(Stroke {
                color: Some("garbage".into()),
                width: Some(2.0),
                line_dash: Some(vec![4.0, 2.0]),
                line_cap: None,
            }),
            text: Some(Text {
                text: Some("Stadtpark".to_string()),
                font: Some("bold 14px Arial Narrow".to_string()),
                offset_y: Some(10.0),
                text_align: Some("left".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let symbolizers = compiler.symbolizers(&style, GeometryKind::MultiPolygon);
        insta::assert_json_snapshot!(symbolizers, @r##"
        [
          {
            "type": "polygon",
            "fillColor": "#008000",
            "fillOpacity": 0.5,
            "strokeColor": "#3399cc",
            "strokeOpacity": 1.0,
            "strokeWidth": 2.0,
            "strokeDashstyle": "4 2"
          },
          {
            "type": "text",
            "label": "[label]",
            "fontColor": "#333333",
            "fontOpacity": 1.0,
            "fontFamily": "Arial Narrow",
            "fontSize": "14px",
            "fontWeight": "bold",
            "labelAlign": "lm",
            "labelYOffset": -10.0
          }
        ]
        "##);
    }

    #[test]
    fn line_without_stroke_uses_default() {
        let graphics = GraphicResolver::default();
        let style = Style {
            fill: Some(Fill::default()),
            ..Default::default()
        };
        let symbolizers = StyleRuleCompiler::new(1.0, &graphics).symbolizers(&style, GeometryKind::LineString);
        assert_eq!(
            symbolizers,
            vec![Symbolizer::Line(LineSymbolizer {
                stroke_color: "#3399cc".to_string(),
                stroke_opacity: 1.0,
                stroke_width: DEFAULT_STROKE_WIDTH,
                ..Default::default()
            })]
        );
    }

    #[test]
    fn icon_graphic_is_resolved() {
        let graphics = GraphicResolver::new(
            Some(Url::parse("https://geoportal.example.org/portal/").unwrap()),
            "/img/",
        );
        let style = Style {
            image: Some(PointSymbol::Icon {
                src: "school.png".to_string(),
                scale: Some(0.5),
                size: Some([40.0, 30.0]),
                opacity: None,
                rotation: None,
            }),
            ..Default::default()
        };
        let symbolizers = StyleRuleCompiler::new(1.0, &graphics).symbolizers(&style, GeometryKind::Point);
        let Symbolizer::Point(point) = &symbolizers[0] else {
            panic!("expected a point symbolizer");
        };
        assert_eq!(
            point.external_graphic.as_deref(),
            Some("https://geoportal.example.org/img/school.png")
        );
        assert_eq!(point.graphic_width, Some(20.0));
        assert_eq!(point.graphic_height, Some(15.0));
    }

    #[rstest]
    #[case("https://cdn.example.org/a.png", "https://cdn.example.org/a.png")]
    #[case("/static/a.png", "https://maps.example.org/static/a.png")]
    #[case("a.png", "https://maps.example.org/legacy/img/a.png")]
    #[case("data:image/png;base64,AAAA", "data:image/png;base64,AAAA")]
    fn graphic_resolution(#[case] path: &str, #[case] expected: &str) {
        let graphics = GraphicResolver::new(
            Some(Url::parse("https://maps.example.org/portal/index.html").unwrap()),
            "/legacy/img/",
        );
        assert_eq!(graphics.resolve(path), expected);
    }

    #[test]
    fn graphic_resolution_without_origin() {
        let graphics = GraphicResolver::new(None, "img/");
        assert_eq!(graphics.resolve("a.png"), "img/a.png");
        assert_eq!(graphics.resolve("/a.png"), "/a.png");
    }

    #[rstest]
    #[case("", "normal", "10px", "sans-serif")]
    #[case("12px Verdana", "normal", "12px", "Verdana")]
    #[case("italic 700 9pt/1.2 'Open Sans'", "700", "9pt", "Open Sans")]
    fn font_shorthand(
        #[case] font: &str,
        #[case] weight: &str,
        #[case] size: &str,
        #[case] family: &str,
    ) {
        assert_eq!(
            ParsedFont::parse(font),
            ParsedFont {
                weight: weight.to_string(),
                size: size.to_string(),
                family: family.to_string(),
            }
        );
    }
}

use geojson::JsonObject;
use geojson::feature::Id;
use serde_json::Value as JsonValue;

use crate::model::StyleSource;

/// A coordinate pair in map units.
pub type Position = [f64; 2];

/// Geometry of a live feature.
///
/// The live map knows circles, the `GeoJSON` wire format does not.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    /// Any geometry `GeoJSON` can express
    Simple(geojson::Value),
    /// A circle given by center and radius in map units
    Circle {
        /// Center of the circle
        center: Position,
        /// Radius in map units
        radius: f64,
    },
}

/// Geometry type tags, used to pick matching symbolizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    /// A single position
    Point,
    /// Several positions
    MultiPoint,
    /// A line
    LineString,
    /// Several lines
    MultiLineString,
    /// A polygon with optional holes
    Polygon,
    /// Several polygons
    MultiPolygon,
    /// Mixed geometries, never printed
    GeometryCollection,
    /// A circle, printed as a polygon
    Circle,
}

impl GeometryKind {
    /// Kind of a `GeoJSON` geometry value.
    #[must_use]
    pub fn of(value: &geojson::Value) -> Self {
        match value {
            geojson::Value::Point(_) => Self::Point,
            geojson::Value::MultiPoint(_) => Self::MultiPoint,
            geojson::Value::LineString(_) => Self::LineString,
            geojson::Value::MultiLineString(_) => Self::MultiLineString,
            geojson::Value::Polygon(_) => Self::Polygon,
            geojson::Value::MultiPolygon(_) => Self::MultiPolygon,
            geojson::Value::GeometryCollection(_) => Self::GeometryCollection,
        }
    }

    /// The symbolizer family drawing this kind: `point`, `line` or `polygon`.
    #[must_use]
    pub fn class(self) -> &'static str {
        if self.is_point() {
            "point"
        } else if self.is_line() {
            "line"
        } else if self.is_polygon() {
            "polygon"
        } else {
            "collection"
        }
    }

    /// Points and multi-points.
    #[must_use]
    pub fn is_point(self) -> bool {
        matches!(self, Self::Point | Self::MultiPoint)
    }

    /// Lines and multi-lines.
    #[must_use]
    pub fn is_line(self) -> bool {
        matches!(self, Self::LineString | Self::MultiLineString)
    }

    /// Polygons, multi-polygons and circles.
    #[must_use]
    pub fn is_polygon(self) -> bool {
        matches!(self, Self::Polygon | Self::MultiPolygon | Self::Circle)
    }
}

impl FeatureGeometry {
    /// The kind of this geometry, used to pick symbolizers.
    #[must_use]
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Simple(value) => GeometryKind::of(value),
            Self::Circle { .. } => GeometryKind::Circle,
        }
    }

    /// Returns `true` if the geometry has no coordinates to draw.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Circle { center, radius } => {
                !(center.iter().all(|c| c.is_finite()) && radius.is_finite())
            }
            Self::Simple(value) => match value {
                geojson::Value::Point(p) => p.len() < 2,
                geojson::Value::MultiPoint(ps) | geojson::Value::LineString(ps) => ps.is_empty(),
                geojson::Value::MultiLineString(ls) | geojson::Value::Polygon(ls) => {
                    ls.iter().all(Vec::is_empty)
                }
                geojson::Value::MultiPolygon(polys) => {
                    polys.iter().flatten().all(Vec::is_empty)
                }
                geojson::Value::GeometryCollection(gs) => gs.is_empty(),
            },
        }
    }
}

/// A feature of a vector layer as held by the live map.
///
/// Cluster features wrap their members in [`cluster_members`](Self::cluster_members)
/// and carry the cluster symbol's geometry themselves.
#[derive(Debug, Clone, Default)]
pub struct Feature {
    /// Explicit identifier, if the data source provided one
    pub id: Option<Id>,
    /// Internal handle, unique within the map
    pub uid: u64,
    /// Geometry; features without one are not printed
    pub geometry: Option<FeatureGeometry>,
    /// Attribute values
    pub properties: JsonObject,
    /// Feature-level style, overriding the layer style
    pub style: Option<StyleSource>,
    /// Attributes distinguishing this feature's style, overriding the layer's
    pub style_attributes: Option<Vec<String>>,
    /// Members of a cluster wrapper feature
    pub cluster_members: Option<Vec<Feature>>,
}

impl Feature {
    /// Creates a plain feature with a geometry.
    #[must_use]
    pub fn new(uid: u64, geometry: FeatureGeometry) -> Self {
        Self {
            uid,
            geometry: Some(geometry),
            ..Default::default()
        }
    }

    /// Creates a cluster wrapper around `members` drawn at `geometry`.
    #[must_use]
    pub fn cluster(uid: u64, geometry: FeatureGeometry, members: Vec<Feature>) -> Self {
        Self {
            cluster_members: Some(members),
            ..Self::new(uid, geometry)
        }
    }

    /// Sets an explicit string id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(Id::String(id.into()));
        self
    }

    /// Sets an attribute value.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets a feature-level style.
    #[must_use]
    pub fn with_style(mut self, style: StyleSource) -> Self {
        self.style = Some(style);
        self
    }

    /// Number of members if this is a cluster wrapper.
    #[must_use]
    pub fn cluster_size(&self) -> Option<usize> {
        self.cluster_members.as_ref().map(Vec::len)
    }

    /// The feature attribute values are read from: the first member of a
    /// cluster, or the feature itself.
    #[must_use]
    pub fn representative(&self) -> &Self {
        self.cluster_members
            .as_ref()
            .and_then(|members| members.first())
            .unwrap_or(self)
    }

    /// The wire identifier: the explicit id, or the internal handle.
    #[must_use]
    pub fn wire_id(&self) -> Id {
        self.id
            .clone()
            .unwrap_or_else(|| Id::Number(self.uid.into()))
    }

    /// The wire identifier as plain text.
    #[must_use]
    pub fn id_text(&self) -> String {
        match self.wire_id() {
            Id::String(s) => s,
            Id::Number(n) => n.to_string(),
        }
    }

    /// Text representation of a scalar property, `None` if missing, null or structured.
    #[must_use]
    pub fn property_text(&self, key: &str) -> Option<String> {
        scalar_text(self.properties.get(key)?)
    }
}

/// Text form of a scalar JSON value as it appears in a rule expression.
///
/// `null` has no text form: a rule comparing against `''` never matches it.
#[must_use]
pub fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

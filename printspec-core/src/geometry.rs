//! Conversion of one styled feature into a wire-safe `GeoJSON` feature.
//!
//! The rendering service accepts only scalar properties and the six simple
//! `GeoJSON` geometry types. Labels travel as a synthetic [`LABEL_PROPERTY`],
//! which text symbolizers reference by name.

use std::f64::consts::PI;

use geojson::{Geometry, JsonObject, Value};
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::model::{Feature, FeatureGeometry, Position, Style};

/// A feature as sent to the rendering service.
pub type WireFeature = geojson::Feature;

/// Property holding the label text of the style the feature was encoded for.
pub const LABEL_PROPERTY: &str = "label";

/// Number of polygon vertices used to approximate a circle.
pub const CIRCLE_SEGMENTS: usize = 64;

/// Maximum relative area difference between a circle and its approximation.
///
/// A regular polygon with [`CIRCLE_SEGMENTS`] vertices inscribed in a circle
/// covers about 99.84% of its area.
pub const CIRCLE_AREA_TOLERANCE: f64 = 0.005;

/// Encodes `feature` for one of its resolved styles.
///
/// Returns `None` if the feature has nothing drawable: no geometry, an empty
/// coordinate list or a geometry collection. A cluster wrapper with exactly
/// one member is replaced by that member.
#[must_use]
pub fn encode_feature(feature: &Feature, style: &Style) -> Option<WireFeature> {
    if let Some([single]) = feature.cluster_members.as_deref() {
        return encode_feature(single, style);
    }

    let geometry = match feature.geometry.as_ref()? {
        geometry if geometry.is_empty() => {
            trace!("Dropping feature {} with empty geometry", feature.id_text());
            return None;
        }
        FeatureGeometry::Circle { center, radius } => {
            circle_to_polygon(*center, *radius, CIRCLE_SEGMENTS)
        }
        FeatureGeometry::Simple(Value::GeometryCollection(_)) => {
            trace!("Dropping geometry collection of feature {}", feature.id_text());
            return None;
        }
        FeatureGeometry::Simple(value) => value.clone(),
    };

    let mut properties = scalar_properties(&feature.properties);
    properties.insert(
        LABEL_PROPERTY.to_string(),
        JsonValue::String(style.label().to_string()),
    );

    Some(WireFeature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: Some(feature.wire_id()),
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Copies all properties except arrays and objects.
fn scalar_properties(properties: &JsonObject) -> JsonObject {
    properties
        .iter()
        .filter(|(_, value)| !matches!(value, JsonValue::Array(_) | JsonValue::Object(_)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Approximates a circle with a closed regular polygon of `segments` vertices.
#[must_use]
pub fn circle_to_polygon(center: Position, radius: f64, segments: usize) -> Value {
    let segments = segments.max(3);
    #[expect(clippy::cast_precision_loss)]
    let step = 2.0 * PI / segments as f64;
    let mut ring: Vec<Vec<f64>> = (0..segments)
        .map(|i| {
            #[expect(clippy::cast_precision_loss)]
            let angle = step * i as f64;
            vec![
                center[0] + radius * angle.cos(),
                center[1] + radius * angle.sin(),
            ]
        })
        .collect();
    ring.push(ring[0].clone());
    Value::Polygon(vec![ring])
}

/// Area of a closed ring using the shoelace formula.
#[must_use]
pub fn ring_area(ring: &[Vec<f64>]) -> f64 {
    let twice: f64 = ring
        .windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum();
    twice.abs() / 2.0
}

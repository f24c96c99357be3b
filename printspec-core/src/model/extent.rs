use serde::{Deserialize, Serialize};

use crate::model::Position;

/// An axis-aligned bounding box in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Left edge
    pub min_x: f64,
    /// Bottom edge
    pub min_y: f64,
    /// Right edge
    pub max_x: f64,
    /// Top edge
    pub max_y: f64,
}

impl Default for Extent {
    /// An inverted extent that any point extends.
    fn default() -> Self {
        Self {
            min_x: f64::MAX,
            min_y: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
        }
    }
}

impl Extent {
    /// Creates a new extent from its edges.
    #[must_use]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates an extent centered on `center` with the given width and height.
    #[must_use]
    pub fn around(center: Position, width: f64, height: f64) -> Self {
        Self::new(
            center[0] - width / 2.0,
            center[1] - height / 2.0,
            center[0] + width / 2.0,
            center[1] + height / 2.0,
        )
    }

    /// Returns `true` if no point was ever added to this extent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Horizontal size in map units.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Vertical size in map units.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grows the extent to include `position`.
    pub fn extend(&mut self, position: &[f64]) {
        if let [x, y, ..] = *position {
            self.min_x = self.min_x.min(x);
            self.min_y = self.min_y.min(y);
            self.max_x = self.max_x.max(x);
            self.max_y = self.max_y.max(y);
        }
    }

    /// Computes the bounds of a `GeoJSON` geometry.
    #[must_use]
    pub fn of_geometry(value: &geojson::Value) -> Self {
        let mut extent = Self::default();
        match value {
            geojson::Value::Point(point) => extent.extend(point),
            geojson::Value::MultiPoint(points) | geojson::Value::LineString(points) => {
                points.iter().for_each(|p| extent.extend(p));
            }
            geojson::Value::MultiLineString(lines) | geojson::Value::Polygon(lines) => {
                lines.iter().flatten().for_each(|p| extent.extend(p));
            }
            geojson::Value::MultiPolygon(polygons) => {
                polygons.iter().flatten().flatten().for_each(|p| extent.extend(p));
            }
            geojson::Value::GeometryCollection(geometries) => {
                for geometry in geometries {
                    let inner = Self::of_geometry(&geometry.value);
                    if !inner.is_empty() {
                        extent.extend(&[inner.min_x, inner.min_y]);
                        extent.extend(&[inner.max_x, inner.max_y]);
                    }
                }
            }
        }
        extent
    }

    /// Returns `true` if the two extents overlap or touch.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

//! Print scale selection and conversions between scales and resolutions.

use tracing::debug;

use crate::model::{Extent, Position};
use crate::{PrintError, PrintResult};

/// Size of a rendering pixel in meters, as defined by OGC.
pub const OGC_PIXEL_SIZE: f64 = 0.000_28;

/// Print layouts are measured in points of 1/72 inch.
pub const POINTS_PER_INCH: f64 = 72.0;

const METERS_PER_INCH: f64 = 0.0254;

/// View resolution in map units per pixel at which the map is shown at `scale`.
#[must_use]
pub fn resolution_for_scale(scale: u32, meters_per_unit: f64) -> f64 {
    f64::from(scale) * OGC_PIXEL_SIZE / meters_per_unit
}

/// Scale denominator of a view shown at `resolution`.
#[must_use]
pub fn scale_for_resolution(resolution: f64, meters_per_unit: f64) -> f64 {
    resolution * meters_per_unit / OGC_PIXEL_SIZE
}

fn points_to_meters(points: f64) -> f64 {
    points / POINTS_PER_INCH * METERS_PER_INCH
}

/// Picks print scales from a fixed list of candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleResolver {
    /// Ascending, without duplicates
    scales: Vec<u32>,
}

impl ScaleResolver {
    /// Creates a resolver over the candidate `scales`, given in any order.
    pub fn new(mut scales: Vec<u32>) -> PrintResult<Self> {
        scales.sort_unstable();
        scales.dedup();
        if scales.is_empty() {
            return Err(PrintError::NoScales);
        }
        Ok(Self { scales })
    }

    /// The candidate scales, smallest first.
    #[must_use]
    pub fn scales(&self) -> &[u32] {
        &self.scales
    }

    /// Returns the scale at which the current view best fills a page.
    ///
    /// `page_size` is the map frame of the layout in points, `view_size` the
    /// viewport in pixels. The raw scale fitting the view into the frame is
    /// computed per axis and the larger one wins. The result is the largest
    /// candidate not exceeding it, or the smallest candidate if all do.
    #[must_use]
    pub fn optimal_scale(
        &self,
        page_size: [f64; 2],
        view_size: [f64; 2],
        resolution: f64,
        meters_per_unit: f64,
    ) -> u32 {
        let raw = |axis: usize| {
            view_size[axis] * resolution * meters_per_unit / points_to_meters(page_size[axis])
        };
        let raw = raw(0).max(raw(1));
        let scale = self
            .scales
            .iter()
            .rev()
            .find(|&&candidate| f64::from(candidate) <= raw)
            .or_else(|| self.scales.first())
            .copied()
            .unwrap_or_default();
        debug!("Raw print scale 1:{raw:.0}, picked 1:{scale}");
        scale
    }

    /// Geographic extent covered by a page frame of `page_size` points at `scale`.
    #[must_use]
    pub fn print_extent(
        center: Position,
        page_size: [f64; 2],
        scale: u32,
        meters_per_unit: f64,
    ) -> Extent {
        let ground = |points: f64| points_to_meters(points) * f64::from(scale) / meters_per_unit;
        Extent::around(center, ground(page_size[0]), ground(page_size[1]))
    }
}

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{ColorLike, Feature};
use crate::style::StyleError;

/// Fill of a polygon, circle marker or text.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Fill color
    pub color: Option<ColorLike>,
}

/// Outline of a line, polygon, circle marker, or the halo of a text.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Stroke color
    pub color: Option<ColorLike>,
    /// Width in pixels
    pub width: Option<f64>,
    /// Dash pattern, alternating dash and gap lengths in pixels
    pub line_dash: Option<Vec<f64>>,
    /// `butt`, `round` or `square`
    pub line_cap: Option<String>,
}

/// A label drawn for the feature.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Text {
    /// The label text, already resolved for this feature
    pub text: Option<String>,
    /// CSS font shorthand, e.g. `bold 14px Arial`
    pub font: Option<String>,
    /// Color of the glyphs
    pub fill: Option<Fill>,
    /// Halo around the glyphs
    pub stroke: Option<Stroke>,
    /// Horizontal offset in pixels
    pub offset_x: Option<f64>,
    /// Vertical offset in pixels
    pub offset_y: Option<f64>,
    /// `left`, `right`, `center`, `start` or `end`
    pub text_align: Option<String>,
}

/// Marker used for point geometries.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PointSymbol {
    /// A filled and stroked circle
    Circle {
        /// Radius in pixels
        radius: f64,
        /// Interior
        fill: Option<Fill>,
        /// Outline
        stroke: Option<Stroke>,
    },
    /// An external image
    Icon {
        /// Image URL or path
        src: String,
        /// Scale factor applied to the image
        scale: Option<f64>,
        /// Image size in pixels before scaling
        size: Option<[f64; 2]>,
        /// Opacity in `0.0..=1.0`
        opacity: Option<f64>,
        /// Rotation in radians, clockwise
        rotation: Option<f64>,
    },
    /// A regular polygon marker
    Shape {
        /// Number of corners
        points: u32,
        /// Radius in pixels
        radius: f64,
        /// Interior
        fill: Option<Fill>,
        /// Outline
        stroke: Option<Stroke>,
        /// Rotation in radians, clockwise
        rotation: Option<f64>,
    },
}

/// One resolved style of a feature, comparable to a single symbol on screen.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Marker of point geometries
    pub image: Option<PointSymbol>,
    /// Fill of polygons and circles
    pub fill: Option<Fill>,
    /// Outline of lines, polygons and circles
    pub stroke: Option<Stroke>,
    /// Label
    pub text: Option<Text>,
}

impl Style {
    /// Returns `true` if the style draws anything besides a label.
    #[must_use]
    pub fn has_geometry_symbol(&self) -> bool {
        self.image.is_some() || self.fill.is_some() || self.stroke.is_some()
    }

    /// Text of the label, empty if the style has none.
    #[must_use]
    pub fn label(&self) -> &str {
        self.text
            .as_ref()
            .and_then(|t| t.text.as_deref())
            .unwrap_or_default()
    }
}

/// Computes the styles of a feature at a given view resolution.
///
/// A function may legitimately return no style (the feature is hidden), one,
/// or several (for example a symbol plus its label). Errors are surfaced to the
/// caller, they are never retried.
pub trait StyleFunction: Send + Sync + Debug {
    /// Styles of `feature` at the given view resolution.
    fn styles(&self, feature: &Feature, resolution: f64) -> Result<Vec<Style>, StyleError>;
}

/// Adapts a closure into a [`StyleFunction`].
pub struct StyleFn<F>(pub F);

impl<F> Debug for StyleFn<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("StyleFn")
    }
}

impl<F> StyleFunction for StyleFn<F>
where
    F: Fn(&Feature, f64) -> Result<Vec<Style>, StyleError> + Send + Sync,
{
    fn styles(&self, feature: &Feature, resolution: f64) -> Result<Vec<Style>, StyleError> {
        (self.0)(feature, resolution)
    }
}

/// Where the styles of a feature or layer come from.
#[derive(Debug, Clone)]
pub enum StyleSource {
    /// Fixed styles, identical for every feature
    Static(Vec<Style>),
    /// Styles computed per feature
    Function(Arc<dyn StyleFunction>),
}

impl StyleSource {
    /// Wraps a closure as a style function.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Feature, f64) -> Result<Vec<Style>, StyleError> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(StyleFn(f)))
    }

    /// Resolves the styles for one feature.
    pub fn resolve(&self, feature: &Feature, resolution: f64) -> Result<Vec<Style>, StyleError> {
        match self {
            Self::Static(styles) => Ok(styles.clone()),
            Self::Function(function) => function.styles(feature, resolution),
        }
    }
}

impl From<Style> for StyleSource {
    fn from(style: Style) -> Self {
        Self::Static(vec![style])
    }
}

//! Read-only view of the interactive map.
//!
//! These types describe what the map registry hands to the compiler: the
//! layer stack, the features of vector layers, their styles and the current
//! view. Nothing in this crate writes back into them.

mod color;
pub use color::{Color, ColorLike};

mod extent;
pub use extent::Extent;

mod feature;
pub use feature::{Feature, FeatureGeometry, GeometryKind, Position, scalar_text};

mod layer;
pub use layer::{
    Layer, LayerKind, RasterSource, RequestEncoding, TileGrid, TileMatrixSource, VectorSource,
    ViewState,
};
pub(crate) use layer::default_image_format;

mod style;
pub use style::{Fill, PointSymbol, Stroke, Style, StyleFn, StyleFunction, StyleSource, Text};

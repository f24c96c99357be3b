//! CSS-ish colors as the map styles use them.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// A color exactly as written in a style: a CSS string or an `[r, g, b, a]` array.
///
/// Parsing is deferred to [`ColorLike::resolve`] so that malformed values
/// never fail style loading; the compiler substitutes a default instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorLike {
    /// `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)`, `rgba(..)` or a few named colors
    Css(String),
    /// `[r, g, b]` or `[r, g, b, a]` with channels in `0..=255` and alpha in `0..=1`
    Rgba(Vec<f64>),
}

impl From<&str> for ColorLike {
    fn from(value: &str) -> Self {
        Self::Css(value.to_string())
    }
}

impl ColorLike {
    /// Parses the color, returning `None` if it is malformed.
    #[must_use]
    pub fn resolve(&self) -> Option<Color> {
        match self {
            Self::Css(css) => Color::parse_css(css),
            Self::Rgba(channels) => Color::from_channels(channels),
        }
    }
}

/// A parsed RGBA color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Opacity in `0.0..=1.0`
    pub a: f64,
}

impl Color {
    /// Fill used when a style has no usable fill color.
    pub const DEFAULT_FILL: Self = Self::rgba(255, 255, 255, 0.4);
    /// Stroke used when a style has no usable stroke color.
    pub const DEFAULT_STROKE: Self = Self::rgba(51, 153, 204, 1.0);
    /// Text fill used when a text style has no usable fill color.
    pub const DEFAULT_TEXT: Self = Self::rgba(51, 51, 51, 1.0);

    /// Creates a color from channels and opacity.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Hex notation without alpha, e.g. `#3399cc`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(7);
        hex.push('#');
        for channel in [self.r, self.g, self.b] {
            let _ = write!(hex, "{channel:02x}");
        }
        hex
    }

    /// Parses a CSS color string.
    #[must_use]
    pub fn parse_css(css: &str) -> Option<Self> {
        let css = css.trim().to_ascii_lowercase();
        if let Some(hex) = css.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        if let Some(args) = css
            .strip_prefix("rgba(")
            .or_else(|| css.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let channels = args
                .split(',')
                .map(|v| v.trim().parse::<f64>().ok())
                .collect::<Option<Vec<_>>>()?;
            return Self::from_channels(&channels);
        }
        Some(match css.as_str() {
            "black" => Self::rgba(0, 0, 0, 1.0),
            "white" => Self::rgba(255, 255, 255, 1.0),
            "red" => Self::rgba(255, 0, 0, 1.0),
            "green" => Self::rgba(0, 128, 0, 1.0),
            "blue" => Self::rgba(0, 0, 255, 1.0),
            "yellow" => Self::rgba(255, 255, 0, 1.0),
            "gray" | "grey" => Self::rgba(128, 128, 128, 1.0),
            "transparent" => Self::rgba(0, 0, 0, 0.0),
            _ => None?,
        })
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        let digit = |i: usize| u8::from_str_radix(hex.get(i..=i)?, 16).ok();
        let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            3 => Some(Self::rgba(
                digit(0)? * 17,
                digit(1)? * 17,
                digit(2)? * 17,
                1.0,
            )),
            6 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, 1.0)),
            8 => Some(Self::rgba(
                pair(0)?,
                pair(2)?,
                pair(4)?,
                f64::from(pair(6)?) / 255.0,
            )),
            _ => None,
        }
    }

    fn from_channels(channels: &[f64]) -> Option<Self> {
        let channel = |v: f64| {
            (v.is_finite() && (0.0..=255.0).contains(&v)).then(|| {
                #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let c = v.round() as u8;
                c
            })
        };
        let (r, g, b, a) = match *channels {
            [r, g, b] => (r, g, b, 1.0),
            [r, g, b, a] => (r, g, b, a),
            _ => return None,
        };
        if !(0.0..=1.0).contains(&a) {
            return None;
        }
        Some(Self::rgba(channel(r)?, channel(g)?, channel(b)?, a))
    }
}

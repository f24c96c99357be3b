//! Declarative styling rules of the wire format.
//!
//! Instead of per-feature styles, the rendering service matches features to
//! symbolizers with attribute expressions. A [`RuleKey`] is such an expression,
//! kept as an ordered list of attribute/value pairs with exactly one
//! serializer ([`Display`]) and one parser ([`FromStr`]).

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::ser::SerializeMap as _;
use serde::{Serialize, Serializer};

/// Version of the style document understood by the rendering service.
pub const STYLE_VERSION: &str = "2";

/// Errors that can occur while parsing a [`RuleKey`].
#[non_exhaustive]
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RuleKeyError {
    /// The key is neither `*` nor bracketed
    #[error("Rule key {0:?} must be '*' or enclosed in square brackets")]
    NotBracketed(String),

    /// A comparison is not of the form `attr='value'`
    #[error("Rule key {0:?} has a malformed comparison at {1:?}")]
    MalformedComparison(String, String),

    /// A quoted value has no closing quote
    #[error("Rule key {0:?} has an unterminated quoted value")]
    UnterminatedValue(String),
}

/// A conjunction of `attribute = 'value'` comparisons, or the wildcard `*`
/// when empty.
///
/// Serialized as `*`, `[kind='lake']` or `[kind='lake' AND size='2']`.
/// Single quotes inside values are doubled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RuleKey(Vec<(String, String)>);

impl RuleKey {
    /// The key matching every feature.
    #[must_use]
    pub fn wildcard() -> Self {
        Self::default()
    }

    /// Creates a key from comparisons; an empty list is the wildcard.
    #[must_use]
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// True for the key matching every feature.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a comparison.
    pub fn push(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.0.push((attribute.into(), value.into()));
    }

    /// The comparisons in order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl Display for RuleKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("*");
        }
        f.write_str("[")?;
        for (i, (attribute, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{attribute}='{}'", value.replace('\'', "''"))?;
        }
        f.write_str("]")
    }
}

impl FromStr for RuleKey {
    type Err = RuleKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "*" {
            return Ok(Self::wildcard());
        }
        let mut rest = trimmed
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(|| RuleKeyError::NotBracketed(s.to_string()))?;

        let mut pairs = Vec::new();
        loop {
            let (attribute, after) = rest
                .split_once("='")
                .ok_or_else(|| RuleKeyError::MalformedComparison(s.to_string(), rest.to_string()))?;
            let attribute = attribute.trim();
            if attribute.is_empty() {
                return Err(RuleKeyError::MalformedComparison(
                    s.to_string(),
                    rest.to_string(),
                ));
            }

            let (value, remainder) = read_quoted(after)
                .ok_or_else(|| RuleKeyError::UnterminatedValue(s.to_string()))?;
            pairs.push((attribute.to_string(), value));

            let remainder = remainder.trim_start();
            if remainder.is_empty() {
                break;
            }
            rest = remainder.strip_prefix("AND ").ok_or_else(|| {
                RuleKeyError::MalformedComparison(s.to_string(), remainder.to_string())
            })?;
        }
        Ok(Self(pairs))
    }
}

/// Reads a value up to its closing quote, unescaping doubled quotes.
/// Returns the value and whatever follows the closing quote.
fn read_quoted(input: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = input.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if let Some((_, '\'')) = chars.peek() {
                chars.next();
                value.push('\'');
            } else {
                return Some((value, &input[i + 1..]));
            }
        } else {
            value.push(c);
        }
    }
    None
}

impl Serialize for RuleKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Marker of a point geometry.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointSymbolizer {
    /// Radius of a well-known marker in pixels
    pub point_radius: Option<f64>,
    /// Fill color as hex
    pub fill_color: Option<String>,
    /// Fill opacity in `0.0..=1.0`
    pub fill_opacity: Option<f64>,
    /// Outline color as hex
    pub stroke_color: Option<String>,
    /// Outline opacity
    pub stroke_opacity: Option<f64>,
    /// Outline width in pixels
    pub stroke_width: Option<f64>,
    /// Well-known marker name, e.g. `square`
    pub graphic_name: Option<String>,
    /// URL of an external image
    pub external_graphic: Option<String>,
    /// Width of the external image in pixels
    pub graphic_width: Option<f64>,
    /// Height of the external image in pixels
    pub graphic_height: Option<f64>,
    /// Opacity of the external image
    pub graphic_opacity: Option<f64>,
    /// Rotation in degrees
    pub rotation: Option<f64>,
}

/// Stroke of a line.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSymbolizer {
    /// Line color as hex
    pub stroke_color: String,
    /// Line opacity
    pub stroke_opacity: f64,
    /// Line width in pixels
    pub stroke_width: f64,
    /// `butt`, `round` or `square`
    pub stroke_linecap: Option<String>,
    /// Dash lengths separated by spaces
    pub stroke_dashstyle: Option<String>,
}

/// Fill and outline of a polygon.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonSymbolizer {
    /// Fill color as hex
    pub fill_color: String,
    /// Fill opacity
    pub fill_opacity: f64,
    /// Outline color as hex
    pub stroke_color: String,
    /// Outline opacity
    pub stroke_opacity: f64,
    /// Outline width in pixels
    pub stroke_width: f64,
    /// Dash lengths separated by spaces
    pub stroke_dashstyle: Option<String>,
}

/// Label of a feature. Always references the label property, never literal text.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSymbolizer {
    /// Expression reading the label property
    pub label: String,
    /// Glyph color as hex
    pub font_color: String,
    /// Glyph opacity
    pub font_opacity: f64,
    /// Font family
    pub font_family: String,
    /// CSS size, e.g. `12px`
    pub font_size: String,
    /// `normal`, `bold` or a numeric weight
    pub font_weight: String,
    /// Anchor as two letters, horizontal (`l`, `c`, `r`) then vertical (`m`)
    pub label_align: String,
    /// Horizontal offset in pixels
    pub label_x_offset: Option<f64>,
    /// Vertical offset in pixels
    pub label_y_offset: Option<f64>,
    /// Halo color as hex
    pub halo_color: Option<String>,
    /// Halo opacity
    pub halo_opacity: Option<f64>,
    /// Halo width in pixels
    pub halo_radius: Option<f64>,
}

/// A rendering instruction in the wire style.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Symbolizer {
    /// Marker of a point
    Point(PointSymbolizer),
    /// Stroke of a line
    Line(LineSymbolizer),
    /// Fill and outline of a polygon
    Polygon(PolygonSymbolizer),
    /// Label
    Text(TextSymbolizer),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Rule<'a> {
    symbolizers: &'a [Symbolizer],
}

/// The rule map of one vector layer, in registration order.
///
/// A key is present at most once. Serialized as
/// `{"version": "2", "<key>": {"symbolizers": [...]}, ...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleRules(Vec<(RuleKey, Vec<Symbolizer>)>);

impl StyleRules {
    /// Returns `true` if a rule with this key exists.
    #[must_use]
    pub fn contains(&self, key: &RuleKey) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Registers `symbolizers` under `key` unless the key is already taken.
    ///
    /// Returns `false` and drops `symbolizers` if the key exists.
    pub fn insert(&mut self, key: RuleKey, symbolizers: Vec<Symbolizer>) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.0.push((key, symbolizers));
        true
    }

    /// Symbolizers of the rule with this key.
    #[must_use]
    pub fn get(&self, key: &RuleKey) -> Option<&[Symbolizer]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, s)| s.as_slice())
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no rule was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rule keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &RuleKey> {
        self.0.iter().map(|(k, _)| k)
    }
}

impl Serialize for StyleRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len() + 1))?;
        map.serialize_entry("version", STYLE_VERSION)?;
        for (key, symbolizers) in &self.0 {
            map.serialize_entry(key, &Rule { symbolizers })?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn key(pairs: &[(&str, &str)]) -> RuleKey {
        RuleKey::new(
            pairs
                .iter()
                .map(|(a, v)| ((*a).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[rstest]
    #[case(key(&[]), "*")]
    #[case(key(&[("kind", "lake")]), "[kind='lake']")]
    #[case(key(&[("kind", "lake"), ("size", "2")]), "[kind='lake' AND size='2']")]
    #[case(key(&[("name", "O'Brien")]), "[name='O''Brien']")]
    #[case(key(&[("note", "a AND b] x='y'")]), "[note='a AND b] x=''y''']")]
    fn canonical_form(#[case] key: RuleKey, #[case] text: &str) {
        assert_eq!(key.to_string(), text);
        assert_eq!(text.parse::<RuleKey>().unwrap(), key);
    }

    #[rstest]
    #[case("kind='lake'")]
    #[case("[='lake']")]
    #[case("[kind='lake]")]
    #[case("[kind='lake' OR size='2']")]
    fn rejects_malformed(#[case] text: &str) {
        assert!(text.parse::<RuleKey>().is_err());
    }

    #[test]
    fn first_registration_wins() {
        let mut rules = StyleRules::default();
        let line = |width| {
            Symbolizer::Line(LineSymbolizer {
                stroke_color: "#000000".to_string(),
                stroke_opacity: 1.0,
                stroke_width: width,
                ..Default::default()
            })
        };
        assert!(rules.insert(key(&[("kind", "road")]), vec![line(1.0)]));
        assert!(!rules.insert(key(&[("kind", "road")]), vec![line(5.0)]));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get(&key(&[("kind", "road")])), Some(&[line(1.0)][..]));
    }

    #[test]
    fn serializes_in_registration_order() {
        let mut rules = StyleRules::default();
        rules.insert(
            key(&[("kind", "b")]),
            vec![Symbolizer::Point(PointSymbolizer {
                point_radius: Some(4.0),
                ..Default::default()
            })],
        );
        rules.insert(RuleKey::wildcard(), vec![]);
        insta::assert_json_snapshot!(rules, @r#"
        {
          "version": "2",
          "[kind='b']": {
            "symbolizers": [
              {
                "type": "point",
                "pointRadius": 4.0
              }
            ]
          },
          "*": {
            "symbolizers": []
          }
        }
        "#);
    }
}

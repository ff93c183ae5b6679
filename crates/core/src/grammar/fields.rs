//! Field maps: the parsed body of a command block.
//!
//! A block body is folded line by line into a [`FieldMap`]. Coercion is
//! deliberately minimal: `version` becomes a number when it parses as one,
//! the literals `true`/`false` become booleans, and everything else stays
//! text. When a key repeats, the later value wins.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// A single field value after primitive coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// `true` / `false`.
    Bool(bool),
    /// A finite number (only produced for `version` by the parser).
    Number(f64),
    /// Any other value, trimmed.
    Text(String),
}

impl FieldValue {
    /// The value if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// String form of the value, as it would have appeared in the block.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s),
            FieldValue::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            FieldValue::Number(n) => Cow::Owned(format_number(*n)),
        }
    }

    /// Whether the string form is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.to_text().trim().is_empty()
    }

    /// The value as a finite number.
    ///
    /// Numbers pass through; text counts when its trimmed form is non-empty
    /// and parses to a finite `f64`. Booleans are never numeric.
    pub fn as_finite_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.is_finite().then_some(*n),
            FieldValue::Text(s) => parse_finite(s),
            FieldValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Parse `s` as a finite decimal number.
pub(crate) fn parse_finite(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integral values print without a fractional part (`1`, not `1.0`).
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Ordered key-to-value map with last-write-wins insertion.
///
/// Keys keep the position of their first occurrence; a later insert with
/// the same key replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Whether `key` is present (with any value).
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Text value for `key`; `None` when absent or not text.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    /// Trimmed string form of `key` when present and not blank.
    pub fn non_blank(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.to_text().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// The first of `keys` that is present, with its value.
    pub fn first_present<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &FieldValue)> {
        keys.iter()
            .find_map(|k| self.get(k).map(|v| (*k, v)))
    }

    /// Iterate entries in key order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        iter.into_iter().fold(FieldMap::new(), |mut map, (k, v)| {
            map.insert(k, v);
            map
        })
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of string, number, or boolean fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
                let mut map = FieldMap::new();
                while let Some((k, v)) = access.next_entry::<String, FieldValue>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

/// Apply the coercion rules to one `(key, value)` pair.
pub fn coerce(key: &str, value: &str) -> FieldValue {
    if key == "version"
        && let Some(n) = parse_finite(value)
    {
        return FieldValue::Number(n);
    }
    match value {
        "true" => FieldValue::Bool(true),
        "false" => FieldValue::Bool(false),
        _ => FieldValue::Text(value.to_string()),
    }
}

/// Fold trimmed `(key, value)` pairs into a [`FieldMap`].
///
/// Later keys overwrite earlier ones.
pub fn parse_fields<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> FieldMap {
    pairs
        .into_iter()
        .fold(FieldMap::new(), |mut map, (key, value)| {
            map.insert(key, coerce(key, value));
            map
        })
}

//! Untyped values, as found in templates and data models.

use crate::color::Color;
use std::collections::BTreeMap;
use std::str::FromStr;

/// An untyped value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Untyped properties, keyed by their template attribute names (e.g. `flexDirection`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawProperties(BTreeMap<String, Value>);

impl RawProperties {
    pub fn new() -> RawProperties {
        RawProperties::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn f32(&self, key: &str) -> Option<f32> {
        self.get(key)?.as_f64().map(|n| n as f32)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_f64()
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    pub fn color(&self, key: &str) -> Option<Color> {
        Color::from_hex(self.get(key)?.as_str()?)
    }

    /// Parses an enumerated value from its string representation.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.as_str()?.parse().ok()
    }
}

impl FromIterator<(String, Value)> for RawProperties {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        RawProperties(iter.into_iter().collect())
    }
}

/// A data model that templates are bound against.
///
/// Paths are dot-separated key paths such as `user.name`.
pub trait Model: Send + Sync {
    fn resolve(&self, path: &str) -> Option<Value>;
}

impl Model for Value {
    fn resolve(&self, path: &str) -> Option<Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Value::Map(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}

impl Model for BTreeMap<String, Value> {
    fn resolve(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let value = self.get(head)?;
        match rest {
            Some(rest) => value.resolve(rest),
            None => Some(value.clone()),
        }
    }
}

/// Replaces `$path` string values with the value the model resolves them to.
///
/// Bindings that the model cannot resolve are dropped, so the property falls back to its
/// default.
pub fn resolve_bindings(raw: &RawProperties, model: &dyn Model) -> RawProperties {
    raw.iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) if s.starts_with('$') => {
                model.resolve(&s[1..]).map(|resolved| (key.clone(), resolved))
            }
            _ => Some((key.clone(), value.clone())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> BTreeMap<String, Value> {
        let mut user = BTreeMap::new();
        user.insert("name".to_string(), Value::from("ada"));
        user.insert(
            "tags".to_string(),
            Value::Array(vec![Value::from("a"), Value::from("b")]),
        );
        let mut model = BTreeMap::new();
        model.insert("user".to_string(), Value::Map(user));
        model.insert("count".to_string(), Value::from(3));
        model
    }

    #[test]
    fn resolves_key_paths() {
        let model = model();
        assert_eq!(model.resolve("count"), Some(Value::Number(3.)));
        assert_eq!(model.resolve("user.name"), Some(Value::from("ada")));
        assert_eq!(model.resolve("user.tags.1"), Some(Value::from("b")));
        assert_eq!(model.resolve("user.missing"), None);
        assert_eq!(model.resolve("count.nope"), None);
    }

    #[test]
    fn substitutes_bindings() {
        let raw = RawProperties::new()
            .with("text", "$user.name")
            .with("width", 10.)
            .with("id", "$nothing");
        let resolved = resolve_bindings(&raw, &model());
        assert_eq!(resolved.string("text").as_deref(), Some("ada"));
        assert_eq!(resolved.f32("width"), Some(10.));
        assert_eq!(resolved.get("id"), None, "unresolved bindings are dropped");
    }

    #[test]
    fn coerces_strings() {
        let raw = RawProperties::new().with("width", "12.5").with("hidden", "true");
        assert_eq!(raw.f32("width"), Some(12.5));
        assert_eq!(raw.bool("hidden"), Some(true));
    }
}

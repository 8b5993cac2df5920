//! Performance oriented JSON manipulation.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// Extension trait for [`serde_json_bytes::Value`].
pub(crate) trait ValueExt {
    /// Returns a `&str` describing the JSON type of the value, for error messages.
    fn json_type_name(&self) -> &'static str;

    /// Returns the value as an integer, accepting floats without a fractional part.
    ///
    /// Documents written by JavaScript clients frequently store counters as doubles.
    fn as_integral(&self) -> Option<i64>;
}

impl ValueExt for Value {
    fn json_type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn as_integral(&self) -> Option<i64> {
        match self {
            Value::Number(number) => number.as_i64().or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
    }
}

/// A GraphQL path element that is composed of strings or numbers.
/// e.g `/tweets/3/user`
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index path element.
    Index(usize),

    /// A key path element.
    Key(String),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Index(index) => write!(f, "{index}"),
            PathElement::Key(key) => f.write_str(key),
        }
    }
}

/// A path into the result document.
///
/// This can be composed of strings and numbers.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    /// Returns a new path with a key appended.
    pub(crate) fn join_key(&self, key: impl Into<String>) -> Path {
        let mut elements = self.0.clone();
        elements.push(PathElement::Key(key.into()));
        Path(elements)
    }

    /// Returns a new path with an index appended.
    pub(crate) fn join_index(&self, index: usize) -> Path {
        let mut elements = self.0.clone();
        elements.push(PathElement::Index(index));
        Path(elements)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }
}

impl<T> From<T> for Path
where
    T: AsRef<str>,
{
    /// Parses a `/` separated path, numeric segments become indexes.
    fn from(s: T) -> Self {
        Self(
            s.as_ref()
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| match segment.parse::<usize>() {
                    Ok(index) => PathElement::Index(index),
                    Err(_) => PathElement::Key(segment.to_string()),
                })
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in self.iter() {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn path_parsing_and_display() {
        let path = Path::from("tweets/1/user");
        assert_eq!(
            path,
            Path(vec![
                PathElement::Key("tweets".to_string()),
                PathElement::Index(1),
                PathElement::Key("user".to_string()),
            ])
        );
        assert_eq!(path.to_string(), "/tweets/1/user");
    }

    #[test]
    fn path_serializes_as_mixed_array() {
        let path = Path::empty().join_key("user").join_key("tweets").join_index(0);
        assert_eq!(
            serde_json::to_value(&path).unwrap(),
            serde_json::json!(["user", "tweets", 0])
        );
    }

    #[test]
    fn integral_values() {
        assert_eq!(json!(5).as_integral(), Some(5));
        assert_eq!(json!(5.0).as_integral(), Some(5));
        assert_eq!(json!(5.5).as_integral(), None);
        assert_eq!(json!("5").as_integral(), None);
        assert_eq!(json!(null).json_type_name(), "null");
        assert_eq!(json!({"a": 1}).json_type_name(), "object");
    }
}

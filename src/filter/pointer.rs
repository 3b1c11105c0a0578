use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::FilterError;

/// Field reference into JSON content, e.g. `/address/city`.
///
/// Parsing accepts the pointer with or without its leading `/` and follows
/// RFC 6901 escaping (`~1` for `/`, `~0` for `~`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(pointer: &str) -> Self {
        Self {
            tokens: pointer
                .split('/')
                .filter(|t| !t.is_empty())
                .map(|t| t.replace("~1", "/").replace("~0", "~"))
                .collect(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// New pointer with `token` inserted in front of this one.
    pub fn prefixed(&self, token: impl Into<String>) -> Self {
        let mut tokens = Vec::with_capacity(self.tokens.len() + 1);
        tokens.push(token.into());
        tokens.extend(self.tokens.iter().cloned());
        Self { tokens }
    }

    /// New pointer with `token` appended.
    pub fn child(&self, token: impl Into<String>) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token.into());
        Self { tokens }
    }

    pub fn get<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.tokens.iter().try_fold(value, |current, token| match current {
            Value::Object(map) => map.get(token),
            Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Set the value at this pointer, creating intermediate objects as needed.
    pub fn set(&self, target: &mut Value, value: Value) -> Result<(), FilterError> {
        let Some((last, parents)) = self.tokens.split_last() else {
            *target = value;
            return Ok(());
        };

        let mut current = target;
        for token in parents {
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            current = match current {
                Value::Object(map) => map
                    .entry(token.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => {
                    let index = token
                        .parse::<usize>()
                        .map_err(|_| FilterError::InvalidPointer(self.to_string()))?;
                    items
                        .get_mut(index)
                        .ok_or_else(|| FilterError::InvalidPointer(self.to_string()))?
                }
                _ => return Err(FilterError::InvalidPointer(self.to_string())),
            };
        }

        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        match current {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(items) if last == "-" => {
                items.push(value);
                Ok(())
            }
            Value::Array(items) => {
                let slot = last
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| FilterError::InvalidPointer(self.to_string()))?;
                *slot = value;
                Ok(())
            }
            _ => Err(FilterError::InvalidPointer(self.to_string())),
        }
    }

    /// Remove and return the value at this pointer.
    pub fn remove(&self, target: &mut Value) -> Option<Value> {
        let (last, parents) = self.tokens.split_last()?;
        let mut current = target;
        for token in parents {
            current = match current {
                Value::Object(map) => map.get_mut(token)?,
                Value::Array(items) => items.get_mut(token.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        match current {
            Value::Object(map) => map.remove(last),
            Value::Array(items) => {
                let index = last.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.remove(index))
            }
            _ => None,
        }
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tokens.is_empty() {
            return write!(f, "/");
        }
        for token in &self.tokens {
            write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl From<&str> for JsonPointer {
    fn from(pointer: &str) -> Self {
        Self::parse(pointer)
    }
}

impl From<String> for JsonPointer {
    fn from(pointer: String) -> Self {
        Self::parse(&pointer)
    }
}

impl From<JsonPointer> for String {
    fn from(pointer: JsonPointer) -> Self {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_with_or_without_leading_slash() {
        assert_eq!(JsonPointer::parse("/a/b"), JsonPointer::parse("a/b"));
        assert_eq!(JsonPointer::parse("/a~1b/c~0d").tokens(), &["a/b".to_string(), "c~d".to_string()]);
        assert_eq!(JsonPointer::parse("/a~1b").to_string(), "/a~1b");
        assert!(JsonPointer::parse("/").is_empty());
    }

    #[test]
    fn get_walks_objects_and_arrays() {
        let doc = json!({"a": {"b": [10, {"c": "x"}]}});
        assert_eq!(JsonPointer::parse("/a/b/0").get(&doc), Some(&json!(10)));
        assert_eq!(JsonPointer::parse("/a/b/1/c").get(&doc), Some(&json!("x")));
        assert_eq!(JsonPointer::parse("/a/z").get(&doc), None);
        assert_eq!(JsonPointer::root().get(&doc), Some(&doc));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = json!({});
        JsonPointer::parse("/address/city").set(&mut doc, json!("Oslo")).unwrap();
        assert_eq!(doc, json!({"address": {"city": "Oslo"}}));

        let mut list = json!({"tags": ["a"]});
        JsonPointer::parse("/tags/-").set(&mut list, json!("b")).unwrap();
        assert_eq!(list, json!({"tags": ["a", "b"]}));

        let mut scalar = json!({"name": "x"});
        assert!(JsonPointer::parse("/name/first").set(&mut scalar, json!(1)).is_err());
    }

    #[test]
    fn remove_returns_previous_value() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(JsonPointer::parse("/a/b").remove(&mut doc), Some(json!(1)));
        assert_eq!(doc, json!({"a": {"c": 2}}));
        assert_eq!(JsonPointer::parse("/missing/x").remove(&mut doc), None);
    }

    #[test]
    fn prefixed_inserts_leading_token() {
        let pointer = JsonPointer::parse("/status").prefixed("fullobject");
        assert_eq!(pointer.to_string(), "/fullobject/status");
        assert_eq!(pointer.first(), Some("fullobject"));
    }
}

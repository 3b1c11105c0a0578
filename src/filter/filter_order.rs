use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::pointer::JsonPointer;
use super::types::{SortDirection, SortKey};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"-name,age"`, `"name desc, age"`, `["name desc", "age"]` or
    /// `{"name": "desc", "age": "asc"}`.
    pub fn validate_and_parse(order: &Value) -> Result<Vec<SortKey>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_sort_keys(s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    let s = v
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidSortKey(v.to_string()))?;
                    out.extend(Self::parse_sort_keys(s)?);
                }
                Ok(out)
            }
            Value::Object(obj) => obj
                .iter()
                .map(|(field, dir)| {
                    let direction = match dir.as_str().map(str::to_ascii_lowercase).as_deref() {
                        Some("desc") => SortDirection::Desc,
                        Some("asc") | None => SortDirection::Asc,
                        Some(other) => return Err(FilterError::InvalidSortKey(format!("{} {}", field, other))),
                    };
                    Ok(SortKey { field: JsonPointer::parse(field), direction })
                })
                .collect(),
            other => Err(FilterError::InvalidSortKey(other.to_string())),
        }
    }

    pub fn parse_sort_keys(s: &str) -> Result<Vec<SortKey>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            out.push(Self::parse_sort_key(trimmed)?);
        }
        Ok(out)
    }

    fn parse_sort_key(token: &str) -> Result<SortKey, FilterError> {
        let mut it = token.split_whitespace();
        let (Some(column), dir, None) = (it.next(), it.next(), it.next()) else {
            return Err(FilterError::InvalidSortKey(token.to_string()));
        };

        let (column, mut direction) = match column.as_bytes().first() {
            Some(b'-') => (&column[1..], SortDirection::Desc),
            Some(b'+') => (&column[1..], SortDirection::Asc),
            _ => (column, SortDirection::Asc),
        };
        if column.is_empty() {
            return Err(FilterError::InvalidSortKey(token.to_string()));
        }
        match dir {
            Some(d) if d.eq_ignore_ascii_case("desc") => direction = SortDirection::Desc,
            Some(d) if d.eq_ignore_ascii_case("asc") => direction = SortDirection::Asc,
            Some(_) => return Err(FilterError::InvalidSortKey(token.to_string())),
            None => {}
        }
        Ok(SortKey { field: JsonPointer::parse(column), direction })
    }

    /// Compare two documents by the given keys. Missing values sort first.
    pub fn compare(keys: &[SortKey], a: &Value, b: &Value) -> Ordering {
        for key in keys {
            let ordering = compare_optional(key.field.get(a), key.field.get(b));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_json(x, y),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_prefix_and_suffix_directions() {
        let keys = FilterOrder::parse_sort_keys("-name, age asc,+city, zip DESC").unwrap();
        assert_eq!(
            keys,
            vec![
                SortKey::descending("name"),
                SortKey::ascending("age"),
                SortKey::ascending("city"),
                SortKey::descending("zip"),
            ]
        );
        assert!(FilterOrder::parse_sort_keys("name sideways").is_err());
        assert!(FilterOrder::parse_sort_keys("-").is_err());
    }

    #[test]
    fn parses_array_and_object_forms() {
        let keys = FilterOrder::validate_and_parse(&json!(["name desc", "age"])).unwrap();
        assert_eq!(keys, vec![SortKey::descending("name"), SortKey::ascending("age")]);
        let keys = FilterOrder::validate_and_parse(&json!({"age": "desc"})).unwrap();
        assert_eq!(keys, vec![SortKey::descending("age")]);
        assert!(FilterOrder::validate_and_parse(&json!(42)).is_err());
    }

    #[test]
    fn compares_documents_by_keys() {
        let keys = vec![SortKey::ascending("team"), SortKey::descending("score")];
        let a = json!({"team": "blue", "score": 3});
        let b = json!({"team": "blue", "score": 9});
        let c = json!({"team": "red", "score": 1});
        let mut docs = vec![c.clone(), a.clone(), b.clone()];
        docs.sort_by(|x, y| FilterOrder::compare(&keys, x, y));
        assert_eq!(docs, vec![b, a, c]);
    }
}

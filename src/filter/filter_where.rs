use serde_json::Value;

use super::error::FilterError;
use super::pointer::JsonPointer;
use super::types::{FilterOp, QueryFilter};

/// Parser for the JSON "where" form of a query filter:
///
/// ```json
/// {"status": "active", "age": {"$gte": 18}, "$or": [{"role": "admin"}, {"role": "owner"}]}
/// ```
///
/// Sibling keys are joined with AND. `{field: null}` means the field is absent,
/// `{field: {"$exists": bool}}` tests for presence explicitly.
pub struct FilterWhere {
    max_depth: u32,
}

impl FilterWhere {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// Parse with the configured nesting limit.
    pub fn parse(where_data: &Value) -> Result<QueryFilter, FilterError> {
        Self::new(crate::config::CONFIG.filter.max_nested_depth).parse_value(where_data)
    }

    /// Parse a where clause delivered as a string (query parameter form).
    pub fn parse_str(where_text: &str) -> Result<QueryFilter, FilterError> {
        let value: Value = serde_json::from_str(where_text)?;
        Self::parse(&value)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Object(_) | Value::Bool(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause(
                "WHERE must be an object or a boolean".to_string(),
            )),
        }
    }

    pub fn parse_value(&self, where_data: &Value) -> Result<QueryFilter, FilterError> {
        Self::validate(where_data)?;
        self.parse_node(where_data, 0)
    }

    fn parse_node(&self, data: &Value, depth: u32) -> Result<QueryFilter, FilterError> {
        if depth > self.max_depth {
            return Err(FilterError::NestingTooDeep { depth, max: self.max_depth });
        }
        match data {
            Value::Bool(b) => Ok(QueryFilter::BooleanLiteral(*b)),
            Value::Object(obj) => {
                let mut clauses = Vec::with_capacity(obj.len());
                for (key, value) in obj {
                    if key.starts_with('$') {
                        clauses.push(self.parse_logical_operator(key, value, depth)?);
                    } else {
                        clauses.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(match clauses.len() {
                    0 => QueryFilter::always_true(),
                    1 => clauses.remove(0),
                    _ => QueryFilter::And(clauses),
                })
            }
            _ => Err(FilterError::InvalidWhereClause(format!("Unsupported WHERE format: {}", data))),
        }
    }

    fn parse_logical_operator(&self, op: &str, value: &Value, depth: u32) -> Result<QueryFilter, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let children = arr
                    .iter()
                    .map(|v| self.parse_node(v, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { QueryFilter::And(children) } else { QueryFilter::Or(children) })
            }
            "$not" => Ok(QueryFilter::not(self.parse_node(value, depth + 1)?)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<QueryFilter>, FilterError> {
        let pointer = JsonPointer::parse(field);
        match value {
            Value::Null => Ok(vec![QueryFilter::not(QueryFilter::Present(pointer))]),
            Value::Object(obj) if obj.keys().any(|k| k.starts_with('$')) => obj
                .iter()
                .map(|(op_key, op_val)| Self::parse_operator(&pointer, op_key, op_val))
                .collect(),
            // Implicit equality: { field: value }
            other => Ok(vec![QueryFilter::equal_to(pointer, other.clone())]),
        }
    }

    fn parse_operator(field: &JsonPointer, op_key: &str, op_val: &Value) -> Result<QueryFilter, FilterError> {
        if op_key == "$exists" {
            let exists = op_val
                .as_bool()
                .ok_or_else(|| FilterError::InvalidOperatorData("$exists requires a boolean".to_string()))?;
            let present = QueryFilter::Present(field.clone());
            return Ok(if exists { present } else { QueryFilter::not(present) });
        }

        let operator = FilterOp::from_key(op_key)?;
        match operator {
            FilterOp::Between => match op_val.as_array() {
                Some(values) if values.len() == 2 => {}
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires array with 2 values".to_string(),
                    ))
                }
            },
            FilterOp::Like | FilterOp::ILike if !op_val.is_string() => {
                return Err(FilterError::InvalidOperatorData(format!("{} requires a string pattern", op_key)))
            }
            _ => {}
        }
        Ok(QueryFilter::comparison(field.clone(), operator, op_val.clone()))
    }
}

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::pointer::JsonPointer;
use super::types::{FilterOp, QueryFilter};

impl QueryFilter {
    pub fn always_true() -> Self {
        QueryFilter::BooleanLiteral(true)
    }

    pub fn comparison(field: impl Into<JsonPointer>, operator: FilterOp, value: impl Into<Value>) -> Self {
        QueryFilter::Comparison {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn equal_to(field: impl Into<JsonPointer>, value: impl Into<Value>) -> Self {
        Self::comparison(field, FilterOp::Eq, value)
    }

    pub fn present(field: impl Into<JsonPointer>) -> Self {
        QueryFilter::Present(field.into())
    }

    pub fn and(filters: Vec<QueryFilter>) -> Self {
        QueryFilter::And(filters)
    }

    pub fn or(filters: Vec<QueryFilter>) -> Self {
        QueryFilter::Or(filters)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: QueryFilter) -> Self {
        QueryFilter::Not(Box::new(filter))
    }

    /// Rebuild the filter with every field reference passed through `transform`.
    /// Structure, operators and operand values are preserved.
    pub fn map_fields<F>(&self, transform: &F) -> QueryFilter
    where
        F: Fn(&JsonPointer) -> JsonPointer,
    {
        match self {
            QueryFilter::BooleanLiteral(b) => QueryFilter::BooleanLiteral(*b),
            QueryFilter::Comparison { field, operator, value } => QueryFilter::Comparison {
                field: transform(field),
                operator: *operator,
                value: value.clone(),
            },
            QueryFilter::Present(field) => QueryFilter::Present(transform(field)),
            QueryFilter::And(filters) => {
                QueryFilter::And(filters.iter().map(|f| f.map_fields(transform)).collect())
            }
            QueryFilter::Or(filters) => {
                QueryFilter::Or(filters.iter().map(|f| f.map_fields(transform)).collect())
            }
            QueryFilter::Not(inner) => QueryFilter::Not(Box::new(inner.map_fields(transform))),
        }
    }

    /// All field references, depth-first.
    pub fn fields(&self) -> Vec<&JsonPointer> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a JsonPointer>) {
        match self {
            QueryFilter::BooleanLiteral(_) => {}
            QueryFilter::Comparison { field, .. } | QueryFilter::Present(field) => out.push(field),
            QueryFilter::And(filters) | QueryFilter::Or(filters) => {
                filters.iter().for_each(|f| f.collect_fields(out))
            }
            QueryFilter::Not(inner) => inner.collect_fields(out),
        }
    }

    /// Evaluate the filter against a JSON document.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            QueryFilter::BooleanLiteral(b) => *b,
            QueryFilter::Present(field) => field.get(document).map_or(false, |v| !v.is_null()),
            QueryFilter::And(filters) => filters.iter().all(|f| f.matches(document)),
            QueryFilter::Or(filters) => filters.iter().any(|f| f.matches(document)),
            QueryFilter::Not(inner) => !inner.matches(document),
            QueryFilter::Comparison { field, operator, value } => {
                let actual = field.get(document);
                match operator {
                    FilterOp::Ne => !compare_eq(actual, value),
                    FilterOp::NIn => !compare_in(actual, value),
                    FilterOp::In => compare_in(actual, value),
                    _ => actual.map_or(false, |a| {
                        any_element(a, value, |candidate| evaluate(*operator, candidate, value))
                    }),
                }
            }
        }
    }
}

fn compare_eq(actual: Option<&Value>, expected: &Value) -> bool {
    actual.map_or(false, |a| any_element(a, expected, |c| values_equal(c, expected)))
}

fn compare_in(actual: Option<&Value>, expected: &Value) -> bool {
    let Some(a) = actual else { return false };
    match expected {
        Value::Array(options) => options
            .iter()
            .any(|option| any_element(a, option, |c| values_equal(c, option))),
        single => any_element(a, single, |c| values_equal(c, single)),
    }
}

// Multi-valued attributes match when any element does, unless the operand is itself an array.
fn any_element<F>(actual: &Value, operand: &Value, predicate: F) -> bool
where
    F: Fn(&Value) -> bool,
{
    match actual {
        Value::Array(items) if !operand.is_array() => items.iter().any(|item| predicate(item)),
        other => predicate(other),
    }
}

fn evaluate(operator: FilterOp, actual: &Value, operand: &Value) -> bool {
    match operator {
        FilterOp::Eq => values_equal(actual, operand),
        FilterOp::Gt => compare_values(actual, operand) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare_values(actual, operand), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare_values(actual, operand) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare_values(actual, operand), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like | FilterOp::ILike => match (actual.as_str(), operand.as_str()) {
            (Some(text), Some(pattern)) => like_match(pattern, text, operator == FilterOp::ILike),
            _ => false,
        },
        FilterOp::Between => match operand.as_array().map(Vec::as_slice) {
            Some([low, high]) => {
                matches!(compare_values(actual, low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare_values(actual, high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
        // handled by the caller
        FilterOp::Ne | FilterOp::In | FilterOp::NIn => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL-style LIKE: `%` matches any run of characters, `_` exactly one.
fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (pattern.to_lowercase(), text.to_lowercase())
    } else {
        (pattern.to_string(), text.to_string())
    };
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    // dp[j] = pattern[..i] matches text[..j]
    let mut dp = vec![false; t.len() + 1];
    dp[0] = true;
    for pc in &p {
        let mut next = vec![false; t.len() + 1];
        match pc {
            '%' => {
                let mut seen = false;
                for j in 0..=t.len() {
                    seen |= dp[j];
                    next[j] = seen;
                }
            }
            '_' => {
                for j in 1..=t.len() {
                    next[j] = dp[j - 1];
                }
            }
            c => {
                for j in 1..=t.len() {
                    next[j] = dp[j - 1] && t[j - 1] == *c;
                }
            }
        }
        dp = next;
    }
    dp[t.len()]
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryFilter::BooleanLiteral(b) => write!(f, "{}", b),
            QueryFilter::Comparison { field, operator, value } => {
                write!(f, "{} {} {}", field, operator.keyword(), value)
            }
            QueryFilter::Present(field) => write!(f, "{} pr", field),
            QueryFilter::And(filters) => write_joined(f, filters, " and "),
            QueryFilter::Or(filters) => write_joined(f, filters, " or "),
            QueryFilter::Not(inner) => write!(f, "!({})", inner),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, filters: &[QueryFilter], joiner: &str) -> fmt::Result {
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", joiner)?;
        }
        write!(f, "({})", filter)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_nested_filters() {
        let filter = QueryFilter::and(vec![
            QueryFilter::equal_to("/fullobject/status", "active"),
            QueryFilter::equal_to("/objecttype", "user"),
        ]);
        assert_eq!(
            filter.to_string(),
            r#"(/fullobject/status eq "active") and (/objecttype eq "user")"#
        );
        assert_eq!(QueryFilter::not(QueryFilter::present("a")).to_string(), "!(/a pr)");
    }

    #[test]
    fn map_fields_preserves_structure() {
        let filter = QueryFilter::or(vec![
            QueryFilter::equal_to("a", 1),
            QueryFilter::not(QueryFilter::present("b/c")),
        ]);
        let mapped = filter.map_fields(&|p: &JsonPointer| p.prefixed("x"));
        assert_eq!(mapped.to_string(), "(/x/a eq 1) or (!(/x/b/c pr))");
        let fields: Vec<String> = mapped.fields().iter().map(|p| p.to_string()).collect();
        assert_eq!(fields, vec!["/x/a", "/x/b/c"]);
    }

    #[test]
    fn evaluates_comparisons() {
        let doc = json!({"name": "alice", "age": 30, "tags": ["x", "y"], "nick": null});
        assert!(QueryFilter::equal_to("name", "alice").matches(&doc));
        assert!(QueryFilter::comparison("age", FilterOp::Gte, 30).matches(&doc));
        assert!(QueryFilter::comparison("age", FilterOp::Lt, 30.5).matches(&doc));
        assert!(!QueryFilter::comparison("age", FilterOp::Gt, 30).matches(&doc));
        assert!(QueryFilter::comparison("age", FilterOp::Between, json!([18, 65])).matches(&doc));
        assert!(QueryFilter::equal_to("tags", "y").matches(&doc));
        assert!(QueryFilter::comparison("name", FilterOp::In, json!(["bob", "alice"])).matches(&doc));
        assert!(QueryFilter::comparison("name", FilterOp::NIn, json!(["bob"])).matches(&doc));
        assert!(QueryFilter::comparison("missing", FilterOp::Ne, "x").matches(&doc));
        assert!(!QueryFilter::present("nick").matches(&doc));
        assert!(!QueryFilter::equal_to("missing", "x").matches(&doc));
    }

    #[test]
    fn like_supports_wildcards() {
        assert!(like_match("al%", "alice", false));
        assert!(like_match("a_ice", "alice", false));
        assert!(like_match("%LI%", "alice", true));
        assert!(!like_match("%LI%", "alice", false));
        assert!(!like_match("b%", "alice", false));
        assert!(like_match("%", "", false));
    }
}

//! In-process evaluation of [`QueryFilter`]s against JSON documents.
//!
//! Semantics follow document-database conventions: numbers compare by value
//! regardless of integer/float representation, operators on an array field
//! match if any element matches, values of different kinds never order
//! against each other, and a missing field only equals `null`.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use ingres_core::error::IngresError;
use ingres_core::filter::{FilterClause, Operator, QueryFilter};

/// Upper bound on compiled regex size, so a model-written pattern cannot
/// blow up memory.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A filter with its regular expressions compiled, ready to test documents.
#[derive(Debug)]
pub struct CompiledFilter {
    clauses: Vec<CompiledClause>,
}

#[derive(Debug)]
enum CompiledClause {
    Field { path: Vec<String>, ops: Vec<CompiledOp> },
    And(Vec<CompiledFilter>),
    Or(Vec<CompiledFilter>),
}

#[derive(Debug)]
enum CompiledOp {
    Plain(Operator),
    Regex(Regex),
}

impl CompiledFilter {
    /// Compile a filter. Fails only on an invalid regular expression.
    pub fn compile(filter: &QueryFilter) -> Result<Self, IngresError> {
        let clauses = filter
            .clauses()
            .iter()
            .map(compile_clause)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses })
    }

    /// True when every clause holds for the document.
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        self.clauses.iter().all(|clause| match clause {
            CompiledClause::Field { path, ops } => {
                let value = lookup(doc, path);
                ops.iter().all(|op| op_matches(op, value))
            }
            CompiledClause::And(filters) => filters.iter().all(|f| f.matches(doc)),
            CompiledClause::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        })
    }
}

fn compile_clause(clause: &FilterClause) -> Result<CompiledClause, IngresError> {
    Ok(match clause {
        FilterClause::Field { field, operators } => CompiledClause::Field {
            path: field.split('.').map(str::to_string).collect(),
            ops: operators
                .iter()
                .map(compile_op)
                .collect::<Result<Vec<_>, _>>()?,
        },
        FilterClause::And(filters) => CompiledClause::And(
            filters
                .iter()
                .map(CompiledFilter::compile)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        FilterClause::Or(filters) => CompiledClause::Or(
            filters
                .iter()
                .map(CompiledFilter::compile)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

fn compile_op(op: &Operator) -> Result<CompiledOp, IngresError> {
    match op {
        Operator::Regex { pattern, options } => RegexBuilder::new(pattern)
            .case_insensitive(options.contains('i'))
            .multi_line(options.contains('m'))
            .dot_matches_new_line(options.contains('s'))
            .ignore_whitespace(options.contains('x'))
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map(CompiledOp::Regex)
            .map_err(|e| IngresError::Filter(format!("invalid regex {:?}: {}", pattern, e))),
        other => Ok(CompiledOp::Plain(other.clone())),
    }
}

/// Resolve a dotted path. Missing intermediate documents yield `None`.
fn lookup<'a>(doc: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = doc.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn op_matches(op: &CompiledOp, value: Option<&Value>) -> bool {
    match op {
        CompiledOp::Regex(re) => any_element(value, |v| v.as_str().is_some_and(|s| re.is_match(s))),
        CompiledOp::Plain(op) => match op {
            Operator::Eq(expected) => equals(value, expected),
            Operator::Ne(expected) => !equals(value, expected),
            Operator::Gt(bound) => ordered(value, bound, |o| o == Ordering::Greater),
            Operator::Gte(bound) => ordered(value, bound, |o| o != Ordering::Less),
            Operator::Lt(bound) => ordered(value, bound, |o| o == Ordering::Less),
            Operator::Lte(bound) => ordered(value, bound, |o| o != Ordering::Greater),
            Operator::In(candidates) => candidates.iter().any(|c| equals(value, c)),
            Operator::Nin(candidates) => !candidates.iter().any(|c| equals(value, c)),
            Operator::Exists(flag) => value.is_some() == *flag,
            // Regexes are always compiled.
            Operator::Regex { .. } => false,
        },
    }
}

/// Apply a predicate to a scalar value or to any element of an array value.
fn any_element(value: Option<&Value>, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        None => false,
        Some(Value::Array(items)) => pred(&Value::Array(items.clone())) || items.iter().any(&pred),
        Some(v) => pred(v),
    }
}

fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(_) => any_element(value, |v| values_equal(v, expected)),
    }
}

fn ordered(value: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    any_element(value, |v| compare(v, bound).is_some_and(&accept))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn compile(filter: Value) -> CompiledFilter {
        CompiledFilter::compile(&QueryFilter::from_json(&filter).unwrap()).unwrap()
    }

    fn kerala() -> Map<String, Value> {
        doc(json!({
            "STATE": "KERALA",
            "DISTRICT": "Wayanad",
            "rainfall_mm_Total": 2890.5,
            "wells": 12,
            "tags": ["hilly", "forest"],
            "meta": {"zone": "south"}
        }))
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(compile(json!({})).matches(&kerala()));
        assert!(compile(json!({})).matches(&Map::new()));
    }

    #[test]
    fn test_literal_equality_is_case_sensitive() {
        assert!(compile(json!({"STATE": "KERALA"})).matches(&kerala()));
        assert!(!compile(json!({"STATE": "kerala"})).matches(&kerala()));
    }

    #[test]
    fn test_regex_case_insensitive_substring() {
        let filter = compile(json!({"STATE": {"$regex": "era", "$options": "i"}}));
        assert!(filter.matches(&kerala()));
        let strict = compile(json!({"STATE": {"$regex": "era"}}));
        assert!(!strict.matches(&kerala()));
    }

    #[test]
    fn test_regex_ignores_non_string_fields() {
        let filter = compile(json!({"wells": {"$regex": "12"}}));
        assert!(!filter.matches(&kerala()));
    }

    #[test]
    fn test_numeric_comparisons_mix_int_and_float() {
        assert!(compile(json!({"rainfall_mm_Total": {"$gt": 1000}})).matches(&kerala()));
        assert!(!compile(json!({"rainfall_mm_Total": {"$lt": 1000}})).matches(&kerala()));
        assert!(compile(json!({"wells": {"$gte": 12.0, "$lte": 12}})).matches(&kerala()));
        assert!(compile(json!({"wells": 12.0})).matches(&kerala()));
    }

    #[test]
    fn test_comparison_across_kinds_never_matches() {
        assert!(!compile(json!({"STATE": {"$gt": 5}})).matches(&kerala()));
        assert!(!compile(json!({"wells": {"$lt": "z"}})).matches(&kerala()));
    }

    #[test]
    fn test_missing_field_semantics() {
        assert!(!compile(json!({"missing": {"$gt": 0}})).matches(&kerala()));
        assert!(compile(json!({"missing": null})).matches(&kerala()));
        assert!(compile(json!({"missing": {"$ne": 3}})).matches(&kerala()));
        assert!(compile(json!({"missing": {"$exists": false}})).matches(&kerala()));
        assert!(compile(json!({"STATE": {"$exists": true}})).matches(&kerala()));
    }

    #[test]
    fn test_array_fields_match_any_element() {
        assert!(compile(json!({"tags": "forest"})).matches(&kerala()));
        assert!(compile(json!({"tags": {"$regex": "^HIL", "$options": "i"}})).matches(&kerala()));
        assert!(compile(json!({"tags": ["hilly", "forest"]})).matches(&kerala()));
        assert!(!compile(json!({"tags": "desert"})).matches(&kerala()));
    }

    #[test]
    fn test_in_and_nin() {
        assert!(compile(json!({"STATE": {"$in": ["GOA", "KERALA"]}})).matches(&kerala()));
        assert!(!compile(json!({"STATE": {"$nin": ["GOA", "KERALA"]}})).matches(&kerala()));
    }

    #[test]
    fn test_dotted_path_lookup() {
        assert!(compile(json!({"meta.zone": "south"})).matches(&kerala()));
        assert!(!compile(json!({"meta.zone.deeper": "south"})).matches(&kerala()));
    }

    #[test]
    fn test_logical_combinators() {
        let either = compile(json!({"$or": [{"STATE": "GOA"}, {"DISTRICT": "Wayanad"}]}));
        assert!(either.matches(&kerala()));
        let both = compile(json!({"$and": [{"STATE": "KERALA"}, {"wells": {"$gt": 100}}]}));
        assert!(!both.matches(&kerala()));
    }

    #[test]
    fn test_invalid_regex_fails_to_compile() {
        let filter = QueryFilter::from_json(&json!({"STATE": {"$regex": "(unclosed"}})).unwrap();
        let err = CompiledFilter::compile(&filter).unwrap_err();
        assert!(matches!(err, IngresError::Filter(_)));
    }
}

//! Structured query filters.
//!
//! A [`QueryFilter`] is the parsed form of a document-database style filter
//! object such as `{"STATE": {"$regex": "kerala", "$options": "i"}}`. An
//! empty filter places no constraint on the collection and doubles as the
//! "could not translate" sentinel.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{IngresError, Result};

/// Comparison and membership operators that apply to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    /// Regular-expression match. `options` holds flag letters (`i`, `m`,
    /// `s`, `x`); `i` means case-insensitive.
    Regex { pattern: String, options: String },
}

impl Operator {
    fn key(&self) -> &'static str {
        match self {
            Operator::Eq(_) => "$eq",
            Operator::Ne(_) => "$ne",
            Operator::Gt(_) => "$gt",
            Operator::Gte(_) => "$gte",
            Operator::Lt(_) => "$lt",
            Operator::Lte(_) => "$lte",
            Operator::In(_) => "$in",
            Operator::Nin(_) => "$nin",
            Operator::Exists(_) => "$exists",
            Operator::Regex { .. } => "$regex",
        }
    }
}

/// One top-level entry of a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    /// Every operator must hold for the named field.
    Field { field: String, operators: Vec<Operator> },
    And(Vec<QueryFilter>),
    Or(Vec<QueryFilter>),
}

/// A conjunction of clauses. Empty means "match everything".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    clauses: Vec<FilterClause>,
}

impl QueryFilter {
    /// The empty filter.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    /// Builder helper: add a field clause.
    pub fn with_field(mut self, field: impl Into<String>, operators: Vec<Operator>) -> Self {
        self.clauses.push(FilterClause::Field {
            field: field.into(),
            operators,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Parse a JSON filter object.
    ///
    /// Anything other than an object, an unknown `$` operator, or a
    /// malformed operand is an [`IngresError::Filter`].
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| filter_err(format!("expected an object, got {}", kind_of(value))))?;

        let mut clauses = Vec::with_capacity(object.len());
        for (key, operand) in object {
            let clause = match key.as_str() {
                "$and" => FilterClause::And(parse_sub_filters(key, operand)?),
                "$or" => FilterClause::Or(parse_sub_filters(key, operand)?),
                k if k.starts_with('$') => {
                    return Err(filter_err(format!("unsupported top-level operator {}", k)))
                }
                field => FilterClause::Field {
                    field: field.to_string(),
                    operators: parse_field_condition(field, operand)?,
                },
            };
            clauses.push(clause);
        }
        Ok(Self { clauses })
    }

    /// Parse filter text (already stripped of any surrounding prose).
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text.trim())?;
        Self::from_json(&value)
    }

    /// Render back into the JSON filter shape.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for clause in &self.clauses {
            match clause {
                FilterClause::Field { field, operators } => {
                    object.insert(field.clone(), operators_to_json(operators));
                }
                FilterClause::And(filters) => {
                    object.insert("$and".to_string(), sub_filters_to_json(filters));
                }
                FilterClause::Or(filters) => {
                    object.insert("$or".to_string(), sub_filters_to_json(filters));
                }
            }
        }
        Value::Object(object)
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn filter_err(message: String) -> IngresError {
    IngresError::Filter(message)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_sub_filters(key: &str, operand: &Value) -> Result<Vec<QueryFilter>> {
    let items = operand
        .as_array()
        .ok_or_else(|| filter_err(format!("{} expects an array", key)))?;
    if items.is_empty() {
        return Err(filter_err(format!("{} expects a non-empty array", key)));
    }
    items.iter().map(QueryFilter::from_json).collect()
}

fn parse_field_condition(field: &str, operand: &Value) -> Result<Vec<Operator>> {
    let Some(object) = operand.as_object() else {
        return Ok(vec![Operator::Eq(operand.clone())]);
    };

    let operator_keys = object.keys().filter(|k| k.starts_with('$')).count();
    if operator_keys == 0 {
        // An embedded document compared as a literal.
        return Ok(vec![Operator::Eq(operand.clone())]);
    }
    if operator_keys != object.len() {
        return Err(filter_err(format!(
            "field {} mixes operators and literal keys",
            field
        )));
    }

    let options = match object.get("$options") {
        None => None,
        Some(Value::String(opts)) => Some(validate_regex_options(field, opts)?),
        Some(other) => {
            return Err(filter_err(format!(
                "$options on {} must be a string, got {}",
                field,
                kind_of(other)
            )))
        }
    };

    let mut operators = Vec::with_capacity(object.len());
    for (key, value) in object {
        let op = match key.as_str() {
            "$eq" => Operator::Eq(value.clone()),
            "$ne" => Operator::Ne(value.clone()),
            "$gt" => Operator::Gt(value.clone()),
            "$gte" => Operator::Gte(value.clone()),
            "$lt" => Operator::Lt(value.clone()),
            "$lte" => Operator::Lte(value.clone()),
            "$in" => Operator::In(expect_array(field, key, value)?),
            "$nin" => Operator::Nin(expect_array(field, key, value)?),
            "$exists" => Operator::Exists(match value {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
                other => {
                    return Err(filter_err(format!(
                        "$exists on {} expects a boolean, got {}",
                        field,
                        kind_of(other)
                    )))
                }
            }),
            "$regex" => {
                let pattern = value.as_str().ok_or_else(|| {
                    filter_err(format!("$regex on {} expects a string", field))
                })?;
                Operator::Regex {
                    pattern: pattern.to_string(),
                    options: options.clone().unwrap_or_default(),
                }
            }
            "$options" => {
                if !object.contains_key("$regex") {
                    return Err(filter_err(format!("$options on {} without $regex", field)));
                }
                continue;
            }
            other => {
                return Err(filter_err(format!(
                    "unsupported operator {} on field {}",
                    other, field
                )))
            }
        };
        operators.push(op);
    }
    Ok(operators)
}

fn expect_array(field: &str, key: &str, value: &Value) -> Result<Vec<Value>> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| filter_err(format!("{} on {} expects an array", key, field)))
}

fn validate_regex_options(field: &str, options: &str) -> Result<String> {
    match options.chars().find(|c| !matches!(c, 'i' | 'm' | 's' | 'x')) {
        Some(bad) => Err(filter_err(format!(
            "unsupported regex option '{}' on field {}",
            bad, field
        ))),
        None => Ok(options.to_string()),
    }
}

fn operators_to_json(operators: &[Operator]) -> Value {
    if let [Operator::Eq(value)] = operators {
        if !value.is_object() {
            return value.clone();
        }
    }
    let mut object = Map::new();
    for op in operators {
        match op {
            Operator::Eq(v)
            | Operator::Ne(v)
            | Operator::Gt(v)
            | Operator::Gte(v)
            | Operator::Lt(v)
            | Operator::Lte(v) => {
                object.insert(op.key().to_string(), v.clone());
            }
            Operator::In(values) | Operator::Nin(values) => {
                object.insert(op.key().to_string(), Value::Array(values.clone()));
            }
            Operator::Exists(flag) => {
                object.insert(op.key().to_string(), Value::Bool(*flag));
            }
            Operator::Regex { pattern, options } => {
                object.insert(op.key().to_string(), Value::String(pattern.clone()));
                if !options.is_empty() {
                    object.insert("$options".to_string(), Value::String(options.clone()));
                }
            }
        }
    }
    Value::Object(object)
}

fn sub_filters_to_json(filters: &[QueryFilter]) -> Value {
    Value::Array(filters.iter().map(QueryFilter::to_json).collect())
}

//! Dynamic filter model — the operator vocabulary of the remote collection
//! backend, passed through on every select and targeted mutation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::order::{compare_values, field_value};
use crate::types::Row;

// ============================================================================
// Operators
// ============================================================================

/// Filter operators accepted by the backend, grouped by arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    // one-arg (raw expression)
    Or,
    // two-arg (field, value)
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Is,
    Like,
    Ilike,
    In,
    Contains,
    ContainedBy,
    RangeGt,
    RangeGte,
    RangeLt,
    RangeLte,
    RangeAdjacent,
    Overlaps,
    Match,
    // three-arg (field, value, options)
    TextSearch,
    Not,
}

/// How many operands an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterArity {
    One,
    Two,
    Three,
}

impl FilterOperator {
    pub fn arity(&self) -> FilterArity {
        use FilterOperator::*;
        match self {
            Or => FilterArity::One,
            TextSearch | Not => FilterArity::Three,
            _ => FilterArity::Two,
        }
    }
}

// ============================================================================
// Filter
// ============================================================================

/// A single dynamic filter entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
    /// Second operand, needed by the three-arg operators.
    #[serde(default)]
    pub value2: Value,
}

impl Filter {
    /// Shorthand for the ubiquitous equality filter.
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::Eq,
            value,
            value2: Value::Null,
        }
    }

    /// Evaluate this filter against a row, for backends that resolve filters
    /// client-side. Covers the comparison subset (`eq`, `neq`, ordering,
    /// `is`, `in`, `like`/`ilike`); operators outside that subset pass
    /// through unevaluated and match everything.
    pub fn matches_row(&self, row: &Row) -> bool {
        use FilterOperator::*;

        let actual = field_value(row, &self.field).unwrap_or(&Value::Null);
        match self.operator {
            Eq => actual == &self.value,
            Neq => actual != &self.value,
            Gt => ordered(actual, &self.value, Ordering::Greater),
            Lt => ordered(actual, &self.value, Ordering::Less),
            Gte => !ordered(actual, &self.value, Ordering::Less),
            Lte => !ordered(actual, &self.value, Ordering::Greater),
            Is => actual == &self.value,
            In => self
                .value
                .as_array()
                .map(|candidates| candidates.contains(actual))
                .unwrap_or(false),
            Like => like_match(actual, &self.value, false),
            Ilike => like_match(actual, &self.value, true),
            _ => true,
        }
    }
}

fn ordered(actual: &Value, expected: &Value, wanted: Ordering) -> bool {
    if actual.is_null() || expected.is_null() {
        return false;
    }
    compare_values(actual, expected) == wanted
}

/// SQL `LIKE`-style pattern match with `%` wildcards.
fn like_match(actual: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(text), Some(pattern)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };

    let segments: Vec<&str> = pattern.split('%').collect();
    if segments.len() == 1 {
        return text == pattern;
    }

    let mut remaining = text.as_str();
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match remaining.strip_prefix(segment) {
                Some(rest) => remaining = rest,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return remaining.ends_with(segment);
        } else {
            match remaining.find(segment) {
                Some(pos) => remaining = &remaining[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

// ============================================================================
// Tests
// ============================================================================

//! Document Filters - Store-agnostic conditions passed to `find`
//!
//! A filter is a conjunction of field conditions. Stores may translate it to
//! their native query form; `Filter::matches` evaluates it against a document
//! for stores that filter in process.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::backends::Document;

/// Comparison operators supported in filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    Exists,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperator::Equal => write!(f, "$eq"),
            FilterOperator::NotEqual => write!(f, "$ne"),
            FilterOperator::GreaterThan => write!(f, "$gt"),
            FilterOperator::GreaterThanOrEqual => write!(f, "$gte"),
            FilterOperator::LessThan => write!(f, "$lt"),
            FilterOperator::LessThanOrEqual => write!(f, "$lte"),
            FilterOperator::In => write!(f, "$in"),
            FilterOperator::NotIn => write!(f, "$nin"),
            FilterOperator::Exists => write!(f, "$exists"),
        }
    }
}

/// A single `field <operator> value` condition
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterCondition {
    fn matches(&self, doc: &Document) -> bool {
        let actual = doc.get(&self.field);
        match self.operator {
            FilterOperator::Exists => {
                let wanted = self.value.as_bool().unwrap_or(true);
                actual.is_some() == wanted
            }
            FilterOperator::Equal => actual.map_or(self.value.is_null(), |v| v == &self.value),
            FilterOperator::NotEqual => actual.map_or(!self.value.is_null(), |v| v != &self.value),
            FilterOperator::In => match (&self.value, actual) {
                (Value::Array(candidates), Some(v)) => candidates.contains(v),
                _ => false,
            },
            FilterOperator::NotIn => match (&self.value, actual) {
                (Value::Array(candidates), Some(v)) => !candidates.contains(v),
                (Value::Array(_), None) => true,
                _ => false,
            },
            FilterOperator::GreaterThan => compare(actual, &self.value) == Some(Ordering::Greater),
            FilterOperator::GreaterThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::LessThan => compare(actual, &self.value) == Some(Ordering::Less),
            FilterOperator::LessThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

/// Numbers compare numerically and strings lexically; anything else is unordered.
fn compare(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<FilterCondition>,
}

impl Filter {
    /// Filter matching all documents
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, field: &str, operator: FilterOperator, value: impl Into<Value>) -> Self {
        self.conditions.push(FilterCondition {
            field: field.to_string(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, FilterOperator::Equal, value)
    }

    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, FilterOperator::NotEqual, value)
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, FilterOperator::GreaterThan, value)
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, FilterOperator::GreaterThanOrEqual, value)
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, FilterOperator::LessThan, value)
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.condition(field, FilterOperator::LessThanOrEqual, value)
    }

    pub fn is_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.condition(field, FilterOperator::In, Value::Array(values))
    }

    pub fn not_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.condition(field, FilterOperator::NotIn, Value::Array(values))
    }

    pub fn exists(self, field: &str, exists: bool) -> Self {
        self.condition(field, FilterOperator::Exists, exists)
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate the filter against a document
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|condition| condition.matches(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&doc(json!({"name": "Ali"}))));
        assert!(Filter::new().matches(&Document::new()));
    }

    #[test]
    fn test_equality_and_comparison() {
        let ali = doc(json!({"name": "Ali", "age": 24}));
        let reza = doc(json!({"name": "Reza", "age": 26}));

        let filter = Filter::new().eq("name", "Ali");
        assert!(filter.matches(&ali));
        assert!(!filter.matches(&reza));

        let filter = Filter::new().gt("age", 24);
        assert!(!filter.matches(&ali));
        assert!(filter.matches(&reza));

        let filter = Filter::new().gte("age", 24).lt("age", 26);
        assert!(filter.matches(&ali));
        assert!(!filter.matches(&reza));
    }

    #[test]
    fn test_in_and_not_in() {
        let omid = doc(json!({"name": "Omid", "age": 27}));
        assert!(Filter::new().is_in("age", [24, 27]).matches(&omid));
        assert!(!Filter::new().not_in("age", [24, 27]).matches(&omid));
        assert!(Filter::new().not_in("name", ["Ali"]).matches(&omid));
    }

    #[test]
    fn test_exists_and_missing_fields() {
        let partial = doc(json!({"name": "Mehran"}));
        assert!(Filter::new().exists("name", true).matches(&partial));
        assert!(Filter::new().exists("age", false).matches(&partial));
        assert!(!Filter::new().gt("age", 1).matches(&partial));
        assert!(Filter::new().ne("age", 24).matches(&partial));
    }

    #[test]
    fn test_mismatched_types_do_not_compare() {
        let ali = doc(json!({"age": "24"}));
        assert!(!Filter::new().gt("age", 1).matches(&ali));
        assert!(!Filter::new().lte("age", 100).matches(&ali));
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(FilterOperator::Equal.to_string(), "$eq");
        assert_eq!(FilterOperator::NotIn.to_string(), "$nin");
    }
}

//! Structured search clauses and per-manager search transformers.
//!
//! Search parameters are per-field clauses whose shape depends on the
//! declared field type: strings match by substring/prefix/suffix,
//! numbers by comparison, dates by before/after/on, and booleans by
//! `is_true`. A manager may additionally register transformer functions
//! mapping a high-level parameter name to a set of field clauses,
//! applied before the permission filter.

use atrium_core::error::{EntityError, Result};
use atrium_core::types::{FieldType, KindDescriptor};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::record::EntityRecord;

/// String clause: substring, prefix, or suffix match (case-insensitive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringClause {
    /// Matches when the field contains the value.
    #[serde(default)]
    pub inc: Option<String>,
    /// Matches when the field starts with the value.
    #[serde(default)]
    pub sw: Option<String>,
    /// Matches when the field ends with the value.
    #[serde(default)]
    pub ew: Option<String>,
}

/// Numeric clause: comparison operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumberClause {
    /// Equal.
    #[serde(default)]
    pub eq: Option<f64>,
    /// Not equal.
    #[serde(default)]
    pub neq: Option<f64>,
    /// Strictly less than.
    #[serde(default)]
    pub lt: Option<f64>,
    /// Strictly greater than.
    #[serde(default)]
    pub gt: Option<f64>,
    /// Less than or equal.
    #[serde(default)]
    pub lteq: Option<f64>,
    /// Greater than or equal.
    #[serde(default)]
    pub gteq: Option<f64>,
}

/// Date clause: before/after an instant, or on a calendar day (UTC).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateClause {
    /// Strictly before the instant.
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
    /// Strictly after the instant.
    #[serde(default)]
    pub after: Option<DateTime<Utc>>,
    /// Within the calendar day.
    #[serde(default)]
    pub on: Option<NaiveDate>,
}

/// Boolean clause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoolClause {
    /// Matches when the field equals the value.
    #[serde(default)]
    pub is_true: Option<bool>,
}

/// A per-field search clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchClause {
    /// Clause on a string field.
    String(StringClause),
    /// Clause on a numeric field.
    Number(NumberClause),
    /// Clause on a date field.
    Date(DateClause),
    /// Clause on a boolean field.
    Bool(BoolClause),
}

impl SearchClause {
    fn accepts(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (SearchClause::String(_), FieldType::String)
                | (SearchClause::String(_), FieldType::Reference)
                | (SearchClause::Number(_), FieldType::Number)
                | (SearchClause::Date(_), FieldType::Date)
                | (SearchClause::Bool(_), FieldType::Boolean)
        )
    }

    /// Whether a field value matches the clause. Absent values never
    /// match.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            SearchClause::String(clause) => {
                let Some(Value::String(s)) = value else {
                    return false;
                };
                let lower = s.to_lowercase();
                if let Some(inc) = &clause.inc {
                    if !lower.contains(&inc.to_lowercase()) {
                        return false;
                    }
                }
                if let Some(sw) = &clause.sw {
                    if !lower.starts_with(&sw.to_lowercase()) {
                        return false;
                    }
                }
                if let Some(ew) = &clause.ew {
                    if !lower.ends_with(&ew.to_lowercase()) {
                        return false;
                    }
                }
                true
            }
            SearchClause::Number(clause) => {
                let Some(n) = value.and_then(Value::as_f64) else {
                    return false;
                };
                clause.eq.map_or(true, |v| n == v)
                    && clause.neq.map_or(true, |v| n != v)
                    && clause.lt.map_or(true, |v| n < v)
                    && clause.gt.map_or(true, |v| n > v)
                    && clause.lteq.map_or(true, |v| n <= v)
                    && clause.gteq.map_or(true, |v| n >= v)
            }
            SearchClause::Date(clause) => {
                let Some(Value::String(s)) = value else {
                    return false;
                };
                let Ok(at) = s.parse::<DateTime<Utc>>() else {
                    return false;
                };
                clause.before.map_or(true, |v| at < v)
                    && clause.after.map_or(true, |v| at > v)
                    && clause.on.map_or(true, |day| at.date_naive() == day)
            }
            SearchClause::Bool(clause) => {
                let Some(b) = value.and_then(Value::as_bool) else {
                    return false;
                };
                clause.is_true.map_or(true, |v| b == v)
            }
        }
    }
}

/// A transformer mapping a high-level parameter value to field clauses.
pub type SearchTransformer =
    Arc<dyn Fn(&Value) -> Result<Vec<(String, SearchClause)>> + Send + Sync>;

/// Per-manager registry of search transformers, populated during
/// manager construction.
#[derive(Clone, Default)]
pub struct SearchTransformers {
    transformers: HashMap<String, SearchTransformer>,
}

impl SearchTransformers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transformer for a parameter name.
    pub fn register(&mut self, name: impl Into<String>, transformer: SearchTransformer) {
        self.transformers.insert(name.into(), transformer);
    }

    /// Whether a transformer exists for the parameter.
    pub fn contains(&self, name: &str) -> bool {
        self.transformers.contains_key(name)
    }

    /// Apply the transformer for `name`, yielding field clauses.
    pub fn apply(&self, name: &str, value: &Value) -> Result<Vec<(String, SearchClause)>> {
        match self.transformers.get(name) {
            Some(transformer) => transformer(value),
            None => Err(EntityError::UnknownField {
                kind: "search".into(),
                field: name.to_string(),
            }
            .into()),
        }
    }
}

/// Resolve search parameters against a descriptor and transformer
/// registry into concrete `(field, clause)` pairs.
///
/// Transformer parameters are expanded first; remaining parameters must
/// name declared fields with a clause matching the field's type.
pub fn resolve_clauses(
    descriptor: &KindDescriptor,
    transformers: &SearchTransformers,
    params: &HashMap<String, Value>,
) -> Result<Vec<(String, SearchClause)>> {
    let mut clauses = Vec::new();
    for (name, value) in params {
        if transformers.contains(name) {
            clauses.extend(transformers.apply(name, value)?);
            continue;
        }

        let field = descriptor
            .field(name)
            .ok_or_else(|| EntityError::UnknownField {
                kind: descriptor.kind.clone(),
                field: name.clone(),
            })?;
        let clause: SearchClause =
            serde_json::from_value(value.clone()).map_err(|e| {
                EntityError::Validation(format!("invalid search clause for '{}': {}", name, e))
            })?;
        if !clause.accepts(field.field_type) {
            return Err(EntityError::Validation(format!(
                "search clause for '{}' does not match its field type",
                name
            ))
            .into());
        }
        clauses.push((name.clone(), clause));
    }
    Ok(clauses)
}

/// Whether a record satisfies every clause.
pub fn record_matches(record: &EntityRecord, clauses: &[(String, SearchClause)]) -> bool {
    clauses
        .iter()
        .all(|(field, clause)| clause.matches(record.attribute(field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::types::FieldSpec;
    use serde_json::json;

    fn descriptor() -> KindDescriptor {
        KindDescriptor::new("task")
            .with_field(FieldSpec::required("title", FieldType::String))
            .with_field(FieldSpec::optional("priority", FieldType::Number))
            .with_field(FieldSpec::optional("due_date", FieldType::Date))
            .with_field(FieldSpec::optional("completed", FieldType::Boolean))
    }

    #[test]
    fn test_string_clause_matching() {
        let clause = SearchClause::String(StringClause {
            inc: Some("port".into()),
            ..Default::default()
        });
        assert!(clause.matches(Some(&json!("Quarterly Report"))));
        assert!(!clause.matches(Some(&json!("Summary"))));
        assert!(!clause.matches(None));

        let clause = SearchClause::String(StringClause {
            sw: Some("qua".into()),
            ew: Some("ort".into()),
            ..Default::default()
        });
        assert!(clause.matches(Some(&json!("Quarterly Report"))));
    }

    #[test]
    fn test_number_clause_matching() {
        let clause = SearchClause::Number(NumberClause {
            gteq: Some(2.0),
            lt: Some(5.0),
            ..Default::default()
        });
        assert!(clause.matches(Some(&json!(2))));
        assert!(clause.matches(Some(&json!(4.5))));
        assert!(!clause.matches(Some(&json!(5))));
        assert!(!clause.matches(Some(&json!("2"))));
    }

    #[test]
    fn test_date_clause_on_day() {
        let clause = SearchClause::Date(DateClause {
            on: Some("2025-06-15".parse().unwrap()),
            ..Default::default()
        });
        assert!(clause.matches(Some(&json!("2025-06-15T09:30:00Z"))));
        assert!(!clause.matches(Some(&json!("2025-06-16T00:00:00Z"))));
    }

    #[test]
    fn test_resolve_rejects_unknown_fields_and_type_mismatches() {
        let descriptor = descriptor();
        let transformers = SearchTransformers::new();

        let mut params = HashMap::new();
        params.insert("nonexistent".to_string(), json!({"inc": "x"}));
        assert!(resolve_clauses(&descriptor, &transformers, &params).is_err());

        let mut params = HashMap::new();
        params.insert("priority".to_string(), json!({"inc": "x"}));
        assert!(resolve_clauses(&descriptor, &transformers, &params).is_err());
    }

    #[test]
    fn test_transformer_expansion() {
        let descriptor = descriptor();
        let mut transformers = SearchTransformers::new();
        // `overdue` expands to completed=false plus a due-date bound.
        transformers.register(
            "overdue",
            Arc::new(|_value| {
                Ok(vec![
                    (
                        "completed".to_string(),
                        SearchClause::Bool(BoolClause {
                            is_true: Some(false),
                        }),
                    ),
                    (
                        "due_date".to_string(),
                        SearchClause::Date(DateClause {
                            before: Some(Utc::now()),
                            ..Default::default()
                        }),
                    ),
                ])
            }),
        );

        let mut params = HashMap::new();
        params.insert("overdue".to_string(), json!(true));
        let clauses = resolve_clauses(&descriptor, &transformers, &params).unwrap();
        assert_eq!(clauses.len(), 2);
    }
}

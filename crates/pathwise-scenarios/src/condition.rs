//! The scenario condition language.
//!
//! Conditions are tagged trees. Leaves address a scope entry by its `source`
//! key and an optional JSON pointer `path` into the entry's data:
//!
//! ```toml
//! condition = { type = "all", conditions = [
//!     { type = "equals", source = "quiz", path = "/answer", value = "b" },
//!     { type = "greater-than", source = "quiz", path = "/score", value = 0.5 },
//! ] }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConditionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Condition {
    Always,
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
    Equals {
        source: String,
        #[serde(default)]
        path: String,
        value: Value,
    },
    NotEquals {
        source: String,
        #[serde(default)]
        path: String,
        value: Value,
    },
    GreaterThan {
        source: String,
        #[serde(default)]
        path: String,
        value: f64,
    },
    LessThan {
        source: String,
        #[serde(default)]
        path: String,
        value: f64,
    },
    Contains {
        source: String,
        #[serde(default)]
        path: String,
        value: Value,
    },
    Exists {
        source: String,
        #[serde(default)]
        path: String,
    },
}

impl Condition {
    pub fn from_value(value: &Value) -> Result<Self, ConditionError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Evaluate the condition against a learner's scope entries.
    ///
    /// `all` and `any` short-circuit, so a faulty leaf after the deciding one
    /// is never reached.
    pub fn evaluate(&self, scope: &HashMap<String, Value>) -> Result<bool, ConditionError> {
        match self {
            Condition::Always => Ok(true),
            Condition::All { conditions } => {
                for c in conditions {
                    if !c.evaluate(scope)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { conditions } => {
                for c in conditions {
                    if c.evaluate(scope)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not { condition } => Ok(!condition.evaluate(scope)?),
            Condition::Equals {
                source,
                path,
                value,
            } => Ok(lookup(scope, source, path).is_some_and(|v| values_equal(v, value))),
            Condition::NotEquals {
                source,
                path,
                value,
            } => Ok(!lookup(scope, source, path).is_some_and(|v| values_equal(v, value))),
            Condition::GreaterThan {
                source,
                path,
                value,
            } => Ok(number_at(scope, source, path)? > *value),
            Condition::LessThan {
                source,
                path,
                value,
            } => Ok(number_at(scope, source, path)? < *value),
            Condition::Contains {
                source,
                path,
                value,
            } => match lookup(scope, source, path) {
                None => Ok(false),
                Some(Value::Array(items)) => Ok(items.iter().any(|i| values_equal(i, value))),
                Some(Value::String(s)) => Ok(value.as_str().is_some_and(|needle| s.contains(needle))),
                Some(other) => Err(ConditionError::NotAContainer {
                    name: source.clone(),
                    path: path.clone(),
                    found: kind(other).to_string(),
                }),
            },
            Condition::Exists { source, path } => {
                Ok(lookup(scope, source, path).is_some_and(|v| !v.is_null()))
            }
        }
    }
}

fn lookup<'a>(scope: &'a HashMap<String, Value>, source: &str, path: &str) -> Option<&'a Value> {
    let entry = scope.get(source)?;
    if path.is_empty() {
        Some(entry)
    } else {
        entry.pointer(path)
    }
}

fn number_at(scope: &HashMap<String, Value>, source: &str, path: &str) -> Result<f64, ConditionError> {
    let value = lookup(scope, source, path).ok_or_else(|| ConditionError::MissingSource {
        name: source.to_string(),
        path: path.to_string(),
    })?;
    value.as_f64().ok_or_else(|| ConditionError::NotANumber {
        name: source.to_string(),
        path: path.to_string(),
        found: kind(value).to_string(),
    })
}

/// JSON equality, except that numbers compare by value (`3 == 3.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> HashMap<String, Value> {
        HashMap::from([
            (
                "quiz".to_string(),
                json!({ "answer": "b", "score": 0.75, "tags": ["algebra", "intro"] }),
            ),
            ("slider".to_string(), json!(3)),
        ])
    }

    fn eval(condition: Value) -> Result<bool, ConditionError> {
        Condition::from_value(&condition)?.evaluate(&scope())
    }

    #[test]
    fn equality_uses_json_pointer() {
        assert!(eval(json!({"type": "equals", "source": "quiz", "path": "/answer", "value": "b"})).unwrap());
        assert!(!eval(json!({"type": "equals", "source": "quiz", "path": "/answer", "value": "c"})).unwrap());
        assert!(eval(json!({"type": "not-equals", "source": "quiz", "path": "/missing", "value": 1})).unwrap());
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(eval(json!({"type": "equals", "source": "slider", "value": 3.0})).unwrap());
        assert!(eval(json!({"type": "greater-than", "source": "quiz", "path": "/score", "value": 0.5})).unwrap());
        assert!(!eval(json!({"type": "less-than", "source": "slider", "value": 2})).unwrap());
    }

    #[test]
    fn combinators() {
        let both = json!({"type": "all", "conditions": [
            {"type": "exists", "source": "quiz", "path": "/tags"},
            {"type": "contains", "source": "quiz", "path": "/tags", "value": "algebra"},
        ]});
        assert!(eval(both).unwrap());

        let either = json!({"type": "any", "conditions": [
            {"type": "equals", "source": "quiz", "path": "/answer", "value": "a"},
            {"type": "not", "condition": {"type": "exists", "source": "nothing"}},
        ]});
        assert!(eval(either).unwrap());
        assert!(eval(json!({"type": "all", "conditions": []})).unwrap());
        assert!(!eval(json!({"type": "any", "conditions": []})).unwrap());
    }

    #[test]
    fn ordering_on_missing_or_non_numeric_is_an_error() {
        let missing = eval(json!({"type": "greater-than", "source": "nothing", "value": 1}));
        assert!(matches!(missing, Err(ConditionError::MissingSource { .. })));

        let text = eval(json!({"type": "less-than", "source": "quiz", "path": "/answer", "value": 1}));
        assert!(matches!(text, Err(ConditionError::NotANumber { .. })));
    }

    #[test]
    fn contains_on_scalar_is_an_error() {
        let err = eval(json!({"type": "contains", "source": "slider", "value": 3}));
        assert!(matches!(err, Err(ConditionError::NotAContainer { .. })));
        assert!(eval(json!({"type": "contains", "source": "quiz", "path": "/answer", "value": "b"})).unwrap());
    }

    #[test]
    fn malformed_condition() {
        assert!(matches!(
            eval(json!({"type": "sometimes"})),
            Err(ConditionError::Malformed(_))
        ));
        assert!(matches!(
            eval(json!({"type": "equals", "value": 1})),
            Err(ConditionError::Malformed(_))
        ));
    }
}

//! Turning a step's filled slots into the next step's arguments.

use crate::error::WorkflowError;
use crate::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// How the values of a step's slots become the next step's arguments.
///
/// The mode is chosen per allocation and the last one requested governs the
/// whole step. With a single slot the result is "unwrapped"; with several the
/// result is always one array argument in allocation order.
///
/// | mode | one slot | several slots |
/// |---|---|---|
/// | `First` | the slot's first value | array of each slot's first value |
/// | `Spread` | every value as its own argument | one flat array of all values |
/// | `Collapse` | one array of the slot's values | array of per-slot arrays |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Keep only the first value of each slot.
    #[default]
    First,
    /// Keep every value, flattened.
    Spread,
    /// Keep every value, grouped per slot.
    Collapse,
}

impl MergeMode {
    /// Returns the lowercase name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::First => "first",
            MergeMode::Spread => "spread",
            MergeMode::Collapse => "collapse",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMode {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(MergeMode::First),
            "spread" => Ok(MergeMode::Spread),
            "collapse" => Ok(MergeMode::Collapse),
            other => Err(WorkflowError::Configuration(format!(
                "unknown merge mode '{}'",
                other
            ))),
        }
    }
}

/// Resolves the arguments for the next step from filled slot values.
///
/// `slots` holds each slot's value tuple (error already stripped) in
/// allocation order. An empty slice yields no arguments.
pub fn resolve(mode: MergeMode, slots: &[Args]) -> Args {
    match (mode, slots) {
        (_, []) => Vec::new(),
        (MergeMode::First, [only]) => vec![head(only)],
        (MergeMode::First, many) => vec![Value::Array(many.iter().map(head).collect())],
        (MergeMode::Spread, [only]) => only.clone(),
        (MergeMode::Spread, many) => vec![Value::Array(many.concat())],
        (MergeMode::Collapse, [only]) => vec![Value::Array(only.clone())],
        (MergeMode::Collapse, many) => vec![Value::Array(
            many.iter().cloned().map(Value::Array).collect(),
        )],
    }
}

fn head(values: &Args) -> Value {
    values.first().cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair() -> Vec<Args> {
        vec![vec![json!(1), json!(3)], vec![json!(2), json!(4)]]
    }

    #[test]
    fn test_first_single_slot_passes_value_through() {
        let slots = vec![vec![json!({"id": 7}), json!("ignored")]];
        assert_eq!(resolve(MergeMode::First, &slots), vec![json!({"id": 7})]);
    }

    #[test]
    fn test_first_single_empty_slot_is_null() {
        assert_eq!(resolve(MergeMode::First, &[Vec::new()]), vec![Value::Null]);
    }

    #[test]
    fn test_first_many_slots() {
        assert_eq!(resolve(MergeMode::First, &pair()), vec![json!([1, 2])]);
    }

    #[test]
    fn test_spread() {
        let single = vec![vec![json!([1]), json!([3])]];
        assert_eq!(
            resolve(MergeMode::Spread, &single),
            vec![json!([1]), json!([3])]
        );
        assert_eq!(resolve(MergeMode::Spread, &pair()), vec![json!([1, 3, 2, 4])]);
    }

    #[test]
    fn test_collapse() {
        let single = vec![vec![json!(1), json!(2), json!(3)]];
        assert_eq!(resolve(MergeMode::Collapse, &single), vec![json!([1, 2, 3])]);
        assert_eq!(
            resolve(MergeMode::Collapse, &pair()),
            vec![json!([[1, 3], [2, 4]])]
        );
    }

    #[test]
    fn test_no_slots() {
        assert!(resolve(MergeMode::Collapse, &[]).is_empty());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("spread".parse::<MergeMode>(), Ok(MergeMode::Spread));
        assert_eq!(MergeMode::Collapse.to_string(), "collapse");
        assert!(matches!(
            "zip".parse::<MergeMode>(),
            Err(WorkflowError::Configuration(_))
        ));

        let mode: MergeMode = serde_json::from_str("\"first\"").unwrap();
        assert_eq!(mode, MergeMode::First);
    }
}

//! Extraction of a plan from free-form reasoning-service output.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::core::types::{Action, Plan};

/// Return the substring from the first `[` to the last `]`, inclusive.
///
/// Tolerates prose or code fences around the JSON array.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parse a raw response into a plan.
///
/// Errors when no array is present or the array is not valid JSON. Elements
/// that do not match a known action shape become [`Action::Unrecognized`].
pub fn parse_plan(raw: &str) -> Result<Plan> {
    let json = extract_json_array(raw.trim()).ok_or_else(|| anyhow!("no JSON plan detected"))?;
    let values: Vec<Value> = serde_json::from_str(json).context("parse plan json")?;
    Ok(values.into_iter().map(action_from_value).collect())
}

fn action_from_value(value: Value) -> Action {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);
    serde_json::from_value(value).unwrap_or(Action::Unrecognized { kind })
}

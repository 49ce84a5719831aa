//! Player adjustment records (`characterValues`).
//!
//! Records are indexed once per sheet by (adjustment type name, target id)
//! so every consumer lookup is a map probe rather than a scan.

use crate::document::CharacterValue;
use crate::tables::Tables;
use std::collections::HashMap;

/// Adjustment type names, as slugged from the config registry.
pub mod kind {
    pub const SKILL_MAGIC_BONUS: &str = "skill-magic-bonus";
    pub const SKILL_MISC_BONUS: &str = "skill-misc-bonus";
    pub const SKILL_OVERRIDE: &str = "skill-override";
    pub const SKILL_PROFICIENCY_LEVEL: &str = "skill-proficiency-level";
    pub const SKILL_STAT_OVERRIDE: &str = "skill-stat-override";

    pub const SAVE_MAGIC_BONUS: &str = "saving-throw-magic-bonus";
    pub const SAVE_MISC_BONUS: &str = "saving-throw-misc-bonus";
    pub const SAVE_OVERRIDE: &str = "saving-throw-override";
    pub const SAVE_PROFICIENCY_LEVEL: &str = "saving-throw-proficiency-level";

    pub const FIXED_VALUE_BONUS: &str = "fixed-value-bonus";
    pub const FIXED_VALUE_OVERRIDE: &str = "fixed-value-override";
    pub const TO_HIT_BONUS: &str = "to-hit-bonus";
    pub const TO_HIT_OVERRIDE: &str = "to-hit-override";
    pub const PACT_WEAPON: &str = "is-pact-weapon";
    pub const HEXBLADE_WEAPON: &str = "is-hexblade-weapon";
    pub const DUAL_WIELD: &str = "dual-wield";
    pub const NAME_OVERRIDE: &str = "name-override";

    pub const DISPLAY_AS_ATTACK: &str = "display-as-attack";
}

/// The value carried by one adjustment record.
#[derive(Debug, Clone, PartialEq)]
pub enum AdjustmentValue {
    Number(i64),
    Flag(bool),
    Text(String),
}

impl AdjustmentValue {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(AdjustmentValue::Flag(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.floor() as i64))
                .map(AdjustmentValue::Number),
            serde_json::Value::String(s) => Some(AdjustmentValue::Text(s.clone())),
            _ => None,
        }
    }

    /// Numeric text such as `"3"` reads as a number; the text itself is kept.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            AdjustmentValue::Number(n) => Some(*n),
            AdjustmentValue::Flag(b) => Some(i64::from(*b)),
            AdjustmentValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Flags are true for `true` or any non-zero number.
    pub fn as_flag(&self) -> bool {
        match self {
            AdjustmentValue::Flag(b) => *b,
            AdjustmentValue::Number(n) => *n != 0,
            AdjustmentValue::Text(s) => {
                s.trim().eq_ignore_ascii_case("true") || self.as_number().is_some_and(|n| n != 0)
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AdjustmentValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Adjustment records keyed by type name, then target id.
#[derive(Debug, Clone, Default)]
pub struct Adjustments {
    by_type: HashMap<String, HashMap<String, AdjustmentValue>>,
}

impl Adjustments {
    /// Index the raw records. Records with an unknown type, no target or a
    /// null value are dropped; a later duplicate replaces an earlier one.
    pub fn build(tables: &Tables, records: &[CharacterValue]) -> Self {
        let mut by_type: HashMap<String, HashMap<String, AdjustmentValue>> = HashMap::new();
        for record in records {
            let Some(type_name) = tables.adjustment_type(record.type_id) else {
                continue;
            };
            let Some(target) = record.value_id.as_ref().and_then(target_key) else {
                continue;
            };
            let Some(value) = AdjustmentValue::from_json(&record.value) else {
                continue;
            };
            by_type
                .entry(type_name.to_string())
                .or_default()
                .insert(target, value);
        }
        Self { by_type }
    }

    pub fn get(&self, kind: &str, target: impl ToString) -> Option<&AdjustmentValue> {
        self.by_type.get(kind)?.get(&target.to_string())
    }

    pub fn number(&self, kind: &str, target: impl ToString) -> Option<i64> {
        self.get(kind, target).and_then(AdjustmentValue::as_number)
    }

    pub fn flag(&self, kind: &str, target: impl ToString) -> bool {
        self.get(kind, target).is_some_and(AdjustmentValue::as_flag)
    }

    pub fn text(&self, kind: &str, target: impl ToString) -> Option<&str> {
        self.get(kind, target).and_then(AdjustmentValue::as_text)
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

fn target_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

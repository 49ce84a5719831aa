//! Errors surfaced by sheet resolution.

use crate::dice::DiceError;
use thiserror::Error;

/// Errors from loading or resolving a character sheet.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("D&D Beyond config unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("Could not find character {id}: {reason}")]
    CharacterNotFound { id: u64, reason: String },

    #[error("Invalid versatile die {annotation:?} on {item}")]
    InvalidVersatileDie { item: String, annotation: String },

    #[error("No skill, attack or roll named {0:?}")]
    NoMatchingSkillOrAttack(String),

    #[error(transparent)]
    Dice(#[from] DiceError),

    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),
}

//! Custom rolls and attacks declared in a sheet's free-text notes.
//!
//! Every note line of the form `name: expression` registers a custom roll.
//! A line whose right-hand side has exactly three comma-separated parts,
//! `name: bonus, damage, damage type`, registers a custom attack instead.
//! Any other line is ignored.

use crate::attacks::{Attack, AttackBonus};
use crate::document::RawCharacter;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::trace;

lazy_static! {
    static ref NOTE_LINE: Regex = Regex::new(r"^\s*([^:]+?)\s*:\s*(.+?)\s*$").unwrap();
}

/// What one note line declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteEntry {
    Roll { name: String, expression: String },
    Attack(Attack),
}

/// Everything the notes declare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetNotes {
    /// Lowercase name -> expression.
    pub rolls: BTreeMap<String, String>,
    /// In the order they appear.
    pub attacks: Vec<Attack>,
}

impl SheetNotes {
    /// Case-insensitive custom roll lookup.
    pub fn roll(&self, name: &str) -> Option<&str> {
        self.rolls
            .get(&name.trim().to_lowercase())
            .map(String::as_str)
    }

    fn add(&mut self, entry: NoteEntry) {
        match entry {
            NoteEntry::Roll { name, expression } => {
                self.rolls.insert(name.to_lowercase(), expression);
            }
            NoteEntry::Attack(attack) => self.attacks.push(attack),
        }
    }
}

/// Parse one line. Returns `None` for lines that declare nothing.
pub fn parse_line(line: &str) -> Option<NoteEntry> {
    let captures = NOTE_LINE.captures(line)?;
    let name = captures[1].trim().to_string();
    if name.is_empty() {
        return None;
    }
    let body = &captures[2];

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if let [bonus, damage, damage_type] = parts[..] {
        return Some(NoteEntry::Attack(Attack {
            name,
            attack_bonus: parse_bonus(bonus),
            damage: non_blank(damage),
            damage_type: non_blank(damage_type).map(|t| t.to_lowercase()),
        }));
    }

    Some(NoteEntry::Roll {
        name,
        expression: body.to_string(),
    })
}

/// Parse every line of a block of notes.
pub fn parse_notes(text: &str) -> SheetNotes {
    let mut notes = SheetNotes::default();
    for entry in text.lines().filter_map(parse_line) {
        notes.add(entry);
    }
    notes
}

/// Notes field that holds custom rolls and attacks. The other fields
/// (backstory, allies, ...) are prose and never parsed.
pub const ANNOTATION_FIELD: &str = "otherNotes";

/// Parse the annotation field of a character's notes.
pub fn parse_sheet_notes(raw: &RawCharacter) -> SheetNotes {
    let notes = raw
        .notes
        .get(ANNOTATION_FIELD)
        .and_then(Option::as_deref)
        .map(parse_notes)
        .unwrap_or_default();
    trace!(
        character = %raw.name,
        rolls = notes.rolls.len(),
        attacks = notes.attacks.len(),
        "parsed notes"
    );
    notes
}

fn non_blank(text: &str) -> Option<String> {
    match text {
        "" | "-" => None,
        text => Some(text.to_string()),
    }
}

fn parse_bonus(text: &str) -> Option<AttackBonus> {
    let text = non_blank(text)?;
    match text.trim_start_matches('+').parse::<i64>() {
        Ok(bonus) => Some(AttackBonus::ToHit(bonus)),
        Err(_) => Some(AttackBonus::Save(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_roll_line() {
        assert_eq!(
            parse_line("Bardic Inspiration : 1d8"),
            Some(NoteEntry::Roll {
                name: "Bardic Inspiration".into(),
                expression: "1d8".into()
            })
        );
        assert_eq!(parse_line("just some prose"), None);
        assert_eq!(parse_line(": 1d6"), None);
        assert_eq!(parse_line("  : 1d6"), None);
    }

    #[test]
    fn test_custom_attack_line() {
        let Some(NoteEntry::Attack(attack)) = parse_line("Claw: +5, 1d6+3, Slashing") else {
            panic!("expected an attack");
        };
        assert_eq!(attack.name, "Claw");
        assert_eq!(attack.attack_bonus, Some(AttackBonus::ToHit(5)));
        assert_eq!(attack.damage.as_deref(), Some("1d6+3"));
        assert_eq!(attack.damage_type.as_deref(), Some("slashing"));

        let Some(NoteEntry::Attack(attack)) = parse_line("Stench: DC 12 CON save, -, poison") else {
            panic!("expected an attack");
        };
        assert_eq!(attack.attack_bonus, Some(AttackBonus::Save("DC 12 CON save".into())));
        assert_eq!(attack.damage, None);
    }

    #[test]
    fn test_other_comma_counts_are_rolls() {
        assert!(matches!(parse_line("pair: 1d6, 1d8"), Some(NoteEntry::Roll { .. })));
        assert!(matches!(parse_line("many: 1, 2, 3, 4"), Some(NoteEntry::Roll { .. })));
    }

    #[test]
    fn test_roll_lookup_is_case_insensitive() {
        let notes = parse_notes("Second Wind: 1d10+5\nLuck: 1d20\nluck: 2d20");
        assert_eq!(notes.roll("second wind"), Some("1d10+5"));
        assert_eq!(notes.roll("SECOND WIND "), Some("1d10+5"));
        assert_eq!(notes.roll("Luck"), Some("2d20"));
        assert_eq!(notes.roll("missing"), None);
    }

    #[test]
    fn test_only_other_notes_are_parsed() {
        let raw: RawCharacter = serde_json::from_value(serde_json::json!({
            "name": "Noted",
            "notes": {
                "backstory": "Longsword: my father's, lost at sea, found again",
                "otherNotes": "Bite: 4, 1d4, piercing\nHeal: 2d4+2",
                "allies": "Torm: a friend, a priest, an ally",
                "personalityTraits": "Temper: short"
            }
        }))
        .unwrap();
        let notes = parse_sheet_notes(&raw);
        assert_eq!(notes.roll("heal"), Some("2d4+2"));
        assert_eq!(notes.roll("temper"), None);
        let names: Vec<_> = notes.attacks.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Bite"]);
    }

    #[test]
    fn test_missing_other_notes() {
        let raw: RawCharacter = serde_json::from_value(serde_json::json!({
            "notes": {"otherNotes": null, "allies": "Torm: 1d4"}
        }))
        .unwrap();
        assert_eq!(parse_sheet_notes(&raw), SheetNotes::default());
    }
}

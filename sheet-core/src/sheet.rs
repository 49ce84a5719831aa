//! A fetched character plus its lazily derived views.
//!
//! Each view is computed at most once per `CharacterSheet`, even under
//! concurrent access, and every caller sees the same result. A sheet is never
//! refreshed in place; fetch a new one instead.

use crate::adjustments::Adjustments;
use crate::attacks::{self, AttackBook, FightingStyle};
use crate::dice::{self, Advantage, DieRoller, Evaluation};
use crate::document::{by_source, Modifier, RawCharacter};
use crate::error::SheetError;
use crate::notes::{self, SheetNotes};
use crate::skills::{self, SkillTable};
use crate::stats::{self, AbilityBlock};
use crate::tables::Tables;
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Class levels and their total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassLevels {
    /// Lowercase class name -> level.
    pub by_class: BTreeMap<String, i64>,
    pub total: i64,
}

/// A character document with memoized derived statistics.
pub struct CharacterSheet {
    tables: Arc<Tables>,
    raw: RawCharacter,
    adjustments: Adjustments,
    levels: ClassLevels,

    abilities: OnceCell<AbilityBlock>,
    skills: OnceCell<SkillTable>,
    armor_class: OnceCell<i64>,
    fighting_styles: OnceCell<BTreeSet<FightingStyle>>,
    attacks: OnceCell<AttackBook>,
    notes: OnceCell<SheetNotes>,
}

impl CharacterSheet {
    pub fn new(tables: Arc<Tables>, raw: RawCharacter) -> Self {
        let adjustments = Adjustments::build(&tables, &raw.character_values);
        let levels = class_levels(&raw);
        Self {
            tables,
            raw,
            adjustments,
            levels,
            abilities: OnceCell::new(),
            skills: OnceCell::new(),
            armor_class: OnceCell::new(),
            fighting_styles: OnceCell::new(),
            attacks: OnceCell::new(),
            notes: OnceCell::new(),
        }
    }

    /// Build a sheet from an already-fetched JSON document.
    pub fn from_json(tables: Arc<Tables>, document: serde_json::Value) -> Result<Self, SheetError> {
        let raw: RawCharacter = serde_json::from_value(document)?;
        Ok(Self::new(tables, raw))
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn raw(&self) -> &RawCharacter {
        &self.raw
    }

    pub fn adjustments(&self) -> &Adjustments {
        &self.adjustments
    }

    pub fn levels(&self) -> &ClassLevels {
        &self.levels
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    /// Every granted modifier on the sheet, across all sources.
    pub fn modifiers(&self) -> impl Iterator<Item = &Modifier> + '_ {
        by_source(&self.raw.modifiers)
            .flat_map(|(_, mods)| mods.iter())
            .filter(|m| m.granted())
    }

    // ------------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------------

    pub fn abilities(&self) -> &AbilityBlock {
        self.abilities
            .get_or_init(|| stats::resolve_abilities(self))
    }

    pub fn skills(&self) -> &SkillTable {
        self.skills.get_or_init(|| skills::resolve(self))
    }

    pub fn armor_class(&self) -> i64 {
        *self
            .armor_class
            .get_or_init(|| stats::resolve_armor_class(self))
    }

    pub fn fighting_styles(&self) -> &BTreeSet<FightingStyle> {
        self.fighting_styles
            .get_or_init(|| attacks::resolve_fighting_styles(self))
    }

    /// Computed attacks merged with the custom attacks from the notes.
    pub fn attacks(&self) -> &AttackBook {
        self.attacks.get_or_init(|| attacks::resolve(self))
    }

    /// Custom rolls and attacks declared in the sheet's notes.
    pub fn notes(&self) -> &SheetNotes {
        self.notes.get_or_init(|| notes::parse_sheet_notes(&self.raw))
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Bonus of a skill or save by its output key, case-insensitive.
    pub fn skill(&self, name: &str) -> Result<i64, SheetError> {
        self.skills()
            .get(name)
            .ok_or_else(|| SheetError::NoMatchingSkillOrAttack(name.to_string()))
    }

    pub fn attack(&self, name: &str) -> Result<&attacks::Attack, SheetError> {
        self.attacks()
            .find(name)
            .ok_or_else(|| SheetError::NoMatchingSkillOrAttack(name.to_string()))
    }

    pub fn custom_roll(&self, name: &str) -> Result<&str, SheetError> {
        self.notes()
            .roll(name)
            .ok_or_else(|| SheetError::NoMatchingSkillOrAttack(name.to_string()))
    }

    // ------------------------------------------------------------------------
    // Rolls
    // ------------------------------------------------------------------------

    /// Roll `1d20 + bonus` for a skill or save.
    pub fn roll_skill(
        &self,
        name: &str,
        advantage: Advantage,
        roller: &mut impl DieRoller,
    ) -> Result<Evaluation, SheetError> {
        let bonus = self.skill(name)?;
        Ok(dice::evaluate_with(&d20_plus(bonus), advantage, roller)?)
    }

    /// Roll an attack's to-hit (when it has a numeric bonus) and damage.
    pub fn roll_attack(
        &self,
        name: &str,
        advantage: Advantage,
        roller: &mut impl DieRoller,
    ) -> Result<AttackRoll, SheetError> {
        let attack = self.attack(name)?;
        let to_hit = match attack.attack_bonus {
            Some(attacks::AttackBonus::ToHit(bonus)) => {
                Some(dice::evaluate_with(&d20_plus(bonus), advantage, roller)?)
            }
            _ => None,
        };
        let damage = match &attack.damage {
            Some(expression) => Some(dice::evaluate_with(expression, Advantage::Normal, roller)?),
            None => None,
        };
        Ok(AttackRoll {
            attack: attack.clone(),
            to_hit,
            damage,
        })
    }

    /// Evaluate a custom roll from the notes.
    pub fn roll_custom(
        &self,
        name: &str,
        advantage: Advantage,
        roller: &mut impl DieRoller,
    ) -> Result<Evaluation, SheetError> {
        let expression = self.custom_roll(name)?;
        Ok(dice::evaluate_with(expression, advantage, roller)?)
    }

    // ------------------------------------------------------------------------
    // Summary
    // ------------------------------------------------------------------------

    /// Theme color as `0xRRGGBB`, red when unset or malformed.
    pub fn color(&self) -> u32 {
        self.raw
            .theme_color
            .as_ref()
            .and_then(|t| t.theme_color.as_deref())
            .and_then(|c| c.strip_prefix('#'))
            .filter(|hex| hex.len() == 6)
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .unwrap_or(0xFF0000)
    }

    /// One `(label, level)` pair per class, e.g. `("Battle Master Fighter", 5)`.
    pub fn class_summary(&self) -> Vec<(String, i64)> {
        self.raw
            .classes
            .iter()
            .filter_map(|c| {
                let name = &c.definition.as_ref()?.name;
                let label = match &c.subclass_definition {
                    Some(sub) if !sub.name.is_empty() => format!("{} {name}", sub.name),
                    _ => name.clone(),
                };
                Some((label, c.level))
            })
            .collect()
    }
}

impl std::fmt::Debug for CharacterSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterSheet")
            .field("name", &self.raw.name)
            .field("levels", &self.levels)
            .finish_non_exhaustive()
    }
}

/// Result of rolling an attack.
#[derive(Debug, Clone)]
pub struct AttackRoll {
    pub attack: attacks::Attack,
    pub to_hit: Option<Evaluation>,
    pub damage: Option<Evaluation>,
}

fn d20_plus(bonus: i64) -> String {
    format!("1d20{}", attacks::signed(bonus))
}

fn class_levels(raw: &RawCharacter) -> ClassLevels {
    let mut levels = ClassLevels::default();
    for class in &raw.classes {
        let name = class
            .definition
            .as_ref()
            .map(|d| d.name.to_lowercase())
            .unwrap_or_default();
        *levels.by_class.entry(name).or_default() += class.level;
        levels.total += class.level;
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_character, sample_sheet, sheet_from, ScriptedRoller};
    use serde_json::json;

    #[test]
    fn test_levels() {
        let mut doc = sample_character();
        doc["classes"] = json!([
            {"level": 3, "definition": {"name": "Fighter"}},
            {"level": 2, "definition": {"name": "Warlock"}, "subclassDefinition": {"name": "Hexblade"}},
        ]);
        let sheet = sheet_from(doc);
        assert_eq!(sheet.levels().total, 5);
        assert_eq!(sheet.levels().by_class["warlock"], 2);
        assert_eq!(
            sheet.class_summary(),
            vec![("Fighter".to_string(), 3), ("Hexblade Warlock".to_string(), 2)]
        );
    }

    #[test]
    fn test_views_are_memoized() {
        let sheet = sample_sheet();
        let first = sheet.abilities() as *const AbilityBlock;
        let second = sheet.abilities() as *const AbilityBlock;
        assert_eq!(first, second);
    }

    #[test]
    fn test_concurrent_access_sees_one_result() {
        let sheet = Arc::new(sample_sheet());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sheet = Arc::clone(&sheet);
                std::thread::spawn(move || {
                    let skills = sheet.skills() as *const SkillTable as usize;
                    let attacks = sheet.attacks() as *const AttackBook as usize;
                    (skills, attacks, sheet.armor_class())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_color() {
        let mut doc = sample_character();
        doc["themeColor"] = json!({"themeColor": "#00FF80"});
        assert_eq!(sheet_from(doc).color(), 0x00FF80);

        let mut doc = sample_character();
        doc["themeColor"] = json!(null);
        assert_eq!(sheet_from(doc).color(), 0xFF0000);
    }

    #[test]
    fn test_unknown_skill_is_no_match() {
        let sheet = sample_sheet();
        assert!(matches!(
            sheet.skill("basket-weaving"),
            Err(SheetError::NoMatchingSkillOrAttack(name)) if name == "basket-weaving"
        ));
    }

    #[test]
    fn test_roll_skill() {
        let sheet = sample_sheet();
        let mut roller = ScriptedRoller::new([12]);
        let bonus = sheet.skill("athletics").unwrap();
        let result = sheet
            .roll_skill("Athletics", Advantage::Normal, &mut roller)
            .unwrap();
        assert_eq!(result.value, (12 + bonus) as f64);
    }

    #[test]
    fn test_roll_attack() {
        let sheet = sample_sheet();
        let mut roller = ScriptedRoller::new([15, 6]);
        let roll = sheet
            .roll_attack("longsword", Advantage::Normal, &mut roller)
            .unwrap();
        assert_eq!(roll.attack.name, "Longsword");
        assert!(roll.to_hit.is_some());
        let damage = roll.damage.unwrap();
        assert!(damage.trace.iter().any(|l| l == "1d8: 6 = 6"));
    }
}

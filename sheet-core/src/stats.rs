//! Ability scores, proficiency bonus and armor class.
//!
//! Every derived number that granted modifiers can raise goes through
//! [`aggregate`]: `bonus` modifiers add up, the highest `set` modifier acts as
//! a floor.

use crate::attacks::FightingStyle;
use crate::document::{InventoryItem, Modifier};
use crate::sheet::CharacterSheet;
use crate::tables::{ability_modifier, Ability};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Modifier subtypes read by the stat resolver.
pub mod subtype {
    pub const PROFICIENCY_BONUS: &str = "proficiency-bonus";
    pub const ARMOR_CLASS: &str = "armor-class";
    pub const UNARMORED_ARMOR_CLASS: &str = "unarmored-armor-class";
    pub const SPELL_ATTACKS: &str = "spell-attacks";
    pub const SPELL_SAVE_DC: &str = "spell-save-dc";
}

/// Apply every modifier tagged `subtype` to `base`.
///
/// A modifier without a fixed value contributes the modifier of the ability
/// named by its `statId`, looked up through `ability_mod`.
pub fn aggregate<'a>(
    modifiers: impl IntoIterator<Item = &'a Modifier>,
    subtype: &str,
    base: i64,
    ability_mod: impl Fn(i64) -> i64,
) -> i64 {
    let mut total = base;
    let mut highest_set: Option<i64> = None;

    for modifier in modifiers {
        if modifier.sub_type != subtype {
            continue;
        }
        let amount = match modifier.value {
            Some(value) => value,
            None => modifier.stat_id.map(&ability_mod).unwrap_or(0),
        };
        match modifier.kind.as_str() {
            "bonus" => total += amount,
            "set" => {
                highest_set = Some(highest_set.map_or(amount, |current| current.max(amount)));
            }
            _ => {}
        }
    }

    match highest_set {
        Some(set) => total.max(set),
        None => total,
    }
}

/// Proficiency bonus before modifiers: ceil(level / 4) + 1.
pub fn base_proficiency(total_level: i64) -> i64 {
    (total_level.max(0) + 3).div_euclid(4) + 1
}

/// Resolved ability scores and proficiency bonus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbilityBlock {
    scores: BTreeMap<Ability, i64>,
    proficiency: i64,
}

impl AbilityBlock {
    pub fn score(&self, ability: Ability) -> i64 {
        self.scores.get(&ability).copied().unwrap_or(0)
    }

    pub fn modifier(&self, ability: Ability) -> i64 {
        ability_modifier(self.score(ability))
    }

    pub fn proficiency_bonus(&self) -> i64 {
        self.proficiency
    }

    /// Flat view keyed `str`, `strmod`, ..., `prof`.
    pub fn to_map(&self) -> BTreeMap<String, i64> {
        let mut map = BTreeMap::new();
        for (&ability, &score) in &self.scores {
            map.insert(ability.short().to_string(), score);
            map.insert(format!("{}mod", ability.short()), ability_modifier(score));
        }
        map.insert("prof".to_string(), self.proficiency);
        map
    }
}

/// Resolve ability scores and the proficiency bonus.
pub fn resolve_abilities(sheet: &CharacterSheet) -> AbilityBlock {
    let raw = sheet.raw();
    let tables = sheet.tables();
    let value_of = |list: &[crate::document::StatValue], id: i64| {
        list.iter().find(|s| s.id == id).and_then(|s| s.value)
    };

    // Scores before modifiers; `statId` references inside score modifiers
    // resolve against these to avoid a circular dependency.
    let mut unmodified: BTreeMap<Ability, (i64, bool)> = BTreeMap::new();
    for (index, &ability) in tables.abilities().iter().enumerate() {
        let id = index as i64 + 1;
        let entry = match value_of(&raw.override_stats, id) {
            Some(score) => (score, true),
            None => {
                let base = value_of(&raw.stats, id).unwrap_or(0);
                let bonus = value_of(&raw.bonus_stats, id).unwrap_or(0);
                (base + bonus, false)
            }
        };
        unmodified.insert(ability, entry);
    }

    let preliminary_mod = |stat_id: i64| {
        tables
            .ability(stat_id)
            .and_then(|a| unmodified.get(&a))
            .map(|&(score, _)| ability_modifier(score))
            .unwrap_or(0)
    };

    let mut scores = BTreeMap::new();
    for (&ability, &(score, overridden)) in &unmodified {
        let score = if overridden {
            score
        } else {
            aggregate(
                sheet.modifiers(),
                &ability.score_subtype(),
                score,
                &preliminary_mod,
            )
        };
        scores.insert(ability, score);
    }

    let level = sheet.levels().total;
    let final_mod = |stat_id: i64| {
        tables
            .ability(stat_id)
            .and_then(|a| scores.get(&a))
            .map(|&score| ability_modifier(score))
            .unwrap_or(0)
    };
    let proficiency = aggregate(
        sheet.modifiers(),
        subtype::PROFICIENCY_BONUS,
        base_proficiency(level),
        final_mod,
    );

    debug!(character = %raw.name, level, proficiency, "resolved ability scores");
    AbilityBlock {
        scores,
        proficiency,
    }
}

/// Body armor categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorType {
    Light,
    Medium,
    Heavy,
    Shield,
}

impl ArmorType {
    fn of(item: &InventoryItem) -> Option<ArmorType> {
        let definition = item.definition.as_ref()?;
        let by_name = definition.kind.as_deref().map(str::to_lowercase);
        match (by_name.as_deref(), definition.armor_type_id) {
            (Some("light armor"), _) | (_, Some(1)) => Some(ArmorType::Light),
            (Some("medium armor"), _) | (_, Some(2)) => Some(ArmorType::Medium),
            (Some("heavy armor"), _) | (_, Some(3)) => Some(ArmorType::Heavy),
            (Some("shield"), _) | (_, Some(4)) => Some(ArmorType::Shield),
            _ => None,
        }
    }
}

/// Resolve armor class from equipped armor, DEX and modifiers.
pub fn resolve_armor_class(sheet: &CharacterSheet) -> i64 {
    let abilities = sheet.abilities();
    let dex = abilities.modifier(Ability::Dexterity);
    let ability_mod = |stat_id: i64| {
        sheet
            .tables()
            .ability(stat_id)
            .map(|a| abilities.modifier(a))
            .unwrap_or(0)
    };

    let mut base = 10;
    let mut worn: Option<ArmorType> = None;
    let mut shield = 0;
    for item in sheet.raw().inventory.iter().filter(|i| i.equipped) {
        let Some(definition) = &item.definition else {
            continue;
        };
        if definition.filter_type.as_deref() != Some("Armor") {
            continue;
        }
        let armor_class = definition.armor_class.unwrap_or(0);
        match ArmorType::of(item) {
            Some(ArmorType::Shield) => shield += armor_class,
            kind => {
                base = armor_class;
                worn = kind.or(Some(ArmorType::Heavy));
            }
        }
    }

    let mut ac = aggregate(sheet.modifiers(), subtype::ARMOR_CLASS, base, ability_mod) + shield;
    ac += match worn {
        None => {
            dex + aggregate(
                sheet.modifiers(),
                subtype::UNARMORED_ARMOR_CLASS,
                0,
                ability_mod,
            )
        }
        Some(ArmorType::Light) => dex,
        Some(ArmorType::Medium) => dex.min(2),
        Some(ArmorType::Heavy) | Some(ArmorType::Shield) => 0,
    };
    if worn.is_some() && sheet.fighting_styles().contains(&FightingStyle::Defense) {
        ac += 1;
    }
    ac
}

//! Skill, saving throw and initiative bonuses.

use crate::adjustments::kind;
use crate::sheet::CharacterSheet;
use crate::tables::{slug, Ability, SkillKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Proficiency tier; higher tiers win when several apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum ProficiencyLevel {
    #[default]
    None,
    Half,
    Proficient,
    Expertise,
}

impl ProficiencyLevel {
    /// Map the sheet's numeric tier (1 = none .. 4 = expertise).
    pub fn from_tier(tier: i64) -> Option<Self> {
        match tier {
            1 => Some(ProficiencyLevel::None),
            2 => Some(ProficiencyLevel::Half),
            3 => Some(ProficiencyLevel::Proficient),
            4 => Some(ProficiencyLevel::Expertise),
            _ => None,
        }
    }

    /// Tier granted by a modifier type, if it grants one.
    pub fn from_modifier(kind: &str) -> Option<Self> {
        match kind {
            "half-proficiency" => Some(ProficiencyLevel::Half),
            "proficiency" => Some(ProficiencyLevel::Proficient),
            "expertise" => Some(ProficiencyLevel::Expertise),
            _ => None,
        }
    }

    pub fn bonus(&self, proficiency_bonus: i64) -> i64 {
        match self {
            ProficiencyLevel::None => 0,
            ProficiencyLevel::Half => proficiency_bonus.div_euclid(2),
            ProficiencyLevel::Proficient => proficiency_bonus,
            ProficiencyLevel::Expertise => proficiency_bonus * 2,
        }
    }
}

/// Final skill and save bonuses, in sheet order.
///
/// Saves are keyed `strsave`, `dexsave`, ...; everything else by its
/// hyphenated lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillTable {
    entries: Vec<(String, i64)>,
}

impl SkillTable {
    /// Look up a bonus. Accepts display names ("Sleight of Hand") and
    /// save aliases ("dex save", "dexterity-saving-throws").
    pub fn get(&self, name: &str) -> Option<i64> {
        let key = normalize(name);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, i64> {
        self.entries.iter().cloned().collect()
    }
}

fn normalize(name: &str) -> String {
    let key = slug(name);
    for suffix in ["-saving-throws", "-saving-throw", "-save", "save"] {
        if let Some(ability) = key.strip_suffix(suffix).and_then(Ability::from_name) {
            return ability.save_key();
        }
    }
    key
}

struct Entry {
    name: String,
    kind: Option<SkillKind>,
    value: i64,
}

/// Resolve every skill, save and initiative bonus.
pub fn resolve(sheet: &CharacterSheet) -> SkillTable {
    let abilities = sheet.abilities();
    let proficiency = abilities.proficiency_bonus();
    let tables = sheet.tables();
    let adjustments = sheet.adjustments();
    let stat_mod = |stat_id: Option<i64>| {
        stat_id
            .and_then(|id| tables.ability(id))
            .map(|a| abilities.modifier(a))
            .unwrap_or(0)
    };

    let mut tiers: HashMap<String, ProficiencyLevel> = HashMap::new();
    let mut bonuses: HashMap<String, i64> = HashMap::new();
    let mut overrides: HashMap<String, i64> = HashMap::new();

    for modifier in sheet.modifiers() {
        let name = modifier.sub_type.clone();
        if let Some(level) = ProficiencyLevel::from_modifier(&modifier.kind) {
            let tier = tiers.entry(name).or_default();
            *tier = (*tier).max(level);
        } else if modifier.kind == "bonus" {
            let amount = modifier.value.unwrap_or_else(|| stat_mod(modifier.stat_id));
            *bonuses.entry(name).or_default() += amount;
        }
    }

    // 1. seed from the governing ability
    let mut entries: Vec<Entry> = tables
        .skills()
        .iter()
        .map(|def| Entry {
            name: def.name.clone(),
            kind: Some(def.kind),
            value: abilities.modifier(def.ability),
        })
        .collect();

    // 2. custom skills
    for custom in sheet.raw().custom_proficiencies.iter().filter(|c| c.kind == 1) {
        let name = slug(&custom.name);
        if name.is_empty() {
            continue;
        }
        let value = stat_mod(custom.stat_id);
        match entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.value = value,
            None => entries.push(Entry {
                name: name.clone(),
                kind: None,
                value,
            }),
        }
        if let Some(level) = custom.proficiency_level.and_then(ProficiencyLevel::from_tier) {
            tiers.insert(name.clone(), level);
        }
        *bonuses.entry(name.clone()).or_default() +=
            custom.magic_bonus.unwrap_or(0) + custom.misc_bonus.unwrap_or(0);
        if let Some(value) = custom.override_value {
            overrides.insert(name, value);
        }
    }

    // 3. adjustment overlays
    for def in tables.skills() {
        let Some(id) = def.id else {
            continue;
        };
        let (magic, misc, override_kind, level_kind) = match def.kind {
            SkillKind::SavingThrow => (
                kind::SAVE_MAGIC_BONUS,
                kind::SAVE_MISC_BONUS,
                kind::SAVE_OVERRIDE,
                kind::SAVE_PROFICIENCY_LEVEL,
            ),
            SkillKind::AbilityCheck | SkillKind::Initiative => (
                kind::SKILL_MAGIC_BONUS,
                kind::SKILL_MISC_BONUS,
                kind::SKILL_OVERRIDE,
                kind::SKILL_PROFICIENCY_LEVEL,
            ),
        };

        for bonus_kind in [magic, misc] {
            if let Some(amount) = adjustments.number(bonus_kind, id) {
                *bonuses.entry(def.name.clone()).or_default() += amount;
            }
        }
        if let Some(value) = adjustments.number(override_kind, id) {
            overrides.insert(def.name.clone(), value);
        }
        if let Some(level) = adjustments
            .number(level_kind, id)
            .and_then(ProficiencyLevel::from_tier)
        {
            tiers.insert(def.name.clone(), level);
        }
        if def.kind != SkillKind::SavingThrow {
            if let Some(stat_id) = adjustments.number(kind::SKILL_STAT_OVERRIDE, id) {
                if let Some(entry) = entries.iter_mut().find(|e| e.name == def.name) {
                    entry.value = stat_mod(Some(stat_id));
                }
            }
        }
    }

    // 4. proficiency tiers and flat bonuses
    for entry in &mut entries {
        let category = entry.kind.and_then(|k| k.category());
        let own = tiers.get(&entry.name).copied().unwrap_or_default();
        let shared = category
            .and_then(|c| tiers.get(c))
            .copied()
            .unwrap_or_default();
        entry.value += own.max(shared).bonus(proficiency);
        entry.value += bonuses.get(&entry.name).copied().unwrap_or(0);
        entry.value += category.and_then(|c| bonuses.get(c)).copied().unwrap_or(0);
    }

    // 5. explicit overrides win
    for entry in &mut entries {
        if let Some(&value) = overrides.get(&entry.name) {
            entry.value = value;
        }
    }

    let table = SkillTable {
        entries: entries
            .into_iter()
            .map(|e| (output_key(&e, sheet), e.value))
            .collect(),
    };
    debug!(character = %sheet.name(), skills = table.len(), "resolved skills");
    table
}

fn output_key(entry: &Entry, sheet: &CharacterSheet) -> String {
    if entry.kind == Some(SkillKind::SavingThrow) {
        if let Some(def) = sheet.tables().skill(&entry.name) {
            return def.ability.save_key();
        }
    }
    entry.name.clone()
}

//! Lookup tables built once from the D&D Beyond config document.
//!
//! The config is identical for every character, so a `Tables` value is
//! built once per process and shared behind an `Arc`.

use crate::error::SheetError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lowercase a display name and hyphenate its spaces ("Sleight of Hand" ->
/// "sleight-of-hand").
pub fn slug(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "-")
}

/// Deserialize `null` as the type's default.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Raw config document
// ============================================================================

/// The parts of the config document the engine reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigDocument {
    #[serde(deserialize_with = "nullable")]
    pub stats: Vec<NamedEntry>,
    #[serde(deserialize_with = "nullable")]
    pub ability_skills: Vec<SkillEntry>,
    #[serde(deserialize_with = "nullable")]
    pub adjustment_types: Vec<NamedEntry>,
    #[serde(deserialize_with = "nullable")]
    pub damage_types: Vec<NamedEntry>,
    #[serde(deserialize_with = "nullable")]
    pub weapon_categories: Vec<NamedEntry>,
    #[serde(deserialize_with = "nullable")]
    pub weapons: Vec<WeaponEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamedEntry {
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkillEntry {
    pub id: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub stat: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeaponEntry {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub category_id: i64,
}

// ============================================================================
// Abilities
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    /// Three-letter key used in stat maps ("str", "dex", ...).
    pub fn short(&self) -> &'static str {
        match self {
            Ability::Strength => "str",
            Ability::Dexterity => "dex",
            Ability::Constitution => "con",
            Ability::Intelligence => "int",
            Ability::Wisdom => "wis",
            Ability::Charisma => "cha",
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    /// Slug as it appears in modifier subtypes ("strength").
    pub fn slug(&self) -> &'static str {
        match self {
            Ability::Strength => "strength",
            Ability::Dexterity => "dexterity",
            Ability::Constitution => "constitution",
            Ability::Intelligence => "intelligence",
            Ability::Wisdom => "wisdom",
            Ability::Charisma => "charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }

    /// Parse a slug, full name, or three-letter key.
    pub fn from_name(name: &str) -> Option<Ability> {
        let name = slug(name);
        Ability::all()
            .into_iter()
            .find(|a| a.slug() == name || a.short() == name)
    }

    /// Modifier subtype for this ability's score ("strength-score").
    pub fn score_subtype(&self) -> String {
        format!("{}-score", self.slug())
    }

    /// Modifier subtype for this ability's saving throw.
    pub fn save_subtype(&self) -> String {
        format!("{}-saving-throws", self.slug())
    }

    /// Output key of this ability's saving throw ("strsave").
    pub fn save_key(&self) -> String {
        format!("{}save", self.short())
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Standard D&D ability modifier: floor((score - 10) / 2).
pub fn ability_modifier(score: i64) -> i64 {
    (score - 10).div_euclid(2)
}

// ============================================================================
// Skills
// ============================================================================

/// What kind of roll a skill-table entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillKind {
    AbilityCheck,
    SavingThrow,
    Initiative,
}

impl SkillKind {
    /// Modifier subtype that grants proficiency or bonuses to every entry of
    /// this kind.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            SkillKind::AbilityCheck => Some("ability-checks"),
            SkillKind::SavingThrow => Some("saving-throws"),
            SkillKind::Initiative => None,
        }
    }
}

/// A skill, saving throw or initiative and the ability that governs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillDefinition {
    /// Config id, used as the target of skill adjustments.
    pub id: Option<i64>,
    /// Hyphenated lowercase name; saves use the modifier subtype
    /// ("dexterity-saving-throws").
    pub name: String,
    pub ability: Ability,
    pub kind: SkillKind,
}

// ============================================================================
// Tables
// ============================================================================

/// Lookup tables shared by every character.
#[derive(Debug, Clone)]
pub struct Tables {
    abilities: Vec<Ability>,
    skills: Vec<SkillDefinition>,
    damage_types: HashMap<i64, String>,
    adjustment_types: HashMap<i64, String>,
    weapon_categories: HashMap<i64, String>,
    weapons: HashMap<String, Vec<String>>,
}

impl Tables {
    /// Build the tables from a parsed config document.
    ///
    /// Fails with `ConfigUnavailable` unless the config lists all six
    /// abilities.
    pub fn from_config(config: &ConfigDocument) -> Result<Self, SheetError> {
        let abilities: Vec<Ability> = config
            .stats
            .iter()
            .filter_map(|s| Ability::from_name(&s.name))
            .collect();
        if abilities.len() != 6 {
            return Err(SheetError::ConfigUnavailable(format!(
                "expected 6 abilities in config, found {}",
                abilities.len()
            )));
        }

        let mut skills = Vec::new();
        let mut has_initiative = false;
        for entry in &config.ability_skills {
            let Some(ability) = stat_at(&abilities, entry.stat) else {
                continue;
            };
            let name = slug(&entry.name);
            let kind = if name == "initiative" {
                has_initiative = true;
                SkillKind::Initiative
            } else {
                SkillKind::AbilityCheck
            };
            skills.push(SkillDefinition {
                id: entry.id,
                name,
                ability,
                kind,
            });
        }
        if !has_initiative {
            skills.push(SkillDefinition {
                id: None,
                name: "initiative".to_string(),
                ability: Ability::Dexterity,
                kind: SkillKind::Initiative,
            });
        }
        for (index, &ability) in abilities.iter().enumerate() {
            skills.push(SkillDefinition {
                id: Some(index as i64 + 1),
                name: ability.save_subtype(),
                ability,
                kind: SkillKind::SavingThrow,
            });
        }

        let weapon_categories: HashMap<i64, String> = config
            .weapon_categories
            .iter()
            .map(|c| (c.id, slug(&c.name)))
            .collect();
        let mut weapons: HashMap<String, Vec<String>> = weapon_categories
            .values()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        for weapon in &config.weapons {
            if let Some(category) = weapon_categories.get(&weapon.category_id) {
                weapons
                    .entry(category.clone())
                    .or_default()
                    .push(slug(&weapon.name));
            }
        }

        Ok(Self {
            abilities,
            skills,
            damage_types: by_id(&config.damage_types),
            adjustment_types: by_id(&config.adjustment_types),
            weapon_categories,
            weapons,
        })
    }

    /// Abilities in config order.
    pub fn abilities(&self) -> &[Ability] {
        &self.abilities
    }

    /// Ability for a 1-based config stat id.
    pub fn ability(&self, stat_id: i64) -> Option<Ability> {
        stat_at(&self.abilities, stat_id)
    }

    /// 1-based config stat id of an ability.
    pub fn stat_id(&self, ability: Ability) -> Option<i64> {
        self.abilities
            .iter()
            .position(|&a| a == ability)
            .map(|i| i as i64 + 1)
    }

    /// Every skill, initiative and saving throw, registry order first.
    pub fn skills(&self) -> &[SkillDefinition] {
        &self.skills
    }

    pub fn skill(&self, name: &str) -> Option<&SkillDefinition> {
        self.skills.iter().find(|s| s.name == name)
    }

    pub fn skill_by_id(&self, id: i64) -> Option<&SkillDefinition> {
        self.skills
            .iter()
            .find(|s| s.kind != SkillKind::SavingThrow && s.id == Some(id))
    }

    /// Slugged damage type name, or `"damage"` when the id is unknown.
    pub fn damage_type(&self, id: Option<i64>) -> String {
        id.and_then(|id| self.damage_types.get(&id))
            .cloned()
            .unwrap_or_else(|| "damage".to_string())
    }

    /// Slugged adjustment type name for a `characterValues` type id.
    pub fn adjustment_type(&self, id: i64) -> Option<&str> {
        self.adjustment_types.get(&id).map(String::as_str)
    }

    pub fn weapon_category(&self, id: i64) -> Option<&str> {
        self.weapon_categories.get(&id).map(String::as_str)
    }

    /// Slugged weapon names in a category ("simple", "martial").
    pub fn weapons_in(&self, category: &str) -> &[String] {
        self.weapons
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn stat_at(abilities: &[Ability], stat_id: i64) -> Option<Ability> {
    usize::try_from(stat_id - 1)
        .ok()
        .and_then(|i| abilities.get(i).copied())
}

fn by_id(entries: &[NamedEntry]) -> HashMap<i64, String> {
    entries.iter().map(|e| (e.id, slug(&e.name))).collect()
}

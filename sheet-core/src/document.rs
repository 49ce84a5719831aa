//! Raw D&D Beyond character document.
//!
//! Only the fields the resolvers read are modelled. Everything is optional:
//! a missing or `null` field deserializes to its empty value so that sparse
//! sheets still resolve.

use crate::tables::nullable;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Order in which per-source lists (modifiers, actions, spells) are visited.
/// Unknown sources follow in name order.
const SOURCE_ORDER: [&str; 5] = ["race", "class", "background", "item", "feat"];

/// Iterate a per-source map in a stable, sheet-like order.
pub fn by_source<'a, T>(
    map: &'a BTreeMap<String, Vec<T>>,
) -> impl Iterator<Item = (&'a str, &'a [T])> {
    let known = SOURCE_ORDER
        .iter()
        .filter_map(move |&key| map.get(key).map(|v| (key, v.as_slice())));
    let rest = map
        .iter()
        .filter(|(key, _)| !SOURCE_ORDER.contains(&key.as_str()))
        .map(|(key, v)| (key.as_str(), v.as_slice()));
    known.chain(rest)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCharacter {
    pub id: Option<u64>,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub readonly_url: Option<String>,
    pub avatar_url: Option<String>,
    pub theme_color: Option<ThemeColor>,

    #[serde(deserialize_with = "nullable")]
    pub stats: Vec<StatValue>,
    #[serde(deserialize_with = "nullable")]
    pub bonus_stats: Vec<StatValue>,
    #[serde(deserialize_with = "nullable")]
    pub override_stats: Vec<StatValue>,

    #[serde(deserialize_with = "nullable")]
    pub classes: Vec<ClassEntry>,
    #[serde(deserialize_with = "nullable_sources")]
    pub modifiers: BTreeMap<String, Vec<Modifier>>,
    #[serde(deserialize_with = "nullable_sources")]
    pub options: BTreeMap<String, Vec<OptionEntry>>,

    #[serde(deserialize_with = "nullable")]
    pub inventory: Vec<InventoryItem>,
    #[serde(deserialize_with = "nullable")]
    pub custom_proficiencies: Vec<CustomProficiency>,
    #[serde(deserialize_with = "nullable")]
    pub character_values: Vec<CharacterValue>,

    #[serde(deserialize_with = "nullable_sources")]
    pub actions: BTreeMap<String, Vec<Action>>,
    #[serde(deserialize_with = "nullable")]
    pub custom_actions: Vec<CustomAction>,
    #[serde(deserialize_with = "nullable_sources")]
    pub spells: BTreeMap<String, Vec<SpellEntry>>,
    #[serde(deserialize_with = "nullable")]
    pub class_spells: Vec<ClassSpellList>,

    #[serde(deserialize_with = "nullable")]
    pub notes: BTreeMap<String, Option<String>>,
}

/// A per-source map whose lists may individually be `null`.
fn nullable_sources<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, Vec<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    let raw: Option<BTreeMap<String, Option<Vec<T>>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeColor {
    pub theme_color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatValue {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassEntry {
    pub id: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub level: i64,
    pub definition: Option<ClassDefinition>,
    pub subclass_definition: Option<ClassDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassDefinition {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub spell_casting_ability_id: Option<i64>,
}

/// A granted modifier ("bonus", "set", "proficiency", ...).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Modifier {
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub kind: String,
    #[serde(deserialize_with = "nullable")]
    pub sub_type: String,
    pub value: Option<i64>,
    pub stat_id: Option<i64>,
    pub is_granted: Option<bool>,
    pub friendly_subtype_name: Option<String>,
}

impl Modifier {
    /// Modifiers without an explicit `isGranted` flag are treated as granted.
    pub fn granted(&self) -> bool {
        self.is_granted.unwrap_or(true)
    }
}

/// A chosen class/race/feat option; fighting styles appear here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OptionEntry {
    pub definition: Option<OptionDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OptionDefinition {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryItem {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub equipped: bool,
    pub display_as_attack: Option<bool>,
    pub definition: Option<ItemDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemDefinition {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub filter_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category_id: Option<i64>,
    pub armor_class: Option<i64>,
    pub armor_type_id: Option<i64>,
    /// 1 = melee, 2 = ranged.
    pub attack_type: Option<i64>,
    pub damage: Option<Dice>,
    pub damage_type: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub magic: bool,
    #[serde(deserialize_with = "nullable")]
    pub properties: Vec<ItemProperty>,
    #[serde(deserialize_with = "nullable")]
    pub granted_modifiers: Vec<Modifier>,
}

impl ItemDefinition {
    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn property(&self, name: &str) -> Option<&ItemProperty> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemProperty {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dice {
    pub dice_string: Option<String>,
    pub dice_count: Option<i64>,
    pub dice_value: Option<i64>,
    pub fixed_value: Option<i64>,
}

impl Dice {
    /// `NdM` notation, preferring the explicit dice string.
    pub fn notation(&self) -> Option<String> {
        match (&self.dice_string, self.dice_count, self.dice_value) {
            (Some(s), _, _) if !s.trim().is_empty() => Some(s.trim().to_string()),
            (_, Some(count), Some(sides)) => Some(format!("{count}d{sides}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomProficiency {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    /// 1 = skill.
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub kind: i64,
    pub stat_id: Option<i64>,
    pub proficiency_level: Option<i64>,
    pub magic_bonus: Option<i64>,
    pub misc_bonus: Option<i64>,
    #[serde(rename = "override")]
    pub override_value: Option<i64>,
}

/// A player adjustment record from `characterValues`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterValue {
    #[serde(deserialize_with = "nullable")]
    pub type_id: i64,
    pub value_id: Option<serde_json::Value>,
    pub value: serde_json::Value,
}

/// A class/race/feat action.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Action {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub display_as_attack: Option<bool>,
    pub dice: Option<Dice>,
    pub damage_type_id: Option<i64>,
}

/// A player-authored action.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomAction {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub display_as_attack: Option<bool>,
    pub stat_id: Option<i64>,
    pub range_id: Option<i64>,
    pub save_stat_id: Option<i64>,
    pub fixed_save_dc: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub is_proficient: bool,
    pub to_hit_bonus: Option<i64>,
    pub fixed_value: Option<i64>,
    pub damage_bonus: Option<i64>,
    pub dice_count: Option<i64>,
    pub dice_type: Option<i64>,
    pub damage_type_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassSpellList {
    pub character_class_id: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub spells: Vec<SpellEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpellEntry {
    pub id: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub prepared: bool,
    #[serde(deserialize_with = "nullable")]
    pub always_prepared: bool,
    pub display_as_attack: Option<bool>,
    pub spell_casting_ability_id: Option<i64>,
    pub definition: Option<SpellDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpellDefinition {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub level: i64,
    #[serde(deserialize_with = "nullable")]
    pub requires_attack_roll: bool,
    #[serde(deserialize_with = "nullable")]
    pub requires_saving_throw: bool,
    pub save_dc_ability_id: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub modifiers: Vec<SpellModifier>,
}

/// A spell effect; damage effects carry `type = "damage"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpellModifier {
    #[serde(rename = "type", deserialize_with = "nullable")]
    pub kind: String,
    #[serde(deserialize_with = "nullable")]
    pub sub_type: String,
    pub die: Option<Dice>,
    #[serde(deserialize_with = "nullable")]
    pub use_primary_stat: bool,
    pub at_higher_levels: Option<HigherLevels>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HigherLevels {
    #[serde(deserialize_with = "nullable")]
    pub higher_level_definitions: Vec<LevelScaling>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LevelScaling {
    pub level: Option<i64>,
    pub dice: Option<Dice>,
}

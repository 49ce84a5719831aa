//! Attack resolution.
//!
//! Attacks come from four kinds of source on the sheet: simple actions,
//! player-authored custom actions, weapons in the inventory, and spells
//! flagged to show as attacks. Each is resolved into an [`Attack`], names are
//! made unique, and custom attacks declared in the notes are merged in front,
//! replacing computed attacks with the same name.

use crate::adjustments::kind;
use crate::document::{
    by_source, Action, CustomAction, InventoryItem, ItemDefinition, SpellDefinition, SpellEntry,
};
use crate::error::SheetError;
use crate::sheet::CharacterSheet;
use crate::stats::{self, subtype, AbilityBlock};
use crate::tables::{slug, Ability};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, warn};

lazy_static! {
    static ref VERSATILE_DIE: Regex = Regex::new(r"^\s*(\d+)d(\d+)\s*$").unwrap();
    static ref LEADING_DIE: Regex = Regex::new(r"^(\d+)d(\d+)").unwrap();
}

/// `attackType` of a ranged weapon.
const RANGED_ATTACK_TYPE: i64 = 2;
/// Suffix of the two-handed entry emitted for versatile weapons.
const TWO_HANDED_SUFFIX: &str = "2h";

// ============================================================================
// Types
// ============================================================================

/// Fighting styles that change attack math (or are at least recognized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FightingStyle {
    Archery,
    Defense,
    Dueling,
    GreatWeaponFighting,
    Protection,
    TwoWeaponFighting,
}

impl FightingStyle {
    /// Parse an option name such as "Dueling" or "Fighting Style: Archery".
    pub fn from_name(name: &str) -> Option<FightingStyle> {
        let name = name.rsplit(':').next().unwrap_or(name);
        match slug(name).as_str() {
            "archery" => Some(FightingStyle::Archery),
            "defense" => Some(FightingStyle::Defense),
            "dueling" => Some(FightingStyle::Dueling),
            "great-weapon-fighting" => Some(FightingStyle::GreatWeaponFighting),
            "protection" => Some(FightingStyle::Protection),
            "two-weapon-fighting" => Some(FightingStyle::TwoWeaponFighting),
            _ => None,
        }
    }
}

/// What an attack asks for before damage: a d20 bonus or a saving throw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttackBonus {
    ToHit(i64),
    /// e.g. `DC 13 DEX save`, or free text from the notes.
    Save(String),
}

impl fmt::Display for AttackBonus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackBonus::ToHit(bonus) => write!(f, "{bonus:+}"),
            AttackBonus::Save(text) => write!(f, "{text}"),
        }
    }
}

/// One resolved attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attack {
    pub name: String,
    pub attack_bonus: Option<AttackBonus>,
    /// Dice expression, e.g. `1d8+5`.
    pub damage: Option<String>,
    /// Lowercase damage type; a trailing `^` marks magical damage.
    pub damage_type: Option<String>,
}

impl fmt::Display for Attack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        let mut parts = Vec::new();
        if let Some(bonus) = &self.attack_bonus {
            parts.push(bonus.to_string());
        }
        if let Some(damage) = &self.damage {
            parts.push(damage.clone());
        }
        if let Some(damage_type) = &self.damage_type {
            parts.push(damage_type.clone());
        }
        if !parts.is_empty() {
            write!(f, ": {}", parts.join(", "))?;
        }
        Ok(())
    }
}

/// Every attack on a sheet, plus the sources that failed to resolve.
#[derive(Debug, Default)]
pub struct AttackBook {
    pub attacks: Vec<Attack>,
    pub failures: Vec<SheetError>,
}

impl AttackBook {
    /// Case-insensitive lookup by name.
    pub fn find(&self, name: &str) -> Option<&Attack> {
        let name = name.trim();
        self.attacks
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attacks.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }
}

/// Format a bonus for appending to an expression: `+3`, `-1`, or nothing.
pub fn signed(n: i64) -> String {
    match n {
        0 => String::new(),
        n => format!("{n:+}"),
    }
}

/// Rewrite a leading `NdM` as `NgM` (reroll ones and twos once).
pub fn great_weapon_dice(dice: &str) -> String {
    LEADING_DIE.replace(dice, "${1}g${2}").into_owned()
}

/// Where an attack came from.
enum AttackSource<'a> {
    SimpleAction(&'a Action),
    CustomAction(&'a CustomAction),
    WeaponItem(&'a InventoryItem, &'a ItemDefinition),
    PreparedSpell {
        definition: &'a SpellDefinition,
        ability: Option<Ability>,
    },
}

impl AttackSource<'_> {
    fn label(&self) -> &str {
        match self {
            AttackSource::SimpleAction(action) => &action.name,
            AttackSource::CustomAction(action) => &action.name,
            AttackSource::WeaponItem(_, definition) => &definition.name,
            AttackSource::PreparedSpell { definition, .. } => &definition.name,
        }
    }
}

/// Values shared by every source in one resolution pass.
struct Context<'a> {
    sheet: &'a CharacterSheet,
    abilities: &'a AbilityBlock,
    proficiency: i64,
    styles: &'a BTreeSet<FightingStyle>,
    weapon_proficiencies: HashSet<String>,
}

impl Context<'_> {
    fn modifier(&self, ability: Option<Ability>) -> i64 {
        ability.map(|a| self.abilities.modifier(a)).unwrap_or(0)
    }

    fn stat_modifier(&self, stat_id: Option<i64>) -> i64 {
        self.modifier(stat_id.and_then(|id| self.sheet.tables().ability(id)))
    }

    fn has_style(&self, style: FightingStyle) -> bool {
        self.styles.contains(&style)
    }
}

/// Hands out unique names: a repeated name gets 2, 3, ... appended.
/// Names compare case-insensitively, like every attack lookup.
#[derive(Default)]
struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    fn claim(&mut self, name: String) -> String {
        if self.used.insert(name.to_lowercase()) {
            return name;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{name}{n}");
            if self.used.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Fighting styles chosen through the sheet's options.
pub fn resolve_fighting_styles(sheet: &CharacterSheet) -> BTreeSet<FightingStyle> {
    by_source(&sheet.raw().options)
        .flat_map(|(_, options)| options.iter())
        .filter_map(|option| option.definition.as_ref())
        .filter_map(|definition| FightingStyle::from_name(&definition.name))
        .collect()
}

/// Resolve every attack on the sheet.
pub fn resolve(sheet: &CharacterSheet) -> AttackBook {
    let context = Context {
        sheet,
        abilities: sheet.abilities(),
        proficiency: sheet.abilities().proficiency_bonus(),
        styles: sheet.fighting_styles(),
        weapon_proficiencies: weapon_proficiencies(sheet),
    };

    let mut names = NameRegistry::default();
    let mut computed = Vec::new();
    let mut failures = Vec::new();
    for source in collect_sources(sheet) {
        match resolve_source(&context, &source) {
            Ok(attacks) => {
                for mut attack in attacks {
                    attack.name = names.claim(attack.name);
                    computed.push(attack);
                }
            }
            Err(e) => {
                warn!(character = %sheet.name(), source = source.label(), error = %e, "skipping attack");
                failures.push(e);
            }
        }
    }

    let custom = sheet.notes().attacks.clone();
    computed.retain(|attack| {
        !custom
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&attack.name))
    });

    let attacks: Vec<Attack> = custom.into_iter().chain(computed).collect();
    debug!(character = %sheet.name(), count = attacks.len(), failed = failures.len(), "resolved attacks");
    AttackBook { attacks, failures }
}

fn collect_sources(sheet: &CharacterSheet) -> Vec<AttackSource<'_>> {
    let raw = sheet.raw();
    let tables = sheet.tables();
    let adjustments = sheet.adjustments();
    let mut sources = Vec::new();

    for (_, actions) in by_source(&raw.actions) {
        sources.extend(
            actions
                .iter()
                .filter(|a| a.display_as_attack == Some(true))
                .map(AttackSource::SimpleAction),
        );
    }

    sources.extend(
        raw.custom_actions
            .iter()
            .filter(|a| a.display_as_attack != Some(false))
            .map(AttackSource::CustomAction),
    );

    for item in &raw.inventory {
        let Some(definition) = &item.definition else {
            continue;
        };
        let is_weapon = definition.filter_type.as_deref() == Some("Weapon");
        // non-weapons opt in, weapons may opt out
        if item.equipped && item.display_as_attack.unwrap_or(is_weapon) {
            sources.push(AttackSource::WeaponItem(item, definition));
        }
    }

    let shown = |entry: &SpellEntry| {
        entry.display_as_attack == Some(true)
            || entry
                .id
                .is_some_and(|id| adjustments.flag(kind::DISPLAY_AS_ATTACK, id))
    };
    let ability_of = |id: Option<i64>| id.and_then(|id| tables.ability(id));

    // Spells granted by race, feats and items are always available.
    for (_, entries) in by_source(&raw.spells) {
        for entry in entries.iter().filter(|e| shown(*e)) {
            if let Some(definition) = &entry.definition {
                sources.push(AttackSource::PreparedSpell {
                    definition,
                    ability: ability_of(entry.spell_casting_ability_id),
                });
            }
        }
    }

    for list in &raw.class_spells {
        let class_ability = raw
            .classes
            .iter()
            .find(|c| c.id.is_some() && c.id == list.character_class_id)
            .and_then(|c| c.definition.as_ref())
            .and_then(|d| d.spell_casting_ability_id);
        for entry in &list.spells {
            let Some(definition) = &entry.definition else {
                continue;
            };
            let available = entry.prepared || entry.always_prepared || definition.level == 0;
            if available && shown(entry) {
                sources.push(AttackSource::PreparedSpell {
                    definition,
                    ability: ability_of(entry.spell_casting_ability_id.or(class_ability)),
                });
            }
        }
    }

    sources
}

fn resolve_source(context: &Context<'_>, source: &AttackSource<'_>) -> Result<Vec<Attack>, SheetError> {
    match source {
        AttackSource::SimpleAction(action) => Ok(vec![simple_action(context, action)]),
        AttackSource::CustomAction(action) => Ok(vec![custom_action(context, action)]),
        AttackSource::WeaponItem(item, definition) => weapon(context, item, definition),
        AttackSource::PreparedSpell {
            definition,
            ability,
        } => Ok(vec![spell(context, definition, *ability)]),
    }
}

/// Dice plus a signed flat bonus; a bare bonus when there are no dice.
fn damage_expression(dice: Option<String>, bonus: i64) -> Option<String> {
    match dice {
        Some(dice) => Some(format!("{dice}{}", signed(bonus))),
        None if bonus != 0 => Some(bonus.to_string()),
        None => None,
    }
}

fn save_text(dc: i64, ability: Option<Ability>) -> String {
    match ability {
        Some(ability) => format!("DC {dc} {} save", ability.abbreviation()),
        None => format!("DC {dc} save"),
    }
}

fn simple_action(context: &Context<'_>, action: &Action) -> Attack {
    let tables = context.sheet.tables();
    Attack {
        name: action.name.clone(),
        attack_bonus: None,
        damage: action.dice.as_ref().and_then(|d| {
            damage_expression(d.notation(), d.fixed_value.unwrap_or(0))
        }),
        damage_type: Some(tables.damage_type(action.damage_type_id)),
    }
}

fn custom_action(context: &Context<'_>, action: &CustomAction) -> Attack {
    let tables = context.sheet.tables();
    let ability = action.stat_id.and_then(|id| tables.ability(id));
    let ability_mod = context.modifier(ability);

    let attack_bonus = if ability.is_some() && action.range_id.is_some() {
        let proficiency = if action.is_proficient {
            context.proficiency
        } else {
            0
        };
        Some(AttackBonus::ToHit(
            ability_mod + proficiency + action.to_hit_bonus.unwrap_or(0),
        ))
    } else if let Some(save) = action.save_stat_id.and_then(|id| tables.ability(id)) {
        let dc = action
            .fixed_save_dc
            .unwrap_or(8 + ability_mod + context.proficiency);
        Some(AttackBonus::Save(save_text(dc, Some(save))))
    } else {
        None
    };

    let bonus = action.fixed_value.unwrap_or(0) + action.damage_bonus.unwrap_or(0) + ability_mod;
    let dice = match (action.dice_count, action.dice_type) {
        (Some(count), Some(sides)) => Some(format!("{count}d{sides}")),
        _ => None,
    };

    Attack {
        name: action.name.clone(),
        attack_bonus,
        damage: damage_expression(dice, bonus),
        damage_type: Some(tables.damage_type(action.damage_type_id)),
    }
}

/// Slugged weapon names, weapon types and categories the character is
/// proficient with.
fn weapon_proficiencies(sheet: &CharacterSheet) -> HashSet<String> {
    let tables = sheet.tables();
    let mut proficient = HashSet::new();
    for modifier in sheet.modifiers().filter(|m| m.kind == "proficiency") {
        let name = slug(&modifier.sub_type);
        if let Some(category) = name.strip_suffix("-weapons") {
            proficient.extend(tables.weapons_in(category).iter().cloned());
        }
        if let Some(friendly) = &modifier.friendly_subtype_name {
            proficient.insert(slug(friendly));
        }
        proficient.insert(name);
    }
    proficient
}

fn is_proficient(context: &Context<'_>, definition: &ItemDefinition) -> bool {
    let known = &context.weapon_proficiencies;
    let by_type = definition
        .kind
        .as_deref()
        .is_some_and(|t| known.contains(&slug(t)));
    let by_category = definition
        .category_id
        .and_then(|id| context.sheet.tables().weapon_category(id))
        .is_some_and(|category| known.contains(&format!("{category}-weapons")));
    by_type || by_category || known.contains(&slug(&definition.name))
}

fn weapon(
    context: &Context<'_>,
    item: &InventoryItem,
    definition: &ItemDefinition,
) -> Result<Vec<Attack>, SheetError> {
    let adjustments = context.sheet.adjustments();
    let abilities = context.abilities;
    let id = item.id;

    let ranged = definition.attack_type == Some(RANGED_ATTACK_TYPE);
    let two_handed = definition.has_property("Two-Handed");
    let strength = abilities.modifier(Ability::Strength);
    let dexterity = abilities.modifier(Ability::Dexterity);
    let mut attack_mod = if ranged {
        dexterity
    } else if definition.has_property("Finesse") {
        strength.max(dexterity)
    } else {
        strength
    };
    if adjustments.flag(kind::HEXBLADE_WEAPON, id) {
        attack_mod = abilities.modifier(Ability::Charisma);
    }

    let magic: i64 = definition
        .granted_modifiers
        .iter()
        .filter(|m| m.kind == "bonus" && m.sub_type == "magic")
        .filter_map(|m| m.value)
        .sum();
    let pact = adjustments.flag(kind::PACT_WEAPON, id);
    let proficient = pact || is_proficient(context, definition);

    let mut to_hit = attack_mod
        + if proficient { context.proficiency } else { 0 }
        + magic
        + adjustments.number(kind::TO_HIT_BONUS, id).unwrap_or(0);
    if ranged && context.has_style(FightingStyle::Archery) {
        to_hit += 2;
    }
    if let Some(value) = adjustments.number(kind::TO_HIT_OVERRIDE, id) {
        to_hit = value;
    }

    let mut damage_mod = attack_mod;
    if adjustments.flag(kind::DUAL_WIELD, id) && !context.has_style(FightingStyle::TwoWeaponFighting) {
        damage_mod = 0;
    }
    let base_bonus = damage_mod + magic + adjustments.number(kind::FIXED_VALUE_BONUS, id).unwrap_or(0);
    let dueling = !ranged && !two_handed && context.has_style(FightingStyle::Dueling);
    let mut one_hand_bonus = base_bonus + if dueling { 2 } else { 0 };
    let mut two_hand_bonus = base_bonus;
    if let Some(value) = adjustments.number(kind::FIXED_VALUE_OVERRIDE, id) {
        one_hand_bonus = value;
        two_hand_bonus = value;
    }

    let great_weapon = !ranged && context.has_style(FightingStyle::GreatWeaponFighting);
    let mut dice = definition.damage.as_ref().and_then(|d| d.notation());
    if great_weapon && two_handed {
        dice = dice.map(|d| great_weapon_dice(&d));
    }

    let name = adjustments
        .text(kind::NAME_OVERRIDE, id)
        .unwrap_or(&definition.name)
        .to_string();
    let damage_type = definition.damage_type.as_ref().map(|t| {
        let marker = if definition.magic || pact { "^" } else { "" };
        format!("{}{marker}", t.to_lowercase())
    });

    let mut attacks = vec![Attack {
        name: name.clone(),
        attack_bonus: Some(AttackBonus::ToHit(to_hit)),
        damage: damage_expression(dice, one_hand_bonus),
        damage_type: damage_type.clone(),
    }];

    if let Some(versatile) = definition.property("Versatile") {
        let annotation = versatile.notes.clone().unwrap_or_default();
        if !VERSATILE_DIE.is_match(&annotation) {
            return Err(SheetError::InvalidVersatileDie {
                item: name,
                annotation,
            });
        }
        let mut die = annotation.trim().to_string();
        if great_weapon {
            die = great_weapon_dice(&die);
        }
        attacks.push(Attack {
            name: format!("{name}{TWO_HANDED_SUFFIX}"),
            attack_bonus: Some(AttackBonus::ToHit(to_hit)),
            damage: damage_expression(Some(die), two_hand_bonus),
            damage_type,
        });
    }

    Ok(attacks)
}

fn spell(context: &Context<'_>, definition: &SpellDefinition, ability: Option<Ability>) -> Attack {
    let sheet = context.sheet;
    let ability_mod = context.modifier(ability);
    let stat_modifier = |stat_id: i64| context.stat_modifier(Some(stat_id));

    let attack_bonus = if definition.requires_attack_roll {
        Some(AttackBonus::ToHit(stats::aggregate(
            sheet.modifiers(),
            subtype::SPELL_ATTACKS,
            ability_mod + context.proficiency,
            stat_modifier,
        )))
    } else if definition.requires_saving_throw {
        let dc = stats::aggregate(
            sheet.modifiers(),
            subtype::SPELL_SAVE_DC,
            8 + ability_mod + context.proficiency,
            stat_modifier,
        );
        let save = definition
            .save_dc_ability_id
            .and_then(|id| sheet.tables().ability(id));
        Some(AttackBonus::Save(save_text(dc, save)))
    } else {
        None
    };

    let (damage, damage_type) = match definition.modifiers.iter().find(|m| m.kind == "damage") {
        Some(modifier) => {
            let scaled = modifier
                .at_higher_levels
                .as_ref()
                .and_then(|h| {
                    h.higher_level_definitions
                        .iter()
                        .filter(|s| s.level.is_some_and(|l| l <= sheet.levels().total))
                        .max_by_key(|s| s.level)
                })
                .and_then(|s| s.dice.as_ref());
            let die = scaled.or(modifier.die.as_ref());
            let mut bonus = die.and_then(|d| d.fixed_value).unwrap_or(0);
            if modifier.use_primary_stat {
                bonus += ability_mod;
            }
            (
                damage_expression(die.and_then(|d| d.notation()), bonus),
                Some(format!("{}^", slug(&modifier.sub_type))),
            )
        }
        None => (None, None),
    };

    Attack {
        name: definition.name.clone(),
        attack_bonus,
        damage,
        damage_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_character, sample_sheet, sheet_from};
    use serde_json::json;

    fn longsword(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "equipped": true,
            "definition": {
                "name": "Longsword",
                "filterType": "Weapon",
                "type": "Longsword",
                "categoryId": 2,
                "attackType": 1,
                "damage": {"diceString": "1d8"},
                "damageType": "Slashing",
                "properties": [{"name": "Versatile", "notes": "1d10"}]
            }
        })
    }

    #[test]
    fn test_signed() {
        assert_eq!(signed(0), "");
        assert_eq!(signed(3), "+3");
        assert_eq!(signed(-2), "-2");
    }

    #[test]
    fn test_fighting_style_names() {
        assert_eq!(FightingStyle::from_name("Dueling"), Some(FightingStyle::Dueling));
        assert_eq!(
            FightingStyle::from_name("Fighting Style: Great Weapon Fighting"),
            Some(FightingStyle::GreatWeaponFighting)
        );
        assert_eq!(FightingStyle::from_name("Action Surge"), None);
    }

    #[test]
    fn test_great_weapon_dice() {
        assert_eq!(great_weapon_dice("2d6"), "2g6");
        assert_eq!(great_weapon_dice("1d10+3"), "1g10+3");
        assert_eq!(great_weapon_dice("5"), "5");
    }

    #[test]
    fn test_name_registry() {
        let mut names = NameRegistry::default();
        assert_eq!(names.claim("Dagger".into()), "Dagger");
        assert_eq!(names.claim("Dagger".into()), "Dagger2");
        assert_eq!(names.claim("Dagger".into()), "Dagger3");
        assert_eq!(names.claim("dagger".into()), "dagger4");
        assert_eq!(names.claim("DAGGER2".into()), "DAGGER22");
    }

    #[test]
    fn test_sample_longsword_and_versatile() {
        let sheet = sample_sheet();
        let book = sheet.attacks();
        // STR +3, proficiency +3, Dueling +2 on the one-handed grip
        let sword = book.find("Longsword").unwrap();
        assert_eq!(sword.attack_bonus, Some(AttackBonus::ToHit(6)));
        assert_eq!(sword.damage.as_deref(), Some("1d8+5"));
        assert_eq!(sword.damage_type.as_deref(), Some("slashing"));

        let two_handed = book.find("longsword2h").unwrap();
        assert_eq!(two_handed.attack_bonus, Some(AttackBonus::ToHit(6)));
        assert_eq!(two_handed.damage.as_deref(), Some("1d10+3"));
        assert!(book.failures.is_empty());
    }

    #[test]
    fn test_duplicate_weapon_names() {
        let mut doc = sample_character();
        doc["inventory"] = json!([longsword(1), longsword(2)]);
        let sheet = sheet_from(doc);
        let names: Vec<_> = sheet.attacks().names().collect();
        assert!(names.contains(&"Longsword"));
        assert!(names.contains(&"Longsword2"));
        assert!(names.contains(&"Longsword2h"));
        assert!(names.contains(&"Longsword2h2"));
    }

    #[test]
    fn test_bad_versatile_die_is_reported() {
        let mut doc = sample_character();
        let mut sword = longsword(7);
        sword["definition"]["properties"] = json!([{"name": "Versatile", "notes": "one d10"}]);
        doc["inventory"] = json!([sword, {
            "id": 8,
            "equipped": true,
            "definition": {
                "name": "Dagger", "filterType": "Weapon", "type": "Dagger", "categoryId": 1,
                "attackType": 1, "damage": {"diceString": "1d4"}, "damageType": "Piercing",
                "properties": [{"name": "Finesse"}]
            }
        }]);
        let sheet = sheet_from(doc);
        let book = sheet.attacks();
        assert!(book.find("Longsword").is_none());
        assert!(book.find("Dagger").is_some());
        assert!(matches!(
            &book.failures[..],
            [SheetError::InvalidVersatileDie { annotation, .. }] if annotation == "one d10"
        ));
    }

    #[test]
    fn test_unproficient_finesse_weapon() {
        let mut doc = sample_character();
        doc["modifiers"]["class"] = json!([]);
        doc["inventory"] = json!([{
            "id": 9,
            "equipped": true,
            "definition": {
                "name": "Rapier", "filterType": "Weapon", "type": "Rapier", "categoryId": 2,
                "attackType": 1, "damage": {"diceString": "1d8"}, "damageType": "Piercing",
                "properties": [{"name": "Finesse"}]
            }
        }]);
        let sheet = sheet_from(doc);
        let rapier = sheet.attack("Rapier").unwrap();
        // max(STR +3, DEX +2), no proficiency, Dueling +2 damage
        assert_eq!(rapier.attack_bonus, Some(AttackBonus::ToHit(3)));
        assert_eq!(rapier.damage.as_deref(), Some("1d8+5"));
    }

    #[test]
    fn test_archery_and_ranged_dexterity() {
        let mut doc = sample_character();
        doc["options"]["class"] = json!([{"definition": {"name": "Archery"}}]);
        doc["inventory"] = json!([{
            "id": 11,
            "equipped": true,
            "definition": {
                "name": "Longbow", "filterType": "Weapon", "type": "Longbow", "categoryId": 2,
                "attackType": 2, "damage": {"diceString": "1d8"}, "damageType": "Piercing",
                "properties": [{"name": "Two-Handed"}, {"name": "Ammunition"}]
            }
        }]);
        let sheet = sheet_from(doc);
        let bow = sheet.attack("Longbow").unwrap();
        // DEX +2, proficiency +3, Archery +2
        assert_eq!(bow.attack_bonus, Some(AttackBonus::ToHit(7)));
        assert_eq!(bow.damage.as_deref(), Some("1d8+2"));
    }

    #[test]
    fn test_great_weapon_fighting() {
        let mut doc = sample_character();
        doc["options"]["class"] = json!([{"definition": {"name": "Great Weapon Fighting"}}]);
        doc["inventory"] = json!([longsword(1), {
            "id": 12,
            "equipped": true,
            "definition": {
                "name": "Greatsword", "filterType": "Weapon", "type": "Greatsword", "categoryId": 2,
                "attackType": 1, "damage": {"diceString": "2d6"}, "damageType": "Slashing",
                "properties": [{"name": "Two-Handed"}, {"name": "Heavy"}]
            }
        }]);
        let sheet = sheet_from(doc);
        assert_eq!(sheet.attack("Greatsword").unwrap().damage.as_deref(), Some("2g6+3"));
        assert_eq!(sheet.attack("Longsword").unwrap().damage.as_deref(), Some("1d8+3"));
        assert_eq!(sheet.attack("Longsword2h").unwrap().damage.as_deref(), Some("1g10+3"));
    }

    #[test]
    fn test_dual_wield_drops_ability_modifier() {
        let mut doc = sample_character();
        doc["options"]["class"] = json!([]);
        doc["inventory"] = json!([longsword(21)]);
        doc["characterValues"] = json!([{"typeId": 18, "valueId": "21", "value": true}]);
        let sheet = sheet_from(doc.clone());
        let sword = sheet.attack("Longsword").unwrap();
        assert_eq!(sword.attack_bonus, Some(AttackBonus::ToHit(6)));
        assert_eq!(sword.damage.as_deref(), Some("1d8"));

        // STR 6 + 1 + 1 = 8, a -1 modifier that the off hand loses as well
        doc["stats"][0]["value"] = json!(6);
        let sheet = sheet_from(doc.clone());
        let sword = sheet.attack("Longsword").unwrap();
        assert_eq!(sword.attack_bonus, Some(AttackBonus::ToHit(2)));
        assert_eq!(sword.damage.as_deref(), Some("1d8"));

        doc["characterValues"] = json!([]);
        let sheet = sheet_from(doc);
        assert_eq!(sheet.attack("Longsword").unwrap().damage.as_deref(), Some("1d8-1"));
    }

    #[test]
    fn test_item_display_as_attack() {
        let mut sword = longsword(51);
        sword["displayAsAttack"] = json!(false);
        let mut doc = sample_character();
        doc["inventory"] = json!([
            sword,
            {
                "id": 52,
                "equipped": true,
                "displayAsAttack": true,
                "definition": {
                    "name": "Staff of Fire",
                    "filterType": "Staff",
                    "type": "Staff",
                    "attackType": 1,
                    "damage": {"diceString": "1d6"},
                    "damageType": "Bludgeoning",
                    "magic": true
                }
            },
            {
                "id": 53,
                "equipped": false,
                "displayAsAttack": true,
                "definition": {"name": "Wand of Sparks", "filterType": "Wand"}
            },
            {
                "id": 54,
                "equipped": true,
                "definition": {"name": "Ring of Warmth", "filterType": "Ring"}
            }
        ]);
        let sheet = sheet_from(doc);
        let names: Vec<_> = sheet.attacks().names().collect();
        assert_eq!(names, vec!["Staff of Fire"]);
        assert_eq!(
            sheet.attack("staff of fire").unwrap().damage_type.as_deref(),
            Some("bludgeoning^")
        );
    }

    #[test]
    fn test_numeric_name_override() {
        let mut doc = sample_character();
        doc["inventory"] = json!([longsword(1)]);
        doc["characterValues"] = json!([{"typeId": 8, "valueId": "1", "value": "1984"}]);
        let sheet = sheet_from(doc);
        let names: Vec<_> = sheet.attacks().names().collect();
        assert_eq!(names, vec!["1984", "19842h"]);
    }

    #[test]
    fn test_names_dedupe_ignoring_case() {
        let mut doc = sample_character();
        let mut lower = longsword(62);
        lower["definition"]["name"] = json!("longsword");
        doc["inventory"] = json!([longsword(61), lower]);
        let sheet = sheet_from(doc);
        let names: Vec<_> = sheet.attacks().names().collect();
        assert_eq!(names, vec!["Longsword", "Longsword2h", "longsword2", "longsword2h2"]);
    }

    #[test]
    fn test_weapon_adjustments() {
        let mut doc = sample_character();
        doc["options"]["class"] = json!([]);
        doc["inventory"] = json!([longsword(31)]);
        doc["characterValues"] = json!([
            {"typeId": 8, "valueId": "31", "value": "Dawnbringer"},
            {"typeId": 12, "valueId": "31", "value": 1},
            {"typeId": 10, "valueId": "31", "value": 2},
            {"typeId": 28, "valueId": "31", "value": true},
        ]);
        let sheet = sheet_from(doc);
        let sword = sheet.attack("Dawnbringer").unwrap();
        assert_eq!(sword.attack_bonus, Some(AttackBonus::ToHit(7)));
        assert_eq!(sword.damage.as_deref(), Some("1d8+5"));
        assert_eq!(sword.damage_type.as_deref(), Some("slashing^"));
        assert!(sheet.attack("Dawnbringer2h").is_ok());
    }

    #[test]
    fn test_hexblade_weapon_uses_charisma() {
        let mut doc = sample_character();
        doc["options"]["class"] = json!([]);
        doc["inventory"] = json!([longsword(41)]);
        doc["characterValues"] = json!([
            {"typeId": 29, "valueId": "41", "value": true},
            {"typeId": 13, "valueId": "41", "value": 9},
            {"typeId": 11, "valueId": "41", "value": 4},
        ]);
        let sheet = sheet_from(doc);
        let sword = sheet.attack("Longsword").unwrap();
        assert_eq!(sword.attack_bonus, Some(AttackBonus::ToHit(9)));
        assert_eq!(sword.damage.as_deref(), Some("1d8+4"));
    }

    #[test]
    fn test_simple_action() {
        let mut doc = sample_character();
        doc["actions"] = json!({"race": [
            {"name": "Breath Weapon", "displayAsAttack": true,
             "dice": {"diceCount": 2, "diceValue": 6}, "damageTypeId": 3},
            {"name": "Hidden", "displayAsAttack": false}
        ]});
        let sheet = sheet_from(doc);
        let breath = sheet.attack("breath weapon").unwrap();
        assert_eq!(breath.attack_bonus, None);
        assert_eq!(breath.damage.as_deref(), Some("2d6"));
        assert_eq!(breath.damage_type.as_deref(), Some("fire"));
        assert!(sheet.attack("Hidden").is_err());
    }

    #[test]
    fn test_custom_actions() {
        let mut doc = sample_character();
        doc["customActions"] = json!([
            {"name": "Shove", "statId": 1, "rangeId": 1, "isProficient": true,
             "toHitBonus": 1, "diceCount": 1, "diceType": 4, "damageBonus": 1, "damageTypeId": 1},
            {"name": "Spit", "statId": 3, "saveStatId": 2, "diceCount": 2, "diceType": 8},
            {"name": "Glare", "saveStatId": 5, "fixedSaveDc": 15},
        ]);
        let sheet = sheet_from(doc);

        let shove = sheet.attack("Shove").unwrap();
        assert_eq!(shove.attack_bonus, Some(AttackBonus::ToHit(7)));
        assert_eq!(shove.damage.as_deref(), Some("1d4+4"));
        assert_eq!(shove.damage_type.as_deref(), Some("bludgeoning"));

        // 8 + CON +2 + proficiency 3
        let spit = sheet.attack("Spit").unwrap();
        assert_eq!(spit.attack_bonus, Some(AttackBonus::Save("DC 13 DEX save".into())));
        assert_eq!(spit.damage.as_deref(), Some("2d8+2"));
        assert_eq!(spit.damage_type.as_deref(), Some("damage"));

        let glare = sheet.attack("Glare").unwrap();
        assert_eq!(glare.attack_bonus, Some(AttackBonus::Save("DC 15 WIS save".into())));
        assert_eq!(glare.damage, None);
    }

    #[test]
    fn test_cantrip_scales_with_character_level() {
        let mut doc = sample_character();
        doc["classes"][0]["definition"]["spellCastingAbilityId"] = json!(4);
        doc["classSpells"] = json!([{
            "characterClassId": 1,
            "spells": [{
                "id": 501,
                "displayAsAttack": true,
                "definition": {
                    "name": "Fire Bolt", "level": 0, "requiresAttackRoll": true,
                    "scaleType": "characterlevel",
                    "modifiers": [{
                        "type": "damage", "subType": "fire", "die": {"diceString": "1d10"},
                        "atHigherLevels": {"higherLevelDefinitions": [
                            {"level": 5, "dice": {"diceString": "2d10"}},
                            {"level": 11, "dice": {"diceString": "3d10"}}
                        ]}
                    }]
                }
            }, {
                "id": 502,
                "definition": {"name": "Ray of Frost", "level": 0, "requiresAttackRoll": true}
            }]
        }]);
        let sheet = sheet_from(doc);
        let bolt = sheet.attack("Fire Bolt").unwrap();
        // INT +0, proficiency +3
        assert_eq!(bolt.attack_bonus, Some(AttackBonus::ToHit(3)));
        assert_eq!(bolt.damage.as_deref(), Some("2d10"));
        assert_eq!(bolt.damage_type.as_deref(), Some("fire^"));
        assert!(sheet.attack("Ray of Frost").is_err());
    }

    #[test]
    fn test_save_spell_and_display_adjustment() {
        let mut doc = sample_character();
        doc["spells"] = json!({"race": [{
            "id": 601,
            "spellCastingAbilityId": 6,
            "definition": {
                "name": "Hellish Rebuke", "level": 1, "requiresSavingThrow": true,
                "saveDcAbilityId": 2, "scaleType": "spellscale",
                "modifiers": [{
                    "type": "damage", "subType": "fire", "die": {"diceString": "2d10"},
                    "atHigherLevels": {"higherLevelDefinitions": [{"level": 2, "dice": {"diceString": "3d10"}}]}
                }]
            }
        }]});
        doc["characterValues"] = json!([{"typeId": 50, "valueId": "601", "value": true}]);
        doc["modifiers"]["item"] = json!([{"type": "bonus", "subType": "spell-save-dc", "value": 1}]);
        let sheet = sheet_from(doc);
        let rebuke = sheet.attack("Hellish Rebuke").unwrap();
        // 8 + CHA -1 + proficiency 3 + item bonus 1
        assert_eq!(rebuke.attack_bonus, Some(AttackBonus::Save("DC 11 DEX save".into())));
        // level 5 unlocks the level 2 entry
        assert_eq!(rebuke.damage.as_deref(), Some("3d10"));
    }

    #[test]
    fn test_notes_attacks_come_first_and_replace() {
        let mut doc = sample_character();
        doc["notes"] = json!({"otherNotes": "longsword: 9, 2d8+4, radiant\nsmite: DC 15 CON save, 4d6, thunder"});
        let sheet = sheet_from(doc);
        let book = sheet.attacks();
        assert_eq!(book.attacks[0].name, "longsword");
        assert_eq!(book.attacks[1].name, "smite");
        assert_eq!(book.attacks.iter().filter(|a| a.name.eq_ignore_ascii_case("longsword")).count(), 1);
        assert_eq!(book.find("LONGSWORD").unwrap().damage.as_deref(), Some("2d8+4"));
        assert!(book.find("Longsword2h").is_some());
    }

    #[test]
    fn test_notes_attack_replaces_deduplicated_name() {
        let mut doc = sample_character();
        doc["inventory"] = json!([longsword(71), longsword(72)]);
        doc["notes"] = json!({"otherNotes": "LONGSWORD2: +9, 2d6, cold"});
        let sheet = sheet_from(doc);
        let names: Vec<_> = sheet.attacks().names().collect();
        assert_eq!(names, vec!["LONGSWORD2", "Longsword", "Longsword2h", "Longsword2h2"]);
        assert_eq!(
            sheet.attack("longsword2").unwrap().attack_bonus,
            Some(AttackBonus::ToHit(9))
        );
    }

    #[test]
    fn test_attack_display() {
        let attack = Attack {
            name: "Longsword".into(),
            attack_bonus: Some(AttackBonus::ToHit(6)),
            damage: Some("1d8+5".into()),
            damage_type: Some("slashing".into()),
        };
        assert_eq!(attack.to_string(), "Longsword: +6, 1d8+5, slashing");
    }
}

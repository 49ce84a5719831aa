//! Testing utilities for sheet resolution.
//!
//! This module provides tools for tests that never touch the network:
//! - `ScriptedRoller` replays fixed die faces
//! - `StaticSource` serves documents from memory
//! - `sample_config` / `sample_character` fixtures describing a level 5
//!   fighter

use crate::dice::DieRoller;
use crate::error::SheetError;
use crate::sheet::CharacterSheet;
use crate::source::DocumentSource;
use crate::tables::{ConfigDocument, Tables};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A die roller that returns scripted faces in order.
///
/// Faces are clamped to the die being rolled. Once the script runs out,
/// every roll is a 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoller {
    faces: VecDeque<i64>,
    rolled: usize,
}

impl ScriptedRoller {
    pub fn new(faces: impl IntoIterator<Item = i64>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            rolled: 0,
        }
    }

    /// Number of faces handed out so far.
    pub fn rolled(&self) -> usize {
        self.rolled
    }

    /// Faces not yet used.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DieRoller for ScriptedRoller {
    fn roll(&mut self, sides: i64) -> i64 {
        self.rolled += 1;
        self.faces.pop_front().unwrap_or(1).clamp(1, sides.max(1))
    }
}

/// An in-memory document source.
#[derive(Debug, Default)]
pub struct StaticSource {
    config: Value,
    characters: HashMap<u64, Value>,
    config_fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_character(mut self, id: u64, document: Value) -> Self {
        self.characters.insert(id, document);
        self
    }

    /// How many times the config has been requested.
    pub fn config_fetches(&self) -> usize {
        self.config_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch_config(&self) -> Result<Value, SheetError> {
        self.config_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.config.clone())
    }

    async fn fetch_character(&self, id: u64) -> Result<Value, SheetError> {
        self.characters
            .get(&id)
            .cloned()
            .ok_or_else(|| SheetError::CharacterNotFound {
                id,
                reason: "no such character".to_string(),
            })
    }
}

/// Lookup tables built from [`sample_config`].
pub fn sample_tables() -> Arc<Tables> {
    let config: ConfigDocument =
        serde_json::from_value(sample_config()).expect("sample config parses");
    Arc::new(Tables::from_config(&config).expect("sample config is complete"))
}

/// Wrap a character document using the sample tables.
pub fn sheet_from(document: Value) -> CharacterSheet {
    CharacterSheet::from_json(sample_tables(), document).expect("character document parses")
}

/// The sample character as a sheet.
pub fn sample_sheet() -> CharacterSheet {
    sheet_from(sample_character())
}

/// A trimmed config document with the registries the resolvers read.
pub fn sample_config() -> Value {
    json!({
        "stats": [
            {"id": 1, "name": "Strength"},
            {"id": 2, "name": "Dexterity"},
            {"id": 3, "name": "Constitution"},
            {"id": 4, "name": "Intelligence"},
            {"id": 5, "name": "Wisdom"},
            {"id": 6, "name": "Charisma"}
        ],
        "abilitySkills": [
            {"id": 2, "name": "Athletics", "stat": 1},
            {"id": 3, "name": "Acrobatics", "stat": 2},
            {"id": 4, "name": "Sleight of Hand", "stat": 2},
            {"id": 5, "name": "Stealth", "stat": 2},
            {"id": 6, "name": "Arcana", "stat": 4},
            {"id": 7, "name": "History", "stat": 4},
            {"id": 8, "name": "Investigation", "stat": 4},
            {"id": 9, "name": "Nature", "stat": 4},
            {"id": 10, "name": "Religion", "stat": 4},
            {"id": 11, "name": "Animal Handling", "stat": 5},
            {"id": 12, "name": "Insight", "stat": 5},
            {"id": 13, "name": "Medicine", "stat": 5},
            {"id": 14, "name": "Perception", "stat": 5},
            {"id": 15, "name": "Survival", "stat": 5},
            {"id": 16, "name": "Deception", "stat": 6},
            {"id": 17, "name": "Intimidation", "stat": 6},
            {"id": 18, "name": "Performance", "stat": 6},
            {"id": 19, "name": "Persuasion", "stat": 6}
        ],
        "adjustmentTypes": [
            {"id": 8, "name": "Name Override"},
            {"id": 10, "name": "Fixed Value Bonus"},
            {"id": 11, "name": "Fixed Value Override"},
            {"id": 12, "name": "To Hit Bonus"},
            {"id": 13, "name": "To Hit Override"},
            {"id": 18, "name": "Dual Wield"},
            {"id": 23, "name": "Skill Override"},
            {"id": 24, "name": "Skill Magic Bonus"},
            {"id": 25, "name": "Skill Misc Bonus"},
            {"id": 26, "name": "Skill Proficiency Level"},
            {"id": 27, "name": "Skill Stat Override"},
            {"id": 28, "name": "Is Pact Weapon"},
            {"id": 29, "name": "Is Hexblade Weapon"},
            {"id": 38, "name": "Saving Throw Override"},
            {"id": 39, "name": "Saving Throw Magic Bonus"},
            {"id": 40, "name": "Saving Throw Misc Bonus"},
            {"id": 41, "name": "Saving Throw Proficiency Level"},
            {"id": 50, "name": "Display As Attack"}
        ],
        "damageTypes": [
            {"id": 1, "name": "Bludgeoning"},
            {"id": 2, "name": "Piercing"},
            {"id": 3, "name": "Fire"},
            {"id": 4, "name": "Slashing"},
            {"id": 5, "name": "Cold"}
        ],
        "weaponCategories": [
            {"id": 1, "name": "Simple"},
            {"id": 2, "name": "Martial"}
        ],
        "weapons": [
            {"name": "Club", "categoryId": 1},
            {"name": "Dagger", "categoryId": 1},
            {"name": "Light Crossbow", "categoryId": 1},
            {"name": "Greatsword", "categoryId": 2},
            {"name": "Longbow", "categoryId": 2},
            {"name": "Longsword", "categoryId": 2},
            {"name": "Rapier", "categoryId": 2},
            {"name": "Shortsword", "categoryId": 2}
        ]
    })
}

/// A level 5 Battle Master fighter with longsword, scale mail and shield.
///
/// STR 17, DEX 14, CON 14, INT 10, WIS 13 (overridden), CHA 8;
/// proficient in Athletics, Perception and STR/CON saves; Dueling style.
pub fn sample_character() -> Value {
    json!({
        "id": 12345678,
        "name": "Brenna Ironhand",
        "readonlyUrl": "https://www.dndbeyond.com/characters/12345678",
        "avatarUrl": null,
        "themeColor": {"themeColor": "#4A6D8C"},
        "stats": [
            {"id": 1, "value": 15},
            {"id": 2, "value": 14},
            {"id": 3, "value": 14},
            {"id": 4, "value": 10},
            {"id": 5, "value": 12},
            {"id": 6, "value": 8}
        ],
        "bonusStats": [
            {"id": 1, "value": 1},
            {"id": 2, "value": null},
            {"id": 3, "value": null},
            {"id": 4, "value": null},
            {"id": 5, "value": null},
            {"id": 6, "value": null}
        ],
        "overrideStats": [
            {"id": 1, "value": null},
            {"id": 2, "value": null},
            {"id": 3, "value": null},
            {"id": 4, "value": null},
            {"id": 5, "value": 13},
            {"id": 6, "value": null}
        ],
        "classes": [{
            "id": 1,
            "level": 5,
            "definition": {"name": "Fighter", "spellCastingAbilityId": null},
            "subclassDefinition": {"name": "Battle Master"}
        }],
        "modifiers": {
            "race": [
                {"type": "bonus", "subType": "strength-score", "value": 1, "isGranted": true}
            ],
            "class": [
                {"type": "proficiency", "subType": "strength-saving-throws"},
                {"type": "proficiency", "subType": "constitution-saving-throws"},
                {"type": "proficiency", "subType": "athletics", "friendlySubtypeName": "Athletics"},
                {"type": "proficiency", "subType": "perception", "friendlySubtypeName": "Perception"},
                {"type": "proficiency", "subType": "simple-weapons", "friendlySubtypeName": "Simple Weapons"},
                {"type": "proficiency", "subType": "martial-weapons", "friendlySubtypeName": "Martial Weapons"},
                {"type": "proficiency", "subType": "medium-armor"},
                {"type": "proficiency", "subType": "shields"}
            ],
            "background": [
                {"type": "language", "subType": "dwarvish"}
            ],
            "item": [],
            "feat": []
        },
        "options": {
            "class": [
                {"definition": {"name": "Dueling"}},
                {"definition": {"name": "Maneuvers: Riposte"}}
            ]
        },
        "inventory": [
            {
                "id": 1001,
                "equipped": true,
                "definition": {
                    "name": "Longsword",
                    "filterType": "Weapon",
                    "type": "Longsword",
                    "categoryId": 2,
                    "attackType": 1,
                    "damage": {"diceCount": 1, "diceValue": 8, "diceString": "1d8", "fixedValue": null},
                    "damageType": "Slashing",
                    "magic": false,
                    "properties": [{"name": "Versatile", "notes": "1d10"}],
                    "grantedModifiers": []
                }
            },
            {
                "id": 1002,
                "equipped": true,
                "definition": {
                    "name": "Scale Mail",
                    "filterType": "Armor",
                    "type": "Medium Armor",
                    "armorClass": 14,
                    "armorTypeId": 2,
                    "grantedModifiers": []
                }
            },
            {
                "id": 1003,
                "equipped": true,
                "definition": {
                    "name": "Shield",
                    "filterType": "Armor",
                    "type": "Shield",
                    "armorClass": 2,
                    "armorTypeId": 4
                }
            },
            {
                "id": 1004,
                "equipped": false,
                "definition": {
                    "name": "Dagger",
                    "filterType": "Weapon",
                    "type": "Dagger",
                    "categoryId": 1,
                    "attackType": 1,
                    "damage": {"diceString": "1d4"},
                    "damageType": "Piercing",
                    "properties": [{"name": "Finesse"}, {"name": "Light"}, {"name": "Thrown"}]
                }
            }
        ],
        "customProficiencies": [],
        "characterValues": [],
        "actions": {
            "class": [
                {"name": "Second Wind", "displayAsAttack": false}
            ]
        },
        "customActions": [],
        "spells": {"race": null, "class": [], "item": []},
        "classSpells": [],
        "notes": {
            "backstory": "Raised in the deep mines of the Iron Hills.",
            "otherNotes": "Second Wind: 1d10+5\nSuperiority: 1d8",
            "allies": null
        }
    })
}

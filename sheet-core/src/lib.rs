//! D&D Beyond character sheet engine.
//!
//! This crate provides:
//! - Lookup tables built from the D&D Beyond config document
//! - Ability scores, armor class, skills and saving throws derived from a
//!   character document, memoized per sheet
//! - A normalized attack list from weapons, spells, actions and notes
//! - A dice expression evaluator with a human-readable trace
//!
//! # Quick Start
//!
//! ```ignore
//! use sheet_core::{Advantage, BeyondSource, CharacterLoader, RandomRoller};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = CharacterLoader::new(BeyondSource::from_env()?);
//!     let sheet = loader.load(12345678).await?;
//!
//!     println!("{} has AC {}", sheet.name(), sheet.armor_class());
//!     for attack in &sheet.attacks().attacks {
//!         println!("{attack}");
//!     }
//!
//!     let roll = sheet.roll_skill("perception", Advantage::Advantage, &mut RandomRoller::thread())?;
//!     println!("{roll}");
//!     Ok(())
//! }
//! ```

pub mod adjustments;
pub mod attacks;
pub mod dice;
pub mod document;
pub mod error;
pub mod notes;
pub mod sheet;
pub mod skills;
pub mod source;
pub mod stats;
pub mod tables;
pub mod testing;

// Primary public API
pub use attacks::{Attack, AttackBonus, AttackBook, FightingStyle};
pub use dice::{evaluate, evaluate_with, split_advantage_suffix, Advantage, DiceError, DieRoller, Evaluation, RandomRoller};
pub use error::SheetError;
pub use sheet::{AttackRoll, CharacterSheet, ClassLevels};
pub use skills::{ProficiencyLevel, SkillTable};
pub use source::{BeyondSource, CharacterLoader, DocumentSource};
pub use stats::AbilityBlock;
pub use tables::{Ability, Tables};

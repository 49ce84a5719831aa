//! Where documents come from, and loading sheets from them.

use crate::error::SheetError;
use crate::sheet::CharacterSheet;
use crate::tables::{ConfigDocument, Tables};
use async_trait::async_trait;
use beyond::Beyond;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Supplies the raw config and character documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// The shared config document. Failure is `ConfigUnavailable`.
    async fn fetch_config(&self) -> Result<Value, SheetError>;

    /// One character document. Failure is `CharacterNotFound`.
    async fn fetch_character(&self, id: u64) -> Result<Value, SheetError>;
}

/// Documents fetched live from D&D Beyond.
pub struct BeyondSource {
    client: Beyond,
}

impl BeyondSource {
    pub fn new(client: Beyond) -> Self {
        Self { client }
    }

    /// Build a client from `DDB_*` environment variables.
    pub fn from_env() -> Result<Self, SheetError> {
        let client = Beyond::from_env().map_err(|e| SheetError::ConfigUnavailable(e.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl DocumentSource for BeyondSource {
    async fn fetch_config(&self) -> Result<Value, SheetError> {
        self.client.fetch_config().await.map_err(|e| {
            warn!(error = %e, "config fetch failed");
            SheetError::ConfigUnavailable(e.to_string())
        })
    }

    async fn fetch_character(&self, id: u64) -> Result<Value, SheetError> {
        self.client.fetch_character(id).await.map_err(|e| {
            warn!(id, error = %e, not_found = e.is_not_found(), "character fetch failed");
            SheetError::CharacterNotFound {
                id,
                reason: e.to_string(),
            }
        })
    }
}

/// Loads character sheets, fetching the config once per loader.
///
/// Share one loader (it is `Send + Sync`) to share the config across every
/// sheet in the process.
pub struct CharacterLoader<S> {
    source: S,
    tables: OnceCell<Arc<Tables>>,
}

impl<S: DocumentSource> CharacterLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            tables: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The lookup tables, fetching the config on first use.
    ///
    /// A failed fetch is not cached; the next call tries again.
    pub async fn tables(&self) -> Result<Arc<Tables>, SheetError> {
        let tables = self
            .tables
            .get_or_try_init(|| async {
                let document = self.source.fetch_config().await?;
                let config: ConfigDocument = serde_json::from_value(document)
                    .map_err(|e| SheetError::ConfigUnavailable(e.to_string()))?;
                let tables = Tables::from_config(&config)?;
                debug!(skills = tables.skills().len(), "built lookup tables");
                Ok::<_, SheetError>(Arc::new(tables))
            })
            .await?;
        Ok(Arc::clone(tables))
    }

    /// Fetch and wrap a character. The config (when not yet cached) and the
    /// character are fetched concurrently.
    pub async fn load(&self, id: u64) -> Result<CharacterSheet, SheetError> {
        debug!(id, "loading character");
        let (tables, document) = futures::try_join!(self.tables(), self.source.fetch_character(id))?;
        let sheet = CharacterSheet::from_json(tables, document).map_err(|e| match e {
            SheetError::Json(e) => SheetError::CharacterNotFound {
                id,
                reason: format!("malformed character document: {e}"),
            },
            other => other,
        })?;
        debug!(id, name = %sheet.name(), level = sheet.levels().total, "loaded character");
        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_character, sample_config, StaticSource};
    use serde_json::json;

    #[tokio::test]
    async fn test_load_sample() {
        let loader = CharacterLoader::new(StaticSource::new(sample_config()).with_character(7, sample_character()));
        let sheet = loader.load(7).await.unwrap();
        assert_eq!(sheet.name(), "Brenna Ironhand");
        assert_eq!(sheet.levels().total, 5);
    }

    #[tokio::test]
    async fn test_config_fetched_once() {
        let loader = CharacterLoader::new(
            StaticSource::new(sample_config())
                .with_character(1, sample_character())
                .with_character(2, sample_character()),
        );
        let first = loader.load(1).await.unwrap();
        let second = loader.load(2).await.unwrap();
        assert_eq!(loader.source().config_fetches(), 1);
        assert!(std::ptr::eq(first.tables(), second.tables()));
    }

    #[tokio::test]
    async fn test_missing_character() {
        let loader = CharacterLoader::new(StaticSource::new(sample_config()));
        assert!(matches!(
            loader.load(404).await,
            Err(SheetError::CharacterNotFound { id: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_bad_config_is_unavailable() {
        let loader = CharacterLoader::new(
            StaticSource::new(json!({"stats": []})).with_character(1, sample_character()),
        );
        assert!(matches!(
            loader.load(1).await,
            Err(SheetError::ConfigUnavailable(_))
        ));
        // not cached, so a second attempt fetches again
        assert!(loader.tables().await.is_err());
        assert_eq!(loader.source().config_fetches(), 2);
    }

    #[tokio::test]
    async fn test_malformed_character_document() {
        let loader = CharacterLoader::new(
            StaticSource::new(sample_config()).with_character(3, json!({"name": 42})),
        );
        assert!(matches!(
            loader.load(3).await,
            Err(SheetError::CharacterNotFound { id: 3, .. })
        ));
    }
}

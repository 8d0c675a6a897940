use async_trait::async_trait;
use std::path::PathBuf;

use crate::{
    error::{AppError, AppResult},
    models::Anime,
};

use super::CatalogSource;

/// Loads the catalog from a JSON array of anime records
#[derive(Debug, Clone)]
pub struct JsonFileCatalogSource {
    path: PathBuf,
}

impl JsonFileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalogSource {
    async fn load(&self) -> AppResult<Vec<Anime>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::Catalog(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let entries: Vec<Anime> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Catalog(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), count = entries.len(), "Read catalog file");

        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "json_file"
    }
}

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, CacheWriterHandle},
    error::AppResult,
    services::{
        catalog::{JsonFileCatalogSource, PostgresCatalogSource, SeedCatalogSource},
        Catalog, Explainer, GenreSpace, LlmExplainer, PreferenceStore, SearchIndex,
        TemplateExplainer,
    },
};

/// Shared application state
///
/// The catalog and everything derived from it is immutable after startup.
/// Only the preference store changes while serving.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub genre_space: Arc<GenreSpace>,
    pub search_index: Arc<SearchIndex>,
    pub explainer: Arc<dyn Explainer>,
    pub preferences: Arc<PreferenceStore>,
    pub cache: Option<Cache>,
    pub search_cache_ttl: u64,
}

impl AppState {
    /// Builds state around a loaded catalog, without caching
    pub fn new(
        catalog: Catalog,
        explainer: Arc<dyn Explainer>,
        preference_capacity: usize,
    ) -> AppResult<Self> {
        let genre_space = GenreSpace::from_catalog(&catalog);
        let search_index = SearchIndex::build(&catalog)?;

        Ok(Self {
            catalog: Arc::new(catalog),
            genre_space: Arc::new(genre_space),
            search_index: Arc::new(search_index),
            explainer,
            preferences: Arc::new(PreferenceStore::new(preference_capacity)),
            cache: None,
            search_cache_ttl: 0,
        })
    }

    /// Enables Redis caching of search results
    pub fn with_cache(mut self, cache: Cache, search_cache_ttl: u64) -> Self {
        self.cache = Some(cache);
        self.search_cache_ttl = search_cache_ttl;
        self
    }

    /// Wires up catalog, cache and explainer from configuration
    ///
    /// Also returns the cache writer handle, which must be shut down to flush
    /// pending writes.
    pub async fn from_config(config: &Config) -> anyhow::Result<(Self, Option<CacheWriterHandle>)> {
        let catalog = load_catalog(config).await?;

        let (cache, writer) = match &config.redis_url {
            Some(url) => {
                let client = create_redis_client(url)?;
                let (cache, writer) = Cache::new(client).await;
                tracing::info!("Redis cache enabled");
                (Some(cache), Some(writer))
            }
            None => {
                tracing::info!("REDIS_URL not set, caching disabled");
                (None, None)
            }
        };

        let explainer: Arc<dyn Explainer> = match &config.explainer_api_key {
            Some(api_key) => {
                let mut explainer = LlmExplainer::new(
                    api_key.clone(),
                    config.explainer_api_url.clone(),
                    config.explainer_model.clone(),
                    Duration::from_secs(config.explainer_timeout_secs),
                )?;
                if let Some(cache) = &cache {
                    explainer = explainer.with_cache(cache.clone());
                }
                Arc::new(explainer)
            }
            None => Arc::new(TemplateExplainer),
        };
        tracing::info!(explainer = explainer.name(), "Explainer configured");

        let mut state = Self::new(catalog, explainer, config.preference_store_capacity)?;
        if let Some(cache) = cache {
            state = state.with_cache(cache, config.search_cache_ttl);
        }

        Ok((state, writer))
    }
}

/// Loads the catalog from Postgres, then a JSON file, then the built-in seed
async fn load_catalog(config: &Config) -> anyhow::Result<Catalog> {
    if let Some(database_url) = &config.database_url {
        let pool = create_pool(database_url).await?;
        return Ok(Catalog::load(&PostgresCatalogSource::new(pool)).await?);
    }

    if let Some(path) = &config.catalog_path {
        return Ok(Catalog::load(&JsonFileCatalogSource::new(path)).await?);
    }

    tracing::warn!("No DATABASE_URL or CATALOG_PATH set, serving the built-in catalog");
    Ok(Catalog::load(&SeedCatalogSource).await?)
}

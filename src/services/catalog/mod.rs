//! Read-only anime catalog
//!
//! The catalog itself is owned by an external data service. This module loads a
//! snapshot of it through a pluggable `CatalogSource` (seed data, JSON file or
//! Postgres), validates it once, and serves lookups from memory.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    error::{AppError, AppResult},
    models::{Anime, AnimeId},
};

pub mod json_file;
pub mod postgres;
pub mod seed;

pub use json_file::JsonFileCatalogSource;
pub use postgres::PostgresCatalogSource;
pub use seed::SeedCatalogSource;

/// Trait for catalog backends
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every catalog entry
    async fn load(&self) -> AppResult<Vec<Anime>>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Validated, immutable catalog snapshot
#[derive(Debug)]
pub struct Catalog {
    entries: Vec<Anime>,
    by_id: HashMap<AnimeId, usize>,
    /// Lowercased title → entry index
    by_title: HashMap<String, usize>,
    /// Lowercased genre → display name, sorted by key
    genres: BTreeMap<String, String>,
}

impl Catalog {
    /// Validates entries and builds the lookup tables
    pub fn new(entries: Vec<Anime>) -> AppResult<Self> {
        if entries.is_empty() {
            return Err(AppError::Catalog("Catalog is empty".to_string()));
        }

        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_title = HashMap::with_capacity(entries.len());
        let mut genres = BTreeMap::new();

        for (index, anime) in entries.iter().enumerate() {
            if anime.id.as_str().trim().is_empty() {
                return Err(AppError::Catalog(format!(
                    "Entry at position {} has an empty id",
                    index
                )));
            }
            if anime.title.trim().is_empty() {
                return Err(AppError::Catalog(format!("Anime {} has an empty title", anime.id)));
            }
            if !(0.0..=10.0).contains(&anime.rating) {
                return Err(AppError::Catalog(format!(
                    "Anime {} has rating {} outside 0-10",
                    anime.id, anime.rating
                )));
            }
            if by_id.insert(anime.id.clone(), index).is_some() {
                return Err(AppError::Catalog(format!("Duplicate anime id {}", anime.id)));
            }

            // First entry wins when two titles collide
            by_title
                .entry(anime.title.trim().to_lowercase())
                .or_insert(index);

            for genre in &anime.genres {
                let genre = genre.trim();
                if !genre.is_empty() {
                    genres
                        .entry(genre.to_lowercase())
                        .or_insert_with(|| genre.to_string());
                }
            }
        }

        Ok(Self {
            entries,
            by_id,
            by_title,
            genres,
        })
    }

    /// Loads a snapshot from the given source
    pub async fn load(source: &dyn CatalogSource) -> AppResult<Self> {
        let entries = source.load().await?;
        let catalog = Self::new(entries)?;

        tracing::info!(
            source = source.name(),
            entries = catalog.len(),
            genres = catalog.genres.len(),
            "Catalog loaded"
        );

        Ok(catalog)
    }

    pub fn get(&self, id: &AnimeId) -> Option<&Anime> {
        self.by_id.get(id).map(|&index| &self.entries[index])
    }

    /// Resolves a user-supplied reference: catalog id first, then exact title
    pub fn resolve(&self, reference: &str) -> Option<&Anime> {
        let reference = reference.trim();
        self.get(&AnimeId::new(reference)).or_else(|| {
            self.by_title
                .get(&reference.to_lowercase())
                .map(|&index| &self.entries[index])
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anime> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display names of every genre in the catalog, sorted case-insensitively
    pub fn genres(&self) -> Vec<&str> {
        self.genres.values().map(String::as_str).collect()
    }

    /// Lowercased genre keys in vocabulary order
    pub fn genre_keys(&self) -> impl Iterator<Item = &str> {
        self.genres.keys().map(String::as_str)
    }

    /// Catalog spelling of a genre, if the catalog knows it
    pub fn canonical_genre(&self, genre: &str) -> Option<&str> {
        self.genres
            .get(&genre.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Resolves a list of references, returning the matches and the leftovers
    pub fn resolve_all<'a>(&'a self, references: &[String]) -> (Vec<&'a Anime>, Vec<String>) {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();

        for reference in references {
            match self.resolve(reference) {
                Some(anime) => {
                    if seen.insert(&anime.id) {
                        resolved.push(anime);
                    }
                }
                None => unresolved.push(reference.clone()),
            }
        }

        (resolved, unresolved)
    }
}

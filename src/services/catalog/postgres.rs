use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{Anime, AnimeId},
};

use super::CatalogSource;

/// Reads the catalog from the `anime` table owned by the catalog service
#[derive(Clone)]
pub struct PostgresCatalogSource {
    db_pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct AnimeRow {
    id: String,
    title: String,
    genres: Vec<String>,
    synopsis: Option<String>,
    rating: f64,
    year: Option<i32>,
    episodes: Option<i32>,
    tags: Option<Vec<String>>,
}

impl From<AnimeRow> for Anime {
    fn from(row: AnimeRow) -> Self {
        Anime {
            id: AnimeId(row.id),
            title: row.title,
            genres: row.genres,
            synopsis: row.synopsis.unwrap_or_default(),
            rating: row.rating,
            year: row.year,
            episodes: row.episodes,
            tags: row.tags.unwrap_or_default(),
        }
    }
}

impl PostgresCatalogSource {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CatalogSource for PostgresCatalogSource {
    async fn load(&self) -> AppResult<Vec<Anime>> {
        let rows = sqlx::query_as::<_, AnimeRow>(
            r#"
            SELECT id, title, genres, synopsis, rating, year, episodes, tags
            FROM anime
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(Anime::from).collect())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

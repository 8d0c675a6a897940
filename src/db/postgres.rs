use sqlx::{postgres::PgPoolOptions, PgPool};

/// Creates a PostgreSQL connection pool for the catalog database
///
/// The catalog is read once at startup, so the pool stays small.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await?;

    Ok(pool)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub mod anime;
pub mod mood;
pub mod user_preferences;

pub use anime::{Anime, AnimeId};
pub use mood::{Mood, UnknownMood};
pub use user_preferences::UserPreferences;

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;
pub const MAX_RECOMMENDATION_LIMIT: usize = 50;
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 100;

fn default_recommendation_limit() -> usize {
    DEFAULT_RECOMMENDATION_LIMIT
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

/// Treats an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn recommendation_limit_or_default<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<usize>::deserialize(deserializer)?.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT))
}

fn search_limit_or_default<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<usize>::deserialize(deserializer)?.unwrap_or(DEFAULT_SEARCH_LIMIT))
}

// ============================================================================
// Recommendation
// ============================================================================

/// Request for personalized recommendations
///
/// `liked_anime` and `disliked_anime` accept catalog ids or exact titles.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub liked_anime: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub disliked_anime: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(
        default = "default_recommendation_limit",
        deserialize_with = "recommendation_limit_or_default"
    )]
    pub limit: usize,
    /// Spread the result list across genres instead of taking the raw top-k
    #[serde(default, deserialize_with = "null_as_default")]
    pub diversify: bool,
}

/// Ranked recommendations with one explanation and confidence per entry
///
/// `recommendations`, `explanations` and `confidence_scores` are index-aligned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Anime>,
    pub explanations: Vec<String>,
    pub confidence_scores: Vec<f64>,
    /// Liked/disliked references that matched nothing in the catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_anime: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// Search
// ============================================================================

/// Free-text catalog search request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_search_limit", deserialize_with = "search_limit_or_default")]
    pub limit: usize,
}

/// A single search hit with its relevance in `[0, 1]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub anime: Anime,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub query: String,
    /// Number of matching entries before `limit` was applied
    pub total: usize,
}

// ============================================================================
// Explanation
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationResponse {
    pub anime_id: AnimeId,
    pub explanation: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Rounds a score to two decimals for the wire
pub fn round_score(score: f64) -> f64 {
    (score.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

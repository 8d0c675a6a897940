use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of an anime in the external catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimeId(pub String);

impl AnimeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AnimeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnimeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Anime metadata as supplied by the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anime {
    pub id: AnimeId,
    pub title: String,
    #[serde(rename = "genre", alias = "genres", default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub synopsis: String,
    /// Average score on a 0-10 scale
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Anime {
    /// Rating scaled into `[0, 1]`
    pub fn normalized_rating(&self) -> f64 {
        (self.rating / 10.0).clamp(0.0, 1.0)
    }

    /// Whether the anime carries the genre, compared case-insensitively
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g.eq_ignore_ascii_case(genre))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anime_id_display() {
        let id = AnimeId::new("16498");
        assert_eq!(format!("{}", id), "16498");
    }

    #[test]
    fn test_anime_serializes_genre_field() {
        let anime = Anime {
            id: AnimeId::new("1"),
            title: "Attack on Titan".to_string(),
            genres: vec!["Action".to_string(), "Drama".to_string()],
            synopsis: "Humanity's last stand against giant titans".to_string(),
            rating: 9.0,
            year: None,
            episodes: None,
            tags: vec![],
        };

        let json = serde_json::to_value(&anime).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["genre"][0], "Action");
        assert!(json.get("year").is_none());
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_anime_accepts_genres_alias() {
        let json = r#"{
            "id": "5114",
            "title": "Fullmetal Alchemist: Brotherhood",
            "genres": ["Action", "Adventure"],
            "rating": 9.1,
            "year": 2009
        }"#;

        let anime: Anime = serde_json::from_str(json).unwrap();
        assert_eq!(anime.genres, vec!["Action", "Adventure"]);
        assert_eq!(anime.synopsis, "");
        assert_eq!(anime.year, Some(2009));
        assert!(anime.has_genre("adventure"));
    }

    #[test]
    fn test_normalized_rating_is_clamped() {
        let mut anime: Anime = serde_json::from_str(r#"{"id":"1","title":"x","rating":8.5}"#).unwrap();
        assert!((anime.normalized_rating() - 0.85).abs() < 1e-9);
        anime.rating = 12.0;
        assert_eq!(anime.normalized_rating(), 1.0);
    }
}

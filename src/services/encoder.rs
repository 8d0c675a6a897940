//! Preference encoding
//!
//! Turns a user's liked/disliked titles, genre filters and mood into a fixed-size
//! vector over the catalog's genre vocabulary. Catalog entries live in the same
//! space, so ranking reduces to a cosine similarity.

use std::collections::{HashMap, HashSet};

use crate::{
    error::{AppError, AppResult},
    models::{Anime, AnimeId, Mood},
    services::catalog::Catalog,
};

const LIKED_WEIGHT: f64 = 1.0;
const DISLIKED_WEIGHT: f64 = -0.5;
const GENRE_FILTER_WEIGHT: f64 = 1.0;
const MOOD_WEIGHT: f64 = 0.5;

/// Genre vocabulary of a catalog, one dimension per genre
#[derive(Debug, Clone)]
pub struct GenreSpace {
    index: HashMap<String, usize>,
}

impl GenreSpace {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let index = catalog
            .genre_keys()
            .enumerate()
            .map(|(i, key)| (key.to_string(), i))
            .collect();
        Self { index }
    }

    pub fn dimension(&self) -> usize {
        self.index.len()
    }

    fn position(&self, genre: &str) -> Option<usize> {
        self.index.get(&genre.trim().to_lowercase()).copied()
    }

    /// Unit-length genre indicator vector of a catalog entry
    pub fn embed(&self, anime: &Anime) -> Vec<f64> {
        let mut vector = vec![0.0; self.dimension()];
        for genre in &anime.genres {
            if let Some(pos) = self.position(genre) {
                vector[pos] = 1.0;
            }
        }
        normalize(&mut vector);
        vector
    }

    fn add_genre(&self, vector: &mut [f64], genre: &str, weight: f64) {
        if let Some(pos) = self.position(genre) {
            vector[pos] += weight;
        }
    }
}

/// Raw preference input after catalog resolution
#[derive(Debug, Default)]
pub struct PreferenceInput<'a> {
    pub liked: Vec<&'a Anime>,
    pub disliked: Vec<&'a Anime>,
    pub genres: Vec<String>,
    pub mood: Option<Mood>,
}

/// Encoded user preferences, ready for ranking
#[derive(Debug, Clone)]
pub struct EncodedPreferences {
    /// Unit-length preference vector, all zeros on a cold start
    pub vector: Vec<f64>,
    /// Titles the user already rated, never recommended back
    pub excluded: HashSet<AnimeId>,
    /// Canonical genre names; candidates must carry at least one
    pub genre_filter: Vec<String>,
    pub mood: Option<Mood>,
}

impl EncodedPreferences {
    /// True when nothing is known about the user's taste
    pub fn is_cold_start(&self) -> bool {
        self.vector.iter().all(|v| *v == 0.0)
    }

    /// Whether a candidate passes the hard genre filter
    pub fn accepts(&self, anime: &Anime) -> bool {
        self.genre_filter.is_empty() || self.genre_filter.iter().any(|g| anime.has_genre(g))
    }
}

/// Parses a free-form mood string
pub fn parse_mood(mood: Option<&str>) -> AppResult<Option<Mood>> {
    match mood.map(str::trim).filter(|m| !m.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse::<Mood>().map(Some).map_err(|e| {
            let known: Vec<&str> = Mood::ALL.iter().map(Mood::as_str).collect();
            AppError::InvalidInput(format!("{}; expected one of: {}", e, known.join(", ")))
        }),
    }
}

/// Maps requested genres to their catalog spelling, rejecting unknown ones
pub fn canonical_genres(catalog: &Catalog, requested: &[String]) -> AppResult<Vec<String>> {
    let mut canonical: Vec<String> = Vec::with_capacity(requested.len());

    for genre in requested.iter().filter(|g| !g.trim().is_empty()) {
        let name = catalog
            .canonical_genre(genre)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown genre '{}'", genre.trim())))?;
        if !canonical.iter().any(|c| c == name) {
            canonical.push(name.to_string());
        }
    }

    Ok(canonical)
}

/// Encodes resolved preferences into the catalog's genre space
pub fn encode(space: &GenreSpace, input: &PreferenceInput<'_>) -> EncodedPreferences {
    let mut vector = vec![0.0; space.dimension()];

    for anime in &input.liked {
        for genre in &anime.genres {
            space.add_genre(&mut vector, genre, LIKED_WEIGHT);
        }
    }

    for anime in &input.disliked {
        for genre in &anime.genres {
            space.add_genre(&mut vector, genre, DISLIKED_WEIGHT);
        }
    }

    for genre in &input.genres {
        space.add_genre(&mut vector, genre, GENRE_FILTER_WEIGHT);
    }

    if let Some(mood) = input.mood {
        for genre in mood.genres() {
            space.add_genre(&mut vector, genre, MOOD_WEIGHT);
        }
    }

    normalize(&mut vector);

    let excluded = input
        .liked
        .iter()
        .chain(input.disliked.iter())
        .map(|a| a.id.clone())
        .collect();

    EncodedPreferences {
        vector,
        excluded,
        genre_filter: input.genres.clone(),
        mood: input.mood,
    }
}

/// Scales a vector to unit length in place; zero vectors are left alone
pub fn normalize(vector: &mut [f64]) {
    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product of two unit vectors
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::seed::seed_entries;

    fn catalog() -> Catalog {
        Catalog::new(seed_entries()).unwrap()
    }

    #[test]
    fn test_embed_is_unit_length() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let anime = catalog.resolve("Attack on Titan").unwrap();

        let vector = space.embed(anime);
        let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert_eq!(vector.len(), space.dimension());
    }

    #[test]
    fn test_empty_input_is_cold_start() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);

        let encoded = encode(&space, &PreferenceInput::default());
        assert!(encoded.is_cold_start());
        assert!(encoded.excluded.is_empty());
    }

    #[test]
    fn test_liked_titles_are_excluded_and_encoded() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let death_note = catalog.resolve("Death Note").unwrap();

        let encoded = encode(
            &space,
            &PreferenceInput {
                liked: vec![death_note],
                ..Default::default()
            },
        );

        assert!(!encoded.is_cold_start());
        assert!(encoded.excluded.contains(&death_note.id));
        // Death Note's own genre vector points the same way as the preference
        let similarity = cosine(&encoded.vector, &space.embed(death_note));
        assert!((similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disliked_genres_pull_away() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let monster = catalog.resolve("Monster").unwrap();
        let k_on = catalog.resolve("K-On!").unwrap();
        let another = catalog.resolve("Another").unwrap();

        let encoded = encode(
            &space,
            &PreferenceInput {
                liked: vec![monster],
                disliked: vec![another],
                ..Default::default()
            },
        );

        assert!(cosine(&encoded.vector, &space.embed(another)) < cosine(&encoded.vector, &space.embed(monster)));
        assert!(cosine(&encoded.vector, &space.embed(k_on)) <= 0.0);
    }

    #[test]
    fn test_genre_filter() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);

        let encoded = encode(
            &space,
            &PreferenceInput {
                genres: vec!["Horror".to_string()],
                ..Default::default()
            },
        );

        assert!(encoded.accepts(catalog.resolve("Another").unwrap()));
        assert!(!encoded.accepts(catalog.resolve("K-On!").unwrap()));
    }

    #[test]
    fn test_canonical_genres() {
        let catalog = catalog();
        let genres = canonical_genres(
            &catalog,
            &["sci-fi".to_string(), "SCI-FI".to_string(), " ".to_string()],
        )
        .unwrap();
        assert_eq!(genres, vec!["Sci-Fi".to_string()]);

        let err = canonical_genres(&catalog, &["Isekai".to_string()]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_mood() {
        assert_eq!(parse_mood(None).unwrap(), None);
        assert_eq!(parse_mood(Some("  ")).unwrap(), None);
        assert_eq!(parse_mood(Some("Dark")).unwrap(), Some(Mood::Dark));
        assert!(matches!(parse_mood(Some("grumpy")), Err(AppError::InvalidInput(_))));
    }
}

use good_lp::{
    default_solver, variable, Expression, ProblemVariables, Solution, SolverModel, Variable,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::{
    error::{AppError, AppResult},
    models::{round_score, Anime},
    services::{
        catalog::Catalog,
        encoder::{cosine, EncodedPreferences, GenreSpace},
    },
};

const SIMILARITY_WEIGHT: f64 = 0.8;
const RATING_WEIGHT: f64 = 0.2;
/// Diversified selection draws from this many top candidates per requested slot
const DIVERSITY_POOL_FACTOR: usize = 4;

/// A catalog entry scored against a user's preferences
#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub anime: &'a Anime,
    pub similarity: f64,
    pub score: f64,
}

impl ScoredCandidate<'_> {
    /// Score rounded for the wire, in `[0, 1]`
    pub fn confidence(&self) -> f64 {
        round_score(self.score)
    }
}

/// Scores every eligible catalog entry and returns them best-first
pub fn rank<'a>(
    catalog: &'a Catalog,
    space: &GenreSpace,
    preferences: &EncodedPreferences,
) -> Vec<ScoredCandidate<'a>> {
    let cold_start = preferences.is_cold_start();

    let mut candidates: Vec<ScoredCandidate<'a>> = catalog
        .iter()
        .filter(|anime| !preferences.excluded.contains(&anime.id))
        .filter(|anime| preferences.accepts(anime))
        .map(|anime| {
            let rating = anime.normalized_rating();
            if cold_start {
                ScoredCandidate {
                    anime,
                    similarity: 0.0,
                    score: rating,
                }
            } else {
                let similarity = cosine(&preferences.vector, &space.embed(anime));
                ScoredCandidate {
                    anime,
                    similarity,
                    score: SIMILARITY_WEIGHT * similarity.max(0.0) + RATING_WEIGHT * rating,
                }
            }
        })
        .collect();

    candidates.sort_by(compare_candidates);
    candidates
}

/// Score desc, then rating desc, then id asc
fn compare_candidates(a: &ScoredCandidate<'_>, b: &ScoredCandidate<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.anime.rating.total_cmp(&a.anime.rating))
        .then_with(|| a.anime.id.cmp(&b.anime.id))
}

/// Picks the final `limit` recommendations from a ranked list
///
/// With `diversify`, genre-balanced selection is attempted first and the plain
/// top-k is used whenever it cannot be solved.
pub fn select<'a>(
    ranked: Vec<ScoredCandidate<'a>>,
    limit: usize,
    diversify: bool,
    exempt_genres: &[String],
) -> Vec<ScoredCandidate<'a>> {
    if !diversify || ranked.len() <= 1 || limit <= 1 {
        return ranked.into_iter().take(limit).collect();
    }

    match select_diverse(&ranked, limit, exempt_genres) {
        Ok(selected) => selected,
        Err(e) => {
            tracing::warn!(error = %e, limit, "Diversified selection failed, using top-k");
            ranked.into_iter().take(limit).collect()
        }
    }
}

/// Chooses `k` candidates maximising total score under a per-genre cap
///
/// Solved as a 0/1 integer programme over the top `DIVERSITY_POOL_FACTOR * k`
/// candidates. Genres in `exempt_genres` (the user's own filters) are uncapped.
fn select_diverse<'a>(
    ranked: &[ScoredCandidate<'a>],
    limit: usize,
    exempt_genres: &[String],
) -> AppResult<Vec<ScoredCandidate<'a>>> {
    let pool = &ranked[..ranked.len().min(limit * DIVERSITY_POOL_FACTOR)];
    let k = limit.min(pool.len());
    let cap = k.div_ceil(2).max(1);

    let mut vars = ProblemVariables::new();
    let picks: Vec<Variable> = pool.iter().map(|_| vars.add(variable().binary())).collect();

    // Group candidate variables by lowercase genre
    let mut by_genre: BTreeMap<String, Vec<Variable>> = BTreeMap::new();
    for (candidate, &var) in pool.iter().zip(&picks) {
        for genre in &candidate.anime.genres {
            let key = genre.to_lowercase();
            if exempt_genres.iter().any(|g| g.eq_ignore_ascii_case(&key)) {
                continue;
            }
            by_genre.entry(key).or_default().push(var);
        }
    }

    let mut objective = Expression::from(0);
    let mut total = Expression::from(0);
    for (candidate, &var) in pool.iter().zip(&picks) {
        // Small positive floor keeps zero-score candidates selectable
        objective = objective + (candidate.score + 1e-6) * var;
        total = total + var;
    }

    let mut problem = vars.maximise(objective).using(default_solver);
    problem = problem.with(total.clone().leq(k as f64));
    problem = problem.with(total.geq(k as f64));
    for vars_in_genre in by_genre.values() {
        if vars_in_genre.len() > cap {
            let mut count = Expression::from(0);
            for &var in vars_in_genre {
                count = count + var;
            }
            problem = problem.with(count.leq(cap as f64));
        }
    }

    let solution = problem
        .solve()
        .map_err(|e| AppError::Internal(format!("Diversity solver failed: {}", e)))?;

    // Binary variables might be slightly off from 1.0 due to floating point
    let chosen: HashSet<usize> = picks
        .iter()
        .enumerate()
        .filter(|(_, &var)| solution.value(var) > 0.5)
        .map(|(i, _)| i)
        .collect();

    let mut selected: Vec<ScoredCandidate<'a>> = pool
        .iter()
        .enumerate()
        .filter(|(i, _)| chosen.contains(i))
        .map(|(_, c)| c.clone())
        .collect();
    selected.sort_by(compare_candidates);

    tracing::debug!(
        pool = pool.len(),
        selected = selected.len(),
        genre_cap = cap,
        "Diversified selection solved"
    );

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::seed::seed_entries;
    use crate::models::AnimeId;
    use crate::services::encoder::{encode, PreferenceInput};
    use tokio_test::{assert_err, assert_ok};

    fn catalog() -> Catalog {
        Catalog::new(seed_entries()).unwrap()
    }

    fn anime(id: &str, genre: &str, rating: f64) -> Anime {
        Anime {
            id: AnimeId::new(id),
            title: format!("Title {}", id),
            genres: vec![genre.to_string()],
            synopsis: String::new(),
            rating,
            year: None,
            episodes: None,
            tags: vec![],
        }
    }

    fn ids(selected: &[ScoredCandidate<'_>]) -> Vec<String> {
        selected.iter().map(|c| c.anime.id.to_string()).collect()
    }

    #[test]
    fn test_cold_start_ranks_by_rating() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(&space, &PreferenceInput::default());

        let ranked = rank(&catalog, &space, &prefs);
        assert_eq!(ranked.len(), catalog.len());
        for pair in ranked.windows(2) {
            assert!(pair[0].anime.rating >= pair[1].anime.rating);
        }
        // Ties on 9.1 broken by id ascending
        assert_eq!(ranked[0].anime.id.as_str(), "3");
        assert_eq!(ranked[1].anime.id.as_str(), "4");
    }

    #[test]
    fn test_liked_titles_are_not_recommended() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let liked = catalog.resolve("Attack on Titan").unwrap();
        let prefs = encode(
            &space,
            &PreferenceInput {
                liked: vec![liked],
                ..Default::default()
            },
        );

        let ranked = rank(&catalog, &space, &prefs);
        assert!(ranked.iter().all(|c| c.anime.id != liked.id));
        assert_eq!(ranked.len(), catalog.len() - 1);
    }

    #[test]
    fn test_similar_titles_rank_first() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(
            &space,
            &PreferenceInput {
                liked: vec![catalog.resolve("Attack on Titan").unwrap()],
                ..Default::default()
            },
        );

        let ranked = rank(&catalog, &space, &prefs);
        // FMA: Brotherhood shares Action, Drama and Fantasy
        assert_eq!(ranked[0].anime.title, "Fullmetal Alchemist: Brotherhood");
        assert!(ranked[0].confidence() > ranked.last().unwrap().confidence());
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_genre_filter_is_hard() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(
            &space,
            &PreferenceInput {
                genres: vec!["Mecha".to_string()],
                ..Default::default()
            },
        );

        let ranked = rank(&catalog, &space, &prefs);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|c| c.anime.has_genre("mecha")));
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(
            &space,
            &PreferenceInput {
                liked: vec![catalog.resolve("K-On!").unwrap()],
                disliked: vec![catalog.resolve("Another").unwrap()],
                ..Default::default()
            },
        );

        for candidate in rank(&catalog, &space, &prefs) {
            let confidence = candidate.confidence();
            assert!((0.0..=1.0).contains(&confidence));
        }
    }

    #[test]
    fn test_select_without_diversity_is_top_k() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(&space, &PreferenceInput::default());
        let ranked = rank(&catalog, &space, &prefs);
        let expected: Vec<_> = ranked.iter().take(5).map(|c| c.anime.id.clone()).collect();

        let selected = select(ranked, 5, false, &[]);
        let ids: Vec<_> = selected.iter().map(|c| c.anime.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_limit_larger_than_catalog() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(&space, &PreferenceInput::default());
        let ranked = rank(&catalog, &space, &prefs);

        let selected = select(ranked, 100, false, &[]);
        assert_eq!(selected.len(), catalog.len());
    }

    #[test]
    fn test_diversified_selection_caps_genres() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(
            &space,
            &PreferenceInput {
                liked: vec![catalog.resolve("Attack on Titan").unwrap()],
                ..Default::default()
            },
        );
        let ranked = rank(&catalog, &space, &prefs);

        let selected = select(ranked, 4, true, &[]);
        assert_eq!(selected.len(), 4);

        let action_count = selected.iter().filter(|c| c.anime.has_genre("action")).count();
        assert!(action_count <= 2, "action_count = {}", action_count);
        for pair in selected.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_infeasible_diversity_falls_back_to_top_k() {
        let catalog = catalog();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(
            &space,
            &PreferenceInput {
                genres: vec!["Mecha".to_string()],
                ..Default::default()
            },
        );
        let ranked = rank(&catalog, &space, &prefs);
        let expected = ids(&ranked);

        // Both Mecha titles also share Sci-Fi and Drama, so a cap of one per
        // genre cannot be met with two picks
        assert_err!(select_diverse(&ranked, 2, &[]));

        let selected = select(ranked, 2, true, &[]);
        assert_eq!(ids(&selected), expected);
    }

    #[test]
    fn test_exempt_genres_are_not_capped() {
        let catalog = Catalog::new(vec![
            anime("1", "Action", 9.0),
            anime("2", "Action", 8.9),
            anime("3", "Action", 8.8),
            anime("4", "Comedy", 5.0),
            anime("5", "Romance", 4.0),
        ])
        .unwrap();
        let space = GenreSpace::from_catalog(&catalog);
        let prefs = encode(&space, &PreferenceInput::default());
        let ranked = rank(&catalog, &space, &prefs);

        let capped = assert_ok!(select_diverse(&ranked, 3, &[]));
        assert_eq!(ids(&capped), vec!["1", "2", "4"]);

        let exempt = assert_ok!(select_diverse(&ranked, 3, &["Action".to_string()]));
        assert_eq!(ids(&exempt), vec!["1", "2", "3"]);
    }
}

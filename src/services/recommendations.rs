use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use crate::{
    error::{AppError, AppResult},
    models::{
        Anime, AnimeId, ExplanationResponse, RecommendationRequest, RecommendationResponse,
        UserPreferences, MAX_RECOMMENDATION_LIMIT,
    },
    services::{
        catalog::Catalog,
        encoder::{self, GenreSpace, PreferenceInput},
        explanation::{template_text, Explainer, ExplanationContext},
        ranking,
    },
};

const MAX_USER_ID_LEN: usize = 128;

/// Result of a recommendation run
#[derive(Debug)]
pub struct RecommendationOutcome {
    pub response: RecommendationResponse,
    /// Resolved preferences, for remembering against the request's user id
    pub preferences: UserPreferences,
}

/// Validates the parts of a request that do not need the catalog
pub fn validate_request(request: &RecommendationRequest) -> AppResult<()> {
    if request.limit == 0 || request.limit > MAX_RECOMMENDATION_LIMIT {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_RECOMMENDATION_LIMIT
        )));
    }

    if let Some(user_id) = &request.user_id {
        let user_id = user_id.trim();
        if user_id.is_empty() || user_id.len() > MAX_USER_ID_LEN {
            return Err(AppError::InvalidInput(format!(
                "user_id must be 1 to {} characters",
                MAX_USER_ID_LEN
            )));
        }
    }

    Ok(())
}

/// Rejects references that are both liked and disliked
fn check_conflicts(liked: &[&Anime], disliked: &[&Anime], request: &RecommendationRequest) -> AppResult<()> {
    let liked_ids: HashSet<&AnimeId> = liked.iter().map(|a| &a.id).collect();
    if let Some(conflict) = disliked.iter().find(|a| liked_ids.contains(&a.id)) {
        return Err(AppError::InvalidInput(format!(
            "'{}' cannot be both liked and disliked",
            conflict.title
        )));
    }

    // Unresolved references are compared verbatim
    let liked_raw: HashSet<String> = request
        .liked_anime
        .iter()
        .map(|r| r.trim().to_lowercase())
        .collect();
    if let Some(conflict) = request
        .disliked_anime
        .iter()
        .find(|r| liked_raw.contains(&r.trim().to_lowercase()))
    {
        return Err(AppError::InvalidInput(format!(
            "'{}' cannot be both liked and disliked",
            conflict.trim()
        )));
    }

    Ok(())
}

/// Generates personalized recommendations
///
/// 1. Resolve liked/disliked references against the catalog
/// 2. Encode preferences into the catalog's genre space
/// 3. Rank eligible titles and pick the final list
/// 4. Explain every pick concurrently
pub async fn get_recommendations(
    catalog: &Catalog,
    space: &GenreSpace,
    explainer: Arc<dyn Explainer>,
    request: &RecommendationRequest,
) -> AppResult<RecommendationOutcome> {
    let start = Instant::now();
    validate_request(request)?;

    let (liked, unresolved_liked) = catalog.resolve_all(&request.liked_anime);
    let (disliked, unresolved_disliked) = catalog.resolve_all(&request.disliked_anime);
    check_conflicts(&liked, &disliked, request)?;

    let genres = encoder::canonical_genres(catalog, &request.genres)?;
    let mood = encoder::parse_mood(request.mood.as_deref())?;

    let unresolved: Vec<String> = unresolved_liked
        .into_iter()
        .chain(unresolved_disliked)
        .collect();
    if !unresolved.is_empty() {
        tracing::warn!(
            count = unresolved.len(),
            references = ?unresolved,
            "Some anime references did not match the catalog"
        );
    }

    let input = PreferenceInput {
        liked,
        disliked,
        genres,
        mood,
    };
    let preferences = encoder::encode(space, &input);

    tracing::info!(
        liked = input.liked.len(),
        disliked = input.disliked.len(),
        genre_filters = input.genres.len(),
        mood = ?input.mood,
        cold_start = preferences.is_cold_start(),
        "Preferences encoded"
    );

    let ranked = ranking::rank(catalog, space, &preferences);
    let candidate_count = ranked.len();
    let selected = ranking::select(ranked, request.limit, request.diversify, &input.genres);

    let liked_owned: Vec<Anime> = input.liked.iter().map(|a| (*a).clone()).collect();
    let disliked_owned: Vec<Anime> = input.disliked.iter().map(|a| (*a).clone()).collect();

    let contexts: Vec<ExplanationContext> = selected
        .iter()
        .map(|candidate| ExplanationContext {
            anime: candidate.anime.clone(),
            liked: liked_owned.clone(),
            disliked: disliked_owned.clone(),
            genres: input.genres.clone(),
            mood: input.mood,
        })
        .collect();
    let explanations = explain_all(explainer, contexts).await;

    let response = RecommendationResponse {
        recommendations: selected.iter().map(|c| c.anime.clone()).collect(),
        explanations,
        confidence_scores: selected.iter().map(|c| c.confidence()).collect(),
        unresolved_anime: unresolved,
        generated_at: Utc::now(),
    };

    let mut stored = UserPreferences {
        genres: input.genres.clone(),
        mood: input.mood,
        updated_at: response.generated_at,
        ..UserPreferences::new()
    };
    for anime in &liked_owned {
        stored.add_liked(anime.id.clone());
    }
    for anime in &disliked_owned {
        stored.add_disliked(anime.id.clone());
    }

    tracing::info!(
        candidates = candidate_count,
        returned = response.recommendations.len(),
        processing_time_ms = start.elapsed().as_millis(),
        "Recommendations generated"
    );

    Ok(RecommendationOutcome {
        response,
        preferences: stored,
    })
}

/// Explains every context in parallel, preserving input order
///
/// A failed explanation falls back to the template text so the output always
/// lines up with the recommendations.
async fn explain_all(explainer: Arc<dyn Explainer>, contexts: Vec<ExplanationContext>) -> Vec<String> {
    let mut texts: Vec<Option<String>> = vec![None; contexts.len()];
    let mut tasks = JoinSet::new();

    for (index, context) in contexts.iter().cloned().enumerate() {
        let explainer = explainer.clone();
        tasks.spawn(async move { (index, explainer.explain(&context).await) });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(explanation))) => texts[index] = Some(explanation.text),
            Ok((_, Err(e))) => {
                tracing::error!(error = %e, explainer = explainer.name(), "Explanation failed");
            }
            Err(e) => tracing::error!(error = %e, "Explanation task join error"),
        }
    }

    texts
        .into_iter()
        .zip(&contexts)
        .map(|(text, context)| text.unwrap_or_else(|| template_text(context)))
        .collect()
}

/// Explains a single catalog entry, personalised when preferences are known
pub async fn explain_anime(
    catalog: &Catalog,
    explainer: &dyn Explainer,
    anime_id: &AnimeId,
    user_id: Option<String>,
    preferences: Option<UserPreferences>,
) -> AppResult<ExplanationResponse> {
    let anime = catalog
        .get(anime_id)
        .ok_or_else(|| AppError::NotFound(format!("Anime {} not found", anime_id)))?;

    // A profile with nothing in it explains like an anonymous request
    let profile = preferences.as_ref().filter(|prefs| !prefs.is_empty());
    let context = match profile {
        Some(prefs) => {
            let lookup = |ids: &[AnimeId]| -> Vec<Anime> {
                ids.iter()
                    .filter(|id| *id != anime_id)
                    .filter_map(|id| catalog.get(id))
                    .cloned()
                    .collect()
            };
            ExplanationContext {
                anime: anime.clone(),
                liked: lookup(&prefs.liked),
                disliked: lookup(&prefs.disliked),
                genres: prefs.genres.clone(),
                mood: prefs.mood,
            }
        }
        None => ExplanationContext::anonymous(anime.clone()),
    };

    tracing::debug!(
        anime_id = %anime_id,
        personalised = profile.is_some(),
        explainer = explainer.name(),
        "Explaining anime"
    );

    let explanation = explainer.explain(&context).await?;

    Ok(ExplanationResponse {
        anime_id: anime_id.clone(),
        explanation: explanation.text,
        confidence: explanation.confidence,
        user_id,
    })
}

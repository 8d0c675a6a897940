//! Recommendation explanations
//!
//! An `Explainer` turns a (user preference, anime) pair into a short
//! justification. The confidence attached to an explanation is computed here
//! from genre overlap and rating, independently of the ranking engine's score.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{round_score, Anime, Mood},
};

const MAX_SHARED_GENRES: usize = 3;
const EXPLANATION_CACHE_TTL: u64 = 86400; // 1 day

/// Everything an explainer knows about one recommendation
#[derive(Debug, Clone)]
pub struct ExplanationContext {
    pub anime: Anime,
    pub liked: Vec<Anime>,
    pub disliked: Vec<Anime>,
    /// Canonical genre filters from the request
    pub genres: Vec<String>,
    pub mood: Option<Mood>,
}

impl ExplanationContext {
    /// Context with no user information
    pub fn anonymous(anime: Anime) -> Self {
        Self {
            anime,
            liked: Vec::new(),
            disliked: Vec::new(),
            genres: Vec::new(),
            mood: None,
        }
    }

    fn has_preferences(&self) -> bool {
        !self.liked.is_empty()
            || !self.disliked.is_empty()
            || !self.genres.is_empty()
            || self.mood.is_some()
    }

    /// Lowercased genres the user leans towards
    fn preferred_genres(&self) -> HashSet<String> {
        let mut preferred: HashSet<String> = self
            .liked
            .iter()
            .flat_map(|a| a.genres.iter())
            .chain(self.genres.iter())
            .map(|g| g.to_lowercase())
            .collect();
        if let Some(mood) = self.mood {
            preferred.extend(mood.genres().iter().map(|g| g.to_string()));
        }
        preferred
    }

    /// Lowercased genres only found among disliked titles
    fn avoided_genres(&self) -> HashSet<String> {
        let preferred = self.preferred_genres();
        self.disliked
            .iter()
            .flat_map(|a| a.genres.iter())
            .map(|g| g.to_lowercase())
            .filter(|g| !preferred.contains(g))
            .collect()
    }

    /// Liked title sharing the most genres with the target, with those genres
    fn best_liked_match(&self) -> Option<(&Anime, Vec<&str>)> {
        self.liked
            .iter()
            .map(|liked| {
                let shared: Vec<&str> = self
                    .anime
                    .genres
                    .iter()
                    .filter(|g| liked.has_genre(g))
                    .map(String::as_str)
                    .collect();
                (liked, shared)
            })
            .filter(|(_, shared)| !shared.is_empty())
            // max_by_key keeps the last maximum, so reverse to favour list order
            .rev()
            .max_by_key(|(_, shared)| shared.len())
    }

    /// Stable description of the preference profile, used as a cache key part
    pub fn profile_fingerprint(&self) -> String {
        let ids = |list: &[Anime]| {
            let mut ids: Vec<&str> = list.iter().map(|a| a.id.as_str()).collect();
            ids.sort_unstable();
            ids.join(",")
        };
        let mut genres: Vec<String> = self.genres.iter().map(|g| g.to_lowercase()).collect();
        genres.sort_unstable();

        format!(
            "l={}|d={}|g={}|m={}",
            ids(&self.liked),
            ids(&self.disliked),
            genres.join(","),
            self.mood.map(|m| m.as_str()).unwrap_or("")
        )
    }

    fn mood_matches(&self) -> bool {
        self.mood
            .map(|mood| mood.genres().iter().any(|g| self.anime.has_genre(g)))
            .unwrap_or(false)
    }
}

/// A natural-language justification plus a confidence in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub text: String,
    pub confidence: f64,
}

/// Trait for explanation backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, context: &ExplanationContext) -> AppResult<Explanation>;

    /// Explainer name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Confidence that the user will enjoy the anime, from genre overlap and rating
pub fn explanation_confidence(context: &ExplanationContext) -> f64 {
    let anime = &context.anime;
    let rating = anime.normalized_rating();

    if !context.has_preferences() {
        return round_score(0.4 + 0.4 * rating);
    }

    let genres: HashSet<String> = anime.genres.iter().map(|g| g.to_lowercase()).collect();
    if genres.is_empty() {
        return round_score(0.3 * rating);
    }

    let preferred = context.preferred_genres();
    let avoided = context.avoided_genres();
    let overlap = genres.intersection(&preferred).count() as f64 / genres.len() as f64;
    let avoided_overlap = genres.intersection(&avoided).count() as f64 / genres.len() as f64;
    let liked_match = if context.best_liked_match().is_some() { 1.0 } else { 0.0 };

    round_score(0.5 * overlap + 0.3 * rating + 0.2 * liked_match - 0.2 * avoided_overlap)
}

/// "A", "A and B", "A, B and C"
fn join_and(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Deterministic explanation text built from the context
pub fn template_text(context: &ExplanationContext) -> String {
    let anime = &context.anime;
    let genres: Vec<&str> = anime
        .genres
        .iter()
        .take(MAX_SHARED_GENRES)
        .map(String::as_str)
        .collect();
    let mut sentences = Vec::new();
    let mut mood_used = false;

    if let Some((liked, shared)) = context.best_liked_match() {
        let shared: Vec<&str> = shared.into_iter().take(MAX_SHARED_GENRES).collect();
        sentences.push(format!(
            "Recommended because you liked {}, which shares its {} elements.",
            liked.title,
            join_and(&shared)
        ));
    } else {
        let matched: Vec<&str> = context
            .genres
            .iter()
            .filter(|g| anime.has_genre(g))
            .map(String::as_str)
            .collect();

        if !matched.is_empty() {
            sentences.push(format!("Matches your interest in {}.", join_and(&matched)));
        } else if let Some(mood) = context.mood.filter(|_| context.mood_matches()) {
            sentences.push(format!(
                "A good pick for a {} mood, blending {}.",
                mood,
                join_and(&genres)
            ));
            mood_used = true;
        } else if anime.rating >= 8.0 {
            sentences.push(format!(
                "{} is a highly rated {} series.",
                anime.title,
                join_and(&genres)
            ));
        } else {
            sentences.push(format!("{} is a {} series.", anime.title, join_and(&genres)));
        }
    }

    if !mood_used {
        if let Some(mood) = context.mood.filter(|_| context.mood_matches()) {
            sentences.push(format!("It also fits a {} mood.", mood));
        }
    }

    let avoided = context.avoided_genres();
    let flagged: Vec<&str> = anime
        .genres
        .iter()
        .filter(|g| avoided.contains(&g.to_lowercase()))
        .map(String::as_str)
        .collect();
    if !flagged.is_empty() {
        sentences.push(format!(
            "Heads up: it has {} elements like titles you disliked.",
            join_and(&flagged)
        ));
    }

    sentences.push(format!("Rated {:.1}/10.", anime.rating));
    sentences.join(" ")
}

/// Explains recommendations with fixed sentence templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExplainer;

#[async_trait]
impl Explainer for TemplateExplainer {
    async fn explain(&self, context: &ExplanationContext) -> AppResult<Explanation> {
        Ok(Explanation {
            text: template_text(context),
            confidence: explanation_confidence(context),
        })
    }

    fn name(&self) -> &'static str {
        "template"
    }
}

/// Explains recommendations with an OpenAI-compatible chat completion API
///
/// Falls back to the template text whenever the upstream call fails, so an
/// explanation is always produced.
#[derive(Clone)]
pub struct LlmExplainer {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
    cache: Option<Cache>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmExplainer {
    pub fn new(api_key: String, api_url: String, model: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            model,
            cache: None,
        })
    }

    /// Caches generated text in Redis, keyed by anime and preference profile
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Prompt describing the user's taste and the recommended anime
    fn build_prompt(context: &ExplanationContext) -> String {
        let anime = &context.anime;
        let titles = |list: &[Anime]| {
            list.iter()
                .map(|a| a.title.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut prompt = format!(
            "Recommended anime: {} (genres: {}; rating {:.1}/10). Synopsis: {}\n",
            anime.title,
            anime.genres.join(", "),
            anime.rating,
            anime.synopsis
        );
        if !context.liked.is_empty() {
            prompt.push_str(&format!("The user liked: {}.\n", titles(&context.liked)));
        }
        if !context.disliked.is_empty() {
            prompt.push_str(&format!("The user disliked: {}.\n", titles(&context.disliked)));
        }
        if !context.genres.is_empty() {
            prompt.push_str(&format!("Preferred genres: {}.\n", context.genres.join(", ")));
        }
        if let Some(mood) = context.mood {
            prompt.push_str(&format!("Current mood: {}.\n", mood));
        }
        prompt.push_str(
            "In one or two sentences, explain why this anime suits the user. Do not invent facts.",
        );
        prompt
    }

    async fn generate(&self, context: &ExplanationContext) -> AppResult<String> {
        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));

        let body = json!({
            "model": self.model,
            "temperature": 0.3,
            "max_tokens": 120,
            "messages": [
                {
                    "role": "system",
                    "content": "You write short, friendly anime recommendation explanations."
                },
                { "role": "user", "content": Self::build_prompt(context) }
            ]
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Explainer API returned status {}: {}",
                status, body
            )));
        }

        let completion: ChatCompletion = response.json().await?;

        completion
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::ExternalApi("Explainer API returned no content".to_string()))
    }
}

#[async_trait]
impl Explainer for LlmExplainer {
    async fn explain(&self, context: &ExplanationContext) -> AppResult<Explanation> {
        let confidence = explanation_confidence(context);

        let generated = match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::Explanation {
                    anime_id: context.anime.id.to_string(),
                    profile: context.profile_fingerprint(),
                },
                EXPLANATION_CACHE_TTL,
                self.generate(context)
            ),
            None => self.generate(context).await,
        };

        let text = match generated {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    anime_id = %context.anime.id,
                    "LLM explanation failed, using template"
                );
                template_text(context)
            }
        };

        Ok(Explanation { text, confidence })
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::{seed::seed_entries, Catalog};

    fn find(catalog: &Catalog, title: &str) -> Anime {
        catalog.resolve(title).unwrap().clone()
    }

    fn catalog() -> Catalog {
        Catalog::new(seed_entries()).unwrap()
    }

    #[test]
    fn test_join_and() {
        assert_eq!(join_and(&[]), "");
        assert_eq!(join_and(&["Action"]), "Action");
        assert_eq!(join_and(&["Action", "Drama"]), "Action and Drama");
        assert_eq!(join_and(&["Action", "Drama", "Fantasy"]), "Action, Drama and Fantasy");
    }

    #[test]
    fn test_template_names_liked_title_and_shared_genres() {
        let catalog = catalog();
        let context = ExplanationContext {
            liked: vec![find(&catalog, "Attack on Titan"), find(&catalog, "K-On!")],
            ..ExplanationContext::anonymous(find(&catalog, "Fullmetal Alchemist: Brotherhood"))
        };

        let text = template_text(&context);
        assert!(
            text.starts_with(
                "Recommended because you liked Attack on Titan, which shares its Action, Drama and Fantasy elements."
            ),
            "{}",
            text
        );
        assert!(text.ends_with("Rated 9.1/10."));
    }

    #[test]
    fn test_template_without_preferences() {
        let catalog = catalog();
        let context = ExplanationContext::anonymous(find(&catalog, "Death Note"));

        let text = template_text(&context);
        assert_eq!(
            text,
            "Death Note is a highly rated Thriller, Mystery and Psychological series. Rated 8.8/10."
        );
    }

    #[test]
    fn test_template_mentions_mood() {
        let catalog = catalog();
        let context = ExplanationContext {
            mood: Some(Mood::Relaxed),
            ..ExplanationContext::anonymous(find(&catalog, "Laid-Back Camp"))
        };

        let text = template_text(&context);
        assert!(text.starts_with("A good pick for a relaxed mood"), "{}", text);
        assert!(!text.contains("It also fits"));
    }

    #[test]
    fn test_template_flags_disliked_genres() {
        let catalog = catalog();
        let context = ExplanationContext {
            liked: vec![find(&catalog, "Death Note")],
            disliked: vec![find(&catalog, "Another")],
            ..ExplanationContext::anonymous(find(&catalog, "Parasyte"))
        };

        let text = template_text(&context);
        assert!(text.contains("Heads up: it has Horror elements"), "{}", text);
    }

    #[test]
    fn test_confidence_without_preferences_uses_rating() {
        let catalog = catalog();
        let context = ExplanationContext::anonymous(find(&catalog, "Attack on Titan"));
        assert_eq!(explanation_confidence(&context), 0.76);
    }

    #[test]
    fn test_confidence_rewards_overlap() {
        let catalog = catalog();
        let liked = vec![find(&catalog, "Attack on Titan")];

        let close = ExplanationContext {
            liked: liked.clone(),
            ..ExplanationContext::anonymous(find(&catalog, "Fullmetal Alchemist: Brotherhood"))
        };
        let far = ExplanationContext {
            liked,
            ..ExplanationContext::anonymous(find(&catalog, "K-On!"))
        };

        let close_confidence = explanation_confidence(&close);
        let far_confidence = explanation_confidence(&far);
        assert!(close_confidence > far_confidence);
        assert!((0.0..=1.0).contains(&close_confidence));
        assert!((0.0..=1.0).contains(&far_confidence));
    }

    #[tokio::test]
    async fn test_template_explainer() {
        let catalog = catalog();
        let context = ExplanationContext::anonymous(find(&catalog, "Mushishi"));

        let explanation = TemplateExplainer.explain(&context).await.unwrap();
        assert_eq!(explanation.text, template_text(&context));
        assert_eq!(explanation.confidence, explanation_confidence(&context));
    }

    #[test]
    fn test_profile_fingerprint_is_order_independent() {
        let catalog = catalog();
        let a = ExplanationContext {
            liked: vec![find(&catalog, "Monster"), find(&catalog, "Death Note")],
            genres: vec!["Thriller".to_string(), "Mystery".to_string()],
            mood: Some(Mood::Dark),
            ..ExplanationContext::anonymous(find(&catalog, "Another"))
        };
        let b = ExplanationContext {
            liked: vec![find(&catalog, "Death Note"), find(&catalog, "Monster")],
            genres: vec!["mystery".to_string(), "thriller".to_string()],
            mood: Some(Mood::Dark),
            ..ExplanationContext::anonymous(find(&catalog, "Another"))
        };

        assert_eq!(a.profile_fingerprint(), b.profile_fingerprint());
        assert_eq!(a.profile_fingerprint(), "l=10,2|d=|g=mystery,thriller|m=dark");
    }

    #[test]
    fn test_build_prompt_includes_preferences() {
        let catalog = catalog();
        let context = ExplanationContext {
            liked: vec![find(&catalog, "Monster")],
            genres: vec!["Thriller".to_string()],
            mood: Some(Mood::Dark),
            ..ExplanationContext::anonymous(find(&catalog, "Death Note"))
        };

        let prompt = LlmExplainer::build_prompt(&context);
        assert!(prompt.starts_with("Recommended anime: Death Note"));
        assert!(prompt.contains("The user liked: Monster."));
        assert!(prompt.contains("Preferred genres: Thriller."));
        assert!(prompt.contains("Current mood: dark."));
    }

    #[test]
    fn test_chat_completion_deserialization() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  Because you love mind games.  "}}
            ]
        }"#;

        let completion: ChatCompletion = serde_json::from_str(json).unwrap();
        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("  Because you love mind games.  ")
        );
    }

    #[tokio::test]
    async fn test_llm_explainer_falls_back_on_upstream_failure() {
        let catalog = catalog();
        let explainer = LlmExplainer::new(
            "test_key".to_string(),
            "http://127.0.0.1:9".to_string(),
            "test-model".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let context = ExplanationContext::anonymous(find(&catalog, "Cowboy Bebop"));

        let explanation = explainer.explain(&context).await.unwrap();
        assert_eq!(explanation.text, template_text(&context));
        assert_eq!(explanation.confidence, explanation_confidence(&context));
    }
}

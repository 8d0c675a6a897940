use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AnimeId, Mood};

/// Resolved taste profile of a user, as last submitted to `/recommend`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    pub liked: Vec<AnimeId>,
    pub disliked: Vec<AnimeId>,
    /// Canonical genre names used as a hard filter
    pub genres: Vec<String>,
    pub mood: Option<Mood>,
    pub updated_at: DateTime<Utc>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self::new()
    }
}

impl UserPreferences {
    /// Creates an empty profile
    pub fn new() -> Self {
        Self {
            liked: Vec::new(),
            disliked: Vec::new(),
            genres: Vec::new(),
            mood: None,
            updated_at: Utc::now(),
        }
    }

    /// Adds a liked anime, dropping it from the disliked list if present
    pub fn add_liked(&mut self, id: AnimeId) {
        self.disliked.retain(|d| d != &id);
        if !self.liked.contains(&id) {
            self.liked.push(id);
        }
    }

    /// Adds a disliked anime, dropping it from the liked list if present
    pub fn add_disliked(&mut self, id: AnimeId) {
        self.liked.retain(|l| l != &id);
        if !self.disliked.contains(&id) {
            self.disliked.push(id);
        }
    }

    /// True when nothing about the user's taste is known
    pub fn is_empty(&self) -> bool {
        self.liked.is_empty() && self.disliked.is_empty() && self.genres.is_empty() && self.mood.is_none()
    }
}

use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Viewing mood a user can attach to a recommendation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Dark,
    Adventurous,
    Romantic,
    Relaxed,
    Thoughtful,
    Excited,
    Scary,
}

impl Mood {
    pub const ALL: [Mood; 9] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Dark,
        Mood::Adventurous,
        Mood::Romantic,
        Mood::Relaxed,
        Mood::Thoughtful,
        Mood::Excited,
        Mood::Scary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Dark => "dark",
            Mood::Adventurous => "adventurous",
            Mood::Romantic => "romantic",
            Mood::Relaxed => "relaxed",
            Mood::Thoughtful => "thoughtful",
            Mood::Excited => "excited",
            Mood::Scary => "scary",
        }
    }

    /// Genres (lowercase) that fit this mood
    pub fn genres(&self) -> &'static [&'static str] {
        match self {
            Mood::Happy => &["comedy", "slice of life", "music"],
            Mood::Sad => &["drama", "romance", "tragedy"],
            Mood::Dark => &["psychological", "thriller", "horror", "seinen"],
            Mood::Adventurous => &["adventure", "action", "fantasy"],
            Mood::Romantic => &["romance", "shoujo", "drama"],
            Mood::Relaxed => &["slice of life", "iyashikei", "comedy"],
            Mood::Thoughtful => &["mystery", "sci-fi", "psychological", "drama"],
            Mood::Excited => &["action", "sports", "mecha", "shounen"],
            Mood::Scary => &["horror", "supernatural", "thriller"],
        }
    }
}

impl Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mood '{0}'")]
pub struct UnknownMood(pub String);

impl FromStr for Mood {
    type Err = UnknownMood;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "happy" | "funny" | "cheerful" | "lighthearted" => Ok(Mood::Happy),
            "sad" | "emotional" | "melancholic" => Ok(Mood::Sad),
            "dark" | "gritty" => Ok(Mood::Dark),
            "adventurous" | "adventure" => Ok(Mood::Adventurous),
            "romantic" | "romance" => Ok(Mood::Romantic),
            "relaxed" | "chill" | "cozy" | "calm" => Ok(Mood::Relaxed),
            "thoughtful" | "cerebral" | "philosophical" => Ok(Mood::Thoughtful),
            "excited" | "hype" | "energetic" => Ok(Mood::Excited),
            "scary" | "spooky" | "creepy" => Ok(Mood::Scary),
            _ => Err(UnknownMood(s.to_string())),
        }
    }
}

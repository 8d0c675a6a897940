use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{Anime, AnimeId},
};

use super::CatalogSource;

/// Built-in catalog used when no external catalog is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedCatalogSource;

#[allow(clippy::too_many_arguments)]
fn entry(
    id: &str,
    title: &str,
    genres: &[&str],
    synopsis: &str,
    rating: f64,
    year: i32,
    episodes: i32,
    tags: &[&str],
) -> Anime {
    Anime {
        id: AnimeId::new(id),
        title: title.to_string(),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        synopsis: synopsis.to_string(),
        rating,
        year: Some(year),
        episodes: Some(episodes),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// The seed entries, in catalog id order
pub fn seed_entries() -> Vec<Anime> {
    vec![
        entry("1", "Attack on Titan", &["Action", "Drama", "Fantasy"],
            "Humanity's last stand against giant titans", 9.0, 2013, 87, &["titans", "military", "survival"]),
        entry("2", "Death Note", &["Thriller", "Mystery", "Psychological", "Supernatural"],
            "A student finds a notebook that can kill people", 8.8, 2006, 37, &["detective", "cat and mouse"]),
        entry("3", "Fullmetal Alchemist: Brotherhood", &["Action", "Adventure", "Drama", "Fantasy"],
            "Two brothers use alchemy to search for the Philosopher's Stone after a failed ritual", 9.1, 2009, 64, &["alchemy", "brothers"]),
        entry("4", "Steins;Gate", &["Sci-Fi", "Thriller", "Psychological", "Drama"],
            "A self-proclaimed mad scientist discovers a way to send messages to the past", 9.1, 2011, 24, &["time travel"]),
        entry("5", "Your Lie in April", &["Drama", "Romance", "Music"],
            "A piano prodigy who lost his ability to hear music meets a free-spirited violinist", 8.6, 2014, 22, &["piano", "tearjerker"]),
        entry("6", "K-On!", &["Comedy", "Slice of Life", "Music"],
            "Four high school girls form a light music club band", 7.9, 2009, 13, &["band", "school"]),
        entry("7", "Haikyu!!", &["Sports", "Comedy", "Drama", "Shounen"],
            "A short but determined boy joins his high school volleyball team", 8.5, 2014, 25, &["volleyball", "teamwork"]),
        entry("8", "Neon Genesis Evangelion", &["Mecha", "Psychological", "Sci-Fi", "Drama"],
            "Teenagers pilot giant bio-machines against mysterious beings called Angels", 8.4, 1995, 26, &["robots", "apocalypse"]),
        entry("9", "Mushishi", &["Slice of Life", "Supernatural", "Mystery", "Iyashikei"],
            "A wandering expert studies strange life forms that cause mysterious phenomena", 8.7, 2005, 26, &["episodic", "nature"]),
        entry("10", "Monster", &["Mystery", "Psychological", "Thriller", "Seinen", "Drama"],
            "A surgeon hunts the former patient he saved who became a serial killer", 8.9, 2004, 74, &["serial killer", "detective"]),
        entry("11", "Cowboy Bebop", &["Action", "Sci-Fi", "Adventure", "Drama"],
            "A crew of bounty hunters chases criminals across the solar system", 8.8, 1998, 26, &["space", "jazz", "bounty hunters"]),
        entry("12", "Toradora!", &["Romance", "Comedy", "Drama", "Slice of Life"],
            "Two mismatched classmates help each other pursue their crushes", 8.1, 2008, 25, &["school", "love triangle"]),
        entry("13", "Made in Abyss", &["Adventure", "Fantasy", "Mystery", "Drama"],
            "An orphan girl descends into a vast and dangerous chasm to find her mother", 8.7, 2017, 13, &["exploration"]),
        entry("14", "Another", &["Horror", "Mystery", "Supernatural", "Thriller"],
            "A transfer student uncovers a deadly curse hanging over his class", 7.3, 2012, 12, &["curse", "school"]),
        entry("15", "Laid-Back Camp", &["Slice of Life", "Comedy", "Iyashikei"],
            "High school girls go camping in the quiet mountains around Mount Fuji", 8.3, 2018, 12, &["camping", "nature"]),
        entry("16", "Mob Psycho 100", &["Action", "Comedy", "Supernatural"],
            "An overpowered psychic boy tries to live a normal life", 8.5, 2016, 12, &["psychic", "coming of age"]),
        entry("17", "Code Geass", &["Mecha", "Action", "Sci-Fi", "Drama", "Thriller"],
            "An exiled prince gains the power of absolute obedience and leads a rebellion", 8.7, 2006, 25, &["robots", "rebellion", "strategy"]),
        entry("18", "Violet Evergarden", &["Drama", "Fantasy", "Slice of Life"],
            "A former soldier becomes a letter writer to understand the meaning of love", 8.7, 2018, 13, &["letters", "tearjerker"]),
        entry("19", "Parasyte", &["Action", "Horror", "Sci-Fi", "Psychological", "Seinen"],
            "A teenager shares his body with an alien parasite that failed to take over his brain", 8.3, 2014, 24, &["aliens", "body horror"]),
        entry("20", "One Punch Man", &["Action", "Comedy", "Sci-Fi", "Seinen"],
            "A hero who defeats any enemy with one punch searches for a worthy opponent", 8.5, 2015, 12, &["superhero", "parody"]),
        entry("21", "Spirited Away", &["Adventure", "Fantasy", "Supernatural"],
            "A girl wanders into a world of spirits and must work in a bathhouse to free her parents", 8.8, 2001, 1, &["movie", "spirits"]),
        entry("22", "Fruits Basket", &["Romance", "Drama", "Supernatural", "Shoujo"],
            "An orphaned girl learns the secret curse of the family that takes her in", 8.2, 2019, 25, &["zodiac", "family"]),
    ]
}

#[async_trait]
impl CatalogSource for SeedCatalogSource {
    async fn load(&self) -> AppResult<Vec<Anime>> {
        Ok(seed_entries())
    }

    fn name(&self) -> &'static str {
        "seed"
    }
}

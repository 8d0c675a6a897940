use tantivy::collector::{Count, TopDocs};
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use crate::{
    error::{AppError, AppResult},
    models::{AnimeId, SearchHit},
    services::catalog::Catalog,
};

const TITLE_BOOST: f32 = 3.0;
const GENRE_BOOST: f32 = 2.0;
const TAG_BOOST: f32 = 1.5;

/// Colloquial words mapped to the catalog vocabulary they usually mean
const SYNONYMS: &[(&str, &str)] = &[
    ("scary", "horror"),
    ("spooky", "horror supernatural"),
    ("creepy", "horror"),
    ("funny", "comedy"),
    ("hilarious", "comedy"),
    ("robot", "mecha"),
    ("robots", "mecha"),
    ("mech", "mecha"),
    ("love", "romance"),
    ("romantic", "romance"),
    ("space", "sci-fi"),
    ("future", "sci-fi"),
    ("magic", "fantasy"),
    ("wizard", "fantasy"),
    ("detective", "mystery"),
    ("cozy", "iyashikei slice"),
    ("relaxing", "iyashikei slice"),
    ("sport", "sports"),
    ("fight", "action"),
    ("fighting", "action"),
    ("sad", "drama tearjerker"),
    ("ghost", "supernatural"),
    ("ghosts", "supernatural"),
];

/// Full-text index over the catalog
///
/// Built once from a catalog snapshot. Ids are stored; everything else is
/// resolved back through the catalog at query time.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    title_field: Field,
    genres_field: Field,
    synopsis_field: Field,
    tags_field: Field,
}

impl SearchIndex {
    /// Builds an in-RAM index over every catalog entry
    pub fn build(catalog: &Catalog) -> AppResult<Self> {
        let mut schema_builder = Schema::builder();

        let id_field = schema_builder.add_text_field("id", STRING | STORED);
        let title_field = schema_builder.add_text_field("title", TEXT);
        let genres_field = schema_builder.add_text_field("genres", TEXT);
        let synopsis_field = schema_builder.add_text_field("synopsis", TEXT);
        let tags_field = schema_builder.add_text_field("tags", TEXT);

        let schema = schema_builder.build();
        let index = Index::create_in_ram(schema);

        let mut writer: IndexWriter = index.writer(50_000_000)?;
        for anime in catalog.iter() {
            let mut doc = TantivyDocument::default();
            doc.add_text(id_field, anime.id.as_str());
            doc.add_text(title_field, &anime.title);
            doc.add_text(synopsis_field, &anime.synopsis);

            for genre in &anime.genres {
                doc.add_text(genres_field, genre);
            }

            for tag in &anime.tags {
                doc.add_text(tags_field, tag);
            }

            writer.add_document(doc)?;
        }
        writer.commit()?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        reader.reload()?;

        tracing::debug!(documents = catalog.len(), "Search index built");

        Ok(Self {
            index,
            reader,
            id_field,
            title_field,
            genres_field,
            synopsis_field,
            tags_field,
        })
    }

    /// Runs a free-text query, returning hits with scores normalised to the best hit
    pub fn search(
        &self,
        catalog: &Catalog,
        query_str: &str,
        limit: usize,
    ) -> AppResult<(Vec<SearchHit>, usize)> {
        let query_str = query_str.trim();
        if query_str.is_empty() {
            return Err(AppError::InvalidInput("Query must not be empty".to_string()));
        }
        if limit == 0 {
            return Err(AppError::InvalidInput("Limit must be at least 1".to_string()));
        }

        let expanded = plain_terms(&expand_query(query_str));
        if expanded.is_empty() {
            return Ok((Vec::new(), 0));
        }
        let searcher = self.reader.searcher();

        let mut query_parser = QueryParser::for_index(
            &self.index,
            vec![
                self.title_field,
                self.genres_field,
                self.synopsis_field,
                self.tags_field,
            ],
        );
        query_parser.set_field_boost(self.title_field, TITLE_BOOST);
        query_parser.set_field_boost(self.genres_field, GENRE_BOOST);
        query_parser.set_field_boost(self.tags_field, TAG_BOOST);

        // Operators and field prefixes are already stripped, lenient parsing
        // only guards against whatever tantivy still objects to
        let (query, errors) = query_parser.parse_query_lenient(&expanded);
        if !errors.is_empty() {
            tracing::debug!(query = %expanded, errors = errors.len(), "Lenient query parse dropped terms");
        }

        let (top_docs, total) = searcher.search(&*query, &(TopDocs::with_limit(limit), Count))?;

        let best = top_docs.first().map(|(score, _)| *score).unwrap_or(0.0);

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: TantivyDocument = searcher.doc(doc_address)?;

            let Some(id) = retrieved_doc
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
            else {
                continue;
            };

            if let Some(anime) = catalog.get(&AnimeId::new(id)) {
                let relative = if best > 0.0 { score / best } else { 0.0 };
                results.push(SearchHit {
                    anime: anime.clone(),
                    score: (f64::from(relative) * 1000.0).round() / 1000.0,
                });
            }
        }

        Ok((results, total))
    }
}

/// Appends synonym expansions for colloquial words in the query
fn expand_query(query: &str) -> String {
    let mut expanded = query.to_string();

    for word in query
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        if let Some((_, expansion)) = SYNONYMS.iter().find(|(from, _)| *from == word) {
            expanded.push(' ');
            expanded.push_str(expansion);
        }
    }

    expanded
}

/// Reduces free text to bare lowercase terms
///
/// Everything but letters and digits becomes a space, so `id:1`, `*`, `-x`
/// and quoted phrases are searched as words rather than query syntax.
/// Lowercasing also disarms the `AND`/`OR`/`NOT` keywords.
fn plain_terms(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub mod catalog;
pub mod encoder;
pub mod explanation;
pub mod preferences;
pub mod ranking;
pub mod recommendations;
pub mod search;

pub use catalog::{Catalog, CatalogSource};
pub use encoder::GenreSpace;
pub use explanation::{Explainer, LlmExplainer, TemplateExplainer};
pub use preferences::PreferenceStore;
pub use search::SearchIndex;

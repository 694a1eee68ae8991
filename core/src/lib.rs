pub mod catalog;
pub mod config;
pub mod corpus;
pub mod error;
pub mod handle;
pub mod persist;
pub mod pipeline;
pub mod recommend;
pub mod reference;
pub mod similarity;
pub mod tokenizer;
pub mod vectorizer;

pub type TermId = u32;
pub type DocId = u32;

pub use catalog::{load_catalog, CatalogRecord, TitleKind};
pub use config::{BuildConfig, StopWords};
pub use error::{ArtifactError, BuildError, Error, QueryError};
pub use handle::SharedRecommender;
pub use recommend::{validate_k, Recommendation, Recommender, DEFAULT_K};

pub mod config;
pub mod error;
pub mod vector_search;

pub use config::SearchConfig;
pub use error::{Error, Result};
pub use vector_search::{SearchError, SimilarityQuery, SimilaritySearchService};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

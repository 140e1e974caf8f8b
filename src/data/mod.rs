//! Data ingestion and storage
//!
//! Statistics retrieval, the SQLite store and the bulk game file.

pub mod database;
pub mod dataset;
pub mod lenient;
pub mod source;

pub use database::Database;
pub use dataset::{BatchPreprocessor, GameDataset, GameRecord, SeasonRange, TrainingMatrix};
pub use source::{InMemoryStatSource, StatKey, StatSource, TimeWindow};

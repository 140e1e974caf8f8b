//! Feature extraction and encoding
//!
//! Aggregates raw per-period statistics into roster objects and flattens them
//! into schema-ordered feature vectors.

pub mod aggregator;
pub mod derived;
pub mod encoder;
pub mod roster;
pub mod schema;

pub use aggregator::{PeriodAggregator, ScheduledGame};
pub use encoder::{FeatureEncoder, LabelVector};
pub use roster::{PlayerFeatureRecord, PositionBlock, RosterObject, TeamMetrics};
pub use schema::{PlayerField, PositionGroup, SchemaOptions, SchemaRegistry, TeamField};

//! The four pipeline stages
//!
//! Each stage is a batch job invoked on an external cadence: storage sync,
//! media analysis, grouping, and post generation with slot scheduling.
//! Decision logic (parsing, grouping rules, merging, slot search, the
//! approval gate) is factored into pure functions so it can be tested
//! without a database or network.

pub mod analysis;
pub mod analyzer;
pub mod generator;
pub mod grouping;
pub mod scheduler;
pub mod summary;
pub mod sync;

pub use analyzer::AnalyzerStage;
pub use generator::GeneratorStage;
pub use grouping::GroupingStage;
pub use summary::StageSummary;
pub use sync::{MediaIngest, SyncStage};

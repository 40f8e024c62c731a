//! Services Layer
//!
//! Pipeline orchestration and result accumulation, independent of how records are
//! loaded or where results are written.

pub mod accumulator;
pub mod identify_service;

// Re-export for convenience
pub use accumulator::{IdentifyResults, MatchedRecord, ResultAccumulator};
pub use identify_service::{IdentifyService, RecordOutcome, RecordStage, RunOptions, RunReport};

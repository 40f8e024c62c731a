//! Fuzzy comparison of source records against catalog candidates

pub mod normalize;
pub mod similarity;

pub use normalize::{normalize, normalize_publisher};
pub use similarity::{Matcher, match_candidate, similarity_ratio};

// Professional Cataloguing Module
// Handles MARC parsing, candidate projection and format classification

pub mod candidate;
pub mod classification;
pub mod marc;

pub use candidate::{ParseWarning, ParsedResponse, parse, project_candidate};
pub use classification::classify;

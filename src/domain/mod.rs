//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no SeaORM, no HTTP client).
//! Only record types, trait definitions and domain error types.

pub mod errors;
pub mod records;
pub mod repositories;

pub use errors::DomainError;
pub use records::*;
pub use repositories::*;

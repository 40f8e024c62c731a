//! Repository implementations using SeaORM

pub mod response_cache_repository;

pub use response_cache_repository::{InMemoryResponseCache, SeaOrmResponseCache};

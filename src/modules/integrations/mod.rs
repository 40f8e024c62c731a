pub mod worldcat;

pub use worldcat::WorldCatClient;

pub mod cataloguing_pro;
pub mod export;
pub mod import;
pub mod integrations;
pub mod matching;

// Core modules
pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod decision;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod market;
pub mod models;
pub mod notify;

// Re-export commonly used types
pub use error::BotError;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

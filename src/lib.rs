// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod risk;
pub mod scheduler;
pub mod strategy;

// Re-export commonly used types
pub use error::BotError;
pub use models::*;
pub use scheduler::{CycleOutcome, Scheduler};

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;

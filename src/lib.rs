// Comment Service - nested comment threads with per-user reactions

// Service configuration
pub mod config;

// Infrastructure - storage backends, cursor codec, events, middleware
pub mod infrastructure;

// Domain models, events, and response shapes
pub mod models;

// Application services
pub mod services;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};

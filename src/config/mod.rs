//! Configuration module

pub mod settings;

pub use settings::{GenerationConfig, LoggingConfig, QueueConfig, ServerConfig, Settings};

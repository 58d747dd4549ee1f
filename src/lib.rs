pub mod cache;
pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod knowledge;
pub mod llm;
pub mod parts;
pub mod prompt;
pub mod server;
pub mod session;

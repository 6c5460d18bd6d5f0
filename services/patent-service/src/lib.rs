pub mod bridge;
pub mod config;
pub mod prompt_loader;

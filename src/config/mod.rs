// src/config/mod.rs
pub mod ai;
pub mod app;
pub mod store;

pub use ai::{Backend, SummarizerConfig};
pub use app::{AppConfig, RedditConfig};
pub use store::ConfigStore;

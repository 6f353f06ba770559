//! Headless map viewer session around the tile engine.

pub mod config;
pub mod fetch;
pub mod headless;

pub use config::{AppConfig, SessionConfig, StartPosition};
pub use fetch::{DirectoryFetcher, SyntheticFetcher};
pub use headless::HeadlessUploader;

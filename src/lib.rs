pub mod analyzer;
pub mod config;
pub mod db;
pub mod pipeline;
pub mod series;

/// Application name for XDG paths
pub const APP_NAME: &str = "chartwords";

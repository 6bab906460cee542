use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Feature extraction settings.
    pub pipeline: PipelineConfig,
}

/// Feature extraction and aggregation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// ISO 639-3 code of the only language whose lyrics are analyzed.
    pub target_language: String,
    /// Two-sided band fraction for the summary statistics.
    pub confidence_frac: f64,
    /// Lemmas kept per week.
    pub top_words: usize,
    /// Tags kept per week.
    pub top_tags: usize,
    /// NRC-style word/emotion file. The built-in lexicon is used when unset.
    pub lexicon_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_language: "eng".to_string(),
            confidence_frac: 0.84,
            top_words: 100,
            top_tags: 50,
            lexicon_path: None,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/chartwords/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let config: AppConfig = toml::from_str(contents)?;
        let frac = config.pipeline.confidence_frac;
        if !(frac > 0.0 && frac < 1.0) {
            log::warn!("confidence_frac {frac} outside (0, 1); using 0.84");
            return Ok(Self {
                pipeline: PipelineConfig {
                    confidence_frac: 0.84,
                    ..config.pipeline
                },
                ..config
            });
        }
        Ok(config)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("chartwords.db")
    } else {
        PathBuf::from("chartwords.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.workers, 0);
        assert_eq!(config.pipeline.target_language, "eng");
        assert_eq!(config.pipeline.top_words, 100);
        assert_eq!(config.pipeline.top_tags, 50);
        assert!((config.pipeline.confidence_frac - 0.84).abs() < 1e-12);
    }

    #[test]
    fn test_partial_pipeline_section() {
        let config = AppConfig::parse(
            "workers = 3\n[pipeline]\ntop_words = 20\nlexicon_path = \"/tmp/nrc.txt\"\n",
        )
        .unwrap();
        assert_eq!(config.resolve_workers(), 3);
        assert_eq!(config.pipeline.top_words, 20);
        assert_eq!(config.pipeline.top_tags, 50);
        assert_eq!(config.pipeline.lexicon_path, Some(PathBuf::from("/tmp/nrc.txt")));
    }

    #[test]
    fn test_bad_fraction_falls_back() {
        let config = AppConfig::parse("[pipeline]\nconfidence_frac = 1.5\n").unwrap();
        assert!((config.pipeline.confidence_frac - 0.84).abs() < 1e-12);
    }

    #[test]
    fn test_auto_workers_at_least_one() {
        assert!(AppConfig::default().resolve_workers() >= 1);
    }
}

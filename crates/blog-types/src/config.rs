//! Configuration loading for the blog engine.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/blog/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::BlogError;

const APP_NAME: &str = "blog";

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Path to the full-text index root; one sub-directory per index name
    #[serde(default = "default_search_index_path")]
    pub search_index_path: String,

    /// When false the text index is treated as unconfigured and
    /// synchronization degrades to a no-op
    #[serde(default = "default_search_enabled")]
    pub search_enabled: bool,

    /// Page size used by search and listings
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u64,

    /// Number of background job workers
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Directory export jobs write into
    #[serde(default = "default_export_dir")]
    pub export_dir: String,

    /// Seconds a finished job stays visible in the queue registry
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    /// Tantivy writer heap budget
    #[serde(default = "default_index_writer_memory_mb")]
    pub index_writer_memory_mb: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn data_dir(sub: &str) -> String {
    ProjectDirs::from("", "", APP_NAME)
        .map(|p| p.data_local_dir().join(sub))
        .unwrap_or_else(|| PathBuf::from(".").join(sub))
        .to_string_lossy()
        .to_string()
}

fn default_db_path() -> String {
    data_dir("db")
}

fn default_search_index_path() -> String {
    data_dir("search-index")
}

fn default_search_enabled() -> bool {
    true
}

fn default_posts_per_page() -> u64 {
    3
}

fn default_worker_count() -> usize {
    2
}

fn default_export_dir() -> String {
    data_dir("exports")
}

fn default_job_ttl_secs() -> u64 {
    500
}

fn default_index_writer_memory_mb() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            search_index_path: default_search_index_path(),
            search_enabled: default_search_enabled(),
            posts_per_page: default_posts_per_page(),
            worker_count: default_worker_count(),
            export_dir: default_export_dir(),
            job_ttl_secs: default_job_ttl_secs(),
            index_writer_memory_mb: default_index_writer_memory_mb(),
            log_level: default_log_level(),
        }
    }
}

fn config_err(e: config::ConfigError) -> BlogError {
    BlogError::Config(e.to_string())
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/blog/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (BLOG_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, BlogError> {
        let config_dir = ProjectDirs::from("", "", APP_NAME)
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(config_err)?
            .set_default("search_index_path", default_search_index_path())
            .map_err(config_err)?
            .set_default("search_enabled", default_search_enabled())
            .map_err(config_err)?
            .set_default("posts_per_page", default_posts_per_page())
            .map_err(config_err)?
            .set_default("worker_count", default_worker_count() as u64)
            .map_err(config_err)?
            .set_default("export_dir", default_export_dir())
            .map_err(config_err)?
            .set_default("job_ttl_secs", default_job_ttl_secs())
            .map_err(config_err)?
            .set_default(
                "index_writer_memory_mb",
                default_index_writer_memory_mb() as u64,
            )
            .map_err(config_err)?
            .set_default("log_level", default_log_level())
            .map_err(config_err)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // BLOG_DB_PATH, BLOG_SEARCH_ENABLED, BLOG_POSTS_PER_PAGE, ...
        builder = builder.add_source(Environment::with_prefix("BLOG").try_parsing(true));

        let config = builder.build().map_err(config_err)?;
        let settings: Settings = config.try_deserialize().map_err(config_err)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), BlogError> {
        if self.posts_per_page == 0 {
            return Err(BlogError::Config("posts_per_page must be > 0".to_string()));
        }
        if self.worker_count == 0 {
            return Err(BlogError::Config("worker_count must be > 0".to_string()));
        }
        if self.index_writer_memory_mb < 15 {
            return Err(BlogError::Config(format!(
                "index_writer_memory_mb must be >= 15, got {}",
                self.index_writer_memory_mb
            )));
        }
        Ok(())
    }

    /// Expand ~ in a configured path to the home directory
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).as_ref())
    }

    pub fn expanded_db_path(&self) -> PathBuf {
        Self::expand_path(&self.db_path)
    }

    pub fn expanded_search_index_path(&self) -> PathBuf {
        Self::expand_path(&self.search_index_path)
    }

    pub fn expanded_export_dir(&self) -> PathBuf {
        Self::expand_path(&self.export_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.posts_per_page, 3);
        assert!(settings.search_enabled);
        assert_eq!(settings.worker_count, 2);
        assert_eq!(settings.job_ttl_secs, 500);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_page_size() {
        let settings = Settings {
            posts_per_page: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(BlogError::Config(_))));
    }

    #[test]
    fn test_expand_path_plain() {
        assert_eq!(
            Settings::expand_path("/var/blog/db"),
            PathBuf::from("/var/blog/db")
        );
    }

    #[test]
    fn test_expand_path_tilde() {
        let Some(dirs) = directories::BaseDirs::new() else {
            return;
        };
        assert_eq!(
            Settings::expand_path("~/.local/share/blog/db"),
            dirs.home_dir().join(".local/share/blog/db")
        );
        assert_eq!(Settings::expand_path("~"), dirs.home_dir());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("blog.toml");
        std::fs::write(&path, "posts_per_page = 7\nsearch_enabled = false\n").unwrap();

        let settings = Settings::load(Some(&path.to_string_lossy())).unwrap();
        assert_eq!(settings.posts_per_page, 7);
        assert!(!settings.search_enabled);
        assert_eq!(settings.worker_count, 2);
    }
}

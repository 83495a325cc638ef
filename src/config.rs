use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::objects::PhotoCompression;
use crate::stages::{Step, TransitionRules};

/// Main configuration structure for Camp Tracker
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CampTrackerConfig {
    /// Transition validation rules
    pub tracker: TrackerConfig,
    /// Record store selection
    pub store: StoreConfig,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
    /// Photo storage
    pub objects: ObjectsConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Require a volunteer name at the desks that record one
    pub require_volunteer: bool,
    /// Steps that may be completed without their payload
    pub skippable_steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Which record store to open
    pub backend: StoreBackend,
    /// Reject illegal or stale stage updates at the store
    pub enforce_transitions: bool,
    /// Directory for the current-event selection and local state
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObjectsConfig {
    /// Directory photos are written into
    pub root: PathBuf,
    /// Base URL the stored photos are served from
    pub public_base_url: String,
    /// Largest photo accepted for upload
    pub max_photo_bytes: u64,
    /// Downscale and re-encode photos as JPEG before storing them
    pub compress_photos: bool,
    /// Widest stored photo, in pixels
    pub max_photo_width: u32,
    /// Size compression aims to stay under, in KB
    pub target_photo_kb: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub json: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let rules = TransitionRules::default();
        Self {
            require_volunteer: rules.require_volunteer,
            skippable_steps: rules.skippable_steps,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
        }
    }
}

impl Default for CampTrackerConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            store: StoreConfig {
                backend: if cfg!(feature = "database") {
                    StoreBackend::Sqlite
                } else {
                    StoreBackend::Memory
                },
                enforce_transitions: true,
                data_dir: PathBuf::from(".camp-tracker"),
            },
            database: Some(DatabaseConfig {
                url: "sqlite://.camp-tracker/camp-tracker.db".to_string(),
                max_connections: 5,
                auto_migrate: true,
            }),
            objects: ObjectsConfig {
                root: PathBuf::from(".camp-tracker/photos"),
                public_base_url: "file://.camp-tracker/photos".to_string(),
                max_photo_bytes: 10 * 1024 * 1024,
                compress_photos: true,
                max_photo_width: 1280,
                target_photo_kb: 300,
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn rules(&self) -> TransitionRules {
        TransitionRules {
            require_volunteer: self.require_volunteer,
            skippable_steps: self.skippable_steps.clone(),
        }
    }
}

impl ObjectsConfig {
    /// `None` stores photos exactly as uploaded.
    pub fn compression(&self) -> Option<PhotoCompression> {
        self.compress_photos.then(|| PhotoCompression {
            max_width: self.max_photo_width.max(1),
            target_bytes: self.target_photo_kb as usize * 1024,
        })
    }
}

impl CampTrackerConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (camp-tracker.toml, .camp-tracker-rc)
    /// 3. Environment variables (prefixed with CAMP_TRACKER_)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) with the configuration files looked up in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("camp-tracker.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".camp-tracker-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        // Nested keys use a double underscore: CAMP_TRACKER_STORE__BACKEND
        builder = builder.add_source(
            Environment::with_prefix("CAMP_TRACKER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<CampTrackerConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = CampTrackerConfig::load_env_file();
        CampTrackerConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static CampTrackerConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

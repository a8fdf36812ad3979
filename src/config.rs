use cadence::lifecycle::LifecycleConfig;
use cadence::scheduler::SchedulerConfig;
use chrono::TimeDelta;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub scheduler: SchedulerSection,
    pub lifecycle: LifecycleSection,
    pub store: StoreSection,
    pub display: DisplaySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub tick_interval_secs: u64,
    pub batch_size: usize,
    pub tick_timeout_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            batch_size: 500,
            tick_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSection {
    /// Items without an end time complete this long after their anchor
    pub grace_window_minutes: i64,
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            grace_window_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cadence")
                .join("cadence.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// Default window for `cadence occurrences`
    pub horizon_days: u32,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self { horizon_days: 90 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            scheduler: SchedulerSection::default(),
            lifecycle: LifecycleSection::default(),
            store: StoreSection::default(),
            display: DisplaySection::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");
        let file_name = format!("{}.yml", project_name);

        // ~/.config/cadence/cadence.yml, then ./cadence.yml
        let candidates = dirs::config_dir()
            .map(|dir| dir.join(project_name).join(&file_name))
            .into_iter()
            .chain(std::iter::once(PathBuf::from(&file_name)));

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => log::warn!("Failed to load config from {}: {:#}", candidate.display(), e),
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parsed `log_level`, if it names a level
    pub fn log_level_filter(&self) -> Option<log::LevelFilter> {
        self.log_level.as_deref().and_then(|level| level.parse().ok())
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        let grace = TimeDelta::try_minutes(self.lifecycle.grace_window_minutes.max(0)).unwrap_or(TimeDelta::MAX);
        LifecycleConfig::new(grace)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(
            Duration::from_secs(self.scheduler.tick_interval_secs.max(1)),
            self.scheduler.batch_size,
        )
        .with_tick_timeout(Duration::from_secs(self.scheduler.tick_timeout_secs.max(1)))
        .with_lifecycle(self.lifecycle_config())
    }
}

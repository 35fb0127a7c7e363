use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tasklane_core::UserId;
use time::UtcOffset;
use time::macros::format_description;

use crate::maintenance::{MAX_INTERVAL, MaintenanceConfig};

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE: &str = "tasklane.toml";
/// File name of the JSON store inside the data directory.
pub const STORE_FILE: &str = "tasks.json";

/// Top-level configuration loaded from `tasklane.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduler timing.
    pub maintenance: MaintenanceSection,
    /// Recurrence time zone.
    pub clock: ClockSection,
    /// Store location.
    pub store: StoreSection,
    /// Local session.
    pub session: SessionSection,
}

/// `[maintenance]` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceSection {
    /// Seconds between scheduled runs.
    pub interval_secs: u64,
    /// Triggers closer than this to the previous run are skipped.
    pub min_gap_secs: u64,
}

impl Default for MaintenanceSection {
    fn default() -> Self {
        let defaults = MaintenanceConfig::default();
        Self {
            interval_secs: defaults.interval.as_secs(),
            min_gap_secs: defaults.min_gap.as_secs(),
        }
    }
}

/// `[clock]` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSection {
    /// Fixed `"+HH:MM"` offset for recurrence; the local offset when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<String>,
}

/// `[store]` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// JSON store file; `<data dir>/tasks.json` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// `[session]` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// User the local session reports; signed out when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
}

impl AppConfig {
    /// Load `tasklane.toml` from `data_dir`.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read, parsed or validated.
    pub fn from_data_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_file(data_dir.as_ref().join(CONFIG_FILE))
    }

    /// Load configuration from `path`; defaults when the file does not exist.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Write this configuration to `path`, creating parent directories.
    ///
    /// # Errors
    /// Fails when the directory or the file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.maintenance.interval_secs == 0 {
            bail!("maintenance.interval_secs must be greater than zero");
        }
        if self.maintenance.interval_secs > MAX_INTERVAL.as_secs() {
            bail!(
                "maintenance.interval_secs must be at most {}",
                MAX_INTERVAL.as_secs()
            );
        }
        self.fixed_offset()?;
        Ok(())
    }

    /// Offset recurrence is evaluated in, `None` for the process's local offset.
    ///
    /// # Errors
    /// Fails when `clock.utc_offset` is not in `+HH:MM` form.
    pub fn fixed_offset(&self) -> Result<Option<UtcOffset>> {
        self.clock.utc_offset.as_deref().map(parse_offset).transpose()
    }

    /// Scheduler timing.
    #[must_use]
    pub const fn maintenance_config(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            interval: Duration::from_secs(self.maintenance.interval_secs),
            min_gap: Duration::from_secs(self.maintenance.min_gap_secs),
        }
    }

    /// Store file, resolved against `data_dir` when relative or absent.
    #[must_use]
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        self.store
            .path
            .as_ref()
            .map_or_else(|| data_dir.join(STORE_FILE), |path| data_dir.join(path))
    }
}

fn parse_offset(raw: &str) -> Result<UtcOffset> {
    UtcOffset::parse(
        raw.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("clock.utc_offset '{raw}' is not in +HH:MM form"))
}

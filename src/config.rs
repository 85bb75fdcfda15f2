use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use jiff::civil::Weekday;
use serde::Deserialize;
use tracing::info;

use crate::data::RepoId;
use crate::github::{GhLimits, PrState};
use crate::refresher::RefreshSettings;
use crate::schedule::{ActiveWindow, Scheduler};

pub const DEFAULT_CONFIG_FILE: &str = "gh-actionable.toml";

/// Contents of `gh-actionable.toml`. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub repositories: Vec<RepoId>,
    pub cache_dir: PathBuf,
    pub staleness_days: u32,
    pub pr_state: PrState,
    pub gh: GhConfig,
    pub schedule: ScheduleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            cache_dir: PathBuf::from(".gh-actionable"),
            staleness_days: 30,
            pr_state: PrState::Open,
            gh: GhConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GhConfig {
    pub timeout_secs: u64,
    pub max_output_mib: u64,
}

impl Default for GhConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_output_mib: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub weekdays: Vec<String>,
    pub start_hour: i8,
    pub end_hour: i8,
    pub every_hours: i8,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekdays: ["mon", "tue", "wed", "thu", "fri"].map(str::to_owned).to_vec(),
            start_hour: 9,
            end_hour: 18,
            every_hours: 3,
        }
    }
}

impl Config {
    /// Load from `path`. A missing file means all defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw)
                .with_context(|| format!("Invalid config file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            (30..=60).contains(&self.gh.timeout_secs),
            "gh.timeout_secs must be between 30 and 60, got {}",
            self.gh.timeout_secs
        );
        ensure!(
            (10..=50).contains(&self.gh.max_output_mib),
            "gh.max_output_mib must be between 10 and 50, got {}",
            self.gh.max_output_mib
        );
        ensure!(self.staleness_days > 0, "staleness_days must be positive");
        self.schedule.active_window()?;
        ensure!(
            self.schedule.every_hours > 0,
            "schedule.every_hours must be positive"
        );
        Ok(())
    }

    pub fn gh_limits(&self) -> GhLimits {
        GhLimits {
            timeout: Duration::from_secs(self.gh.timeout_secs),
            max_output_bytes: self.gh.max_output_mib * 1024 * 1024,
        }
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            repositories: self.repositories.clone(),
            staleness_days: self.staleness_days,
            pr_state: self.pr_state,
        }
    }

    pub fn scheduler(&self) -> Result<Scheduler> {
        Ok(Scheduler::new(
            self.schedule.active_window()?,
            self.schedule.every_hours,
        ))
    }
}

impl ScheduleConfig {
    pub fn active_window(&self) -> Result<ActiveWindow> {
        ensure!(
            (0..=24).contains(&self.start_hour) && (0..=24).contains(&self.end_hour),
            "schedule hours must be within 0..=24"
        );
        ensure!(
            self.start_hour < self.end_hour,
            "schedule.start_hour ({}) must be before schedule.end_hour ({})",
            self.start_hour,
            self.end_hour
        );
        let weekdays = self
            .weekdays
            .iter()
            .map(|day| parse_weekday(day))
            .collect::<Result<Vec<_>>>()?;
        Ok(ActiveWindow {
            weekdays,
            start_hour: self.start_hour,
            end_hour: self.end_hour,
        })
    }
}

fn parse_weekday(day: &str) -> Result<Weekday> {
    let weekday = match day.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Weekday::Monday,
        "tue" | "tuesday" => Weekday::Tuesday,
        "wed" | "wednesday" => Weekday::Wednesday,
        "thu" | "thursday" => Weekday::Thursday,
        "fri" | "friday" => Weekday::Friday,
        "sat" | "saturday" => Weekday::Saturday,
        "sun" | "sunday" => Weekday::Sunday,
        _ => bail!("Unknown weekday: {day}"),
    };
    Ok(weekday)
}

use anyhow::{Context, Result};
use chrono_tz::Tz;
use drip_core::time::parse_tz;
use drip_core::{ReminderPolicy, DEFAULT_NUDGE_HOURS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_drip_home;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub nudges: NudgeSection,
    #[serde(default)]
    pub snapshots: SnapshotSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleSection {
    /// IANA zone all wall-clock scheduling happens in.
    pub timezone: String,
    pub lookahead_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NudgeSection {
    /// Local hours at which nudges may go out.
    pub hours: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SnapshotSection {
    /// Enrollment + session export. Relative paths resolve against DRIP_HOME.
    pub data: Option<String>,
    pub profiles: Option<String>,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            timezone: "America/Chicago".to_string(),
            lookahead_days: ReminderPolicy::default().lookahead_days,
        }
    }
}

impl Default for NudgeSection {
    fn default() -> Self {
        Self {
            hours: DEFAULT_NUDGE_HOURS.to_vec(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        let name = &self.schedule.timezone;
        parse_tz(name).ok_or_else(|| anyhow::anyhow!("invalid timezone in config: {name}"))
    }

    pub fn policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            lookahead_days: self.schedule.lookahead_days.max(0),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_drip_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

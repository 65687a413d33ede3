//! Resolving snapshot files and the planning clock for a command run.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use drip_core::time::{parse_anchor, to_utc};
use drip_core::UserProfile;
use drip_ingest::{parse_profiles_json, parse_snapshot_json, Snapshot};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::state::drip_home;

fn resolve(explicit: Option<PathBuf>, configured: Option<&str>, what: &str) -> Result<PathBuf> {
    let p = match (explicit, configured) {
        (Some(p), _) => p,
        (None, Some(c)) => PathBuf::from(c),
        (None, None) => bail!(
            "no {what} snapshot set (pass --{what} <path> or set [snapshots].{what} in config.toml)"
        ),
    };
    if p.is_absolute() || p.exists() {
        return Ok(p);
    }
    Ok(drip_home()?.join(p))
}

fn read(p: &Path) -> Result<String> {
    if !p.exists() {
        bail!("snapshot not found: {}", p.display());
    }
    fs::read_to_string(p).with_context(|| format!("read {}", p.display()))
}

pub fn load_snapshot(cfg: &Config, explicit: Option<PathBuf>, tz: Tz) -> Result<Snapshot> {
    let p = resolve(explicit, cfg.snapshots.data.as_deref(), "data")?;
    let snap =
        parse_snapshot_json(&read(&p)?, tz).with_context(|| format!("parsing {}", p.display()))?;
    tracing::debug!(
        path = %p.display(),
        enrollments = snap.enrollments.len(),
        sessions = snap.sessions.len(),
        "loaded snapshot"
    );
    Ok(snap)
}

pub fn load_profiles(cfg: &Config, explicit: Option<PathBuf>) -> Result<Vec<UserProfile>> {
    let p = resolve(explicit, cfg.snapshots.profiles.as_deref(), "profiles")?;
    parse_profiles_json(&read(&p)?).with_context(|| format!("parsing {}", p.display()))
}

/// `--now` override (any anchor format) or the current instant.
pub fn resolve_now_utc(now: Option<&str>, tz: Tz) -> Result<DateTime<Utc>> {
    match now {
        None => Ok(Utc::now()),
        Some(raw) => {
            let local = parse_anchor(raw, tz)
                .ok_or_else(|| anyhow::anyhow!("invalid --now value: {raw}"))?;
            Ok(to_utc(local, tz))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use drip_core::time::to_local;

    #[test]
    fn now_override_is_local_wall_clock() {
        let tz = chrono_tz::America::Chicago;
        let utc = resolve_now_utc(Some("2026-02-20 08:15"), tz).unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-20T14:15:00+00:00");
        let expected = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap().and_hms_opt(8, 15, 0);
        assert_eq!(Some(to_local(utc, tz)), expected);
    }

    #[test]
    fn bad_now_is_an_error() {
        assert!(resolve_now_utc(Some("whenever"), Tz::UTC).is_err());
    }

    #[test]
    fn explicit_snapshot_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("snap.json");
        fs::write(&p, r#"{"enrollments": [], "sessions": []}"#).unwrap();
        let snap = load_snapshot(&Config::default(), Some(p), Tz::UTC).unwrap();
        assert!(snap.enrollments.is_empty());
    }

    #[test]
    fn missing_snapshot_setting_is_an_error() {
        assert!(load_snapshot(&Config::default(), None, Tz::UTC).is_err());
    }
}

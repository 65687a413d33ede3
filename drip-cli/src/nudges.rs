use anyhow::Result;
use drip_core::plan_nudges;
use drip_core::time::to_local;
use std::path::PathBuf;
use tracing::info;

use crate::config::load_config;
use crate::inputs::{load_profiles, resolve_now_utc};
use crate::state::{append_jsonl, queue_dir};

/// Run the per-user nudge loop once and append the picks to the nudge queue.
///
/// Meant to be triggered hourly; users outside a nudge hour or without a
/// matching inactivity tier are skipped.
pub fn plan(profiles: Option<PathBuf>, now: Option<String>, dry_run: bool) -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.timezone()?;
    let now = resolve_now_utc(now.as_deref(), tz)?;
    let profiles = load_profiles(&cfg, profiles)?;

    let nudges = plan_nudges(&profiles, now, &cfg.nudges.hours, tz);
    info!(profiles = profiles.len(), nudges = nudges.len(), "nudge pass");

    println!(
        "Nudge pass at {} ({}): {} of {} users",
        to_local(now, tz).format("%Y-%m-%d %H:%M"),
        tz,
        nudges.len(),
        profiles.len()
    );
    for n in &nudges {
        println!("- {} [{} days idle] {}: {}", n.user_id, n.gap_days, n.title, n.body);
    }

    if !dry_run {
        append_jsonl(&queue_dir()?.join("nudges.jsonl"), &nudges)?;
    }
    Ok(())
}

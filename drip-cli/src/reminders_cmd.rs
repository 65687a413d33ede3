use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::Subcommand;
use drip_core::{
    plan_content_unlock_reminders_with, plan_session_reminders_with, reschedule, ReminderPolicy,
    ReminderRequest,
};
use drip_ingest::Snapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::load_config;
use crate::inputs::{load_snapshot, resolve_now_utc};
use crate::state::{append_jsonl, event_log_path, outbox_path, queue_dir, KeyCategory, KeyStore};

#[derive(Subcommand, Debug)]
pub enum RemindersCommand {
    /// Plan new session + content reminders and queue them for the device
    Plan {
        /// Enrollment/session snapshot (defaults to config [snapshots].data)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Plan as if it were this local time (testing)
        #[arg(long)]
        now: Option<String>,

        /// Print what would be queued without touching state
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Forget every scheduled key and plan everything again
    Reschedule {
        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long)]
        now: Option<String>,
    },

    /// List queued notifications
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Key-store and queue summary
    Status,
}

/// One line of the outbox handed to the platform scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedNotification {
    #[serde(flatten)]
    pub request: ReminderRequest,
    pub queued_at: DateTime<Utc>,
}

pub fn run(cmd: RemindersCommand) -> Result<()> {
    match cmd {
        RemindersCommand::Plan { data, now, dry_run } => plan(data, now, dry_run),
        RemindersCommand::Reschedule { data, now } => force_reschedule(data, now),
        RemindersCommand::List { limit } => list(limit),
        RemindersCommand::Status => status(),
    }
}

/// Append `requests` to the outbox under `queue`, then log them.
///
/// Only the outbox write can fail the hand-off; the event log is advisory.
fn hand_off(queue: &Path, requests: &[ReminderRequest]) -> Result<()> {
    let queued_at = Utc::now();
    let queued: Vec<_> = requests
        .iter()
        .map(|r| QueuedNotification {
            request: r.clone(),
            queued_at,
        })
        .collect();
    append_jsonl(&outbox_path(queue), &queued)?;

    let logs: Vec<_> = requests.iter().map(ReminderRequest::log_entry).collect();
    if let Err(e) = append_jsonl(&event_log_path(queue), &logs) {
        warn!(error = %e, "failed to write notification event log");
    }
    Ok(())
}

/// Plan both categories against `store` and queue the new reminders.
///
/// A category's keys are persisted only after its reminders reached the
/// outbox, so a failed hand-off is planned again on the next run.
fn plan_and_hand_off(
    store: &KeyStore,
    queue: &Path,
    snap: &Snapshot,
    now: DateTime<Utc>,
    tz: Tz,
    policy: ReminderPolicy,
) -> Result<Vec<ReminderRequest>> {
    let mut queued = store.update(KeyCategory::Sessions, |keys| {
        let plan = plan_session_reminders_with(&snap.sessions, now, keys, tz, policy);
        hand_off(queue, &plan.to_schedule)?;
        Ok((plan.updated_keys, plan.to_schedule))
    })?;
    let content = store.update(KeyCategory::Content, |keys| {
        let plan = plan_content_unlock_reminders_with(&snap.enrollments, now, keys, tz, policy);
        hand_off(queue, &plan.to_schedule)?;
        Ok((plan.updated_keys, plan.to_schedule))
    })?;
    info!(sessions = queued.len(), content = content.len(), "planned reminders");

    queued.extend(content);
    Ok(queued)
}

fn print_requests(requests: &[ReminderRequest]) {
    for r in requests {
        println!(
            "[{}] #{} {} | {} | {}",
            r.payload.type_name(),
            r.numeric_id,
            r.fire_at.format("%Y-%m-%d %H:%M"),
            r.title,
            r.body.replace('\n', " ")
        );
    }
}

fn plan(data: Option<PathBuf>, now: Option<String>, dry_run: bool) -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.timezone()?;
    let policy = cfg.policy();
    let now = resolve_now_utc(now.as_deref(), tz)?;
    let snap = load_snapshot(&cfg, data, tz)?;
    let store = KeyStore::open_default()?;

    if dry_run {
        let session_keys = store.load(KeyCategory::Sessions);
        let content_keys = store.load(KeyCategory::Content);
        let sessions = plan_session_reminders_with(&snap.sessions, now, &session_keys, tz, policy);
        let content =
            plan_content_unlock_reminders_with(&snap.enrollments, now, &content_keys, tz, policy);
        let total = sessions.to_schedule.len() + content.to_schedule.len();
        println!("[DRY RUN] would queue {total} reminders");
        print_requests(&sessions.to_schedule);
        print_requests(&content.to_schedule);
        return Ok(());
    }

    let queue = queue_dir()?;
    let queued = plan_and_hand_off(&store, &queue, &snap, now, tz, policy)?;
    print_requests(&queued);
    println!("Queued {} new reminders in {}", queued.len(), outbox_path(&queue).display());
    Ok(())
}

fn force_reschedule(data: Option<PathBuf>, now: Option<String>) -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.timezone()?;
    let now = resolve_now_utc(now.as_deref(), tz)?;
    let snap = load_snapshot(&cfg, data, tz)?;
    let store = KeyStore::open_default()?;
    let queue = queue_dir()?;

    store.clear_all()?;
    let outbox = outbox_path(&queue);
    if outbox.exists() {
        // The device cancels everything it holds before reading a fresh outbox.
        fs::remove_file(&outbox)?;
    }

    let fresh = reschedule(&snap.sessions, &snap.enrollments, now, tz, cfg.policy());
    let mut all = fresh.sessions.to_schedule;
    all.extend(fresh.content.to_schedule);
    hand_off(&queue, &all)?;

    let (session_keys, content_keys) = (fresh.sessions.updated_keys, fresh.content.updated_keys);
    store.update(KeyCategory::Sessions, |_| Ok((session_keys, ())))?;
    store.update(KeyCategory::Content, |_| Ok((content_keys, ())))?;

    info!(count = all.len(), "rescheduled reminders");
    print_requests(&all);
    println!("Cleared scheduled keys; queued {} reminders", all.len());
    Ok(())
}

fn read_outbox() -> Result<Vec<QueuedNotification>> {
    let p = outbox_path(&queue_dir()?);
    if !p.exists() {
        return Ok(vec![]);
    }
    let reader = BufReader::new(fs::File::open(&p)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<QueuedNotification>(&line) {
            Ok(v) => rows.push(v),
            Err(e) => warn!(error = %e, "skipping unreadable outbox line"),
        }
    }
    Ok(rows)
}

fn list(limit: usize) -> Result<()> {
    let rows = read_outbox()?;
    if rows.is_empty() {
        println!("No queued notifications at {}", outbox_path(&queue_dir()?).display());
        return Ok(());
    }
    for (i, r) in rows.iter().rev().take(limit).enumerate() {
        println!(
            "{}. #{} {} at {} ({})",
            i + 1,
            r.request.numeric_id,
            r.request.title,
            r.request.fire_at.format("%Y-%m-%d %H:%M"),
            r.request.fire_at_utc.to_rfc3339()
        );
    }
    Ok(())
}

fn status() -> Result<()> {
    let store = KeyStore::open_default()?;
    let rows = read_outbox()?;
    let now = Utc::now();
    let pending = rows.iter().filter(|r| r.request.fire_at_utc > now).count();

    for category in KeyCategory::ALL {
        println!(
            "{}: {} keys ({})",
            category.storage_key(),
            store.load(category).len(),
            store.path(category).display()
        );
    }
    let fired = rows.len() - pending;
    println!("Outbox: {} total, {} pending, {} fired", rows.len(), pending, fired);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use drip_core::time::to_utc;
    use drip_core::{plan_session_reminders, SessionEvent};
    use std::collections::BTreeSet;

    #[test]
    fn queued_notification_flattens_request() {
        let tz = chrono_tz::America::Chicago;
        let now = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let s = SessionEvent::new("s1", "Live Q&A", now + Duration::hours(25));
        let plan = plan_session_reminders(&[s], to_utc(now, tz), &BTreeSet::new(), tz);
        let q = QueuedNotification {
            request: plan.to_schedule[0].clone(),
            queued_at: to_utc(now, tz),
        };

        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["stable_key"], "session-24h-s1");
        assert_eq!(v["payload"]["type"], "session_reminder");
        assert_eq!(v["fire_at_utc"], "2026-02-20T15:00:00Z");

        let back: QueuedNotification = serde_json::from_value(v).unwrap();
        assert_eq!(back.request, plan.to_schedule[0]);
    }

    fn outbox_lines(queue: &Path) -> usize {
        fs::read_to_string(outbox_path(queue))
            .map(|raw| raw.lines().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0)
    }

    #[test]
    fn keys_are_kept_only_after_hand_off_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        let queue = dir.path().join("queue");
        let tz = chrono_tz::Tz::UTC;
        let now = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        let snap = Snapshot {
            enrollments: vec![],
            sessions: vec![SessionEvent::new("s1", "Live Q&A", now + Duration::hours(25))],
        };
        let policy = ReminderPolicy::default();

        // A regular file where the queue directory should be.
        fs::write(&queue, "not a directory").unwrap();
        let failed = plan_and_hand_off(&store, &queue, &snap, now.and_utc(), tz, policy);
        assert!(failed.is_err());
        assert!(store.load(KeyCategory::Sessions).is_empty());

        fs::remove_file(&queue).unwrap();
        let queued = plan_and_hand_off(&store, &queue, &snap, now.and_utc(), tz, policy).unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(outbox_lines(&queue), 2);
        assert_eq!(store.load(KeyCategory::Sessions).len(), 2);

        let again = plan_and_hand_off(&store, &queue, &snap, now.and_utc(), tz, policy).unwrap();
        assert!(again.is_empty());
        assert_eq!(outbox_lines(&queue), 2);
    }
}

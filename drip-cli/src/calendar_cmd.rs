use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use drip_core::time::parse_day;
use drip_core::{
    find_events_on_date, find_unlock_dates_in_range, order_events, CalendarEvent,
    CalendarEventKind, SessionEvent,
};
use drip_ingest::Snapshot;
use std::path::PathBuf;

use crate::config::load_config;
use crate::inputs::load_snapshot;

#[derive(Subcommand, Debug)]
pub enum CalendarCommand {
    /// Days in a range that carry an unlock or a session
    Range {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Everything happening on one day
    Day {
        /// Day (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        #[arg(long)]
        data: Option<PathBuf>,
    },
}

pub fn run(cmd: CalendarCommand) -> Result<()> {
    match cmd {
        CalendarCommand::Range { start, end, data } => range(&start, &end, data),
        CalendarCommand::Day { date, data } => day(&date, data),
    }
}

fn day_arg(raw: &str) -> Result<NaiveDate> {
    parse_day(raw).with_context(|| format!("invalid date '{raw}' (expected YYYY-MM-DD)"))
}

fn snapshot(data: Option<PathBuf>) -> Result<Snapshot> {
    let cfg = load_config()?;
    let tz = cfg.timezone()?;
    load_snapshot(&cfg, data, tz)
}

/// Sessions are shared across the user's enrollments; each round sees them
/// once, so they are only passed with the first enrollment.
fn sessions_for(idx: usize, snap: &Snapshot) -> &[SessionEvent] {
    if idx == 0 { &snap.sessions[..] } else { &[] }
}

fn range(start: &str, end: &str, data: Option<PathBuf>) -> Result<()> {
    let (start, end) = (day_arg(start)?, day_arg(end)?);
    if end < start {
        anyhow::bail!("--end {end} is before --start {start}");
    }
    let snap = snapshot(data)?;

    let mut days: Vec<String> = if snap.enrollments.is_empty() {
        find_unlock_dates_in_range(&[], &snap.sessions, None, 0, start, end)
            .into_iter()
            .collect()
    } else {
        snap.enrollments
            .iter()
            .enumerate()
            .flat_map(|(i, e)| {
                find_unlock_dates_in_range(
                    &e.items,
                    sessions_for(i, &snap),
                    e.round.first_session_date,
                    e.round.drip_offset_days,
                    start,
                    end,
                )
            })
            .collect()
    };
    days.sort();
    days.dedup();

    if days.is_empty() {
        println!("Nothing scheduled between {start} and {end}");
    }
    for d in days {
        println!("{d}");
    }
    Ok(())
}

/// Events on `date` across every enrollment, in one day-listing order.
fn merge_day_events(snap: &Snapshot, date: NaiveDate) -> Vec<CalendarEvent> {
    let mut events = if snap.enrollments.is_empty() {
        find_events_on_date(&[], &snap.sessions, None, 0, date)
    } else {
        Vec::new()
    };
    for (i, e) in snap.enrollments.iter().enumerate() {
        events.extend(find_events_on_date(
            &e.items,
            sessions_for(i, snap),
            e.round.first_session_date,
            e.round.drip_offset_days,
            date,
        ));
    }
    order_events(&mut events);
    events
}

fn day(date: &str, data: Option<PathBuf>) -> Result<()> {
    let date = day_arg(date)?;
    let snap = snapshot(data)?;
    let events = merge_day_events(&snap, date);

    println!("# {date}\n");
    if events.is_empty() {
        println!("(nothing scheduled)");
    }
    for e in events {
        let what = match e.kind {
            CalendarEventKind::Session => "session".to_string(),
            CalendarEventKind::ContentUnlock { content } => {
                format!("{} unlock", content.label())
            }
        };
        let when = e.time_label.as_deref().unwrap_or("--");
        match e.meeting_link {
            Some(link) => println!("- {when:>8}  [{what}] {} ({link})", e.title),
            None => println!("- {when:>8}  [{what}] {}", e.title),
        }
    }
    Ok(())
}

//! Inactivity nudges: time-of-day gating plus a tiered message table.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::model::UserProfile;
use crate::time::{parse_tz, to_local};

/// Local hours at which the nudge loop may message a user.
pub const DEFAULT_NUDGE_HOURS: [u32; 4] = [9, 12, 15, 18];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub id: &'static str,
    /// Inclusive gap bounds, in days.
    pub min_gap: i64,
    pub max_gap: i64,
    pub title: &'static str,
    pub body: &'static str,
}

/// Checked top to bottom; first match wins. Boundaries are product-tuned.
pub const INACTIVITY_TIERS: &[MessageTemplate] = &[
    MessageTemplate {
        id: "gap-1",
        min_gap: 1,
        max_gap: 1,
        title: "Keep your streak going",
        body: "You showed up yesterday. A few minutes today keeps the momentum.",
    },
    MessageTemplate {
        id: "gap-2",
        min_gap: 2,
        max_gap: 2,
        title: "Pick up where you left off",
        body: "It's been a couple of days. Your next step is waiting.",
    },
    MessageTemplate {
        id: "gap-3-4",
        min_gap: 3,
        max_gap: 4,
        title: "A quick check-in",
        body: "How are you feeling? A short journal entry can help.",
    },
    MessageTemplate {
        id: "gap-5-6",
        min_gap: 5,
        max_gap: 6,
        title: "We saved your place",
        body: "Your program is right where you left it. Come back for five minutes.",
    },
    MessageTemplate {
        id: "gap-7-14",
        min_gap: 7,
        max_gap: 14,
        title: "It's never too late to restart",
        body: "A new week is a fresh start. Open today's practice when you're ready.",
    },
];

/// Exact membership; `nudge_hours` is an enumerated set, not a range.
pub fn is_eligible_for_nudge(user_local_hour: u32, nudge_hours: &[u32]) -> bool {
    nudge_hours.contains(&user_local_hour)
}

/// First tier whose `[min_gap, max_gap]` contains `gap_days`.
pub fn classify_inactivity(gap_days: i64) -> Option<&'static MessageTemplate> {
    INACTIVITY_TIERS
        .iter()
        .find(|t| gap_days >= t.min_gap && gap_days <= t.max_gap)
}

/// Per-user inactivity snapshot, computed fresh each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InactivityWindow {
    pub user_id: String,
    pub last_active_date: DateTime<Utc>,
    /// Calendar days between last activity and now, in the user's zone.
    pub gap_days: i64,
    pub local_hour: u32,
}

impl InactivityWindow {
    /// `None` when the profile has never been active.
    pub fn derive(profile: &UserProfile, now: DateTime<Utc>, default_tz: Tz) -> Option<Self> {
        let last_active = profile.last_active_at?;
        let tz = profile
            .timezone
            .as_deref()
            .and_then(parse_tz)
            .unwrap_or(default_tz);

        let local_now = to_local(now, tz);
        let local_last = to_local(last_active, tz);

        Some(Self {
            user_id: profile.user_id.clone(),
            last_active_date: last_active,
            gap_days: (local_now.date() - local_last.date()).num_days(),
            local_hour: local_now.hour(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Nudge {
    pub user_id: String,
    pub template_id: &'static str,
    pub title: String,
    pub body: String,
    pub gap_days: i64,
}

/// The per-user nudge loop: hour gate, then tier lookup.
pub fn plan_nudges(
    profiles: &[UserProfile],
    now: DateTime<Utc>,
    nudge_hours: &[u32],
    default_tz: Tz,
) -> Vec<Nudge> {
    profiles
        .iter()
        .filter_map(|p| {
            let window = InactivityWindow::derive(p, now, default_tz)?;
            if !is_eligible_for_nudge(window.local_hour, nudge_hours) {
                return None;
            }
            let template = classify_inactivity(window.gap_days)?;
            Some(Nudge {
                user_id: window.user_id,
                template_id: template.id,
                title: template.title.to_string(),
                body: template.body.to_string(),
                gap_days: window.gap_days,
            })
        })
        .collect()
}

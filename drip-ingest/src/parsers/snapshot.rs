//! Enrollment + session snapshot parser (JSON).
//!
//! Expected shape:
//!   { "enrollments": [ { "enrollment_id": "e1", "program_title": "...",
//!                        "round": { "round_id": "r1", "first_session_date": "2025-03-01T09:00:00",
//!                                   "drip_offset_days": 0 },
//!                        "items": [ { "item_id": "m1", "kind": "module", "title": "...",
//!                                     "drip_delay_days": 1 } ] } ],
//!     "sessions": [ { "session_id": "s1", "session_date": "2025-03-02T18:00:00Z",
//!                     "title": "...", "status": "scheduled", "meeting_link": "..." } ] }

use anyhow::{Context, Result};
use chrono_tz::Tz;
use drip_core::time::parse_anchor;
use drip_core::{
    ContentItem, ContentKind, Enrollment, EnrollmentRound, SessionEvent, SessionStatus,
};
use tracing::warn;

use crate::types::{RawContentItem, RawEnrollment, RawRound, RawSession, RawSnapshot};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub enrollments: Vec<Enrollment>,
    pub sessions: Vec<SessionEvent>,
}

/// Parse a snapshot export; dates are interpreted in the user's zone `tz`.
pub fn parse_snapshot_json(text: &str, tz: Tz) -> Result<Snapshot> {
    let raw: RawSnapshot = serde_json::from_str(text).context("parse snapshot JSON")?;
    Ok(snapshot_from_raw(raw, tz))
}

pub fn snapshot_from_raw(raw: RawSnapshot, tz: Tz) -> Snapshot {
    Snapshot {
        enrollments: raw
            .enrollments
            .into_iter()
            .map(|e| enrollment_from_raw(e, tz))
            .collect(),
        sessions: raw
            .sessions
            .into_iter()
            .filter_map(|s| session_from_raw(s, tz))
            .collect(),
    }
}

fn non_negative(value: Option<i64>, what: &str, id: &str) -> Option<u32> {
    match value {
        None => Some(0),
        Some(v) => match u32::try_from(v) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(id, value = v, "invalid {what}");
                None
            }
        },
    }
}

fn round_from_raw(raw: RawRound, tz: Tz) -> EnrollmentRound {
    let first_session_date = raw.first_session_date.as_deref().and_then(|s| {
        let parsed = parse_anchor(s, tz);
        if parsed.is_none() {
            warn!(
                round_id = %raw.round_id,
                raw = s,
                "unparsable first_session_date; treating as absent"
            );
        }
        parsed
    });
    let drip_offset_days =
        non_negative(raw.drip_offset_days, "drip_offset_days", &raw.round_id).unwrap_or(0);

    EnrollmentRound {
        round_id: raw.round_id,
        first_session_date,
        drip_offset_days,
    }
}

fn item_from_raw(raw: RawContentItem) -> Option<ContentItem> {
    let drip_delay_days = non_negative(raw.drip_delay_days, "drip_delay_days", &raw.item_id)?;
    let kind = match raw.kind.as_deref().map(str::trim) {
        Some(k) if k.eq_ignore_ascii_case("track") || k.eq_ignore_ascii_case("audio") => {
            ContentKind::Track
        }
        _ => ContentKind::Module,
    };
    Some(ContentItem {
        title: raw.title.unwrap_or_else(|| raw.item_id.clone()),
        item_id: raw.item_id,
        kind,
        drip_delay_days,
    })
}

fn enrollment_from_raw(raw: RawEnrollment, tz: Tz) -> Enrollment {
    Enrollment {
        enrollment_id: raw.enrollment_id,
        program_title: raw.program_title,
        round: round_from_raw(raw.round, tz),
        items: raw.items.into_iter().filter_map(item_from_raw).collect(),
    }
}

fn session_from_raw(raw: RawSession, tz: Tz) -> Option<SessionEvent> {
    let Some(session_date) = raw.session_date.as_deref().and_then(|s| parse_anchor(s, tz)) else {
        warn!(session_id = %raw.session_id, "session without a usable date; skipping");
        return None;
    };

    let status = match raw.status.as_deref().map(|s| s.trim().to_lowercase()) {
        None => SessionStatus::Scheduled,
        Some(s) if s == "scheduled" => SessionStatus::Scheduled,
        Some(s) if s == "completed" => SessionStatus::Completed,
        Some(s) if s == "cancelled" || s == "canceled" => SessionStatus::Cancelled,
        Some(other) => {
            warn!(
                session_id = %raw.session_id,
                status = %other,
                "unknown session status; not reminding"
            );
            SessionStatus::Cancelled
        }
    };

    Some(SessionEvent {
        title: raw.title.unwrap_or_else(|| "Live session".to_string()),
        session_id: raw.session_id,
        session_date,
        status,
        meeting_link: raw.meeting_link.filter(|l| !l.trim().is_empty()),
    })
}

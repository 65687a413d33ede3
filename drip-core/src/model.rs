//! Snapshot types pulled from storage.
//!
//! Everything here is read-only input to the planners. Timestamps are
//! wall-clock times in the user's zone (see `crate::time`).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A program round: the anchor every drip unlock is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRound {
    pub round_id: String,
    /// `None` when the round has no first session yet (or it was malformed).
    pub first_session_date: Option<NaiveDateTime>,
    /// Added to every unlock computed under this round.
    pub drip_offset_days: u32,
}

impl EnrollmentRound {
    pub fn new(round_id: impl Into<String>, first_session_date: Option<NaiveDateTime>) -> Self {
        Self {
            round_id: round_id.into(),
            first_session_date,
            drip_offset_days: 0,
        }
    }

    pub fn with_offset(mut self, drip_offset_days: u32) -> Self {
        self.drip_offset_days = drip_offset_days;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Module,
    Track,
}

impl ContentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Module => "module",
            ContentKind::Track => "track",
        }
    }
}

/// A drip-gated catalog entry (course module or audio track).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub item_id: String,
    pub kind: ContentKind,
    pub title: String,
    /// 0 = available immediately; never scheduled.
    pub drip_delay_days: u32,
}

impl ContentItem {
    pub fn module(
        item_id: impl Into<String>,
        title: impl Into<String>,
        drip_delay_days: u32,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            kind: ContentKind::Module,
            title: title.into(),
            drip_delay_days,
        }
    }

    pub fn track(
        item_id: impl Into<String>,
        title: impl Into<String>,
        drip_delay_days: u32,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            kind: ContentKind::Track,
            title: title.into(),
            drip_delay_days,
        }
    }

    /// Dedupe key for this item's unlock reminder.
    pub fn stable_key(&self) -> String {
        match self.kind {
            ContentKind::Module => format!("content-{}", self.item_id),
            ContentKind::Track => format!("content-track-{}", self.item_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

/// A live coaching session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: String,
    pub session_date: NaiveDateTime,
    pub title: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub meeting_link: Option<String>,
}

impl SessionEvent {
    pub fn new(
        session_id: impl Into<String>,
        title: impl Into<String>,
        session_date: NaiveDateTime,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            session_date,
            title: title.into(),
            status: SessionStatus::Scheduled,
            meeting_link: None,
        }
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_meeting_link(mut self, link: impl Into<String>) -> Self {
        self.meeting_link = Some(link.into());
        self
    }
}

/// One user's enrollment: a round plus its catalog, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub enrollment_id: String,
    #[serde(default)]
    pub program_title: Option<String>,
    pub round: EnrollmentRound,
    pub items: Vec<ContentItem>,
}

/// Profile fields the nudge loop needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
    /// IANA zone; falls back to the configured zone when absent or invalid.
    #[serde(default)]
    pub timezone: Option<String>,
}

use serde::{Deserialize, Serialize};

/// Round row as exported from storage. Dates stay raw until parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRound {
    pub round_id: String,
    #[serde(default)]
    pub first_session_date: Option<String>,
    #[serde(default)]
    pub drip_offset_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContentItem {
    pub item_id: String,
    /// "module" or "track"; anything else is treated as a module.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub drip_delay_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnrollment {
    pub enrollment_id: String,
    #[serde(default)]
    pub program_title: Option<String>,
    pub round: RawRound,
    #[serde(default)]
    pub items: Vec<RawContentItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSession {
    pub session_id: String,
    #[serde(default)]
    pub session_date: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
}

/// One user's storage export: enrollments plus upcoming sessions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub enrollments: Vec<RawEnrollment>,
    #[serde(default)]
    pub sessions: Vec<RawSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProfile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub last_active_date: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

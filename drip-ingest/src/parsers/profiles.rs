//! User profile export parser (JSON array) for the nudge loop.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use drip_core::UserProfile;
use tracing::warn;

use crate::types::RawProfile;

/// Accepts RFC 3339 or a bare `YYYY-MM-DD` (taken as midnight UTC).
fn parse_last_active(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

pub fn parse_profiles_json(text: &str) -> Result<Vec<UserProfile>> {
    let raw: Vec<RawProfile> = serde_json::from_str(text).context("parse profiles JSON")?;
    Ok(profiles_from_raw(raw))
}

pub fn profiles_from_raw(raw: Vec<RawProfile>) -> Vec<UserProfile> {
    raw.into_iter()
        .map(|p| {
            let last_active_at = p.last_active_date.as_deref().and_then(|s| {
                let parsed = parse_last_active(s);
                if parsed.is_none() {
                    warn!(user_id = %p.user_id, raw = s, "unparsable last_active_date");
                }
                parsed
            });
            UserProfile {
                user_id: p.user_id,
                display_name: p.display_name,
                last_active_at,
                timezone: p.timezone,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_profiles() {
        let json = r#"[
            { "user_id": "u1", "last_active_date": "2026-01-08T03:00:00Z", "timezone": "America/Chicago" },
            { "user_id": "u2", "last_active_date": "2026-01-05" },
            { "user_id": "u3", "last_active_date": "yesterday" },
            { "user_id": "u4" }
        ]"#;
        let got = parse_profiles_json(json).unwrap();
        assert_eq!(got.len(), 4);
        assert_eq!(got[0].last_active_at, Some(Utc.with_ymd_and_hms(2026, 1, 8, 3, 0, 0).unwrap()));
        assert_eq!(got[0].timezone.as_deref(), Some("America/Chicago"));
        assert_eq!(got[1].last_active_at, Some(Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap()));
        assert_eq!(got[2].last_active_at, None);
        assert_eq!(got[3].last_active_at, None);
    }
}

//! Drip unlock date calculator.

use chrono::{Duration, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::model::{ContentItem, EnrollmentRound};
use crate::time::{clock_label, parse_anchor};

/// When a drip item becomes visible. Both fields are `None` for
/// immediately-available items and for rounds with no usable anchor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnlockTime {
    pub unlock_date: Option<NaiveDateTime>,
    pub unlock_time_label: Option<String>,
}

impl UnlockTime {
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Unlock = anchor + (delay - 1 + offset) days, keeping the anchor's time of day.
pub fn compute_unlock_date_time(
    drip_delay_days: u32,
    first_session_date: Option<NaiveDateTime>,
    drip_offset_days: u32,
) -> UnlockTime {
    if drip_delay_days == 0 {
        return UnlockTime::unknown();
    }
    let Some(anchor) = first_session_date else {
        return UnlockTime::unknown();
    };

    let days = i64::from(drip_delay_days) - 1 + i64::from(drip_offset_days);
    let Some(unlock) = anchor.checked_add_signed(Duration::days(days)) else {
        return UnlockTime::unknown();
    };

    UnlockTime {
        unlock_date: Some(unlock),
        unlock_time_label: Some(clock_label(unlock.time())),
    }
}

/// Same as [`compute_unlock_date_time`], but from a raw stored anchor.
/// Malformed anchors degrade to unknown.
pub fn compute_unlock_from_raw(
    drip_delay_days: u32,
    first_session_date: Option<&str>,
    drip_offset_days: u32,
    tz: Tz,
) -> UnlockTime {
    let anchor = first_session_date.and_then(|raw| parse_anchor(raw, tz));
    compute_unlock_date_time(drip_delay_days, anchor, drip_offset_days)
}

/// Unlock time of one catalog item under `round`.
pub fn unlock_for(item: &ContentItem, round: &EnrollmentRound) -> UnlockTime {
    compute_unlock_date_time(
        item.drip_delay_days,
        round.first_session_date,
        round.drip_offset_days,
    )
}

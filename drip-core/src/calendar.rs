//! Calendar queries over drip unlocks and live sessions.
//!
//! Both sources feed the same calendar view: days get marked, and a
//! selected day lists what happens on it.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::model::{ContentItem, ContentKind, SessionEvent};
use crate::time::{clock_label, day_key};
use crate::unlock::compute_unlock_date_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarEventKind {
    Session,
    ContentUnlock { content: ContentKind },
}

impl CalendarEventKind {
    /// Sessions list before unlocks.
    fn tier(&self) -> u8 {
        match self {
            CalendarEventKind::Session => 0,
            CalendarEventKind::ContentUnlock { .. } => 1,
        }
    }
}

/// Day-listing order: sessions by start time, then unlocks in the order
/// given. Within a tier, events without a time go last.
///
/// The sort is stable, so events gathered from several rounds can be
/// concatenated and ordered once.
pub fn order_events(events: &mut [CalendarEvent]) {
    events.sort_by_key(|e| {
        let session_time = match e.kind {
            CalendarEventKind::Session => e.time,
            CalendarEventKind::ContentUnlock { .. } => None,
        };
        (e.kind.tier(), e.time.is_none(), session_time)
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub kind: CalendarEventKind,
    pub id: String,
    pub title: String,
    pub time: Option<NaiveTime>,
    pub time_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
}

/// Days in `[range_start, range_end]` that carry an unlock or a session.
pub fn find_unlock_dates_in_range(
    items: &[ContentItem],
    sessions: &[SessionEvent],
    first_session_date: Option<NaiveDateTime>,
    drip_offset_days: u32,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> HashSet<String> {
    let in_range = |d: NaiveDate| d >= range_start && d <= range_end;
    let mut days = HashSet::new();

    for item in items {
        let unlock =
            compute_unlock_date_time(item.drip_delay_days, first_session_date, drip_offset_days);
        if let Some(at) = unlock.unlock_date {
            if in_range(at.date()) {
                days.insert(day_key(at.date()));
            }
        }
    }

    for s in sessions {
        if in_range(s.session_date.date()) {
            days.insert(day_key(s.session_date.date()));
        }
    }

    days
}

/// Everything happening on `date`, in [`order_events`] order.
pub fn find_events_on_date(
    items: &[ContentItem],
    sessions: &[SessionEvent],
    first_session_date: Option<NaiveDateTime>,
    drip_offset_days: u32,
    date: NaiveDate,
) -> Vec<CalendarEvent> {
    let mut events = Vec::new();

    for s in sessions.iter().filter(|s| s.session_date.date() == date) {
        let time = s.session_date.time();
        events.push(CalendarEvent {
            kind: CalendarEventKind::Session,
            id: s.session_id.clone(),
            title: s.title.clone(),
            time: Some(time),
            time_label: Some(clock_label(time)),
            meeting_link: s.meeting_link.clone(),
        });
    }

    for item in items {
        let unlock =
            compute_unlock_date_time(item.drip_delay_days, first_session_date, drip_offset_days);
        let Some(at) = unlock.unlock_date else {
            continue;
        };
        if at.date() != date {
            continue;
        }
        events.push(CalendarEvent {
            kind: CalendarEventKind::ContentUnlock { content: item.kind },
            id: item.item_id.clone(),
            title: item.title.clone(),
            time: Some(at.time()),
            time_label: unlock.unlock_time_label,
            meeting_link: None,
        });
    }

    order_events(&mut events);
    events
}

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use drip_core::{
    compute_unlock_date_time, compute_unlock_from_raw, find_events_on_date,
    find_unlock_dates_in_range, plan_content_unlock_reminders, plan_session_reminders,
    ContentItem, Enrollment, EnrollmentRound, SessionEvent,
};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Two-item round starting 2025-03-01 09:00: unlocks on day 1 and day 3.
#[test]
fn test_round_unlock_dates_and_calendar_marks() {
    let anchor = Some(at(2025, 3, 1, 9, 0));
    let items = vec![ContentItem::module("a", "A", 1), ContentItem::module("b", "B", 3)];

    assert_eq!(compute_unlock_date_time(1, anchor, 0).unlock_date, Some(at(2025, 3, 1, 9, 0)));
    assert_eq!(compute_unlock_date_time(3, anchor, 0).unlock_date, Some(at(2025, 3, 3, 9, 0)));

    let (start, end) = (day(2025, 3, 1), day(2025, 3, 5));
    let marked = find_unlock_dates_in_range(&items, &[], anchor, 0, start, end);
    let mut marked: Vec<String> = marked.into_iter().collect();
    marked.sort();
    assert_eq!(marked, vec!["2025-03-01", "2025-03-03"]);

    let on_third = find_events_on_date(&items, &[], anchor, 0, day(2025, 3, 3));
    assert_eq!(on_third.len(), 1);
    assert_eq!(on_third[0].id, "b");
    assert_eq!(on_third[0].time_label.as_deref(), Some("9:00 AM"));
}

#[test]
fn test_raw_anchor_with_offset() {
    for d in 1..=5u32 {
        for o in 0..=2u32 {
            let got = compute_unlock_from_raw(d, Some("2025-01-10T15:30:00"), o, Tz::UTC);
            let expected = at(2025, 1, 10, 15, 30) + Duration::days(i64::from(d - 1 + o));
            assert_eq!(got.unlock_date, Some(expected));
            assert_eq!(got.unlock_time_label.as_deref(), Some("3:30 PM"));
        }
    }
}

#[test]
fn test_session_a_day_out_gets_both_reminders() {
    let now = at(2025, 6, 1, 8, 0);
    let sessions = vec![SessionEvent::new("s1", "Live Q&A", now + Duration::hours(25))];

    let plan = plan_session_reminders(&sessions, now.and_utc(), &BTreeSet::new(), Tz::UTC);
    assert_eq!(plan.to_schedule.len(), 2);

    let mut fire: Vec<NaiveDateTime> = plan.to_schedule.iter().map(|r| r.fire_at).collect();
    fire.sort();
    assert_eq!(fire, vec![now + Duration::hours(1), now + Duration::hours(24)]);
}

#[test]
fn test_planning_twice_is_idempotent() {
    let now = at(2025, 6, 1, 8, 0);
    let sessions = vec![
        SessionEvent::new("s1", "Live Q&A", now + Duration::hours(25)),
        SessionEvent::new("s2", "Office hours", now + Duration::days(3)),
        SessionEvent::new("s3", "Already over", now - Duration::hours(2)),
    ];
    let enrollments = vec![Enrollment {
        enrollment_id: "e1".into(),
        program_title: None,
        round: EnrollmentRound::new("r1", Some(now)).with_offset(1),
        items: vec![
            ContentItem::module("m1", "Week one", 1),
            ContentItem::track("t1", "Sleep story", 4),
        ],
    }];

    let first = plan_session_reminders(&sessions, now.and_utc(), &BTreeSet::new(), Tz::UTC);
    assert_eq!(first.to_schedule.len(), 4);
    assert!(!first.updated_keys.iter().any(|k| k.ends_with("s3")));
    let second = plan_session_reminders(&sessions, now.and_utc(), &first.updated_keys, Tz::UTC);
    assert!(second.to_schedule.is_empty());

    let first =
        plan_content_unlock_reminders(&enrollments, now.and_utc(), &BTreeSet::new(), Tz::UTC);
    assert_eq!(first.to_schedule.len(), 2);
    let second =
        plan_content_unlock_reminders(&enrollments, now.and_utc(), &first.updated_keys, Tz::UTC);
    assert!(second.to_schedule.is_empty());
}

#[test]
fn test_past_session_adds_no_keys() {
    let now = at(2025, 6, 1, 8, 0);
    let sessions = vec![SessionEvent::new("s1", "Missed", now - Duration::hours(2))];
    let plan = plan_session_reminders(&sessions, now.and_utc(), &BTreeSet::new(), Tz::UTC);
    assert!(plan.to_schedule.is_empty());
    assert!(plan.updated_keys.is_empty());
}

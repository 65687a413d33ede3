//! Reminder planning with stable-key de-duplication.
//!
//! Planners are pure: the caller passes in the keys already scheduled on the
//! device and gets back the new requests plus the updated key set to persist.
//!
//! Session leads are real elapsed hours, so they are subtracted from the UTC
//! instant of the session. Unlocks are whole calendar days and stay on the
//! user's wall clock.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::model::{ContentItem, ContentKind, Enrollment, SessionEvent, SessionStatus};
use crate::time::{clock_label, to_local, to_utc};
use crate::unlock::unlock_for;

/// Numeric-ID bases. Each family owns a disjoint range of width 100_000.
pub const SESSION_ID_BASE: i64 = 1_000_000;
pub const SESSION_1H_OFFSET: i64 = 500_000;
pub const CONTENT_MODULE_ID_BASE: i64 = 2_000_000;
pub const CONTENT_TRACK_ID_BASE: i64 = 3_000_000;

const HASH_MODULUS: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPolicy {
    /// Only events within this many days of `now` are planned.
    pub lookahead_days: i64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self { lookahead_days: 30 }
    }
}

impl ReminderPolicy {
    /// Latest instant still planned. Saturates instead of overflowing.
    fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(self.lookahead_days)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionLead {
    #[serde(rename = "24h")]
    DayBefore,
    #[serde(rename = "1h")]
    HourBefore,
}

impl SessionLead {
    fn offset(&self) -> Duration {
        match self {
            SessionLead::DayBefore => Duration::hours(24),
            SessionLead::HourBefore => Duration::hours(1),
        }
    }

    fn key_prefix(&self) -> &'static str {
        match self {
            SessionLead::DayBefore => "session-24h-",
            SessionLead::HourBefore => "session-1h-",
        }
    }

    fn id_base(&self) -> i64 {
        match self {
            SessionLead::DayBefore => SESSION_ID_BASE,
            SessionLead::HourBefore => SESSION_ID_BASE + SESSION_1H_OFFSET,
        }
    }
}

/// Extra data handed back to the app when the notification is tapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderPayload {
    SessionReminder {
        session_id: String,
        lead: SessionLead,
        #[serde(skip_serializing_if = "Option::is_none")]
        meeting_link: Option<String>,
    },
    ContentUnlock {
        item_id: String,
        round_id: String,
        kind: ContentKind,
    },
}

impl ReminderPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            ReminderPayload::SessionReminder { .. } => "session_reminder",
            ReminderPayload::ContentUnlock { .. } => "content_unlock",
        }
    }
}

/// A local notification to hand to the platform scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub stable_key: String,
    pub numeric_id: i64,
    /// Wall-clock time in the user's zone.
    pub fire_at: NaiveDateTime,
    /// The instant the platform should fire at.
    pub fire_at_utc: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub payload: ReminderPayload,
}

/// Advisory telemetry record for the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: String,
    pub numeric_id: i64,
    pub fire_at: NaiveDateTime,
    pub title: String,
    pub body: String,
}

impl ReminderRequest {
    pub fn log_entry(&self) -> NotificationLogEntry {
        NotificationLogEntry {
            kind: self.payload.type_name().to_string(),
            event: "scheduled".to_string(),
            numeric_id: self.numeric_id,
            fire_at: self.fire_at,
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReminderPlan {
    pub to_schedule: Vec<ReminderRequest>,
    /// Input keys plus every key emitted in `to_schedule`.
    pub updated_keys: BTreeSet<String>,
}

/// Deterministic string hash in `[0, 100_000)`.
///
/// `h = h * 31 + c` over UTF-16 code units with 32-bit wraparound, then
/// absolute value. The platform cancels notifications by integer ID, so the
/// same key must map to the same number on every run.
pub fn stable_hash(key: &str) -> i64 {
    let mut h: i32 = 0;
    for unit in key.encode_utf16() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit));
    }
    i64::from(h.unsigned_abs() % HASH_MODULUS)
}

/// `base + stable_hash(key)`.
pub fn numeric_id(base: i64, key: &str) -> i64 {
    base + stable_hash(key)
}

fn content_id_base(kind: ContentKind) -> i64 {
    match kind {
        ContentKind::Module => CONTENT_MODULE_ID_BASE,
        ContentKind::Track => CONTENT_TRACK_ID_BASE,
    }
}

fn session_text(session: &SessionEvent, lead: SessionLead) -> (String, String) {
    let (title, mut body) = match lead {
        SessionLead::DayBefore => (
            "Session tomorrow".to_string(),
            format!(
                "{} starts at {} tomorrow.",
                session.title,
                clock_label(session.session_date.time())
            ),
        ),
        SessionLead::HourBefore => (
            "Session starting soon".to_string(),
            format!("{} starts in 1 hour.", session.title),
        ),
    };
    if let Some(link) = &session.meeting_link {
        body.push('\n');
        body.push_str(link);
    }
    (title, body)
}

fn content_text(item: &ContentItem, program_title: Option<&str>) -> (String, String) {
    let title = match item.kind {
        ContentKind::Module => "New module unlocked",
        ContentKind::Track => "New track unlocked",
    };
    let body = match program_title {
        Some(program) => format!("{}: {} is now available.", program, item.title),
        None => format!("{} is now available.", item.title),
    };
    (title.to_string(), body)
}

/// Plan 24h-before and 1h-before reminders for upcoming scheduled sessions.
pub fn plan_session_reminders_with(
    sessions: &[SessionEvent],
    now: DateTime<Utc>,
    already_scheduled: &BTreeSet<String>,
    tz: Tz,
    policy: ReminderPolicy,
) -> ReminderPlan {
    let horizon = policy.horizon(now);
    let mut plan = ReminderPlan {
        to_schedule: Vec::new(),
        updated_keys: already_scheduled.clone(),
    };

    for session in sessions {
        if session.status != SessionStatus::Scheduled {
            continue;
        }
        let starts_at = to_utc(session.session_date, tz);
        if starts_at <= now || starts_at > horizon {
            continue;
        }

        for lead in [SessionLead::DayBefore, SessionLead::HourBefore] {
            let key = format!("{}{}", lead.key_prefix(), session.session_id);
            let Some(fire_at_utc) = starts_at.checked_sub_signed(lead.offset()) else {
                continue;
            };
            // Past-due candidates are dropped, not recorded.
            if plan.updated_keys.contains(&key) || fire_at_utc <= now {
                continue;
            }

            let (title, body) = session_text(session, lead);
            plan.to_schedule.push(ReminderRequest {
                numeric_id: numeric_id(lead.id_base(), &key),
                stable_key: key.clone(),
                fire_at: to_local(fire_at_utc, tz),
                fire_at_utc,
                title,
                body,
                payload: ReminderPayload::SessionReminder {
                    session_id: session.session_id.clone(),
                    lead,
                    meeting_link: session.meeting_link.clone(),
                },
            });
            plan.updated_keys.insert(key);
        }
    }

    plan
}

pub fn plan_session_reminders(
    sessions: &[SessionEvent],
    now: DateTime<Utc>,
    already_scheduled: &BTreeSet<String>,
    tz: Tz,
) -> ReminderPlan {
    plan_session_reminders_with(sessions, now, already_scheduled, tz, ReminderPolicy::default())
}

/// Plan one reminder per drip item, firing at its unlock time.
pub fn plan_content_unlock_reminders_with(
    enrollments: &[Enrollment],
    now: DateTime<Utc>,
    already_scheduled: &BTreeSet<String>,
    tz: Tz,
    policy: ReminderPolicy,
) -> ReminderPlan {
    let horizon = policy.horizon(now);
    let mut plan = ReminderPlan {
        to_schedule: Vec::new(),
        updated_keys: already_scheduled.clone(),
    };

    for enrollment in enrollments {
        for item in &enrollment.items {
            if item.drip_delay_days == 0 {
                continue;
            }
            let Some(fire_at) = unlock_for(item, &enrollment.round).unlock_date else {
                continue;
            };
            let fire_at_utc = to_utc(fire_at, tz);
            if fire_at_utc <= now || fire_at_utc > horizon {
                continue;
            }

            let key = item.stable_key();
            if plan.updated_keys.contains(&key) {
                continue;
            }

            let (title, body) = content_text(item, enrollment.program_title.as_deref());
            plan.to_schedule.push(ReminderRequest {
                numeric_id: numeric_id(content_id_base(item.kind), &key),
                stable_key: key.clone(),
                fire_at,
                fire_at_utc,
                title,
                body,
                payload: ReminderPayload::ContentUnlock {
                    item_id: item.item_id.clone(),
                    round_id: enrollment.round.round_id.clone(),
                    kind: item.kind,
                },
            });
            plan.updated_keys.insert(key);
        }
    }

    plan
}

pub fn plan_content_unlock_reminders(
    enrollments: &[Enrollment],
    now: DateTime<Utc>,
    already_scheduled: &BTreeSet<String>,
    tz: Tz,
) -> ReminderPlan {
    let policy = ReminderPolicy::default();
    plan_content_unlock_reminders_with(enrollments, now, already_scheduled, tz, policy)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rescheduled {
    pub sessions: ReminderPlan,
    pub content: ReminderPlan,
}

/// Force recompute: both planners from empty key sets.
///
/// Only for explicit resets and login bootstrap; the caller must also cancel
/// whatever the platform still holds before scheduling these.
pub fn reschedule(
    sessions: &[SessionEvent],
    enrollments: &[Enrollment],
    now: DateTime<Utc>,
    tz: Tz,
    policy: ReminderPolicy,
) -> Rescheduled {
    let empty = BTreeSet::new();
    Rescheduled {
        sessions: plan_session_reminders_with(sessions, now, &empty, tz, policy),
        content: plan_content_unlock_reminders_with(enrollments, now, &empty, tz, policy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnrollmentRound;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    const TZ: Tz = Tz::UTC;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn now_utc() -> DateTime<Utc> {
        now().and_utc()
    }

    fn sessions_plan(sessions: &[SessionEvent], keys: &BTreeSet<String>) -> ReminderPlan {
        plan_session_reminders(sessions, now_utc(), keys, TZ)
    }

    fn content_plan(enrollments: &[Enrollment], keys: &BTreeSet<String>) -> ReminderPlan {
        plan_content_unlock_reminders(enrollments, now_utc(), keys, TZ)
    }

    #[test]
    fn hash_is_deterministic() {
        let a = stable_hash("session-24h-abc");
        let b = stable_hash("session-24h-abc");
        assert_eq!(a, b);
        assert!((0..100_000).contains(&a));
    }

    #[test]
    fn hash_matches_known_values() {
        // "a" = 97; "ab" = 97 * 31 + 98
        assert_eq!(stable_hash(""), 0);
        assert_eq!(stable_hash("a"), 97);
        assert_eq!(stable_hash("ab"), 3105);
    }

    #[test]
    fn hash_has_no_collisions_across_sample() {
        let ids: HashSet<i64> = (0..500)
            .map(|i| numeric_id(SESSION_ID_BASE, &format!("session-24h-{i:04}")))
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn id_families_do_not_overlap() {
        let key = "x";
        let ids = [
            numeric_id(SESSION_ID_BASE, key),
            numeric_id(SESSION_ID_BASE + SESSION_1H_OFFSET, key),
            numeric_id(CONTENT_MODULE_ID_BASE, key),
            numeric_id(CONTENT_TRACK_ID_BASE, key),
        ];
        let distinct: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn two_reminders_for_session_a_day_out() {
        let s = SessionEvent::new("s1", "Group coaching", now() + Duration::hours(25));
        let plan = sessions_plan(&[s], &BTreeSet::new());
        assert_eq!(plan.to_schedule.len(), 2);
        assert_eq!(plan.to_schedule[0].fire_at, now() + Duration::hours(1));
        assert_eq!(plan.to_schedule[1].fire_at, now() + Duration::hours(24));
        assert_eq!(plan.to_schedule[1].fire_at_utc, now_utc() + Duration::hours(24));
        assert_eq!(plan.to_schedule[0].stable_key, "session-24h-s1");
        assert_eq!(plan.to_schedule[1].stable_key, "session-1h-s1");
        assert_eq!(
            plan.to_schedule[1].numeric_id,
            SESSION_ID_BASE + SESSION_1H_OFFSET + stable_hash("session-1h-s1")
        );
    }

    #[test]
    fn session_leads_are_elapsed_hours_across_dst() {
        // Chicago springs forward at 2026-03-08 02:00; 03:30 CDT is 08:30 UTC.
        let tz = chrono_tz::America::Chicago;
        let day = |d: u32, h: u32, m: u32| {
            NaiveDate::from_ymd_opt(2026, 3, d)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
        };
        let planned_at = to_utc(day(1, 9, 0), tz);
        let s = SessionEvent::new("s1", "Morning sit", day(8, 3, 30));
        let starts_at = to_utc(s.session_date, tz);

        let plan = plan_session_reminders(&[s], planned_at, &BTreeSet::new(), tz);
        assert_eq!(plan.to_schedule.len(), 2);

        let day_before = &plan.to_schedule[0];
        assert_eq!(day_before.fire_at_utc, starts_at - Duration::hours(24));
        assert_eq!(day_before.fire_at, day(7, 2, 30));

        let hour_before = &plan.to_schedule[1];
        assert_eq!(hour_before.fire_at_utc, starts_at - Duration::hours(1));
        assert_eq!(hour_before.fire_at, day(8, 1, 30));
        assert_eq!(to_utc(hour_before.fire_at, tz), hour_before.fire_at_utc);
    }

    #[test]
    fn only_hour_reminder_when_day_reminder_passed() {
        let s = SessionEvent::new("s1", "Group coaching", now() + Duration::hours(5));
        let plan = sessions_plan(&[s], &BTreeSet::new());
        assert_eq!(plan.to_schedule.len(), 1);
        assert_eq!(plan.to_schedule[0].stable_key, "session-1h-s1");
        assert!(!plan.updated_keys.contains("session-24h-s1"));
    }

    #[test]
    fn past_session_adds_nothing() {
        let s = SessionEvent::new("s1", "Done", now() - Duration::hours(2));
        let keys: BTreeSet<String> = ["keep".to_string()].into_iter().collect();
        let plan = sessions_plan(&[s], &keys);
        assert!(plan.to_schedule.is_empty());
        assert_eq!(plan.updated_keys, keys);
    }

    #[test]
    fn fire_time_equal_to_now_is_dropped() {
        let s = SessionEvent::new("s1", "Edge", now() + Duration::hours(1));
        let plan = sessions_plan(&[s], &BTreeSet::new());
        assert!(plan.to_schedule.is_empty());
    }

    #[test]
    fn non_scheduled_and_far_sessions_skipped() {
        let in_two_days = now() + Duration::days(2);
        let sessions = vec![
            SessionEvent::new("c", "Cancelled", in_two_days).with_status(SessionStatus::Cancelled),
            SessionEvent::new("d", "Completed", in_two_days).with_status(SessionStatus::Completed),
            SessionEvent::new("far", "Far", now() + Duration::days(31)),
        ];
        let plan = sessions_plan(&sessions, &BTreeSet::new());
        assert!(plan.to_schedule.is_empty());
    }

    #[test]
    fn lookahead_is_configurable() {
        let s = SessionEvent::new("s1", "Soon-ish", now() + Duration::days(10));
        let policy = ReminderPolicy { lookahead_days: 7 };
        let narrow =
            plan_session_reminders_with(&[s.clone()], now_utc(), &BTreeSet::new(), TZ, policy);
        assert!(narrow.to_schedule.is_empty());
        assert_eq!(sessions_plan(&[s], &BTreeSet::new()).to_schedule.len(), 2);
    }

    #[test]
    fn huge_lookahead_saturates_instead_of_panicking() {
        let s = SessionEvent::new("s1", "Group", now() + Duration::hours(25));
        for lookahead_days in [1_000_000_000, i64::MAX] {
            let policy = ReminderPolicy { lookahead_days };
            let sessions =
                plan_session_reminders_with(&[s.clone()], now_utc(), &BTreeSet::new(), TZ, policy);
            assert_eq!(sessions.to_schedule.len(), 2);

            let content = plan_content_unlock_reminders_with(
                &[enrollment()],
                now_utc(),
                &BTreeSet::new(),
                TZ,
                policy,
            );
            // m40 is inside an unbounded window.
            assert_eq!(content.to_schedule.len(), 3);
        }
    }

    #[test]
    fn session_body_includes_time_and_link() {
        let s = SessionEvent::new("s1", "Breathwork", now() + Duration::days(2))
            .with_meeting_link("https://meet.example.com/abc");
        let plan = sessions_plan(&[s], &BTreeSet::new());
        assert_eq!(
            plan.to_schedule[0].body,
            "Breathwork starts at 12:00 PM tomorrow.\nhttps://meet.example.com/abc"
        );
        assert_eq!(plan.to_schedule[1].title, "Session starting soon");
    }

    fn enrollment() -> Enrollment {
        Enrollment {
            enrollment_id: "e1".into(),
            program_title: Some("Calm Foundations".into()),
            round: EnrollmentRound::new("r1", Some(now() - Duration::hours(3))),
            items: vec![
                ContentItem::module("m0", "Welcome", 0),
                ContentItem::module("m1", "Day one", 1),
                ContentItem::module("m2", "Day two", 2),
                ContentItem::track("a1", "Evening audio", 3),
                ContentItem::module("m40", "Too far", 40),
            ],
        }
    }

    #[test]
    fn content_reminders_future_unlocks_only() {
        let plan = content_plan(&[enrollment()], &BTreeSet::new());
        let keys: Vec<&str> = plan.to_schedule.iter().map(|r| r.stable_key.as_str()).collect();
        // m0 is immediate, m1 unlocked three hours ago, m40 is past the lookahead.
        assert_eq!(keys, vec!["content-m2", "content-track-a1"]);
        assert_eq!(plan.to_schedule[0].fire_at, now() - Duration::hours(3) + Duration::days(1));
        assert_eq!(plan.to_schedule[0].body, "Calm Foundations: Day two is now available.");
        assert_eq!(plan.to_schedule[1].title, "New track unlocked");
        assert_eq!(
            plan.to_schedule[1].numeric_id,
            CONTENT_TRACK_ID_BASE + stable_hash("content-track-a1")
        );
    }

    #[test]
    fn content_without_anchor_is_skipped() {
        let mut e = enrollment();
        e.round.first_session_date = None;
        let plan = content_plan(&[e], &BTreeSet::new());
        assert!(plan.to_schedule.is_empty());
        assert!(plan.updated_keys.is_empty());
    }

    #[test]
    fn content_planning_is_idempotent() {
        let first = content_plan(&[enrollment()], &BTreeSet::new());
        let second = content_plan(&[enrollment()], &first.updated_keys);
        assert!(second.to_schedule.is_empty());
        assert_eq!(second.updated_keys, first.updated_keys);
    }

    #[test]
    fn reschedule_ignores_existing_keys() {
        let s = SessionEvent::new("s1", "Group", now() + Duration::hours(25));
        let first = sessions_plan(&[s.clone()], &BTreeSet::new());
        assert!(sessions_plan(&[s.clone()], &first.updated_keys).to_schedule.is_empty());

        let again = reschedule(&[s], &[enrollment()], now_utc(), TZ, ReminderPolicy::default());
        assert_eq!(again.sessions.to_schedule.len(), 2);
        assert_eq!(again.content.to_schedule.len(), 2);
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let s = SessionEvent::new("s1", "Group", now() + Duration::hours(25));
        let plan = sessions_plan(&[s], &BTreeSet::new());
        let v = serde_json::to_value(&plan.to_schedule[0].payload).unwrap();
        assert_eq!(v["type"], "session_reminder");
        assert_eq!(v["lead"], "24h");
        assert_eq!(v["session_id"], "s1");

        let log = serde_json::to_value(plan.to_schedule[0].log_entry()).unwrap();
        assert_eq!(log["type"], "session_reminder");
        assert_eq!(log["event"], "scheduled");
    }
}

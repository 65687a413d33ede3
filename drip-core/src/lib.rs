//! drip-core: drip-content unlock scheduling and reminder de-duplication.
//!
//! Everything here is pure. Storage, the platform notification scheduler and
//! the event log live in the caller (see `drip-cli`).

pub mod calendar;
pub mod model;
pub mod nudges;
pub mod reminders;
pub mod time;
pub mod unlock;

pub use calendar::{
    find_events_on_date, find_unlock_dates_in_range, order_events, CalendarEvent,
    CalendarEventKind,
};
pub use model::{
    ContentItem, ContentKind, Enrollment, EnrollmentRound, SessionEvent, SessionStatus,
    UserProfile,
};
pub use nudges::{
    classify_inactivity, is_eligible_for_nudge, plan_nudges, InactivityWindow, MessageTemplate,
    Nudge, DEFAULT_NUDGE_HOURS, INACTIVITY_TIERS,
};
pub use reminders::{
    numeric_id, plan_content_unlock_reminders, plan_content_unlock_reminders_with,
    plan_session_reminders, plan_session_reminders_with, reschedule, stable_hash,
    NotificationLogEntry, ReminderPayload, ReminderPlan, ReminderPolicy, ReminderRequest,
    Rescheduled, SessionLead,
};
pub use unlock::{compute_unlock_date_time, compute_unlock_from_raw, unlock_for, UnlockTime};

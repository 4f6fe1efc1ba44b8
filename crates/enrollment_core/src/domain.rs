//! crates/enrollment_core/src/domain.rs
//!
//! Defines the pure, core data structures for the enrollment engine.
//! These structs are independent of any database or serialization format
//! used by the surrounding web application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of conference activity a student can enroll into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Workshop,
    Competition,
    Talk,
}

/// A read-only view of one activity from the catalog.
///
/// The engine never mutates an activity's own fields; the only derived value
/// it owns is `enrolled_count`, which the durable store updates atomically
/// on admission.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub kind: ActivityKind,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// `None` means the activity has no seat limit.
    pub capacity: Option<u32>,
    pub enrolled_count: u32,
    pub published: bool,
    pub active: bool,
}

impl Activity {
    /// The activity's schedule as a validated half-open interval, or `None`
    /// if the catalog row is malformed (`ends_at <= starts_at`).
    pub fn window(&self) -> Option<TimeWindow> {
        TimeWindow::new(self.starts_at, self.ends_at)
    }
}

/// A half-open time interval `[start, end)`.
///
/// Construction enforces `end > start`, so a `TimeWindow` that exists is
/// always well-formed and the conflict detector never sees a zero-length or
/// inverted window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Returns `None` when `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Half-open overlap test: back-to-back windows do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The shared sub-interval of two overlapping windows.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        Self::new(self.start.max(other.start), self.end.min(other.end))
    }
}

/// One student's admitted seat in one activity.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub activity_id: String,
    pub created_at: DateTime<Utc>,
    /// Human-readable label, unique within the activity. See [`seat_number`].
    pub seat_number: String,
    /// Opaque single-use token presented at the door (QR scan or manual entry).
    pub attendance_token: String,
    pub attended: bool,
    /// Set exactly once, when `attended` flips to true.
    pub attended_at: Option<DateTime<Utc>>,
}

/// Builds the seat label for the `index`-th enrollment of an activity, where
/// `index` is the activity's enrollment count *after* the admitting increment
/// (so the first seat of "Aula 101" is `"Aula 101-001"`).
pub fn seat_number(location: &str, index: u32) -> String {
    format!("{}-{:03}", location, index)
}

/// Why a single activity within a batch was not enrolled.
///
/// Every failure in the engine is scoped to one activity or one attendance
/// event and returned to the caller as data; nothing here is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// The activity id is unknown to the catalog.
    NotFound,
    /// The same activity id appeared more than once in one batch request.
    DuplicateRequest,
    /// The activity's catalog window is malformed (`end <= start`).
    InvalidSchedule,
    /// The activity overlaps an existing enrollment or a sibling candidate.
    ScheduleConflict,
    ActivityFull,
    ActivityNotPublished,
    ActivityInactive,
    /// The durable store failed transiently; the caller may retry this
    /// activity. Never conflated with `ActivityFull`.
    StoreUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn zero_length_window_is_rejected() {
        assert!(TimeWindow::new(at(9), at(9)).is_none());
        assert!(TimeWindow::new(at(10), at(9)).is_none());
        assert!(TimeWindow::new(at(9), at(10)).is_some());
    }

    #[test]
    fn seat_numbers_are_zero_padded() {
        assert_eq!(seat_number("Aula 101", 1), "Aula 101-001");
        assert_eq!(seat_number("Aula 101", 42), "Aula 101-042");
        assert_eq!(seat_number("Main Hall", 1000), "Main Hall-1000");
    }
}

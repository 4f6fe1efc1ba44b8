//! crates/enrollment_core/src/engine.rs
//!
//! The enrollment admission engine: orchestrates conflict screening and
//! capacity admission for batch enrollment, and enforces single-use
//! attendance confirmation. The engine is stateless between calls; every
//! invocation derives its view of the world from the stores.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::capacity::{Admission, CapacityController, CapacityStatus};
use crate::conflict::{find_conflicts, CandidateWindow, WindowSource};
use crate::domain::{Activity, Enrollment, FailureReason, TimeWindow};
use crate::ports::{CatalogStore, EnrollmentStore, NewEnrollment, PortResult, TokenRedemption};

//=========================================================================================
// Result Types
//=========================================================================================

/// One activity that was not enrolled, and why. `conflict_with` names the
/// conflicting activity's title when the reason is a schedule conflict.
#[derive(Debug, Clone)]
pub struct RefusedActivity {
    pub activity_id: String,
    pub reason: FailureReason,
    pub conflict_with: Option<String>,
}

impl RefusedActivity {
    fn new(activity_id: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            activity_id: activity_id.into(),
            reason,
            conflict_with: None,
        }
    }
}

/// Aggregate outcome of one batch enrollment call.
///
/// Partial failure is deliberate: activities that were admitted stay enrolled
/// even when siblings in the same batch fail, and the caller must present the
/// per-activity breakdown rather than claim total success.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<Enrollment>,
    pub failed: Vec<RefusedActivity>,
}

impl BatchOutcome {
    /// "Total success" in the sense the callers care about: at least one
    /// activity was enrolled.
    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

/// Outcome of presenting an attendance token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    /// First redemption; `attended_at` was recorded in this call.
    Ok,
    /// The token was already redeemed; visibly distinct from the first scan.
    AlreadyAttended,
    /// No enrollment carries this token.
    NotFound,
}

#[derive(Debug, Clone)]
pub struct AttendanceOutcome {
    pub status: AttendanceStatus,
    pub enrollment: Option<Enrollment>,
}

/// Advisory occupancy snapshot for one activity.
#[derive(Debug, Clone)]
pub struct CapacityReport {
    pub activity_id: String,
    pub status: CapacityStatus,
    pub current_count: u32,
    pub capacity: Option<u32>,
}

/// One reported overlap from the standalone conflict validation entry point.
#[derive(Debug, Clone)]
pub struct ValidatedConflict {
    pub activity_id: String,
    pub conflicting_activity_id: String,
    pub overlap: TimeWindow,
}

/// Result of screening a requested set without touching any enrollment state.
#[derive(Debug, Clone, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<ValidatedConflict>,
    /// Requested ids the catalog does not know.
    pub unknown_ids: Vec<String>,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

//=========================================================================================
// The Engine
//=========================================================================================

/// Orchestrates the conflict detector and the capacity controller against the
/// catalog and enrollment stores. The engine is the sole writer of
/// enrollments; the catalog is read-only from here.
#[derive(Clone)]
pub struct EnrollmentEngine {
    catalog: Arc<dyn CatalogStore>,
    store: Arc<dyn EnrollmentStore>,
    controller: CapacityController,
}

impl EnrollmentEngine {
    pub fn new(catalog: Arc<dyn CatalogStore>, store: Arc<dyn EnrollmentStore>) -> Self {
        let controller = CapacityController::new(store.clone());
        Self {
            catalog,
            store,
            controller,
        }
    }

    /// Enrolls `student_id` into each of `activity_ids`, independently.
    ///
    /// Pipeline per call: duplicate screening, catalog lookup, window
    /// validation, conflict screening over existing + requested windows, then
    /// capacity admission per surviving activity in ascending id order (the
    /// order is for deterministic outcomes, not correctness). Failures never
    /// abort sibling activities, and earlier successes are never rolled back.
    ///
    /// A batch-level `Err` is returned only when the student's own enrollment
    /// state cannot be read at all; everything after that point degrades to
    /// per-activity failure entries.
    pub async fn enroll_batch(
        &self,
        student_id: Uuid,
        activity_ids: &[String],
    ) -> PortResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        // Duplicate ids never reach the conflict detector; they are a request
        // shape error, not a time overlap. Each repeated id is reported once.
        let mut requested: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut duplicates: HashSet<&str> = HashSet::new();
        for id in activity_ids {
            if seen.insert(id) {
                requested.push(id.clone());
            } else if duplicates.insert(id) {
                outcome
                    .failed
                    .push(RefusedActivity::new(id, FailureReason::DuplicateRequest));
            }
        }

        // Resolve the requested ids against the catalog. A store hiccup on
        // one lookup fails that activity alone, never the batch.
        let mut candidates = Vec::new();
        for id in &requested {
            match self.catalog.get_activity(id).await {
                Ok(Some(activity)) => {
                    if activity.window().is_some() {
                        candidates.push(activity);
                    } else {
                        outcome
                            .failed
                            .push(RefusedActivity::new(id, FailureReason::InvalidSchedule));
                    }
                }
                Ok(None) => outcome
                    .failed
                    .push(RefusedActivity::new(id, FailureReason::NotFound)),
                Err(_) => outcome
                    .failed
                    .push(RefusedActivity::new(id, FailureReason::StoreUnavailable)),
            }
        }

        let conflicted = self.screen_conflicts(student_id, &candidates).await?;

        // Deterministic admission order across the surviving set.
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        for activity in candidates {
            if let Some(with) = conflicted.get(&activity.id) {
                outcome.failed.push(RefusedActivity {
                    activity_id: activity.id.clone(),
                    reason: FailureReason::ScheduleConflict,
                    conflict_with: Some(with.clone()),
                });
                continue;
            }

            let new = NewEnrollment {
                id: Uuid::new_v4(),
                student_id,
                activity_id: activity.id.clone(),
                created_at: Utc::now(),
                attendance_token: Uuid::new_v4().to_string(),
            };
            match self.controller.try_admit(&activity, new).await {
                Ok(Admission::Admitted(enrollment)) => outcome.succeeded.push(enrollment),
                Ok(Admission::Refused { reason, .. }) => outcome
                    .failed
                    .push(RefusedActivity::new(&activity.id, reason)),
                Err(_) => outcome
                    .failed
                    .push(RefusedActivity::new(&activity.id, FailureReason::StoreUnavailable)),
            }
        }

        Ok(outcome)
    }

    /// Confirms a student's presence via their attendance token, at most once.
    ///
    /// A second presentation of the same token reports `AlreadyAttended`
    /// rather than silently succeeding, so a replayed QR scan is visibly
    /// different from the first.
    pub async fn confirm_attendance(&self, token: &str) -> PortResult<AttendanceOutcome> {
        let outcome = match self.store.redeem_token(token, Utc::now()).await? {
            TokenRedemption::Confirmed(enrollment) => AttendanceOutcome {
                status: AttendanceStatus::Ok,
                enrollment: Some(enrollment),
            },
            TokenRedemption::AlreadyUsed(enrollment) => AttendanceOutcome {
                status: AttendanceStatus::AlreadyAttended,
                enrollment: Some(enrollment),
            },
            TokenRedemption::Unknown => AttendanceOutcome {
                status: AttendanceStatus::NotFound,
                enrollment: None,
            },
        };
        Ok(outcome)
    }

    /// Advisory occupancy snapshot for the UI. May be stale by the time the
    /// student submits; the authoritative gate remains the admission path.
    /// Unknown ids are omitted from the result.
    pub async fn capacity_status(&self, activity_ids: &[String]) -> PortResult<Vec<CapacityReport>> {
        let mut reports = Vec::new();
        let mut seen = HashSet::new();
        for id in activity_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if let Some(activity) = self.catalog.get_activity(id).await? {
                reports.push(CapacityReport {
                    activity_id: activity.id.clone(),
                    status: CapacityStatus::classify(activity.enrolled_count, activity.capacity),
                    current_count: activity.enrolled_count,
                    capacity: activity.capacity,
                });
            }
        }
        Ok(reports)
    }

    /// Runs the conflict detector over just the requested set, without any
    /// student context, so the UI can warn before submission. Repeated ids
    /// are collapsed; unknown ids are reported back instead of ignored.
    pub async fn validate_conflicts(&self, activity_ids: &[String]) -> PortResult<ConflictReport> {
        let mut report = ConflictReport::default();
        let mut windows = Vec::new();
        let mut seen = HashSet::new();
        for id in activity_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.catalog.get_activity(id).await? {
                Some(activity) => {
                    // A malformed window cannot overlap anything; it is
                    // surfaced by the enrollment path, not here.
                    if let Some(window) = activity.window() {
                        windows.push(CandidateWindow {
                            activity_id: activity.id.clone(),
                            title: activity.title.clone(),
                            window,
                            source: WindowSource::Requested,
                        });
                    }
                }
                None => report.unknown_ids.push(id.clone()),
            }
        }

        report.conflicts = find_conflicts(&windows)
            .into_iter()
            .map(|pair| ValidatedConflict {
                activity_id: pair.first.activity_id,
                conflicting_activity_id: pair.second.activity_id,
                overlap: pair.overlap,
            })
            .collect();
        Ok(report)
    }

    /// Builds the candidate window set (existing enrollments + requested
    /// activities) and returns, for every requested activity involved in a
    /// conflict, the title of the first activity it clashes with.
    async fn screen_conflicts(
        &self,
        student_id: Uuid,
        candidates: &[Activity],
    ) -> PortResult<HashMap<String, String>> {
        let mut windows = Vec::new();

        for enrollment in self.store.enrollments_for_student(student_id).await? {
            // A stale enrollment whose activity has vanished from the catalog
            // cannot constrain the schedule.
            if let Some(activity) = self.catalog.get_activity(&enrollment.activity_id).await? {
                if let Some(window) = activity.window() {
                    windows.push(CandidateWindow {
                        activity_id: activity.id,
                        title: activity.title,
                        window,
                        source: WindowSource::Existing,
                    });
                }
            }
        }

        for activity in candidates {
            if let Some(window) = activity.window() {
                windows.push(CandidateWindow {
                    activity_id: activity.id.clone(),
                    title: activity.title.clone(),
                    window,
                    source: WindowSource::Requested,
                });
            }
        }

        let mut conflicted = HashMap::new();
        for pair in find_conflicts(&windows) {
            Self::note_conflict(&mut conflicted, &pair.first, &pair.second);
            Self::note_conflict(&mut conflicted, &pair.second, &pair.first);
        }
        Ok(conflicted)
    }

    fn note_conflict(
        conflicted: &mut HashMap<String, String>,
        side: &CandidateWindow,
        other: &CandidateWindow,
    ) {
        if side.source == WindowSource::Requested {
            conflicted
                .entry(side.activity_id.clone())
                .or_insert_with(|| other.title.clone());
        }
    }
}

//! crates/enrollment_core/src/capacity.rs
//!
//! The capacity admission controller: occupancy classification for the UI
//! plus the one hard admission gate. Classification is advisory and may act
//! on a stale count; the authoritative check-then-increment happens inside
//! the store's atomic `persist_admission` primitive.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Activity, Enrollment, FailureReason};
use crate::ports::{AdmissionGrant, EnrollmentStore, NewEnrollment, PortResult};

/// Presentation-level occupancy bands. Only `Full` corresponds to a hard
/// refusal; the rest exist so the UI can warn before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityStatus {
    /// No capacity set on the activity.
    Unlimited,
    /// Less than 70% full.
    Available,
    /// 70-89% full.
    FewSpots,
    /// 90-99% full.
    NearlyFull,
    /// At or above capacity.
    Full,
}

impl CapacityStatus {
    /// Classifies an occupancy snapshot into a band.
    pub fn classify(enrolled_count: u32, capacity: Option<u32>) -> Self {
        let Some(capacity) = capacity else {
            return Self::Unlimited;
        };
        if enrolled_count >= capacity {
            return Self::Full;
        }
        // capacity > enrolled_count >= 0 here, so capacity >= 1.
        let percent = u64::from(enrolled_count) * 100 / u64::from(capacity);
        match percent {
            0..=69 => Self::Available,
            70..=89 => Self::FewSpots,
            _ => Self::NearlyFull,
        }
    }
}

/// Decision returned by [`CapacityController::try_admit`].
#[derive(Debug, Clone)]
pub enum Admission {
    Admitted(Enrollment),
    Refused {
        reason: FailureReason,
        current_count: u32,
        capacity: Option<u32>,
    },
}

/// Owns the read-check-increment sequence for activity seat counters. No
/// other component may mutate a counter.
#[derive(Clone)]
pub struct CapacityController {
    store: Arc<dyn EnrollmentStore>,
}

impl CapacityController {
    pub fn new(store: Arc<dyn EnrollmentStore>) -> Self {
        Self { store }
    }

    /// Attempts to admit one enrollment into `activity`.
    ///
    /// Visibility preconditions (published, active) are checked against the
    /// catalog snapshot; the capacity gate itself is delegated to the store's
    /// atomic primitive so that racing callers for the last seat cannot
    /// oversell. A refusal mutates nothing.
    pub async fn try_admit(
        &self,
        activity: &Activity,
        new: NewEnrollment,
    ) -> PortResult<Admission> {
        if let Some(reason) = Self::visibility_block(activity) {
            return Ok(Admission::Refused {
                reason,
                current_count: activity.enrolled_count,
                capacity: activity.capacity,
            });
        }

        match self.store.persist_admission(new).await? {
            AdmissionGrant::Seated(enrollment) => Ok(Admission::Admitted(enrollment)),
            AdmissionGrant::Full { current_count } => Ok(Admission::Refused {
                reason: FailureReason::ActivityFull,
                current_count,
                capacity: activity.capacity,
            }),
        }
    }

    fn visibility_block(activity: &Activity) -> Option<FailureReason> {
        if !activity.published {
            Some(FailureReason::ActivityNotPublished)
        } else if !activity.active {
            Some(FailureReason::ActivityInactive)
        } else {
            None
        }
    }
}

//! crates/enrollment_core/src/ports.rs
//!
//! Defines the store contracts (traits) the engine depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the durable store that actually holds activities,
//! enrollments and attendance records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Activity, Enrollment};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the external store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Transient infrastructure failure; the affected operation may be retried.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected store error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

/// Read-only view of the activity catalog. The catalog is owned externally;
/// the engine only ever reads it.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns `Ok(None)` for an id the catalog does not know.
    async fn get_activity(&self, activity_id: &str) -> PortResult<Option<Activity>>;
}

/// The enrollment the engine asks the store to persist. The seat index is
/// chosen by the store inside the admitting transaction, so it is absent here.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub activity_id: String,
    pub created_at: DateTime<Utc>,
    pub attendance_token: String,
}

/// Outcome of the atomic admit-and-insert primitive.
#[derive(Debug, Clone)]
pub enum AdmissionGrant {
    /// The counter was below capacity; the enrollment row now exists with its
    /// assigned seat number.
    Seated(Enrollment),
    /// The counter was already at capacity; nothing was mutated.
    Full { current_count: u32 },
}

/// Outcome of the atomic token check-and-set.
#[derive(Debug, Clone)]
pub enum TokenRedemption {
    /// `attended` flipped false -> true in this call.
    Confirmed(Enrollment),
    /// The token was valid but had already been redeemed earlier.
    AlreadyUsed(Enrollment),
    /// No enrollment carries this token.
    Unknown,
}

/// Writable store of enrollments and the per-activity seat counter.
///
/// The two mutating operations are the only places the engine's invariants
/// depend on atomicity: `persist_admission` must perform its capacity check,
/// counter increment and row insert as one transaction, and `redeem_token`
/// must perform its read-check-set as one step. Both are serialized by the
/// store across all concurrent callers for the same activity or token.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// All non-cancelled enrollments of one student.
    async fn enrollments_for_student(&self, student_id: Uuid) -> PortResult<Vec<Enrollment>>;

    /// Atomically admit one more enrollment into the activity if, and only
    /// if, its counter is below capacity (or the activity is unbounded).
    async fn persist_admission(&self, new: NewEnrollment) -> PortResult<AdmissionGrant>;

    /// Atomically flip `attended` for the enrollment holding `token`,
    /// recording `at` as the attendance instant on the first redemption.
    async fn redeem_token(&self, token: &str, at: DateTime<Utc>) -> PortResult<TokenRedemption>;
}

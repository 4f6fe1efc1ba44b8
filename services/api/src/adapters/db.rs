//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `CatalogStore` and `EnrollmentStore` ports from the
//! core crate. It handles all interactions with the PostgreSQL database using
//! `sqlx`.
//!
//! The admission primitive is a conditional `UPDATE ... RETURNING` so the
//! capacity check and the counter increment are one atomic step; racing
//! callers for the last seat are serialized by the row lock, and the
//! enrollment row is inserted in the same transaction as the increment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use enrollment_core::domain::{seat_number, Activity, ActivityKind, Enrollment};
use enrollment_core::ports::{
    AdmissionGrant, CatalogStore, EnrollmentStore, NewEnrollment, PortError, PortResult,
    TokenRedemption,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements both store ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a `sqlx` error onto the port taxonomy: connection-level failures are
/// transient (`Unavailable`, the caller may retry), everything else is
/// unexpected.
fn port_err(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => PortError::Unavailable(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ActivityRecord {
    id: String,
    title: String,
    kind: String,
    location: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    capacity: Option<i32>,
    enrolled_count: i32,
    published: bool,
    active: bool,
}

impl ActivityRecord {
    fn to_domain(self) -> PortResult<Activity> {
        let kind = match self.kind.as_str() {
            "workshop" => ActivityKind::Workshop,
            "competition" => ActivityKind::Competition,
            "talk" => ActivityKind::Talk,
            other => {
                return Err(PortError::Unexpected(format!(
                    "Unknown activity kind '{}' for activity {}",
                    other, self.id
                )))
            }
        };
        Ok(Activity {
            id: self.id,
            title: self.title,
            kind,
            location: self.location,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            capacity: self.capacity.map(|c| c.max(0) as u32),
            enrolled_count: self.enrolled_count.max(0) as u32,
            published: self.published,
            active: self.active,
        })
    }
}

#[derive(FromRow)]
struct EnrollmentRecord {
    id: Uuid,
    student_id: Uuid,
    activity_id: String,
    created_at: DateTime<Utc>,
    seat_number: String,
    attendance_token: String,
    attended: bool,
    attended_at: Option<DateTime<Utc>>,
}

impl EnrollmentRecord {
    fn to_domain(self) -> Enrollment {
        Enrollment {
            id: self.id,
            student_id: self.student_id,
            activity_id: self.activity_id,
            created_at: self.created_at,
            seat_number: self.seat_number,
            attendance_token: self.attendance_token,
            attended: self.attended,
            attended_at: self.attended_at,
        }
    }
}

const ENROLLMENT_COLUMNS: &str =
    "id, student_id, activity_id, created_at, seat_number, attendance_token, attended, attended_at";

//=========================================================================================
// `CatalogStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CatalogStore for PgStore {
    async fn get_activity(&self, activity_id: &str) -> PortResult<Option<Activity>> {
        let record = sqlx::query_as::<_, ActivityRecord>(
            "SELECT id, title, kind, location, starts_at, ends_at, capacity, enrolled_count, \
             published, active FROM activities WHERE id = $1",
        )
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_err)?;

        record.map(ActivityRecord::to_domain).transpose()
    }
}

//=========================================================================================
// `EnrollmentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn enrollments_for_student(&self, student_id: Uuid) -> PortResult<Vec<Enrollment>> {
        let records = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM enrollments WHERE student_id = $1 ORDER BY created_at ASC",
            ENROLLMENT_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_err)?;

        Ok(records.into_iter().map(EnrollmentRecord::to_domain).collect())
    }

    async fn persist_admission(&self, new: NewEnrollment) -> PortResult<AdmissionGrant> {
        let mut tx = self.pool.begin().await.map_err(port_err)?;

        // Check-then-increment as a single statement. No matching row means
        // the activity is full (or gone); the row count after the increment
        // doubles as the seat index.
        let admitted = sqlx::query_as::<_, (i32, String)>(
            "UPDATE activities SET enrolled_count = enrolled_count + 1 \
             WHERE id = $1 AND (capacity IS NULL OR enrolled_count < capacity) \
             RETURNING enrolled_count, location",
        )
        .bind(&new.activity_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(port_err)?;

        let Some((count, location)) = admitted else {
            tx.rollback().await.map_err(port_err)?;
            let current = sqlx::query_as::<_, (i32,)>(
                "SELECT enrolled_count FROM activities WHERE id = $1",
            )
            .bind(&new.activity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_err)?;
            return Ok(AdmissionGrant::Full {
                current_count: current.map(|(c,)| c.max(0) as u32).unwrap_or(0),
            });
        };

        let seat = seat_number(&location, count.max(0) as u32);
        let record = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "INSERT INTO enrollments \
             (id, student_id, activity_id, created_at, seat_number, attendance_token) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(new.id)
        .bind(new.student_id)
        .bind(&new.activity_id)
        .bind(new.created_at)
        .bind(&seat)
        .bind(&new.attendance_token)
        .fetch_one(&mut *tx)
        .await
        .map_err(port_err)?;

        tx.commit().await.map_err(port_err)?;
        Ok(AdmissionGrant::Seated(record.to_domain()))
    }

    async fn redeem_token(&self, token: &str, at: DateTime<Utc>) -> PortResult<TokenRedemption> {
        // Atomic check-and-set: the WHERE clause only matches an unredeemed
        // token, so a replayed scan never rewrites attended_at.
        let confirmed = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "UPDATE enrollments SET attended = TRUE, attended_at = $2 \
             WHERE attendance_token = $1 AND attended = FALSE RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(token)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_err)?;

        if let Some(record) = confirmed {
            return Ok(TokenRedemption::Confirmed(record.to_domain()));
        }

        let existing = sqlx::query_as::<_, EnrollmentRecord>(&format!(
            "SELECT {} FROM enrollments WHERE attendance_token = $1",
            ENROLLMENT_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_err)?;

        Ok(match existing {
            Some(record) => TokenRedemption::AlreadyUsed(record.to_domain()),
            None => TokenRedemption::Unknown,
        })
    }
}

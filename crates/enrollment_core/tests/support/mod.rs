//! Shared test support: an in-memory implementation of both store ports.
//!
//! The capacity gate is a mutex-guarded check-then-increment, which gives the
//! same serialization guarantee the production Postgres adapter gets from its
//! conditional `UPDATE`, so the engine's race behavior can be exercised
//! without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use enrollment_core::domain::{seat_number, Activity, ActivityKind, Enrollment};
use enrollment_core::ports::{
    AdmissionGrant, CatalogStore, EnrollmentStore, NewEnrollment, PortError, PortResult,
    TokenRedemption,
};

#[derive(Default)]
struct Inner {
    activities: HashMap<String, Activity>,
    enrollments: Vec<Enrollment>,
    /// When set, every admission attempt fails as if the store were down.
    admissions_unavailable: bool,
    /// Activity ids whose admission never completes, for abandonment tests.
    hanging_admissions: Vec<String>,
}

/// In-memory catalog + enrollment store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_activity(&self, activity: Activity) {
        let mut inner = self.inner.lock().unwrap();
        inner.activities.insert(activity.id.clone(), activity);
    }

    pub fn fail_admissions(&self, unavailable: bool) {
        self.inner.lock().unwrap().admissions_unavailable = unavailable;
    }

    pub fn hang_admissions_for(&self, activity_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .hanging_admissions
            .push(activity_id.to_string());
    }

    pub fn enrolled_count(&self, activity_id: &str) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner
            .activities
            .get(activity_id)
            .map(|a| a.enrolled_count)
            .unwrap_or(0)
    }

    pub fn enrollments(&self) -> Vec<Enrollment> {
        self.inner.lock().unwrap().enrollments.clone()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_activity(&self, activity_id: &str) -> PortResult<Option<Activity>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.activities.get(activity_id).cloned())
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn enrollments_for_student(&self, student_id: Uuid) -> PortResult<Vec<Enrollment>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn persist_admission(&self, new: NewEnrollment) -> PortResult<AdmissionGrant> {
        let should_hang = {
            let inner = self.inner.lock().unwrap();
            inner.hanging_admissions.contains(&new.activity_id)
        };
        if should_hang {
            std::future::pending::<()>().await;
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.admissions_unavailable {
            return Err(PortError::Unavailable("injected outage".to_string()));
        }
        let activity = inner
            .activities
            .get_mut(&new.activity_id)
            .ok_or_else(|| PortError::Unexpected(format!("no activity {}", new.activity_id)))?;

        if let Some(capacity) = activity.capacity {
            if activity.enrolled_count >= capacity {
                return Ok(AdmissionGrant::Full {
                    current_count: activity.enrolled_count,
                });
            }
        }
        activity.enrolled_count += 1;
        let enrollment = Enrollment {
            id: new.id,
            student_id: new.student_id,
            activity_id: new.activity_id,
            created_at: new.created_at,
            seat_number: seat_number(&activity.location, activity.enrolled_count),
            attendance_token: new.attendance_token,
            attended: false,
            attended_at: None,
        };
        inner.enrollments.push(enrollment.clone());
        Ok(AdmissionGrant::Seated(enrollment))
    }

    async fn redeem_token(&self, token: &str, at: DateTime<Utc>) -> PortResult<TokenRedemption> {
        let mut inner = self.inner.lock().unwrap();
        let Some(enrollment) = inner
            .enrollments
            .iter_mut()
            .find(|e| e.attendance_token == token)
        else {
            return Ok(TokenRedemption::Unknown);
        };
        if enrollment.attended {
            return Ok(TokenRedemption::AlreadyUsed(enrollment.clone()));
        }
        enrollment.attended = true;
        enrollment.attended_at = Some(at);
        Ok(TokenRedemption::Confirmed(enrollment.clone()))
    }
}

/// Activity builder with the defaults most tests want: published, active,
/// scheduled on 2025-03-15 between the given hours.
pub fn activity(
    id: &str,
    title: &str,
    location: &str,
    start_hour: u32,
    end_hour: u32,
    capacity: Option<u32>,
) -> Activity {
    Activity {
        id: id.to_string(),
        title: title.to_string(),
        kind: ActivityKind::Workshop,
        location: location.to_string(),
        starts_at: Utc.with_ymd_and_hms(2025, 3, 15, start_hour, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2025, 3, 15, end_hour, 0, 0).unwrap(),
        capacity,
        enrolled_count: 0,
        published: true,
        active: true,
    }
}

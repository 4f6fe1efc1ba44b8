//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use enrollment_core::capacity::CapacityStatus;
use enrollment_core::domain::{Enrollment, FailureReason};
use enrollment_core::engine::{AttendanceStatus, BatchOutcome, ConflictReport, RefusedActivity};
use enrollment_core::ports::PortError;

use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        enroll_handler,
        confirm_attendance_handler,
        capacity_status_handler,
        validate_conflicts_handler,
    ),
    components(schemas(
        EnrollRequest,
        EnrollResponse,
        EnrollmentDto,
        RefusedDto,
        AttendanceRequest,
        AttendanceResponse,
        AttendanceStatusDto,
        CapacityResponse,
        CapacityDto,
        ValidateConflictsRequest,
        ValidateConflictsResponse,
        ConflictDto,
    )),
    tags(
        (name = "Enrollment API", description = "Admission engine endpoints for the conference registration front-end.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub student_id: Uuid,
    pub activity_ids: Vec<String>,
}

/// One persisted enrollment, including the attendance token the front-end
/// renders as a QR code.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDto {
    pub id: Uuid,
    pub student_id: Uuid,
    pub activity_id: String,
    pub created_at: DateTime<Utc>,
    pub seat_number: String,
    pub attendance_token: String,
    pub attended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attended_at: Option<DateTime<Utc>>,
}

impl From<Enrollment> for EnrollmentDto {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            student_id: e.student_id,
            activity_id: e.activity_id,
            created_at: e.created_at,
            seat_number: e.seat_number,
            attendance_token: e.attendance_token,
            attended: e.attended,
            attended_at: e.attended_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefusedDto {
    pub activity_id: String,
    /// One of the engine's failure reasons, e.g. `ACTIVITY_FULL`.
    #[schema(value_type = String, example = "ACTIVITY_FULL")]
    pub reason: FailureReason,
    /// Title of the clashing activity when the reason is `SCHEDULE_CONFLICT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_with: Option<String>,
}

impl From<RefusedActivity> for RefusedDto {
    fn from(r: RefusedActivity) -> Self {
        Self {
            activity_id: r.activity_id,
            reason: r.reason,
            conflict_with: r.conflict_with,
        }
    }
}

/// Per-activity breakdown of a batch enrollment. A non-empty `failed` list
/// means partial success at best; the front-end must never present a batch
/// with failures as fully successful.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    pub succeeded: Vec<EnrollmentDto>,
    pub failed: Vec<RefusedDto>,
}

impl From<BatchOutcome> for EnrollResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            succeeded: outcome.succeeded.into_iter().map(Into::into).collect(),
            failed: outcome.failed.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AttendanceRequest {
    pub token: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatusDto {
    Ok,
    AlreadyAttended,
    NotFound,
}

impl From<AttendanceStatus> for AttendanceStatusDto {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::Ok => Self::Ok,
            AttendanceStatus::AlreadyAttended => Self::AlreadyAttended,
            AttendanceStatus::NotFound => Self::NotFound,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceResponse {
    pub status: AttendanceStatusDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<EnrollmentDto>,
}

#[derive(Deserialize)]
pub struct CapacityQuery {
    /// Comma-separated activity ids.
    pub ids: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapacityDto {
    pub activity_id: String,
    /// Occupancy band, e.g. `FEW_SPOTS`. Advisory only; the enrollment
    /// endpoint remains the authoritative gate.
    #[schema(value_type = String, example = "FEW_SPOTS")]
    pub status: CapacityStatus,
    pub current_count: u32,
    /// Absent for unlimited activities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapacityResponse {
    pub activities: Vec<CapacityDto>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateConflictsRequest {
    pub activity_ids: Vec<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDto {
    pub activity_id: String,
    pub conflicting_activity_id: String,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateConflictsResponse {
    pub has_conflicts: bool,
    pub conflicts: Vec<ConflictDto>,
    /// Requested ids the catalog does not know.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_found: Vec<String>,
}

impl From<ConflictReport> for ValidateConflictsResponse {
    fn from(report: ConflictReport) -> Self {
        Self {
            has_conflicts: report.has_conflicts(),
            conflicts: report
                .conflicts
                .into_iter()
                .map(|c| ConflictDto {
                    activity_id: c.activity_id,
                    conflicting_activity_id: c.conflicting_activity_id,
                    overlap_start: c.overlap.start(),
                    overlap_end: c.overlap.end(),
                })
                .collect(),
            not_found: report.unknown_ids,
        }
    }
}

/// Maps a batch-level port failure onto an HTTP status. Per-activity store
/// failures never reach here; they come back as `STORE_UNAVAILABLE` entries
/// in the response body.
fn port_status(e: &PortError) -> (StatusCode, String) {
    match e {
        PortError::Unavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Store temporarily unavailable".to_string(),
        ),
        PortError::Unexpected(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        ),
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Enroll a student into a batch of activities.
///
/// Each activity succeeds or fails on its own; successes are never rolled
/// back when a sibling fails.
#[utoipa::path(
    post,
    path = "/enrollments",
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Per-activity breakdown of the batch", body = EnrollResponse),
        (status = 400, description = "Empty activity list"),
        (status = 503, description = "The durable store could not be reached at all")
    )
)]
pub async fn enroll_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<EnrollRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if request.activity_ids.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "activityIds must not be empty".to_string(),
        ));
    }

    match app_state
        .engine
        .enroll_batch(request.student_id, &request.activity_ids)
        .await
    {
        Ok(outcome) => Ok(Json(EnrollResponse::from(outcome))),
        Err(e) => {
            error!("Batch enrollment failed for student {}: {:?}", request.student_id, e);
            Err(port_status(&e))
        }
    }
}

/// Confirm attendance via a scanned (or manually entered) token.
///
/// A second presentation of the same token reports `ALREADY_ATTENDED` so the
/// door staff can tell a replayed QR code from a first scan.
#[utoipa::path(
    post,
    path = "/attendance",
    request_body = AttendanceRequest,
    responses(
        (status = 200, description = "Redemption outcome", body = AttendanceResponse),
        (status = 503, description = "The durable store could not be reached")
    )
)]
pub async fn confirm_attendance_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<AttendanceRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.engine.confirm_attendance(&request.token).await {
        Ok(outcome) => Ok(Json(AttendanceResponse {
            status: outcome.status.into(),
            enrollment: outcome.enrollment.map(Into::into),
        })),
        Err(e) => {
            error!("Attendance confirmation failed: {:?}", e);
            Err(port_status(&e))
        }
    }
}

/// Advisory occupancy snapshot, used by the UI to disable full activities
/// before submission. May be stale by the time the student submits.
#[utoipa::path(
    get,
    path = "/activities/capacity",
    params(
        ("ids" = String, Query, description = "Comma-separated activity ids.")
    ),
    responses(
        (status = 200, description = "Occupancy per known activity; unknown ids are omitted", body = CapacityResponse),
        (status = 503, description = "The durable store could not be reached")
    )
)]
pub async fn capacity_status_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CapacityQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ids: Vec<String> = query
        .ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    match app_state.engine.capacity_status(&ids).await {
        Ok(reports) => Ok(Json(CapacityResponse {
            activities: reports
                .into_iter()
                .map(|r| CapacityDto {
                    activity_id: r.activity_id,
                    status: r.status,
                    current_count: r.current_count,
                    capacity: r.capacity,
                })
                .collect(),
        })),
        Err(e) => {
            error!("Capacity status lookup failed: {:?}", e);
            Err(port_status(&e))
        }
    }
}

/// Screen a set of activities for schedule conflicts without enrolling,
/// so the UI can warn before submission.
#[utoipa::path(
    post,
    path = "/conflicts/validate",
    request_body = ValidateConflictsRequest,
    responses(
        (status = 200, description = "Conflicting pairs within the requested set", body = ValidateConflictsResponse),
        (status = 503, description = "The durable store could not be reached")
    )
)]
pub async fn validate_conflicts_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ValidateConflictsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state
        .engine
        .validate_conflicts(&request.activity_ids)
        .await
    {
        Ok(report) => Ok(Json(ValidateConflictsResponse::from(report))),
        Err(e) => {
            error!("Conflict validation failed: {:?}", e);
            Err(port_status(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn refusal_reasons_serialize_screaming_snake() {
        let refused = RefusedDto {
            activity_id: "ws".to_string(),
            reason: FailureReason::ActivityFull,
            conflict_with: None,
        };
        let json = serde_json::to_value(&refused).unwrap();
        assert_eq!(json["reason"], "ACTIVITY_FULL");
        assert_eq!(json["activityId"], "ws");
        assert!(json.get("conflictWith").is_none());
    }

    #[test]
    fn attendance_status_wire_names() {
        assert_eq!(
            serde_json::to_value(AttendanceStatusDto::Ok).unwrap(),
            "OK"
        );
        assert_eq!(
            serde_json::to_value(AttendanceStatusDto::AlreadyAttended).unwrap(),
            "ALREADY_ATTENDED"
        );
        assert_eq!(
            serde_json::to_value(AttendanceStatusDto::NotFound).unwrap(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn enrollment_dto_uses_camel_case() {
        let dto = EnrollmentDto {
            id: Uuid::nil(),
            student_id: Uuid::nil(),
            activity_id: "intro-react".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 15, 8, 0, 0).unwrap(),
            seat_number: "Aula 101-001".to_string(),
            attendance_token: "tok".to_string(),
            attended: false,
            attended_at: None,
        };
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["seatNumber"], "Aula 101-001");
        assert_eq!(json["activityId"], "intro-react");
        assert!(json.get("attendedAt").is_none());
    }
}

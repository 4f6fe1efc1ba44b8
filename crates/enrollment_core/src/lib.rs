pub mod capacity;
pub mod conflict;
pub mod domain;
pub mod engine;
pub mod ports;

pub use capacity::{Admission, CapacityController, CapacityStatus};
pub use conflict::{find_conflicts, CandidateWindow, ConflictPair, WindowSource};
pub use domain::{seat_number, Activity, ActivityKind, Enrollment, FailureReason, TimeWindow};
pub use engine::{
    AttendanceOutcome, AttendanceStatus, BatchOutcome, CapacityReport, ConflictReport,
    EnrollmentEngine, RefusedActivity, ValidatedConflict,
};
pub use ports::{
    AdmissionGrant, CatalogStore, EnrollmentStore, NewEnrollment, PortError, PortResult,
    TokenRedemption,
};

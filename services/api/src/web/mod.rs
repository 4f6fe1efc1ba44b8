pub mod rest;
pub mod state;

// Re-export the handlers so the binary can build the router without reaching
// into the module tree.
pub use rest::{
    capacity_status_handler, confirm_attendance_handler, enroll_handler,
    validate_conflicts_handler,
};

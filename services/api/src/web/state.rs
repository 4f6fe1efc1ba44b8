//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use enrollment_core::engine::EnrollmentEngine;

use crate::config::Config;

/// The shared application state, created once at startup and passed to all
/// handlers. The engine itself is stateless between calls; everything mutable
/// lives behind its store ports.
#[derive(Clone)]
pub struct AppState {
    pub engine: EnrollmentEngine,
    pub config: Arc<Config>,
}

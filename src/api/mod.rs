//! HTTP API for the Veil engine.
//!
//! ## Endpoints
//!
//! - `GET /status` - Health check
//! - `GET /tasks/status?id=` - Current status string of a task
//! - `POST /tasks/create` - Register a new task
//! - `GET /tasks/delete?id=` - Delete a task (cancels its worker)
//! - `GET /tasks/run?id=` - Start a task's worker
//! - `GET /tasks/all` - Sanitized views of every task

mod routes;
mod tasks;
pub mod types;

pub use routes::{serve, AppState};
pub use types::*;

//! # Veil
//!
//! Automation engine for a university course-registration portal.
//!
//! This library provides:
//! - A federated SSO (SAML) login state machine producing authenticated sessions
//! - A seat-availability watcher and a batch signup workflow
//! - A concurrent task registry driving many independent flows
//! - An HTTP API for creating, inspecting, running, and deleting tasks
//!
//! ## Task Flow
//! 1. Receive a task via `POST /tasks/create`
//! 2. `GET /tasks/run?id=` flips the task to Running and spawns a worker
//! 3. The worker builds a cookie-carrying HTTP client, walks the SSO
//!    handshake, then watches seats or submits a registration batch
//! 4. Terminal outcomes are pushed to the task's webhook
//!
//! ## Modules
//! - `session`: the 7-step SAML handshake state machine
//! - `watch`: seat-count polling and the availability decision
//! - `signup`: eligibility check, course staging, batch submission
//! - `task`: task entity and the concurrent registry
//! - `api`: axum control surface

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod html;
pub mod notify;
pub mod session;
pub mod signup;
pub mod task;
pub mod util;
pub mod watch;

pub use config::Config;
pub use error::WorkflowError;

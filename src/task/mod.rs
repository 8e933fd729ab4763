//! Task entity: the unit of work owned by the registry.
//!
//! A task aggregates identity, credentials, mode, and target courses. Its
//! `status` string is the externally visible progress indicator, overwritten
//! by whichever flow stage last ran. Internally the running flag and the
//! cancellation token track machine state so the string stays purely
//! human-readable.

pub mod registry;

pub use registry::{RunOutcome, TaskRegistry};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::client::SessionClient;
use crate::config::PortalEndpoints;

/// What a task does when run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Poll seat availability until a spot opens
    Watch,
    /// Authenticate and submit a registration batch
    Signup,
}

/// Wire shape of a task as submitted to `POST /tasks/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub mode: Mode,
    pub term: String,
    /// Comma-separated course reference numbers
    pub crns: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub webhook_url: String,
}

/// A registered task. Owned by the registry until deleted; mutated by its
/// own worker while running.
pub struct Task {
    pub id: String,
    pub mode: Mode,
    pub term: String,
    pub crns: String,
    pub username: String,
    pub password: String,
    pub webhook_url: String,
    status: RwLock<String>,
    homepage_url: RwLock<String>,
    sso_manager_url: RwLock<String>,
    running: AtomicBool,
    cancel: CancellationToken,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            id: spec.id,
            mode: spec.mode,
            term: spec.term,
            crns: spec.crns,
            username: spec.username,
            password: spec.password,
            webhook_url: spec.webhook_url,
            status: RwLock::new("Idle".to_string()),
            homepage_url: RwLock::new(String::new()),
            sso_manager_url: RwLock::new(String::new()),
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Current human-readable status.
    pub fn status(&self) -> String {
        self.status.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Overwrite the status string. Last write wins.
    pub fn set_status(&self, status: impl Into<String>) {
        if let Ok(mut guard) = self.status.write() {
            *guard = status.into();
        }
    }

    /// Flip the running flag; returns false if the task was already running.
    pub(crate) fn try_start(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The CRN list, split from the comma-separated wire form.
    pub fn crn_list(&self) -> Vec<String> {
        self.crns
            .split(',')
            .map(|crn| crn.trim().to_string())
            .filter(|crn| !crn.is_empty())
            .collect()
    }

    /// Compute the per-run SSO entry URLs from the configured endpoints.
    pub fn prepare_run(&self, endpoints: &PortalEndpoints) {
        if let Ok(mut guard) = self.homepage_url.write() {
            *guard = endpoints.homepage_url.clone();
        }
        if let Ok(mut guard) = self.sso_manager_url.write() {
            *guard = endpoints.sso_manager_url.clone();
        }
    }

    pub fn homepage_url(&self) -> String {
        self.homepage_url
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn sso_manager_url(&self) -> String {
        self.sso_manager_url
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Projection safe to serialize externally. Credentials' password is
    /// never echoed back.
    pub fn sanitized(&self) -> SanitizedTask {
        SanitizedTask {
            id: self.id.clone(),
            mode: self.mode,
            term: self.term.clone(),
            crns: self.crns.clone(),
            status: self.status(),
            username: self.username.clone(),
            webhook_url: self.webhook_url.clone(),
            homepage_url: self.homepage_url(),
            sso_manager_url: self.sso_manager_url(),
        }
    }
}

/// External view of a task without the live client, session internals, or
/// password.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTask {
    pub id: String,
    pub mode: Mode,
    pub term: String,
    pub crns: String,
    pub status: String,
    pub username: String,
    pub webhook_url: String,
    pub homepage_url: String,
    pub sso_manager_url: String,
}

/// Everything one task run needs: the task itself, its cookie-carrying
/// client, the portal endpoints, and the cancellation token.
pub struct RunContext {
    pub task: Arc<Task>,
    pub client: SessionClient,
    pub endpoints: PortalEndpoints,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleep for `duration` unless cancelled first. Returns false when the
    /// run should stop.
    pub async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TaskSpec {
        TaskSpec {
            id: "t1".to_string(),
            mode: Mode::Signup,
            term: "202530".to_string(),
            crns: "41126, 40001,".to_string(),
            username: "student".to_string(),
            password: "hunter2".to_string(),
            webhook_url: "http://localhost/webhook".to_string(),
        }
    }

    #[test]
    fn crn_list_splits_and_trims() {
        let task = Task::new(spec());
        assert_eq!(task.crn_list(), vec!["41126", "40001"]);
    }

    #[test]
    fn sanitized_view_omits_password() {
        let task = Task::new(spec());
        task.set_status("Running");
        let json = serde_json::to_value(task.sanitized()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "student");
        assert_eq!(json["status"], "Running");
        assert_eq!(json["mode"], "Signup");
    }

    #[test]
    fn mode_round_trips_wire_names() {
        let mode: Mode = serde_json::from_str("\"Watch\"").unwrap();
        assert_eq!(mode, Mode::Watch);
        assert_eq!(serde_json::to_string(&Mode::Signup).unwrap(), "\"Signup\"");
    }

    #[test]
    fn try_start_guards_double_run() {
        let task = Task::new(spec());
        assert!(task.try_start());
        assert!(!task.try_start());
        task.finish();
        assert!(task.try_start());
    }
}

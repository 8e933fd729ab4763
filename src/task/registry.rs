//! Concurrent task registry.
//!
//! One process-wide map of task id to task, guarded by a single lock. The
//! lock protects map membership and the run guard only; a running task
//! mutates its own status from its worker without touching the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::client::SessionClient;
use crate::config::PortalEndpoints;
use crate::error::WorkflowError;
use crate::session::AuthSession;
use crate::task::{Mode, RunContext, SanitizedTask, Task, TaskSpec};
use crate::{notify, signup, watch};

/// Result of asking the registry to run a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    NotFound,
    AlreadyRunning,
    Started,
}

pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, Arc<Task>>>,
    endpoints: PortalEndpoints,
}

impl TaskRegistry {
    pub fn new(endpoints: PortalEndpoints) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            endpoints,
        }
    }

    /// Insert a task, overwriting any existing task with the same id.
    pub fn create(&self, spec: TaskSpec) {
        let task = Arc::new(Task::new(spec));
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.insert(task.id.clone(), task);
        }
    }

    /// Remove a task, cancelling its worker if one is running. Returns
    /// whether the task existed.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self
            .tasks
            .lock()
            .ok()
            .and_then(|mut tasks| tasks.remove(id));
        match removed {
            Some(task) => {
                task.cancel_token().cancel();
                true
            }
            None => false,
        }
    }

    /// Current status string of a task, if it exists.
    pub fn status(&self, id: &str) -> Option<String> {
        self.tasks
            .lock()
            .ok()
            .and_then(|tasks| tasks.get(id).map(|task| task.status()))
    }

    /// Flip a task to Running and launch its worker. Non-blocking: returns
    /// as soon as the worker is scheduled.
    pub fn run(&self, id: &str) -> RunOutcome {
        let Ok(tasks) = self.tasks.lock() else {
            return RunOutcome::NotFound;
        };
        let Some(task) = tasks.get(id) else {
            return RunOutcome::NotFound;
        };
        if !task.try_start() {
            return RunOutcome::AlreadyRunning;
        }
        task.set_status("Running");

        let task = Arc::clone(task);
        let endpoints = self.endpoints.clone();
        tokio::spawn(async move {
            execute(task, endpoints).await;
        });
        RunOutcome::Started
    }

    /// Snapshot of sanitized views of all tasks.
    pub fn list_sanitized(&self) -> Vec<SanitizedTask> {
        self.tasks
            .lock()
            .map(|tasks| tasks.values().map(|task| task.sanitized()).collect())
            .unwrap_or_default()
    }
}

/// One task run, start to finish. Terminal errors become the task's status
/// and a failure notification; the status string is never cleared.
async fn execute(task: Arc<Task>, endpoints: PortalEndpoints) {
    info!("Task {} starting in {:?} mode", task.id, task.mode);
    task.prepare_run(&endpoints);

    let client = match SessionClient::new() {
        Ok(client) => client,
        Err(e) => {
            warn!("Task {}: could not build HTTP client: {}", task.id, e);
            task.set_status(e.to_string());
            task.finish();
            return;
        }
    };

    let ctx = RunContext {
        task: Arc::clone(&task),
        client,
        endpoints,
        cancel: task.cancel_token(),
    };

    if let Err(e) = run_flow(&ctx).await {
        warn!("Task {} failed: {}", task.id, e);
        task.set_status(e.to_string());
        notify::send(&ctx.client, &task.webhook_url, &task.crns, &e.to_string()).await;
    }
    task.finish();
}

async fn run_flow(ctx: &RunContext) -> Result<(), WorkflowError> {
    let mut session = AuthSession::new();
    session.establish(ctx).await?;
    if ctx.cancelled() {
        return Ok(());
    }

    match ctx.task.mode {
        Mode::Watch => watch::run(ctx).await,
        Mode::Signup => signup::run(ctx, &session).await,
    }
}

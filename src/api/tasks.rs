//! Task endpoint handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;

use super::routes::AppState;
use super::types::{ApiError, IdQuery, MessageResponse, StatusResponse};
use crate::task::{RunOutcome, SanitizedTask, TaskSpec};

/// `GET /status`
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "Connected".to_string(),
    })
}

/// An absent or empty `?id=` is a bad request.
fn require_id(query: IdQuery) -> Result<String, ApiError> {
    match query.id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ApiError::missing_id()),
    }
}

/// `GET /tasks/status?id=`
///
/// Unknown ids report the not-found sentinel in the body rather than a 404;
/// external dashboards poll this without existence checks.
pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id = require_id(query)?;
    let status = state
        .registry
        .status(&id)
        .unwrap_or_else(|| "Task not found".to_string());
    Ok(Json(StatusResponse { status }))
}

/// `POST /tasks/create`
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<TaskSpec>,
) -> Json<MessageResponse> {
    state.registry.create(spec);
    Json(MessageResponse {
        message: "Task created".to_string(),
    })
}

/// `GET /tasks/delete?id=`
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = require_id(query)?;
    if state.registry.delete(&id) {
        Ok(Json(MessageResponse {
            message: "Task deleted".to_string(),
        }))
    } else {
        Err(ApiError::task_not_found())
    }
}

/// `GET /tasks/run?id=`
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = require_id(query)?;
    match state.registry.run(&id) {
        RunOutcome::NotFound => Err(ApiError::task_not_found()),
        RunOutcome::AlreadyRunning => Err(ApiError::already_running()),
        RunOutcome::Started => Ok(Json(MessageResponse {
            message: "Task is running".to_string(),
        })),
    }
}

/// `GET /tasks/all`
pub async fn all_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<SanitizedTask>> {
    Json(state.registry.list_sanitized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::task::{Mode, TaskRegistry};

    fn test_state() -> Arc<AppState> {
        let config = Config::new("127.0.0.1".to_string(), 0);
        Arc::new(AppState {
            registry: TaskRegistry::new(config.endpoints.clone()),
            config,
        })
    }

    fn spec(id: &str) -> TaskSpec {
        TaskSpec {
            id: id.to_string(),
            mode: Mode::Watch,
            term: "202530".to_string(),
            crns: "41126".to_string(),
            username: "student".to_string(),
            password: "hunter2".to_string(),
            webhook_url: String::new(),
        }
    }

    #[tokio::test]
    async fn health_reports_connected() {
        let Json(body) = health().await;
        assert_eq!(body.status, "Connected");
    }

    #[tokio::test]
    async fn status_without_id_is_bad_request() {
        let result = task_status(State(test_state()), Query(IdQuery { id: None })).await;
        assert_eq!(result.unwrap_err(), ApiError::missing_id());
    }

    #[tokio::test]
    async fn empty_id_is_treated_as_missing() {
        // `?id=` with no value deserializes to Some("")
        let empty = || {
            Query(IdQuery {
                id: Some(String::new()),
            })
        };
        let status = task_status(State(test_state()), empty()).await;
        assert_eq!(status.unwrap_err(), ApiError::missing_id());

        let deleted = delete_task(State(test_state()), empty()).await;
        assert_eq!(deleted.unwrap_err(), ApiError::missing_id());

        let ran = run_task(State(test_state()), empty()).await;
        assert_eq!(ran.unwrap_err(), ApiError::missing_id());
    }

    #[tokio::test]
    async fn status_of_unknown_task_uses_sentinel() {
        let result = task_status(
            State(test_state()),
            Query(IdQuery {
                id: Some("ghost".to_string()),
            }),
        )
        .await;
        assert_eq!(result.unwrap().0.status, "Task not found");
    }

    #[tokio::test]
    async fn delete_of_unknown_task_is_not_found() {
        let result = delete_task(
            State(test_state()),
            Query(IdQuery {
                id: Some("ghost".to_string()),
            }),
        )
        .await;
        assert_eq!(result.unwrap_err(), ApiError::task_not_found());
    }

    #[tokio::test]
    async fn run_of_unknown_task_is_not_found() {
        let result = run_task(
            State(test_state()),
            Query(IdQuery {
                id: Some("ghost".to_string()),
            }),
        )
        .await;
        assert_eq!(result.unwrap_err(), ApiError::task_not_found());
    }

    #[tokio::test]
    async fn create_then_list_shows_sanitized_task() {
        let state = test_state();
        let Json(body) = create_task(State(Arc::clone(&state)), Json(spec("t1"))).await;
        assert_eq!(body.message, "Task created");

        let Json(all) = all_tasks(State(Arc::clone(&state))).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "t1");
        assert_eq!(all[0].status, "Idle");
    }

    #[tokio::test]
    async fn run_then_rerun_conflicts() {
        let state = test_state();
        create_task(State(Arc::clone(&state)), Json(spec("t2"))).await;

        let first = run_task(
            State(Arc::clone(&state)),
            Query(IdQuery {
                id: Some("t2".to_string()),
            }),
        )
        .await;
        assert_eq!(first.unwrap().0.message, "Task is running");

        let second = run_task(
            State(Arc::clone(&state)),
            Query(IdQuery {
                id: Some("t2".to_string()),
            }),
        )
        .await;
        assert_eq!(second.unwrap_err(), ApiError::already_running());
    }
}

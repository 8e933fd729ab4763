//! Signup mode: eligibility check, course staging, batch registration.
//!
//! After the SSO handshake the workflow confirms the student may register
//! (blocking until the registration window opens when the portal names a
//! future time), stages each requested CRN through the add-item endpoint,
//! then submits every staged model as one batch and maps the per-course
//! results to statuses and webhook notifications.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::WorkflowError;
use crate::notify;
use crate::session::AuthSession;
use crate::task::RunContext;
use crate::util;

const STATUS_RETRY_DELAY: Duration = Duration::from_secs(2);

const REGISTRATION_WINDOW_MARKER: &str = "You can register from";
const WINDOW_TIMESTAMP_PATTERN: &str = r"\d{2}/\d{2}/\d{4} \d{2}:\d{2} [APM]{2}";
const WINDOW_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M %p";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationStatusResponse {
    #[serde(default)]
    student_elig_failures: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AddCourseResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    model: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct BatchRequest {
    update: Vec<Map<String, Value>>,
    #[serde(rename = "uniqueSessionId")]
    unique_session_id: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    data: BatchData,
}

#[derive(Debug, Default, Deserialize)]
struct BatchData {
    #[serde(default)]
    update: Vec<CourseResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseResult {
    #[serde(default)]
    course_reference_number: String,
    #[serde(default)]
    status_description: String,
    #[serde(default)]
    course_title: String,
    #[serde(default)]
    crn_errors: Vec<CrnError>,
}

#[derive(Debug, Deserialize)]
struct CrnError {
    #[serde(default)]
    message: String,
}

/// What the eligibility response means for the workflow.
#[derive(Debug, Clone, PartialEq)]
enum Eligibility {
    /// No failures, no embargo: proceed
    Clean,
    /// Hard eligibility failure; terminal
    Rejected(String),
    /// Registration opens at the given Pacific-time instant
    Window(DateTime<Tz>),
    /// A window message without a parseable timestamp; retried shortly
    WindowUnparsed,
}

fn window_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(WINDOW_TIMESTAMP_PATTERN).expect("static pattern"))
}

/// Pull the `MM/DD/YYYY hh:mm AM|PM` instant out of a window message,
/// interpreted in Pacific time.
fn parse_window(failure: &str) -> Option<DateTime<Tz>> {
    let matched = window_pattern().find(failure)?;
    let naive = NaiveDateTime::parse_from_str(matched.as_str(), WINDOW_TIMESTAMP_FORMAT).ok()?;
    Los_Angeles.from_local_datetime(&naive).single()
}

/// Classify the eligibility failure list. A window message wins over other
/// failures; without one, the last listed failure is the terminal error.
fn classify_eligibility(failures: &[String]) -> Eligibility {
    if failures.is_empty() {
        return Eligibility::Clean;
    }
    match failures
        .iter()
        .find(|failure| failure.contains(REGISTRATION_WINDOW_MARKER))
    {
        Some(window_failure) => match parse_window(window_failure) {
            Some(opens_at) => Eligibility::Window(opens_at),
            None => Eligibility::WindowUnparsed,
        },
        None => Eligibility::Rejected(failures[failures.len() - 1].clone()),
    }
}

/// Check registration eligibility, blocking through the registration window
/// if necessary. Returns false when the run was cancelled mid-wait.
async fn get_registration_status(
    ctx: &RunContext,
    session: &AuthSession,
) -> Result<bool, WorkflowError> {
    loop {
        ctx.task.set_status("Getting Registration Status");
        let body = ctx
            .client
            .post_form(
                &ctx.endpoints.term_search_url(),
                &[
                    ("term", ctx.task.term.as_str()),
                    ("studyPath", ""),
                    ("startDatepicker", ""),
                    ("endDatepicker", ""),
                    ("uniqueSessionId", session.unique_session_id.as_str()),
                ],
            )
            .await?;

        let status: RegistrationStatusResponse = serde_json::from_str(&body)
            .map_err(|e| WorkflowError::Parse(format!("registration status: {}", e)))?;

        match classify_eligibility(&status.student_elig_failures) {
            Eligibility::Clean => return Ok(true),
            Eligibility::Rejected(message) => return Err(WorkflowError::Rejected(message)),
            Eligibility::WindowUnparsed => {
                if !ctx.wait(STATUS_RETRY_DELAY).await {
                    return Ok(false);
                }
            }
            Eligibility::Window(opens_at) => {
                let now = Utc::now().with_timezone(&Los_Angeles);
                if now >= opens_at {
                    // Window already open; the portal just hasn't caught up
                    if !ctx.wait(STATUS_RETRY_DELAY).await {
                        return Ok(false);
                    }
                    continue;
                }

                let rfc1123 = opens_at.format("%a, %d %b %Y %H:%M:%S %Z").to_string();
                ctx.task.set_status(format!("Waiting til {}", rfc1123));
                let remaining = (opens_at - now)
                    .to_std()
                    .unwrap_or_else(|_| Duration::from_secs(0));
                info!(
                    "Waiting for registration to open: {} (in {})",
                    rfc1123,
                    util::format_duration(remaining)
                );

                while Utc::now().with_timezone(&Los_Angeles) < opens_at {
                    if !ctx.wait(STATUS_RETRY_DELAY).await {
                        return Ok(false);
                    }
                }
            }
        }
    }
}

/// Mark the class-registration page visited.
async fn visit_class_registration(ctx: &RunContext) -> Result<(), WorkflowError> {
    ctx.task.set_status("Visiting Class Registration");
    ctx.client
        .head(&ctx.endpoints.class_registration_url())
        .await
}

/// Interpret one add-item response: either a staged registration model or
/// the portal's rejection message.
fn stage_course(body: &str) -> Result<Result<Map<String, Value>, String>, WorkflowError> {
    let response: AddCourseResponse = serde_json::from_str(body)
        .map_err(|e| WorkflowError::Parse(format!("add course: {}", e)))?;

    if !response.success {
        return Ok(Err(response.message.unwrap_or_default()));
    }
    let mut model = response
        .model
        .ok_or_else(|| WorkflowError::Parse("add course: success without model".to_string()))?;
    // Prefer the waitlist when the section is full
    model.insert("selectedAction".to_string(), Value::String("WL".to_string()));
    Ok(Ok(model))
}

/// Stage each requested CRN in order. The first rejection sets the status
/// and aborts the remaining CRNs.
async fn add_courses(ctx: &RunContext) -> Result<Vec<Map<String, Value>>, WorkflowError> {
    let mut models = Vec::new();
    for crn in ctx.task.crn_list() {
        ctx.task.set_status("Adding Course");
        let body = ctx
            .client
            .get_json(&ctx.endpoints.add_item_url(&ctx.task.term, &crn))
            .await?;
        match stage_course(&body)? {
            Ok(model) => models.push(model),
            Err(message) => {
                warn!("Course {} rejected: {}", crn, message);
                ctx.task.set_status(message);
                break;
            }
        }
    }
    Ok(models)
}

/// Outcome of one course in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BatchOutcome {
    course_title: String,
    status_text: String,
    success: bool,
}

/// Map the portal's per-course results onto outcomes for the requested CRNs.
fn map_batch_outcomes(results: &[CourseResult], crns: &[String]) -> Vec<BatchOutcome> {
    let mut outcomes = Vec::new();
    for result in results {
        if !crns.iter().any(|crn| *crn == result.course_reference_number) {
            continue;
        }
        match result.status_description.as_str() {
            "Registered" | "Waitlisted" => outcomes.push(BatchOutcome {
                course_title: result.course_title.clone(),
                status_text: result.status_description.clone(),
                success: true,
            }),
            "Errors Preventing Registration" => {
                let message = result
                    .crn_errors
                    .first()
                    .map(|error| error.message.clone())
                    .unwrap_or_else(|| result.status_description.clone());
                outcomes.push(BatchOutcome {
                    course_title: result.course_title.clone(),
                    status_text: message,
                    success: false,
                });
            }
            _ => {}
        }
    }
    outcomes
}

/// Submit the staged models as one batch and report each course's result.
async fn send_batch(
    ctx: &RunContext,
    session: &AuthSession,
    models: Vec<Map<String, Value>>,
) -> Result<(), WorkflowError> {
    ctx.task.set_status("Submitting Batch");
    let request = BatchRequest {
        update: models,
        unique_session_id: session.unique_session_id.clone(),
    };

    let body = ctx
        .client
        .post_json(&ctx.endpoints.batch_submit_url(), &request)
        .await?;
    let response: BatchResponse = serde_json::from_str(&body)
        .map_err(|e| WorkflowError::Parse(format!("batch result: {}", e)))?;

    let crns = ctx.task.crn_list();
    for outcome in map_batch_outcomes(&response.data.update, &crns) {
        if outcome.success {
            info!("{}: {}", outcome.course_title, outcome.status_text);
        } else {
            warn!(
                "{}: registration error: {}",
                outcome.course_title, outcome.status_text
            );
        }
        ctx.task.set_status(outcome.status_text.clone());
        notify::send(
            &ctx.client,
            &ctx.task.webhook_url,
            &outcome.course_title,
            &outcome.status_text,
        )
        .await;
    }
    Ok(())
}

/// The full signup sequence after authentication.
pub async fn run(ctx: &RunContext, session: &AuthSession) -> Result<(), WorkflowError> {
    if !get_registration_status(ctx, session).await? {
        return Ok(());
    }
    visit_class_registration(ctx).await?;
    let models = add_courses(ctx).await?;
    if models.is_empty() {
        // Every CRN was rejected before staging; the rejection message is
        // already the task's status.
        return Ok(());
    }
    send_batch(ctx, session, models).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_failures_is_clean() {
        assert_eq!(classify_eligibility(&[]), Eligibility::Clean);
    }

    #[test]
    fn hard_failures_reject_with_last_message() {
        let failures = vec![
            "Your student status prevents registration.".to_string(),
            "You have holds on your record.".to_string(),
        ];
        assert_eq!(
            classify_eligibility(&failures),
            Eligibility::Rejected("You have holds on your record.".to_string())
        );
    }

    #[test]
    fn window_message_parses_pacific_instant() {
        let failures =
            vec!["You can register from 11/15/2025 09:00 AM to 12/05/2025 11:59 PM".to_string()];
        match classify_eligibility(&failures) {
            Eligibility::Window(opens_at) => {
                assert_eq!(
                    opens_at,
                    Los_Angeles.with_ymd_and_hms(2025, 11, 15, 9, 0, 0).unwrap()
                );
            }
            other => panic!("expected window, got {:?}", other),
        }
    }

    #[test]
    fn window_message_without_timestamp_retries() {
        let failures = vec!["You can register from your assigned time.".to_string()];
        assert_eq!(classify_eligibility(&failures), Eligibility::WindowUnparsed);
    }

    #[test]
    fn stage_course_tags_waitlist_action() {
        let body = r#"{"success": true, "message": null, "model": {"courseReferenceNumber": "41126", "term": "202530"}}"#;
        let model = stage_course(body).unwrap().unwrap();
        assert_eq!(model["selectedAction"], "WL");
        assert_eq!(model["courseReferenceNumber"], "41126");
    }

    #[test]
    fn stage_course_surfaces_rejection_message() {
        let body = r#"{"success": false, "message": "Course is closed."}"#;
        assert_eq!(
            stage_course(body).unwrap(),
            Err("Course is closed.".to_string())
        );
    }

    #[test]
    fn stage_course_malformed_json_is_parse_error() {
        assert!(matches!(
            stage_course("<html>login page</html>"),
            Err(WorkflowError::Parse(_))
        ));
    }

    fn batch_fixture() -> BatchResponse {
        serde_json::from_str(
            r#"{
                "data": {
                    "update": [
                        {
                            "courseReferenceNumber": "41126",
                            "statusDescription": "Registered",
                            "courseTitle": "Calculus I",
                            "crnErrors": []
                        },
                        {
                            "courseReferenceNumber": "40001",
                            "statusDescription": "Errors Preventing Registration",
                            "courseTitle": "Physics 4A",
                            "crnErrors": [
                                {"message": "Closed Section"},
                                {"message": "Time conflict"}
                            ]
                        },
                        {
                            "courseReferenceNumber": "99999",
                            "statusDescription": "Registered",
                            "courseTitle": "Not Requested",
                            "crnErrors": []
                        }
                    ]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn batch_outcomes_map_statuses_and_first_error() {
        let response = batch_fixture();
        let crns = vec!["41126".to_string(), "40001".to_string()];
        let outcomes = map_batch_outcomes(&response.data.update, &crns);
        assert_eq!(
            outcomes,
            vec![
                BatchOutcome {
                    course_title: "Calculus I".to_string(),
                    status_text: "Registered".to_string(),
                    success: true,
                },
                BatchOutcome {
                    course_title: "Physics 4A".to_string(),
                    status_text: "Closed Section".to_string(),
                    success: false,
                },
            ]
        );
    }

    #[test]
    fn batch_outcomes_ignore_unrequested_crns() {
        let response = batch_fixture();
        let crns = vec!["41126".to_string()];
        let outcomes = map_batch_outcomes(&response.data.update, &crns);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].course_title, "Calculus I");
    }

    #[test]
    fn waitlisted_counts_as_success() {
        let results = vec![CourseResult {
            course_reference_number: "41126".to_string(),
            status_description: "Waitlisted".to_string(),
            course_title: "Calculus I".to_string(),
            crn_errors: vec![],
        }];
        let outcomes = map_batch_outcomes(&results, &["41126".to_string()]);
        assert_eq!(outcomes[0].status_text, "Waitlisted");
        assert!(outcomes[0].success);
    }

    #[test]
    fn registration_status_missing_failures_deserializes_empty() {
        let status: RegistrationStatusResponse = serde_json::from_str("{}").unwrap();
        assert!(status.student_elig_failures.is_empty());
    }
}

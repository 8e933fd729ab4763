//! Federated SSO (SAML) authentication state machine.
//!
//! The handshake walks eight fixed steps, each an HTTP exchange that must
//! succeed before the next. Opaque `RelayState`/`SAMLResponse`/`SAMLRequest`
//! tokens are lifted out of hidden form inputs and round-tripped into the
//! following request; the cookie jar accumulates the session along the way.
//!
//! Transport errors are fatal and abort the whole session build. Login
//! rejections never are: the banner text decides whether to stop, retry the
//! login step, or restart the handshake from the top.

use std::time::Duration;
use tracing::{debug, warn};

use crate::error::WorkflowError;
use crate::html;
use crate::task::RunContext;
use crate::util;

const LOGIN_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Handshake restarts tolerated before giving up on a looping idp.
const MAX_RESTARTS: u32 = 3;

const BANNER_SELECTOR: &str = "div.alert.alert-danger";
const RETRY_MESSAGE_SELECTOR: &str = "div.retry-msg-text.text_right_custom";

const UNKNOWN_USERNAME_BANNER: &str = "The username you entered cannot be identified.";
const WRONG_PASSWORD_BANNER: &str = "The password you entered was incorrect.";
const STALE_SESSION_BANNER: &str = "You may be seeing this page because you used the Back button while browsing a secure web site or application. Alternatively, you may have mistakenly bookmarked the web login form instead of the actual web site you wanted to bookmark or used a link created by somebody else who made the same mistake.  Left unchecked, this can cause errors on some browsers or result in you returning to the web site you tried to leave, so this page is presented instead.";

/// Position in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Init,
    HomepageVisited,
    LoggedIn,
    CommonAuthSubmitted,
    SsoManagerSubmitted,
    PostSignInRegistered,
    SamlSsoSubmitted,
    Authenticated,
}

/// Classification of the idp's login error banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// No banner: credentials accepted
    Clean,
    /// Unknown account; terminal, but the flow still proceeds
    InvalidUsername,
    /// Wrong password; retried after a fixed delay
    InvalidPassword,
    /// Stale idp state; the whole handshake restarts from the top
    BadSession,
    /// Any other non-empty banner; surfaced as status, then retried
    Blocked(String),
}

/// Map the exact banner text to its outcome. Unlisted non-empty text falls
/// into the generic blocking branch.
pub fn classify_login_banner(banner: &str) -> LoginOutcome {
    match banner {
        "" => LoginOutcome::Clean,
        UNKNOWN_USERNAME_BANNER => LoginOutcome::InvalidUsername,
        WRONG_PASSWORD_BANNER => LoginOutcome::InvalidPassword,
        STALE_SESSION_BANNER => LoginOutcome::BadSession,
        other => LoginOutcome::Blocked(other.to_string()),
    }
}

/// Where the login step left the handshake.
enum StepFlow {
    Proceed,
    Restart,
    Cancelled,
}

/// Ephemeral per-run SSO state.
///
/// Invariant: each token field holds either the empty string or the most
/// recent extraction; a full restart clears them so a stale token never
/// leaks into a fresh handshake.
pub struct AuthSession {
    pub login_attempts: u32,
    pub relay_state: String,
    pub saml_response: String,
    pub saml_request: String,
    pub unique_session_id: String,
    state: AuthState,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession {
    pub fn new() -> Self {
        Self {
            login_attempts: 0,
            relay_state: String::new(),
            saml_response: String::new(),
            saml_request: String::new(),
            unique_session_id: String::new(),
            state: AuthState::Init,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Drive the handshake to completion, restarting from the top on stale
    /// idp sessions. Transport errors propagate immediately.
    pub async fn establish(&mut self, ctx: &RunContext) -> Result<(), WorkflowError> {
        let mut restarts = 0;
        loop {
            match self.handshake(ctx).await? {
                StepFlow::Proceed => return Ok(()),
                StepFlow::Cancelled => return Ok(()),
                StepFlow::Restart => {
                    restarts += 1;
                    if restarts > MAX_RESTARTS {
                        return Err(WorkflowError::Rejected(
                            "Login session kept going stale".to_string(),
                        ));
                    }
                    self.reset_tokens();
                    if !ctx.wait(LOGIN_RETRY_DELAY).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One full pass over the eight steps.
    async fn handshake(&mut self, ctx: &RunContext) -> Result<StepFlow, WorkflowError> {
        self.state = AuthState::Init;
        self.unique_session_id = util::generate_session_id(&mut rand::thread_rng());

        self.visit_homepage(ctx).await?;
        match self.login(ctx).await? {
            StepFlow::Proceed => {}
            other => return Ok(other),
        }
        self.submit_common_auth(ctx).await?;
        self.submit_sso_manager(ctx).await?;
        self.register_post_sign_in(ctx).await?;
        self.submit_saml_sso(ctx).await?;
        self.submit_service_provider(ctx).await?;
        Ok(StepFlow::Proceed)
    }

    fn reset_tokens(&mut self) {
        self.relay_state.clear();
        self.saml_response.clear();
        self.saml_request.clear();
    }

    async fn visit_homepage(&mut self, ctx: &RunContext) -> Result<(), WorkflowError> {
        ctx.task.set_status("Visiting Homepage");
        ctx.client.get_document(&ctx.task.homepage_url()).await?;
        self.state = AuthState::HomepageVisited;
        Ok(())
    }

    /// POST credentials to the idp, classifying the error banner. The
    /// execution id query embeds the attempt counter, which survives
    /// handshake restarts.
    async fn login(&mut self, ctx: &RunContext) -> Result<StepFlow, WorkflowError> {
        loop {
            ctx.task.set_status("Logging In");
            self.login_attempts += 1;

            let body = ctx
                .client
                .post_form(
                    &ctx.endpoints.login_url(self.login_attempts),
                    &[
                        ("j_username", ctx.task.username.as_str()),
                        ("j_password", ctx.task.password.as_str()),
                        ("_eventId_proceed", ""),
                    ],
                )
                .await?;

            let banner = html::text_of(&body, BANNER_SELECTOR);
            match classify_login_banner(&banner) {
                LoginOutcome::Clean => {
                    self.extract_login_tokens(&body);
                    self.state = AuthState::LoggedIn;
                    return Ok(StepFlow::Proceed);
                }
                LoginOutcome::InvalidUsername => {
                    ctx.task.set_status("Invalid Username");
                    self.extract_login_tokens(&body);
                    self.state = AuthState::LoggedIn;
                    return Ok(StepFlow::Proceed);
                }
                LoginOutcome::InvalidPassword => {
                    ctx.task.set_status("Invalid Password");
                    if !ctx.wait(LOGIN_RETRY_DELAY).await {
                        return Ok(StepFlow::Cancelled);
                    }
                }
                LoginOutcome::BadSession => {
                    ctx.task.set_status("Bad Session");
                    return Ok(StepFlow::Restart);
                }
                LoginOutcome::Blocked(message) => {
                    debug!("Login blocked: {}", message);
                    ctx.task.set_status(message);
                    if !ctx.wait(LOGIN_RETRY_DELAY).await {
                        return Ok(StepFlow::Cancelled);
                    }
                }
            }
        }
    }

    fn extract_login_tokens(&mut self, body: &str) {
        self.relay_state = html::attr_of(body, "input[name='RelayState']", "value");
        self.saml_response = html::attr_of(body, "input[name='SAMLResponse']", "value");
    }

    async fn submit_common_auth(&mut self, ctx: &RunContext) -> Result<(), WorkflowError> {
        ctx.task.set_status("Submitting Common Auth");
        let body = ctx
            .client
            .post_form(
                &ctx.endpoints.common_auth_url,
                &[
                    ("RelayState", self.relay_state.as_str()),
                    ("SAMLResponse", self.saml_response.as_str()),
                ],
            )
            .await?;

        let retry_message = html::text_of(&body, RETRY_MESSAGE_SELECTOR);
        if retry_message.contains("Authentication Error!") {
            warn!("Common auth reported: {}", retry_message);
        }

        self.extract_login_tokens(&body);
        self.state = AuthState::CommonAuthSubmitted;
        Ok(())
    }

    async fn submit_sso_manager(&mut self, ctx: &RunContext) -> Result<(), WorkflowError> {
        ctx.task.set_status("Submitting SSO Manager");
        ctx.client
            .post_form(
                &ctx.task.sso_manager_url(),
                &[
                    ("RelayState", self.relay_state.as_str()),
                    ("SAMLResponse", self.saml_response.as_str()),
                ],
            )
            .await?;
        self.state = AuthState::SsoManagerSubmitted;
        Ok(())
    }

    async fn register_post_sign_in(&mut self, ctx: &RunContext) -> Result<(), WorkflowError> {
        ctx.task.set_status("Posting Register Sign-in");
        let body = ctx
            .client
            .get_document(&ctx.endpoints.post_sign_in_url())
            .await?;
        self.saml_request = html::attr_of(&body, "input[name='SAMLRequest']", "value");
        self.state = AuthState::PostSignInRegistered;
        Ok(())
    }

    async fn submit_saml_sso(&mut self, ctx: &RunContext) -> Result<(), WorkflowError> {
        ctx.task.set_status("Submitting SAML SSO");
        let body = ctx
            .client
            .post_form(
                &ctx.endpoints.saml_sso_url,
                &[("SAMLRequest", self.saml_request.as_str())],
            )
            .await?;
        self.saml_response = html::attr_of(&body, "input[name='SAMLResponse']", "value");
        self.state = AuthState::SamlSsoSubmitted;
        Ok(())
    }

    async fn submit_service_provider(&mut self, ctx: &RunContext) -> Result<(), WorkflowError> {
        ctx.task.set_status("Submitting Service Provider");
        ctx.client
            .post_form(
                &ctx.endpoints.service_provider_url(),
                &[("SAMLResponse", self.saml_response.as_str())],
            )
            .await?;
        self.state = AuthState::Authenticated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_banner_is_clean() {
        assert_eq!(classify_login_banner(""), LoginOutcome::Clean);
    }

    #[test]
    fn documented_banners_classify_exactly() {
        assert_eq!(
            classify_login_banner(UNKNOWN_USERNAME_BANNER),
            LoginOutcome::InvalidUsername
        );
        assert_eq!(
            classify_login_banner(WRONG_PASSWORD_BANNER),
            LoginOutcome::InvalidPassword
        );
        assert_eq!(
            classify_login_banner(STALE_SESSION_BANNER),
            LoginOutcome::BadSession
        );
    }

    #[test]
    fn unlisted_banner_falls_into_blocked_branch() {
        let banner = "Your account is locked for 15 minutes.";
        assert_eq!(
            classify_login_banner(banner),
            LoginOutcome::Blocked(banner.to_string())
        );
    }

    #[test]
    fn near_miss_banner_is_not_special_cased() {
        // Prefix of a documented banner must not match it
        let banner = "The password you entered was incorrect";
        assert!(matches!(
            classify_login_banner(banner),
            LoginOutcome::Blocked(_)
        ));
    }

    #[test]
    fn reset_clears_every_token() {
        let mut session = AuthSession::new();
        session.relay_state = "R1".to_string();
        session.saml_response = "SR".to_string();
        session.saml_request = "SQ".to_string();
        session.login_attempts = 2;
        session.reset_tokens();
        assert!(session.relay_state.is_empty());
        assert!(session.saml_response.is_empty());
        assert!(session.saml_request.is_empty());
        // The attempt counter survives restarts; the idp execution id keeps counting.
        assert_eq!(session.login_attempts, 2);
    }

    #[test]
    fn token_extraction_overwrites_with_latest() {
        let mut session = AuthSession::new();
        session.extract_login_tokens(
            r#"<input name="RelayState" value="R1"/><input name="SAMLResponse" value="S1"/>"#,
        );
        assert_eq!(session.relay_state, "R1");
        assert_eq!(session.saml_response, "S1");

        session.extract_login_tokens(r#"<input name="RelayState" value="R2"/>"#);
        assert_eq!(session.relay_state, "R2");
        // No matching element yields empty, never an error
        assert_eq!(session.saml_response, "");
    }
}

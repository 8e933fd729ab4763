//! Configuration management for the Veil engine.
//!
//! Configuration can be set via environment variables:
//! - `VEIL_HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `VEIL_PORT` - Optional. Server port. Defaults to `1942`.
//! - `VEIL_IDP_LOGIN_URL` - Optional. Identity-provider login endpoint.
//! - `VEIL_COMMON_AUTH_URL` - Optional. Common-auth submission endpoint.
//! - `VEIL_SAML_SSO_URL` - Optional. SAML SSO submission endpoint.
//! - `VEIL_REGISTRATION_BASE_URL` - Optional. Registration service base URL.
//! - `VEIL_HOMEPAGE_URL` - Optional. SSO entry deep link visited first.
//! - `VEIL_SSO_MANAGER_URL` - Optional. SSO manager submission endpoint.
//!
//! The endpoint overrides exist so tests and staging portals can point the
//! flows at a different host; the defaults target the production portal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

const DEFAULT_IDP_LOGIN_URL: &str = "https://ssoshib.fhda.edu/idp/profile/SAML2/Redirect/SSO";
const DEFAULT_COMMON_AUTH_URL: &str = "https://eis-prod.ec.fhda.edu/commonauth";
const DEFAULT_SAML_SSO_URL: &str = "https://eis-prod.ec.fhda.edu/samlsso";
const DEFAULT_REGISTRATION_BASE_URL: &str = "https://reg-prod.ec.fhda.edu/StudentRegistrationSsb";
const DEFAULT_HOMEPAGE_URL: &str = "https://ssb-prod.ec.fhda.edu/ssomanager/saml/login?relayState=%2Fc%2Fauth%2FSSB%3Fpkg%3Dhttps%3A%2F%2Fssb-prod.ec.fhda.edu%2FPROD%2Ffhda_uportal.P_DeepLink_Post%3Fp_page%3Dbwskfreg.P_AltPin%26p_payload%3De30%3D";
const DEFAULT_SSO_MANAGER_URL: &str = "https://ssb-prod.ec.fhda.edu/ssomanager/saml/SSO";

/// Every portal URL the workflows touch.
///
/// Composite endpoints (login execution id, add-item query) are built by the
/// methods below so callers never format query strings by hand.
#[derive(Debug, Clone)]
pub struct PortalEndpoints {
    /// Identity-provider login endpoint (execution id appended per attempt)
    pub idp_login_url: String,
    /// Common-auth token relay endpoint
    pub common_auth_url: String,
    /// SAML SSO endpoint receiving the SAMLRequest
    pub saml_sso_url: String,
    /// Registration service base URL
    pub registration_base_url: String,
    /// SSO entry deep link visited before login
    pub homepage_url: String,
    /// SSO manager endpoint receiving the relayed tokens
    pub sso_manager_url: String,
}

impl Default for PortalEndpoints {
    fn default() -> Self {
        Self {
            idp_login_url: DEFAULT_IDP_LOGIN_URL.to_string(),
            common_auth_url: DEFAULT_COMMON_AUTH_URL.to_string(),
            saml_sso_url: DEFAULT_SAML_SSO_URL.to_string(),
            registration_base_url: DEFAULT_REGISTRATION_BASE_URL.to_string(),
            homepage_url: DEFAULT_HOMEPAGE_URL.to_string(),
            sso_manager_url: DEFAULT_SSO_MANAGER_URL.to_string(),
        }
    }
}

impl PortalEndpoints {
    /// Login URL for the given attempt number (`execution=e1s<N>`).
    pub fn login_url(&self, attempt: u32) -> String {
        format!("{}?execution=e1s{}", self.idp_login_url, attempt)
    }

    /// Registration landing page visited right after the handshake.
    pub fn post_sign_in_url(&self) -> String {
        format!(
            "{}/ssb/registration/registerPostSignIn?mode=registration",
            self.registration_base_url
        )
    }

    /// Service-provider SSO alias endpoint completing the handshake.
    pub fn service_provider_url(&self) -> String {
        format!(
            "{}/saml/SSO/alias/registrationssb-prod-sp",
            self.registration_base_url
        )
    }

    /// Term search endpoint used for the eligibility check.
    pub fn term_search_url(&self) -> String {
        format!(
            "{}/ssb/term/search?mode=registration",
            self.registration_base_url
        )
    }

    /// Class registration page, visited with a HEAD request.
    pub fn class_registration_url(&self) -> String {
        format!(
            "{}/ssb/classRegistration/classRegistration",
            self.registration_base_url
        )
    }

    /// Add-item endpoint for staging one course into the registration model.
    pub fn add_item_url(&self, term: &str, crn: &str) -> String {
        format!(
            "{}/ssb/classRegistration/addRegistrationItem?term={}&courseReferenceNumber={}&olr=false",
            self.registration_base_url, term, crn
        )
    }

    /// Batch submission endpoint.
    pub fn batch_submit_url(&self) -> String {
        format!(
            "{}/ssb/classRegistration/submitRegistration/batch",
            self.registration_base_url
        )
    }

    /// Seat-count endpoint polled in watch mode.
    pub fn enrollment_info_url(&self) -> String {
        format!(
            "{}/ssb/searchResults/getEnrollmentInfo",
            self.registration_base_url
        )
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Portal endpoints used by every task run
    pub endpoints: PortalEndpoints,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `VEIL_PORT` is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("VEIL_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("VEIL_PORT")
            .unwrap_or_else(|_| "1942".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("VEIL_PORT".to_string(), format!("{}", e)))?;

        let defaults = PortalEndpoints::default();
        let endpoints = PortalEndpoints {
            idp_login_url: std::env::var("VEIL_IDP_LOGIN_URL")
                .unwrap_or(defaults.idp_login_url),
            common_auth_url: std::env::var("VEIL_COMMON_AUTH_URL")
                .unwrap_or(defaults.common_auth_url),
            saml_sso_url: std::env::var("VEIL_SAML_SSO_URL").unwrap_or(defaults.saml_sso_url),
            registration_base_url: std::env::var("VEIL_REGISTRATION_BASE_URL")
                .unwrap_or(defaults.registration_base_url),
            homepage_url: std::env::var("VEIL_HOMEPAGE_URL").unwrap_or(defaults.homepage_url),
            sso_manager_url: std::env::var("VEIL_SSO_MANAGER_URL")
                .unwrap_or(defaults.sso_manager_url),
        };

        Ok(Self {
            host,
            port,
            endpoints,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            endpoints: PortalEndpoints::default(),
        }
    }
}

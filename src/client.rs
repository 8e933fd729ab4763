//! Browser-like HTTP session client.
//!
//! One client is built per task run. It persists cookies across every
//! request the run issues (the handshake's whole point is the session
//! cookies it accumulates) and presents a fixed Chrome header set. The
//! exact header values are a compatibility requirement with the portal,
//! not a design choice.

use reqwest::Client;
use serde::Serialize;

use crate::error::WorkflowError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const ACCEPT_DOCUMENT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// HTTP client carrying one task run's cookie jar and browser fingerprint.
pub struct SessionClient {
    client: Client,
}

impl SessionClient {
    /// Build a fresh client with an empty cookie jar.
    pub fn new() -> Result<Self, WorkflowError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// GET a page with document-fetch headers, returning the body.
    pub async fn get_document(&self, url: &str) -> Result<String, WorkflowError> {
        let response = self
            .client
            .get(url)
            .header("accept", ACCEPT_DOCUMENT)
            .header("accept-language", ACCEPT_LANGUAGE)
            .send()
            .await?;
        Ok(response.text().await?)
    }

    /// HEAD a page with document-fetch headers, discarding the body.
    pub async fn head(&self, url: &str) -> Result<(), WorkflowError> {
        self.client
            .head(url)
            .header("accept", ACCEPT_DOCUMENT)
            .header("accept-language", ACCEPT_LANGUAGE)
            .send()
            .await?;
        Ok(())
    }

    /// POST a urlencoded form, returning the response body.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<String, WorkflowError> {
        let response = self
            .client
            .post(url)
            .header("accept", "*/*")
            .header("accept-language", ACCEPT_LANGUAGE)
            .form(form)
            .send()
            .await?;
        Ok(response.text().await?)
    }

    /// GET a JSON endpoint, returning the raw body for the caller to parse.
    pub async fn get_json(&self, url: &str) -> Result<String, WorkflowError> {
        let response = self
            .client
            .get(url)
            .header("accept", ACCEPT_DOCUMENT)
            .header("accept-language", ACCEPT_LANGUAGE)
            .send()
            .await?;
        Ok(response.text().await?)
    }

    /// POST a JSON payload, returning the raw response body.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<String, WorkflowError> {
        let response = self
            .client
            .post(url)
            .header("accept", "application/json")
            .header("accept-language", ACCEPT_LANGUAGE)
            .json(payload)
            .send()
            .await?;
        Ok(response.text().await?)
    }
}

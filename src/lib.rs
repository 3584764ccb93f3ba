// lib.rs
// Copyright 2026 fixture-audit contributors
//
// Licensed under the MIT License <LICENSE-MIT or https://opensource.org/licenses/MIT>.
// This file may not be copied, modified, or distributed except according to those terms.

//! # Fixture Audit
//!
//! An HTTP relay that grades photos of retail fixtures (bags, shoes, women's wall,
//! men's wall) against a fixed visual merchandising rubric. Each request forwards the
//! image and the rubric to the Anthropic Messages API and returns the model's
//! evaluation text unchanged.
//!
//! ## Features
//! - **Evaluation endpoint**: `POST /api/analyze` with `{ image, imageType?, fixtureType }`.
//! - **Permissive CORS**: preflight requests are answered before any validation.
//! - **Messages API client**: a small [`Client`] for single, non-streaming calls.
//!
//! ## Usage
//!
//! ```no_run
//! use fixture_audit::{handler::{router, AppState}, Client};
//!
//! # async fn run() -> Result<(), fixture_audit::error::Error> {
//! let client = Client::builder("your_api_key".into()).build()?;
//! let app = router("/api/analyze", AppState::new(Some(client)));
//! # Ok(())
//! # }
//! ```

use error::{ApiErrorJsonResponse, Error};
use models::{message::Message, request::MessagesRequest, response::MessagesResponse};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client as ReqwestClient, StatusCode,
};

pub mod config;
pub mod error;
pub mod handler;
pub mod models;
pub mod rubric;

pub static BASE_URL: &str = "https://api.anthropic.com";
pub static DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub static API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Number of key characters that may appear in logs.
const KEY_PREFIX_LEN: usize = 10;

/// The `Client` for the Anthropic Messages API.
///
/// Every call is a single request/response cycle: no retries, no streaming, and no
/// timeout beyond what the transport imposes.
///
/// ## Usage Example
///
/// ```
/// use fixture_audit::Client;
///
/// let client = Client::builder("your_api_key".into())
///     .base_url("https://custom.url".to_string())
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct Client {
    /// The API key for authentication.
    api_key: String,
    /// Model identifier sent with every request.
    model: String,
    /// Output token cap sent with every request.
    max_tokens: u32,
    /// Internal HTTP client for making requests.
    client: ReqwestClient,
    /// The base URL for API requests.
    base_url: String,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &format_args!("{}...", self.key_prefix()))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Client {
    /// Creates a new `ClientBuilder` with the required API key.
    ///
    /// # Arguments
    ///
    /// * `api_key` - The key sent in the `x-api-key` header.
    pub fn builder(api_key: String) -> ClientBuilder {
        ClientBuilder {
            api_key,
            base_url: BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            version: API_VERSION.into(),
        }
    }

    /// Creates a new `Client` with every setting spelled out.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the key or version cannot be sent as a header,
    /// or `Error::HttpError` if the HTTP client cannot be built.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        max_tokens: Option<u32>,
        version: Option<String>,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let api_key_value = HeaderValue::from_str(&api_key)
            .map_err(|_| Error::ConfigError("Invalid API key".to_owned()))?;
        let version_value = HeaderValue::from_str(version.as_deref().unwrap_or(API_VERSION))
            .map_err(|_| Error::ConfigError("Invalid API version".to_owned()))?;
        headers.insert("x-api-key", api_key_value);
        headers.insert("anthropic-version", version_value);

        let client = ReqwestClient::builder()
            .default_headers(headers)
            .user_agent(APP_USER_AGENT)
            .build()?;

        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.into()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            client,
            base_url: base_url.unwrap_or_else(|| BASE_URL.into()),
        })
    }

    /// The leading characters of the API key, safe to write to logs.
    pub fn key_prefix(&self) -> String {
        self.api_key.chars().take(KEY_PREFIX_LEN).collect()
    }

    /// Sends one `POST /v1/messages` call with the configured model and token cap.
    ///
    /// # Arguments
    /// * `messages` - The conversation to send, usually one user turn with an image and a text block.
    ///
    /// # Returns
    /// * `MessagesResponse` - The parsed model response.
    ///
    /// # Errors
    ///
    /// * `Error::UpstreamError` - the API answered with a non-success status.
    /// * `Error::SerializationError` - the body was not the expected JSON.
    /// * `Error::HttpError` - the request could not be sent or read.
    pub async fn create_message(&self, messages: Vec<Message>) -> Result<MessagesResponse, Error> {
        let request = MessagesRequest::new(self.model.clone(), self.max_tokens, messages);
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        tracing::info!(model = %self.model, max_tokens = self.max_tokens, "calling messages API");

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        tracing::info!(status = status.as_u16(), "messages API responded");

        let body: serde_json::Value = serde_json::from_slice(&response.bytes().await?)?;
        Self::check_response(status, &body)?;

        serde_json::from_value(body).map_err(Error::from)
    }

    /// Maps a non-success status to an error carrying the API's own message when it sent one.
    pub(crate) fn check_response(status: StatusCode, body: &serde_json::Value) -> Result<(), Error> {
        if status.is_success() {
            return Ok(());
        }

        tracing::error!(status = status.as_u16(), body = %body, "messages API error");

        let error_body: ApiErrorJsonResponse =
            serde_json::from_value(body.clone()).unwrap_or_default();
        let message = error_body
            .message()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("API error: {}", status.as_u16()));

        Err(Error::UpstreamError(message))
    }
}

/// Builder for configuring and creating a `Client` instance.
///
/// Only the API key is required; base URL, model, token cap and protocol version
/// default to the values the evaluation endpoint uses.
pub struct ClientBuilder {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    version: String,
}

impl ClientBuilder {
    /// Sets a custom `base_url` for the API endpoint.
    ///
    /// This is useful if the API endpoint changes or if using a mock server
    /// for testing purposes.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the API, without the `/v1/messages` path.
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the model identifier.
    pub fn model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Sets the output token cap.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the `anthropic-version` header value.
    pub fn version(mut self, version: String) -> Self {
        self.version = version;
        self
    }

    /// Builds and returns a new `Client` instance.
    pub fn build(self) -> Result<Client, Error> {
        Client::new(
            self.api_key,
            Some(self.base_url),
            Some(self.model),
            Some(self.max_tokens),
            Some(self.version),
        )
    }
}

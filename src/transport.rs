//! Sending signed request objects to an si-authorize endpoint.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::RequestConfig;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The error type for failures to get any response from the authorize endpoint.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request never produced an HTTP response
    #[error("request to `{url}` failed: `{reason}`")]
    Request {
        /// Endpoint URL
        url: String,
        /// Underlying failure
        reason: String,
    },
    /// The response body could not be read
    #[error("unable to read response body: `{0}`")]
    Body(String),
}

/// Query parameters of an SI authorize request. The request object travels signed in `request`;
/// `response_type`, `scope` and `client_id` are repeated in the clear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizeRequest {
    /// e.g. `mc_si_async_code`
    pub response_type: String,
    /// e.g. `openid mc_atp`
    pub scope: String,
    /// Client id registered with the operator
    pub client_id: String,
    /// The signed request object
    pub request: String,
}

impl AuthorizeRequest {
    /// Creates a new [AuthorizeRequest].
    pub fn new(response_type: String, scope: String, client_id: String, request: String) -> Self {
        AuthorizeRequest {
            response_type,
            scope,
            client_id,
            request,
        }
    }

    /// Takes the clear-text parameters from `config`.
    pub fn from_config(config: &RequestConfig, request: String) -> Self {
        AuthorizeRequest::new(
            config.response_type.clone(),
            config.scope.clone(),
            config.client_id.clone(),
            request,
        )
    }

    /// Parameters in the order they are sent.
    pub fn query_pairs(&self) -> [(&str, &str); 4] {
        [
            ("response_type", self.response_type.as_str()),
            ("scope", self.scope.as_str()),
            ("client_id", self.client_id.as_str()),
            ("request", self.request.as_str()),
        ]
    }
}

/// Whatever the endpoint answered, any status included.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizeResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

/// Sends SI authorize requests.
pub trait AuthorizeTransport {
    /// POSTs `request` to `url`. `host` overrides the Host header, which a locally run sandbox
    /// uses to pick the simulated operator.
    fn post_authorize(
        &self,
        url: &str,
        request: &AuthorizeRequest,
        host: Option<&str>,
    ) -> Result<AuthorizeResponse, TransportError>;
}

/// Blocking [AuthorizeTransport] backed by a `ureq` agent that does not follow redirects.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        UreqTransport::new(Duration::from_secs(30), Duration::from_secs(10))
    }
}

impl UreqTransport {
    /// Creates a transport with the given overall and connect timeouts.
    pub fn new(timeout: Duration, conn_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(conn_timeout)
            .redirects(0)
            .build();
        UreqTransport { agent }
    }
}

impl AuthorizeTransport for UreqTransport {
    fn post_authorize(
        &self,
        url: &str,
        request: &AuthorizeRequest,
        host: Option<&str>,
    ) -> Result<AuthorizeResponse, TransportError> {
        info!(url, "making SI authorize request");

        let mut http_request = self
            .agent
            .post(url)
            .set("Content-Type", FORM_CONTENT_TYPE)
            .query_pairs(request.query_pairs());
        if let Some(host) = host {
            http_request = http_request.set("Host", host);
        }

        let response = match http_request.call() {
            Ok(response) => response,
            // Error statuses are still an answer from the operator.
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => {
                return Err(TransportError::Request {
                    url: url.to_owned(),
                    reason: e.to_string(),
                })
            }
        };

        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| TransportError::Body(e.to_string()))?;
        debug!(status, "SI authorize response");

        Ok(AuthorizeResponse { status, body })
    }
}

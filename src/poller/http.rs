use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::trace;
use url::Url;

use crate::args::DEFAULT_USER_AGENT;
use crate::error::{AppError, AppResult, TransportError, ValidationError};

use super::transport::{PollRequest, PollTransport, PollUpdate};

/// Poll endpoint, relative to the console base URL.
pub const POLL_PATH: &str = "ui/poll";

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub headers: Vec<(String, String)>,
}

/// [`PollTransport`] speaking to a console's `/ui/poll` over HTTP.
///
/// Tokens go out as query parameters (`?sample=-1&threads=7`) and the
/// response is a JSON array of `{key, value, next}` records.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Builds the transport and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error when the base URL or a header is invalid, or the
    /// client cannot be built.
    pub fn new(config: &HttpTransportConfig) -> AppResult<Self> {
        let endpoint = poll_endpoint(&config.base_url)?;
        let headers = build_header_map(&config.headers)?;
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl PollTransport for HttpTransport {
    async fn poll(&self, request: PollRequest) -> Result<Vec<PollUpdate>, TransportError> {
        trace!(endpoint = %self.endpoint, keys = request.len(), "Sending poll");
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(request.tokens())
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(TransportError::from_reqwest)?;
        serde_json::from_slice(&body).map_err(|err| TransportError::Decode { source: err })
    }
}

pub(crate) fn poll_endpoint(base_url: &str) -> AppResult<Url> {
    let mut base = Url::parse(base_url.trim()).map_err(|err| {
        AppError::validation(ValidationError::InvalidUrl {
            url: base_url.to_owned(),
            source: err,
        })
    })?;
    match base.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::validation(ValidationError::UnsupportedScheme {
                scheme: other.to_owned(),
            }));
        }
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(POLL_PATH).map_err(|err| {
        AppError::validation(ValidationError::InvalidUrl {
            url: base_url.to_owned(),
            source: err,
        })
    })
}

fn build_header_map(headers: &[(String, String)]) -> AppResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            AppError::validation(ValidationError::InvalidHeaderName {
                name: name.clone(),
                source: err,
            })
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            AppError::validation(ValidationError::InvalidHeaderValue {
                name: name.clone(),
                source: err,
            })
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

use crate::config::ClientConfig;
use crate::error::{Result, SnapmakerError};
use reqwest::{RequestBuilder, StatusCode};

/// Low-level HTTP transport to one printer's API
///
/// Owns the `reqwest::Client` with the connect and total-request timeouts
/// applied, and turns responses into either a body or a classified error.
/// Never retries.
#[derive(Debug, Clone)]
pub struct Connection {
    http: reqwest::Client,
    base_url: String,
}

impl Connection {
    /// Build a connection to `http://{host}:{api_port}/api/v1`
    pub fn new(host: &str, config: &ClientConfig) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() || host.contains(['/', '?', '#', '@']) || host.contains(char::is_whitespace) {
            return Err(SnapmakerError::InvalidHost(host.to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("snapmaker-lan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("http://{}:{}/api/v1", host, config.api_port),
        })
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and classify the outcome.
    ///
    /// Returns the HTTP status together with the body for 2xx responses.
    /// 401 becomes `Unauthorized`, any other non-2xx status `HttpStatus`,
    /// and network or timeout failures `Transport`.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        // The token travels in the query string, so URLs are stripped from errors
        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            tracing::debug!("Request to {} failed: {}", self.base_url, e);
            SnapmakerError::Transport(e)
        })?;

        let status = response.status();
        tracing::debug!("{} answered {}", response.url().path(), status);

        if status == StatusCode::UNAUTHORIZED {
            return Err(SnapmakerError::Unauthorized);
        }
        if !status.is_success() {
            return Err(SnapmakerError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SnapmakerError::Transport(e.without_url()))?;
        Ok((status, body))
    }
}

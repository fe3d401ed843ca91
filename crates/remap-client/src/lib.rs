//! HTTP request executor for talking to the SCION Coordinator.
//!
//! Uses blocking `ureq`: the agent runs strictly sequentially and has no
//! async runtime. Redirects are followed by hand so the hop count is
//! bounded and the method and body are resent unchanged at every hop.

use std::time::Duration;

/// Default TCP connection timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read timeout. Bundle downloads are generated on demand by the
/// Coordinator, so this is generous.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of redirects followed for one logical call.
pub const MAX_HOPS: usize = 10;

/// HTTP statuses treated as redirects when they carry a `Location`.
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

// ── Error types ───────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Coordinator not reachable: {0}")]
    Network(String),

    #[error("Redirect loop: more than {hops} redirects, last target {url}")]
    RedirectLoop { hops: usize, url: String },

    #[error("Invalid response: {0}")]
    Protocol(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

// ── Request types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Connect and read timeouts applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: CONNECT_TIMEOUT,
            read: READ_TIMEOUT,
        }
    }
}

/// Terminal response of one logical call, after redirects.
pub struct Response {
    status: u16,
    url: String,
    inner: ureq::Response,
}

impl Response {
    pub fn status(&self) -> u16 {
        self.status
    }

    /// URL that produced this response (the last hop).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Body as a stream, for payloads that should not be buffered.
    pub fn into_reader(self) -> Box<dyn std::io::Read + Send + Sync + 'static> {
        self.inner.into_reader()
    }

    /// Body parsed as JSON, whatever the status code.
    pub fn into_json(self) -> Result<serde_json::Value> {
        let status = self.status;
        let body = self
            .inner
            .into_string()
            .map_err(|e| ClientError::Network(format!("reading body: {e}")))?;
        serde_json::from_str(&body).map_err(|e| {
            ClientError::Protocol(format!(
                "HTTP {status}: body is not JSON ({e}): {}",
                truncate(&body, 200)
            ))
        })
    }
}

// ── Executor ──────────────────────────────────────────────────────

pub struct RequestExecutor {
    endpoint: String,
    agent: ureq::Agent,
    max_hops: usize,
}

impl RequestExecutor {
    pub fn new(endpoint: &str, timeouts: Timeouts) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeouts.connect)
            .timeout_read(timeouts.read)
            .redirects(0)
            .build();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            agent,
            max_hops: MAX_HOPS,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Perform one logical call against `path` on the Coordinator,
    /// following redirects up to [`MAX_HOPS`].
    ///
    /// Non-2xx statuses are returned as responses; only transport failures,
    /// malformed redirect targets and redirect loops are errors.
    pub fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let mut url = format!("{}{path}", self.endpoint);
        let mut hops = 0;

        loop {
            tracing::debug!(method = method.as_str(), url = %url, hop = hops, "Coordinator request");
            let resp = self.send_once(method, &url, body)?;

            let location = if REDIRECT_STATUSES.contains(&resp.status()) {
                resp.header("Location").map(str::to_string)
            } else {
                None
            };

            let Some(location) = location else {
                return Ok(Response {
                    status: resp.status(),
                    url,
                    inner: resp,
                });
            };

            let next = resolve_location(&url, &location)?;
            if hops == self.max_hops {
                return Err(ClientError::RedirectLoop {
                    hops: self.max_hops,
                    url: next,
                });
            }
            hops += 1;
            tracing::debug!(status = resp.status(), from = %url, to = %next, "Following redirect");
            url = next;
        }
    }

    /// [`execute`](Self::execute) and parse the terminal body as JSON.
    pub fn execute_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(u16, serde_json::Value)> {
        let resp = self.execute(method, path, body)?;
        let status = resp.status();
        Ok((status, resp.into_json()?))
    }

    fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ureq::Response> {
        let request = self.agent.request(method.as_str(), url);
        let result = match body {
            Some(json) => request.send_json(json),
            None => request.call(),
        };
        match result {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(_status, resp)) => Ok(resp),
            Err(ureq::Error::Transport(t)) => Err(map_transport(&t)),
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn map_transport(t: &ureq::Transport) -> ClientError {
    match t.kind() {
        ureq::ErrorKind::InvalidUrl | ureq::ErrorKind::UnknownScheme => {
            ClientError::InvalidUrl(t.to_string())
        }
        _ => ClientError::Network(t.to_string()),
    }
}

/// Resolve a `Location` header against the URL that returned it.
fn resolve_location(current: &str, location: &str) -> Result<String> {
    let base = url::Url::parse(current).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
    base.join(location)
        .map(String::from)
        .map_err(|e| ClientError::Protocol(format!("bad redirect target '{location}': {e}")))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

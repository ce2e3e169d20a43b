// HTTP transport for the Last.fm API
// One request/response cycle; classification and retries live in request.rs

use std::fmt;

/// Endpoint every API call is issued against.
pub const API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

const USER_AGENT: &str = concat!("lastfm-scrobbler/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Status and body of a completed HTTP exchange, before any JSON decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// The request never produced a response (DNS, TLS, dropped connection,
/// unreadable body). Always treated as transient by the caller.
#[derive(Debug, Clone)]
pub struct ConnectionFailure(pub String);

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection failure: {}", self.0)
    }
}

/// Executes one request against the remote API. The orchestrator only
/// depends on this contract, so a blocking client, an event-loop client
/// or a test double can all satisfy it.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RawResponse, ConnectionFailure>;
}

/// Blocking transport used by the application. GET sends the parameters
/// as a query string, POST as a form body; the user agent is attached to
/// every call.
#[derive(Debug, Default)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RawResponse, ConnectionFailure> {
        let result = match method {
            HttpMethod::Get => attohttpc::get(url)
                .header("User-Agent", USER_AGENT)
                .params(params.iter())
                .send(),
            HttpMethod::Post => attohttpc::post(url)
                .header("User-Agent", USER_AGENT)
                .form(&params)
                .and_then(|request| request.send()),
        };

        let response = result.map_err(|err| ConnectionFailure(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| ConnectionFailure(err.to_string()))?;

        Ok(RawResponse { status, body })
    }
}

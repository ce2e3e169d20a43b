// Error types for the Last.fm API client

use thiserror::Error;

/// Failure modes surfaced by the Last.fm client.
///
/// Known "not found" responses are not errors; they surface as `Ok(None)`
/// from the read methods instead.
#[derive(Error, Debug)]
pub enum LastfmError {
    /// The remote returned HTTP 403. Raised immediately, never retried;
    /// callers typically treat the resource as hidden (e.g. a friend's
    /// listening history set to private).
    #[error("Last.fm denied access for {method}: {body}")]
    PermissionDenied { method: String, body: String },

    /// The remote returned HTTP 400. Raised immediately, never retried;
    /// indicates a malformed call rather than an environment issue.
    #[error("Last.fm rejected the request for {method}: {body}")]
    BadRequest { method: String, body: String },

    /// A 200-level response carried an `error` field with a message
    /// outside the known not-found set.
    #[error("unknown Last.fm error: {0}")]
    Api(String),

    /// Connection failures, non-JSON bodies, 5xx statuses and malformed
    /// payloads were retried up to the attempt limit without success.
    #[error("could not request {method} after {attempts} attempts")]
    RetriesExhausted { method: String, attempts: u32 },

    /// The session exchange returned an empty session key: the user has
    /// not yet approved the auth token in their browser.
    #[error("auth token has not been authorized by the user")]
    AuthPending,

    /// An operation that requires a session was called before
    /// `log_in_with_session`.
    #[error("not logged in to Last.fm")]
    NotLoggedIn,

    /// The remote reported a not-found condition for a call that must
    /// produce a value (e.g. a write submission).
    #[error("Last.fm returned no payload for {0}")]
    EmptyResponse(&'static str),
}

pub type Result<T> = std::result::Result<T, LastfmError>;

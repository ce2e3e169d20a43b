// Request orchestration for the Last.fm API
// Composes signing, transport and the response cache, and owns the retry
// policy and error classification.

use std::sync::Mutex;

use chrono::Duration;
use serde_json::Value;

use super::cache::ResponseCache;
use super::error::{LastfmError, Result};
use super::mappers::{MapResult, MissingKey};
use super::models::LastfmSession;
use super::signature;
use super::transport::{HttpMethod, Transport, API_URL};

/// Attempts allowed for one logical request, counting the first try.
const MAX_ATTEMPTS: u32 = 3;

/// Error messages that mean "nothing matched", which is a normal negative
/// lookup outcome and not a failure.
const NOT_FOUND_ERRORS: [&str; 3] = [
    "The artist you supplied could not be found",
    "Track not found",
    "Album not found",
];

pub(crate) struct RequestOrchestrator {
    api_key: String,
    api_secret: String,
    transport: Box<dyn Transport>,
    cache: Mutex<ResponseCache>,
}

impl RequestOrchestrator {
    pub fn new(api_key: String, api_secret: String, transport: Box<dyn Transport>) -> Self {
        Self {
            api_key,
            api_secret,
            transport,
            cache: Mutex::new(ResponseCache::new()),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Run one logical API request to completion.
    ///
    /// Connection failures, non-JSON bodies, 5xx statuses and missing keys
    /// during mapping consume a retry attempt and loop immediately; 403 and
    /// 400 are raised without retrying; a known not-found error message
    /// yields `Ok(None)`.
    ///
    /// Retries re-issue the same call verbatim, POST submissions included:
    /// a scrobble whose first attempt was accepted upstream but whose
    /// response was lost can be recorded twice by the service.
    pub fn request<T, M>(
        &self,
        session: Option<&LastfmSession>,
        args: Vec<(String, String)>,
        http_method: HttpMethod,
        cacheable: bool,
        mapper: M,
    ) -> Result<Option<T>>
    where
        T: Clone + Send + 'static,
        M: Fn(&Value) -> MapResult<T>,
    {
        let method_name = args
            .iter()
            .find(|(key, _)| key == "method")
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let cache_key = ResponseCache::canonical_key(&args);
        if cacheable {
            if let Some(hit) = self.cache.lock().unwrap().get::<T>(&cache_key) {
                log::debug!("Used API cache for {}", method_name);
                return Ok(Some(hit));
            }
        }

        let params = self.build_params(session, args, http_method, &method_name)?;

        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.transport.execute(http_method, API_URL, &params) {
                Ok(response) => response,
                Err(failure) => {
                    // The service drops connections randomly.
                    log::debug!("{} attempt {}: {}", method_name, attempt, failure);
                    continue;
                }
            };

            let json: Value = match serde_json::from_str(&response.body) {
                Ok(json) => json,
                Err(err) => {
                    log::debug!("{} attempt {}: non-JSON body: {}", method_name, attempt, err);
                    continue;
                }
            };

            match response.status {
                403 => {
                    return Err(LastfmError::PermissionDenied {
                        method: method_name,
                        body: response.body,
                    });
                }
                400 => {
                    return Err(LastfmError::BadRequest {
                        method: method_name,
                        body: response.body,
                    });
                }
                500..=599 => {
                    log::debug!("{} attempt {}: HTTP {}", method_name, attempt, response.status);
                    continue;
                }
                _ => {}
            }

            if json.get("error").is_some() {
                let message = json
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();

                if NOT_FOUND_ERRORS.contains(&message) {
                    return Ok(None);
                }

                return Err(LastfmError::Api(response.body));
            }

            let mapped = match mapper(&json) {
                Ok(mapped) => mapped,
                Err(MissingKey(key)) => {
                    // An incomplete payload is assumed to be a transient
                    // upstream glitch.
                    log::debug!("{} attempt {}: missing key {}", method_name, attempt, key);
                    continue;
                }
            };

            if cacheable {
                if let Some(value) = &mapped {
                    self.cache
                        .lock()
                        .unwrap()
                        .put(cache_key, value.clone(), Duration::minutes(1));
                }
            }

            return Ok(mapped);
        }

        Err(LastfmError::RetriesExhausted {
            method: method_name,
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Merge the fixed credentials into the caller's arguments, attach the
    /// session key to writes, and sign when required. The session exchange
    /// is the one GET that must be signed: it is issued before a session
    /// key exists.
    fn build_params(
        &self,
        session: Option<&LastfmSession>,
        args: Vec<(String, String)>,
        http_method: HttpMethod,
        method_name: &str,
    ) -> Result<Vec<(String, String)>> {
        let mut params = Vec::with_capacity(args.len() + 4);
        params.push(("api_key".to_string(), self.api_key.clone()));
        params.push(("format".to_string(), "json".to_string()));
        params.extend(args);

        if http_method == HttpMethod::Post {
            let session = session.ok_or(LastfmError::NotLoggedIn)?;
            params.push(("sk".to_string(), session.session_key.clone()));
        }

        if http_method == HttpMethod::Post || method_name == "auth.getSession" {
            let api_sig = signature::sign(&params, &self.api_secret);
            params.push(("api_sig".to_string(), api_sig));
        }

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lastfm::transport::{ConnectionFailure, RawResponse};
    use std::sync::Mutex as StdMutex;

    /// Scripted transport: pops one canned outcome per call and records
    /// what was sent.
    struct MockTransport {
        responses: StdMutex<Vec<std::result::Result<RawResponse, ConnectionFailure>>>,
        calls: StdMutex<Vec<(HttpMethod, Vec<(String, String)>)>>,
    }

    impl MockTransport {
        fn new(
            responses: Vec<std::result::Result<RawResponse, ConnectionFailure>>,
        ) -> Self {
            let mut reversed = responses;
            reversed.reverse();
            Self {
                responses: StdMutex::new(reversed),
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn ok(status: u16, body: &str) -> std::result::Result<RawResponse, ConnectionFailure> {
            Ok(RawResponse {
                status,
                body: body.to_string(),
            })
        }

        fn dropped() -> std::result::Result<RawResponse, ConnectionFailure> {
            Err(ConnectionFailure("connection reset".to_string()))
        }
    }

    impl Transport for MockTransport {
        fn execute(
            &self,
            method: HttpMethod,
            _url: &str,
            params: &[(String, String)],
        ) -> std::result::Result<RawResponse, ConnectionFailure> {
            self.calls.lock().unwrap().push((method, params.to_vec()));
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(MockTransport::dropped)
        }
    }

    fn orchestrator(
        responses: Vec<std::result::Result<RawResponse, ConnectionFailure>>,
    ) -> (RequestOrchestrator, std::sync::Arc<MockTransport>) {
        let transport = std::sync::Arc::new(MockTransport::new(responses));
        let orchestrator = RequestOrchestrator::new(
            "key".to_string(),
            "secret".to_string(),
            Box::new(SharedTransport(transport.clone())),
        );
        (orchestrator, transport)
    }

    /// Lets the test keep a handle on the mock after handing ownership to
    /// the orchestrator.
    struct SharedTransport(std::sync::Arc<MockTransport>);

    impl Transport for SharedTransport {
        fn execute(
            &self,
            method: HttpMethod,
            url: &str,
            params: &[(String, String)],
        ) -> std::result::Result<RawResponse, ConnectionFailure> {
            self.0.execute(method, url, params)
        }
    }

    fn args(method: &str) -> Vec<(String, String)> {
        vec![("method".to_string(), method.to_string())]
    }

    fn token_mapper(json: &Value) -> MapResult<String> {
        use crate::lastfm::mappers::JsonFieldExt;
        Ok(Some(json.str_field("token")?.to_string()))
    }

    fn session() -> LastfmSession {
        LastfmSession {
            session_key: "sessionkey".to_string(),
            username: "kale".to_string(),
        }
    }

    #[test]
    fn connection_failures_exhaust_exactly_three_attempts() {
        let (orchestrator, transport) = orchestrator(vec![
            MockTransport::dropped(),
            MockTransport::dropped(),
            MockTransport::dropped(),
            MockTransport::dropped(),
        ]);

        let result = orchestrator.request(
            None,
            args("auth.getToken"),
            HttpMethod::Get,
            false,
            token_mapper,
        );

        match result {
            Err(LastfmError::RetriesExhausted { method, attempts }) => {
                assert_eq!(method, "auth.getToken");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected retry exhaustion, got {:?}", other.map(|_| ())),
        }
        assert_eq!(transport.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn forbidden_is_raised_after_a_single_attempt() {
        let (orchestrator, transport) = orchestrator(vec![MockTransport::ok(
            403,
            r#"{"error":17,"message":"Login: User required to be logged in"}"#,
        )]);

        let result = orchestrator.request(
            None,
            args("user.getRecentTracks"),
            HttpMethod::Get,
            false,
            token_mapper,
        );

        assert!(matches!(result, Err(LastfmError::PermissionDenied { .. })));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn bad_request_is_raised_after_a_single_attempt() {
        let (orchestrator, transport) = orchestrator(vec![MockTransport::ok(
            400,
            r#"{"error":6,"message":"Invalid parameters"}"#,
        )]);

        let result = orchestrator.request(
            None,
            args("user.getInfo"),
            HttpMethod::Get,
            false,
            token_mapper,
        );

        assert!(matches!(result, Err(LastfmError::BadRequest { .. })));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn known_not_found_message_is_an_empty_result() {
        let (orchestrator, transport) = orchestrator(vec![MockTransport::ok(
            200,
            r#"{"error":6,"message":"Track not found"}"#,
        )]);

        let result = orchestrator.request(
            None,
            args("track.getInfo"),
            HttpMethod::Get,
            false,
            token_mapper,
        );

        assert!(matches!(result, Ok(None)));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn unknown_error_message_is_terminal() {
        let (orchestrator, transport) = orchestrator(vec![MockTransport::ok(
            200,
            r#"{"error":10,"message":"Invalid API key"}"#,
        )]);

        let result = orchestrator.request(
            None,
            args("auth.getToken"),
            HttpMethod::Get,
            false,
            token_mapper,
        );

        assert!(matches!(result, Err(LastfmError::Api(_))));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn server_errors_and_bad_bodies_are_retried() {
        let (orchestrator, transport) = orchestrator(vec![
            MockTransport::ok(500, r#"{"error":16,"message":"Temporary error"}"#),
            MockTransport::ok(200, "<html>not json</html>"),
            MockTransport::ok(200, r#"{"token":"abc"}"#),
        ]);

        let result = orchestrator.request(
            None,
            args("auth.getToken"),
            HttpMethod::Get,
            false,
            token_mapper,
        );

        assert_eq!(result.unwrap(), Some("abc".to_string()));
        assert_eq!(transport.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn missing_key_during_mapping_consumes_an_attempt() {
        let (orchestrator, transport) = orchestrator(vec![
            MockTransport::ok(200, r#"{"unexpected":"shape"}"#),
            MockTransport::ok(200, r#"{"token":"abc"}"#),
        ]);

        let result = orchestrator.request(
            None,
            args("auth.getToken"),
            HttpMethod::Get,
            false,
            token_mapper,
        );

        assert_eq!(result.unwrap(), Some("abc".to_string()));
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn cacheable_request_skips_the_network_on_a_hit() {
        let (orchestrator, transport) = orchestrator(vec![
            MockTransport::ok(200, r#"{"token":"abc"}"#),
            MockTransport::ok(200, r#"{"token":"def"}"#),
        ]);

        let first = orchestrator
            .request(
                None,
                args("album.getInfo"),
                HttpMethod::Get,
                true,
                token_mapper,
            )
            .unwrap();
        let second = orchestrator
            .request(
                None,
                args("album.getInfo"),
                HttpMethod::Get,
                true,
                token_mapper,
            )
            .unwrap();

        assert_eq!(first, Some("abc".to_string()));
        assert_eq!(second, Some("abc".to_string()));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn cache_key_is_independent_of_argument_order() {
        let (orchestrator, transport) = orchestrator(vec![
            MockTransport::ok(200, r#"{"token":"abc"}"#),
            MockTransport::ok(200, r#"{"token":"def"}"#),
        ]);

        let ordered = vec![
            ("method".to_string(), "album.getInfo".to_string()),
            ("artist".to_string(), "Cher".to_string()),
            ("album".to_string(), "Believe".to_string()),
        ];
        let shuffled = vec![
            ("album".to_string(), "Believe".to_string()),
            ("method".to_string(), "album.getInfo".to_string()),
            ("artist".to_string(), "Cher".to_string()),
        ];

        orchestrator
            .request(None, ordered, HttpMethod::Get, true, token_mapper)
            .unwrap();
        let second = orchestrator
            .request(None, shuffled, HttpMethod::Get, true, token_mapper)
            .unwrap();

        assert_eq!(second, Some("abc".to_string()));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn post_attaches_session_key_and_signature() {
        let (orchestrator, transport) = orchestrator(vec![MockTransport::ok(
            200,
            r#"{"token":"abc"}"#,
        )]);

        let session = session();
        orchestrator
            .request(
                Some(&session),
                args("track.scrobble"),
                HttpMethod::Post,
                false,
                token_mapper,
            )
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        let (method, params) = &calls[0];
        assert_eq!(*method, HttpMethod::Post);

        let find = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(find("api_key").as_deref(), Some("key"));
        assert_eq!(find("format").as_deref(), Some("json"));
        assert_eq!(find("sk").as_deref(), Some("sessionkey"));
        assert!(find("api_sig").is_some());
    }

    #[test]
    fn session_exchange_is_the_only_signed_get() {
        let (orchestrator, transport) = orchestrator(vec![
            MockTransport::ok(200, r#"{"token":"abc"}"#),
            MockTransport::ok(200, r#"{"token":"abc"}"#),
        ]);

        orchestrator
            .request(None, args("auth.getSession"), HttpMethod::Get, false, token_mapper)
            .unwrap();
        orchestrator
            .request(None, args("auth.getToken"), HttpMethod::Get, false, token_mapper)
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        let has_sig = |index: usize| {
            calls[index]
                .1
                .iter()
                .any(|(key, _)| key == "api_sig")
        };
        let has_sk = |index: usize| calls[index].1.iter().any(|(key, _)| key == "sk");

        assert!(has_sig(0));
        assert!(!has_sk(0));
        assert!(!has_sig(1));
    }

    #[test]
    fn post_without_session_is_rejected_before_the_network() {
        let (orchestrator, transport) = orchestrator(vec![]);

        let result = orchestrator.request(
            None,
            args("track.scrobble"),
            HttpMethod::Post,
            false,
            token_mapper,
        );

        assert!(matches!(result, Err(LastfmError::NotLoggedIn)));
        assert!(transport.calls.lock().unwrap().is_empty());
    }
}

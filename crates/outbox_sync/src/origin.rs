//! Origin server abstraction.
//!
//! Every call to the origin resolves to an [`OriginResponse`], so callers
//! branch on an explicit tag instead of poking at response bodies.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::watch;

/// A record as returned by the origin, including server-assigned fields.
pub type ServerRecord = Value;

/// Outcome of one request to the origin.
#[derive(Debug, Clone, PartialEq)]
pub enum OriginResponse {
    /// The origin created every submitted record.
    Success(Vec<ServerRecord>),
    /// The origin understood the request and rejected it.
    BusinessFailure(String),
    /// No usable response reached us.
    TransportFailure(String),
}

impl OriginResponse {
    /// Classifies an HTTP status and body.
    ///
    /// - 5xx and other non-2xx/4xx statuses are transport failures, even when
    ///   the body carries `message`. The write is queued and retried rather
    ///   than reported as rejected, so an origin that is up but failing is
    ///   treated the same as one that cannot be reached.
    /// - a body object carrying `message` is a business failure, whatever
    ///   the status
    /// - other 4xx responses are business failures
    /// - a 2xx array is success; a 2xx object is success with one record
    pub fn classify(status: u16, body: &[u8]) -> Self {
        let success = (200..300).contains(&status);
        if !success && !(400..500).contains(&status) {
            return Self::TransportFailure(format!("origin returned status {status}"));
        }

        let parsed: Result<Value, _> = serde_json::from_slice(body);

        match parsed {
            Ok(Value::Object(map)) if map.contains_key("message") => {
                let message = match &map["message"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Self::BusinessFailure(message)
            }
            _ if !success => Self::BusinessFailure(format!("origin rejected request with status {status}")),
            Ok(Value::Array(records)) => Self::Success(records),
            Ok(record @ Value::Object(_)) => Self::Success(vec![record]),
            Ok(other) => Self::BusinessFailure(format!("unexpected response body: {other}")),
            Err(e) => Self::BusinessFailure(format!("undecodable response body: {e}")),
        }
    }

    /// Returns true for [`OriginResponse::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// The origin server's create endpoint.
///
/// Implementations never return errors: every failure is folded into an
/// [`OriginResponse`] tag.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Creates one record.
    async fn create(&self, payload: &Value) -> OriginResponse;

    /// Creates a batch of records in one request.
    async fn create_batch(&self, payloads: &[Value]) -> OriginResponse;
}

/// A scripted origin for tests.
///
/// Responses are taken from a queue; when it is empty the default applies.
/// The default is "accept and echo with an `_id`". Requests can be held in
/// flight with [`MockOrigin::close_gate`].
#[derive(Debug)]
pub struct MockOrigin {
    scripted: Mutex<VecDeque<OriginResponse>>,
    fallback: Mutex<Option<OriginResponse>>,
    requests: Mutex<Vec<Vec<Value>>>,
    calls: watch::Sender<usize>,
    gate: watch::Sender<bool>,
    delay: Mutex<Duration>,
    next_id: Mutex<u64>,
}

impl MockOrigin {
    /// Creates a mock that accepts everything.
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: watch::Sender::new(0),
            gate: watch::Sender::new(true),
            delay: Mutex::new(Duration::ZERO),
            next_id: Mutex::new(1),
        }
    }

    /// Creates a mock whose every request fails at the transport level.
    pub fn unreachable() -> Self {
        let origin = Self::new();
        origin.set_default(OriginResponse::TransportFailure("connection refused".into()));
        origin
    }

    /// Queues a response for the next request.
    pub fn push_response(&self, response: OriginResponse) {
        self.scripted.lock().push_back(response);
    }

    /// Sets the response used when nothing is queued.
    pub fn set_default(&self, response: OriginResponse) {
        *self.fallback.lock() = Some(response);
    }

    /// Goes back to accepting everything by default.
    pub fn accept_all(&self) {
        *self.fallback.lock() = None;
    }

    /// Delays every response.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Holds requests in flight until [`MockOrigin::open_gate`].
    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    /// Releases held requests.
    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// Returns every request body received, as payload lists.
    pub fn requests(&self) -> Vec<Vec<Value>> {
        self.requests.lock().clone()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        *self.calls.borrow()
    }

    /// Waits until at least `n` requests have arrived.
    pub async fn wait_for_requests(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    async fn respond(&self, payloads: Vec<Value>) -> OriginResponse {
        self.requests.lock().push(payloads.clone());
        self.calls.send_modify(|count| *count += 1);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(response) = self.scripted.lock().pop_front() {
            return response;
        }
        if let Some(response) = self.fallback.lock().clone() {
            return response;
        }

        let mut next_id = self.next_id.lock();
        let records = payloads
            .into_iter()
            .map(|mut payload| {
                if let Value::Object(map) = &mut payload {
                    map.insert("_id".into(), Value::String((*next_id).to_string()));
                }
                *next_id += 1;
                payload
            })
            .collect();
        OriginResponse::Success(records)
    }
}

impl Default for MockOrigin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Origin for MockOrigin {
    async fn create(&self, payload: &Value) -> OriginResponse {
        self.respond(vec![payload.clone()]).await
    }

    async fn create_batch(&self, payloads: &[Value]) -> OriginResponse {
        self.respond(payloads.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_batch_success() {
        let body = br#"[{"_id":"1","pizzaName":"A"},{"_id":"2","pizzaName":"B"}]"#;
        match OriginResponse::classify(200, body) {
            OriginResponse::Success(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[1]["_id"], "2");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn classify_single_success() {
        let response = OriginResponse::classify(200, br#"{"_id":"9","pizzaName":"A"}"#);
        assert_eq!(
            response,
            OriginResponse::Success(vec![json!({"_id": "9", "pizzaName": "A"})])
        );
    }

    #[test]
    fn message_in_ok_body_is_business_failure() {
        let response = OriginResponse::classify(200, br#"{"message":"validation failed"}"#);
        assert_eq!(
            response,
            OriginResponse::BusinessFailure("validation failed".into())
        );
    }

    #[test]
    fn client_errors_are_business_failures() {
        assert!(matches!(
            OriginResponse::classify(400, br#"{"errors":{}}"#),
            OriginResponse::BusinessFailure(_)
        ));
        assert!(matches!(
            OriginResponse::classify(404, br#"{"message":"No pizza found with this id"}"#),
            OriginResponse::BusinessFailure(m) if m == "No pizza found with this id"
        ));
    }

    #[test]
    fn server_errors_are_transport_failures() {
        assert!(matches!(
            OriginResponse::classify(503, b"upstream down"),
            OriginResponse::TransportFailure(_)
        ));
        assert!(matches!(
            OriginResponse::classify(302, b""),
            OriginResponse::TransportFailure(_)
        ));
    }

    #[test]
    fn undecodable_ok_body_is_business_failure() {
        assert!(matches!(
            OriginResponse::classify(200, b"<html>"),
            OriginResponse::BusinessFailure(_)
        ));
        assert!(matches!(
            OriginResponse::classify(200, b"42"),
            OriginResponse::BusinessFailure(_)
        ));
    }

    #[test]
    fn server_error_queues_even_with_message() {
        // A 5xx never reached application logic, so its body is not a verdict.
        let body = br#"{"message":"database connection lost"}"#;
        assert!(matches!(
            OriginResponse::classify(503, body),
            OriginResponse::TransportFailure(_)
        ));
        assert!(matches!(
            OriginResponse::classify(500, b"<html>oops</html>"),
            OriginResponse::TransportFailure(_)
        ));
    }

    #[tokio::test]
    async fn mock_echoes_with_ids() {
        let origin = MockOrigin::new();
        let response = origin
            .create_batch(&[json!({"pizzaName": "A"}), json!({"pizzaName": "B"})])
            .await;
        assert_eq!(
            response,
            OriginResponse::Success(vec![
                json!({"pizzaName": "A", "_id": "1"}),
                json!({"pizzaName": "B", "_id": "2"}),
            ])
        );
        assert_eq!(origin.request_count(), 1);
    }

    #[tokio::test]
    async fn mock_scripted_then_default() {
        let origin = MockOrigin::unreachable();
        origin.push_response(OriginResponse::Success(vec![]));

        assert!(origin.create(&json!({})).await.is_success());
        assert!(matches!(
            origin.create(&json!({})).await,
            OriginResponse::TransportFailure(_)
        ));
        assert_eq!(origin.requests().len(), 2);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn non_client_errors_are_transport(status in 300u16..600, body in ".*") {
                prop_assume!(!(400..500).contains(&status));
                prop_assert!(matches!(
                    OriginResponse::classify(status, body.as_bytes()),
                    OriginResponse::TransportFailure(_)
                ));
            }

            #[test]
            fn message_always_means_business_failure(
                status in prop_oneof![200u16..300, 400u16..500],
                message in "[a-z ]{1,20}",
            ) {
                let body = serde_json::to_vec(&json!({ "message": message.clone() })).unwrap();
                prop_assert_eq!(
                    OriginResponse::classify(status, &body),
                    OriginResponse::BusinessFailure(message)
                );
            }
        }
    }
}

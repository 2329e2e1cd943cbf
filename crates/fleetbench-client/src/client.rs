// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Typed client for one peer's agent API.

use std::time::Duration;

use fleetbench_contracts::{Instructions, RetryPolicy, StateItem};
use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, Result};

/// HTTP client for a single remote agent. One instance per peer; cheap to
/// clone (shares the underlying connection pool).
///
/// Every operation takes an optional [`RetryPolicy`]; `None` selects the
/// per-method default. Retries cover transport failures and transient
/// statuses; the policy's non-transient statuses and exhausted attempts
/// surface as [`ApiError`].
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
}

/// Request timeout applied by [`AgentClient::new`]. Bounds every
/// individual attempt; polling operations additionally race attempts
/// against their own deadline.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl AgentClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::ClientBuild)?;
        Self::with_client(http, base_url)
    }

    /// Build against an existing `reqwest::Client`, e.g. one with custom
    /// timeouts, sharing its pool across peers.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if let Err(err) = reqwest::Url::parse(&base_url) {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url,
                reason: err.to_string(),
            });
        }
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/heartbeat`. Answers with the process's liveness; any HTTP
    /// exchange at all means the process is up, so the status is returned
    /// rather than mapped to an error.
    pub async fn heartbeat(&self, policy: Option<&RetryPolicy>) -> Result<StatusCode> {
        let policy = policy.cloned().unwrap_or_else(RetryPolicy::default_get);
        let url = format!("{}/api/heartbeat", self.base_url);
        let response = self
            .execute("heartbeat", &url, &policy, || self.http.get(&url))
            .await?;
        Ok(response.status())
    }

    /// `HEAD /api/events`. 200 once the peer has declared itself online
    /// and ready for instructions, 423 while it is still starting up.
    pub async fn server_online(&self, policy: Option<&RetryPolicy>) -> Result<StatusCode> {
        let policy = policy.cloned().unwrap_or_else(RetryPolicy::default_get);
        let url = format!("{}/api/events", self.base_url);
        let response = self
            .execute("online check", &url, &policy, || self.http.head(&url))
            .await?;
        Ok(response.status())
    }

    /// `GET /api/state/{id}` as the raw JSON item. Absence is a normal
    /// outcome, not an error: a 404 maps to `Ok(None)`.
    pub async fn get_state(
        &self,
        state_id: &str,
        policy: Option<&RetryPolicy>,
    ) -> Result<Option<StateItem<Value>>> {
        let policy = policy.cloned().unwrap_or_else(RetryPolicy::default_get);
        let url = self.state_url(state_id);
        let response = self
            .execute("get state", &url, &policy, || self.http.get(&url))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success("get state", response).await?;
        Ok(Some(Self::decode_body("get state", response).await?))
    }

    /// Typed variant of [`AgentClient::get_state`]. A present item whose
    /// definition does not deserialize is a payload error.
    pub async fn get_state_parsed<T: DeserializeOwned>(
        &self,
        state_id: &str,
        policy: Option<&RetryPolicy>,
    ) -> Result<Option<StateItem<T>>> {
        match self.get_state(state_id, policy).await? {
            Some(item) => item
                .parse_definition()
                .map(Some)
                .map_err(|source| ApiError::Decode {
                    operation: "get state",
                    source,
                }),
            None => Ok(None),
        }
    }

    /// `POST /api/state/{id}` with a bare definition. Returns the created
    /// item; an existing item surfaces as [`ApiError::Conflict`].
    pub async fn create_state<T: Serialize + DeserializeOwned>(
        &self,
        state_id: &str,
        definition: &T,
        policy: Option<&RetryPolicy>,
    ) -> Result<StateItem<T>> {
        let policy = policy.cloned().unwrap_or_else(RetryPolicy::default_write);
        let url = self.state_url(state_id);
        let response = self
            .execute("create state", &url, &policy, || {
                self.http.post(&url).json(definition)
            })
            .await?;
        let response = Self::ensure_success("create state", response).await?;
        Self::decode_body("create state", response).await
    }

    /// `PUT /api/state/{id}` replacing the whole item. The store refreshes
    /// `lastModified`; the refreshed item is returned.
    pub async fn update_state<T: Serialize + DeserializeOwned>(
        &self,
        state_id: &str,
        item: &StateItem<T>,
        policy: Option<&RetryPolicy>,
    ) -> Result<StateItem<T>> {
        let policy = policy.cloned().unwrap_or_else(RetryPolicy::default_write);
        let url = self.state_url(state_id);
        let response = self
            .execute("update state", &url, &policy, || {
                self.http.put(&url).json(item)
            })
            .await?;
        let response = Self::ensure_success("update state", response).await?;
        Self::decode_body("update state", response).await
    }

    /// `DELETE /api/state/{id}`. Idempotent on the server side: deleting
    /// an absent item still succeeds.
    pub async fn delete_state(&self, state_id: &str, policy: Option<&RetryPolicy>) -> Result<()> {
        let policy = policy.cloned().unwrap_or_else(RetryPolicy::default_delete);
        let url = self.state_url(state_id);
        let response = self
            .execute("delete state", &url, &policy, || self.http.delete(&url))
            .await?;
        Self::ensure_success("delete state", response).await?;
        Ok(())
    }

    /// `POST /api/events` delivering a wrapped instruction set to the
    /// peer. The peer echoes the accepted item.
    pub async fn post_instructions(
        &self,
        item: &StateItem<Instructions>,
        policy: Option<&RetryPolicy>,
    ) -> Result<StateItem<Instructions>> {
        let policy = policy.cloned().unwrap_or_else(RetryPolicy::default_write);
        let url = format!("{}/api/events", self.base_url);
        let response = self
            .execute("send instructions", &url, &policy, || {
                self.http.post(&url).json(item)
            })
            .await?;
        let response = Self::ensure_success("send instructions", response).await?;
        Self::decode_body("send instructions", response).await
    }

    /// Fetch the state, creating it from `definition` when absent. Loses
    /// a create race gracefully by re-reading the winner's item.
    pub async fn get_or_create_state<T: Serialize + DeserializeOwned>(
        &self,
        state_id: &str,
        definition: &T,
        policy: Option<&RetryPolicy>,
    ) -> Result<StateItem<T>> {
        if let Some(item) = self.get_state_parsed(state_id, policy).await? {
            return Ok(item);
        }
        match self.create_state(state_id, definition, policy).await {
            Ok(item) => Ok(item),
            Err(conflict @ ApiError::Conflict { .. }) => {
                match self.get_state_parsed(state_id, policy).await? {
                    Some(item) => Ok(item),
                    None => Err(conflict),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Presence check without caring about the definition's shape.
    pub async fn verify_state_exists(
        &self,
        state_id: &str,
        policy: Option<&RetryPolicy>,
    ) -> Result<bool> {
        Ok(self
            .get_state_parsed::<Value>(state_id, policy)
            .await?
            .is_some())
    }

    fn state_url(&self, state_id: &str) -> String {
        format!("{}/api/state/{}", self.base_url, state_id)
    }

    /// Drives one request through its retry policy. Returns the final
    /// response whatever its status; callers decide which statuses are
    /// acceptable for their operation.
    async fn execute(
        &self,
        operation: &'static str,
        url: &str,
        policy: &RetryPolicy,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut attempt: u32 = 0;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if !policy.is_retryable(status) || attempt >= policy.max_attempts {
                        return Ok(response);
                    }
                    debug!(
                        operation,
                        url,
                        status = status.as_u16(),
                        attempt,
                        "Transient response, retrying"
                    );
                }
                Err(err) => {
                    if attempt >= policy.max_attempts {
                        return Err(ApiError::Transport {
                            operation,
                            url: url.to_string(),
                            source: err,
                        });
                    }
                    debug!(operation, url, error = %err, attempt, "Transport failure, retrying");
                }
            }
            attempt += 1;
            tokio::time::sleep((policy.backoff)(attempt)).await;
        }
    }

    async fn ensure_success(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            // The agent API tags its 409 bodies with a machine-readable
            // code; a busy writer lock is not the same condition as a
            // lost create race. Foreign bodies fall back to Conflict.
            return Err(match error_code(&body).as_deref() {
                Some("busy") => ApiError::Busy { operation, url },
                _ => ApiError::Conflict { operation, url },
            });
        }
        Err(ApiError::Status {
            operation,
            url,
            status,
            body,
        })
    }

    async fn decode_body<T: DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T> {
        let url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport {
                operation,
                url,
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode { operation, source })
    }
}

fn error_code(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("code")?
        .as_str()
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn no_retry() -> RetryPolicy {
        RetryPolicy::none()
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: |_| Duration::from_millis(1),
            ..RetryPolicy::default_get()
        }
    }

    fn item_body(id: &str, definition: serde_json::Value) -> serde_json::Value {
        json!({
            "id": id,
            "definition": definition,
            "lastModified": "2026-08-29T10:00:00Z",
        })
    }

    #[test]
    fn rejects_an_unparseable_base_url() {
        let err = AgentClient::new("not a url").unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
    }

    #[tokio::test]
    async fn get_state_maps_not_found_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/state/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        let state = client
            .get_state("missing", Some(&no_retry()))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn get_state_parses_a_typed_definition() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct ServerState {
            online: bool,
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/state/serverstate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(item_body("serverstate", json!({ "online": true }))),
            )
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        let item = client
            .get_state_parsed::<ServerState>("serverstate", Some(&no_retry()))
            .await
            .unwrap()
            .unwrap();
        assert!(item.definition.online);
        assert!(item.has_id("ServerState"));
    }

    #[tokio::test]
    async fn undeserializable_definition_is_a_payload_error() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct ServerState {
            online: bool,
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/state/serverstate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(item_body("serverstate", json!({ "online": "yes" }))),
            )
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        let err = client
            .get_state_parsed::<ServerState>("serverstate", Some(&no_retry()))
            .await
            .unwrap_err();
        assert!(err.is_payload_error());
    }

    #[tokio::test]
    async fn verify_state_exists_reports_presence_without_parsing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/state/present"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(item_body("present", json!({ "anything": [1, 2] }))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/state/absent"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        assert!(client
            .verify_state_exists("present", Some(&no_retry()))
            .await
            .unwrap());
        assert!(!client
            .verify_state_exists("absent", Some(&no_retry()))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn busy_writer_conflicts_are_distinguished_from_create_races() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/state/contended"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": "state writer is busy, try again",
                "code": "busy",
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/state/taken"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": "state item taken already exists",
                "code": "already_exists",
            })))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();

        let item = StateItem::new("contended", json!({ "value": 1 }));
        let err = client
            .update_state("contended", &item, Some(&no_retry()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Busy { .. }));

        let err = client
            .create_state("taken", &json!({ "value": 1 }), Some(&no_retry()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[tokio::test]
    async fn retries_transient_statuses_up_to_the_policy_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/heartbeat"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/heartbeat"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        let status = client.heartbeat(Some(&fast_retry(5))).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/state/stuck"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: |_| Duration::from_millis(1),
            ..RetryPolicy::default_delete()
        };
        let err = client.delete_state("stuck", Some(&policy)).await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                ..
            }
        ));
        // Initial attempt plus two retries.
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn non_transient_statuses_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/state/taken"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        let err = client
            .create_state("taken", &json!({ "value": 1 }), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Conflict { .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_state_sends_the_bare_definition() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/state/settings"))
            .and(body_json(json!({ "iterations": 3 })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(item_body("settings", json!({ "iterations": 3 }))),
            )
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        let item = client
            .create_state("settings", &json!({ "iterations": 3 }), Some(&no_retry()))
            .await
            .unwrap();
        assert_eq!(item.definition["iterations"], 3);
    }

    #[tokio::test]
    async fn get_or_create_falls_back_to_the_race_winner() {
        // GET sees nothing, POST loses the creation race, the second GET
        // must return the winner's item instead of an error.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/state/shared"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/state/shared"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/state/shared"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(item_body("shared", json!({ "owner": "peer" }))),
            )
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri()).unwrap();
        let item = client
            .get_or_create_state("shared", &json!({ "owner": "me" }), Some(&no_retry()))
            .await
            .unwrap();
        assert_eq!(item.definition["owner"], "peer");
    }
}

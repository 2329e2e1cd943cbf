// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! HTTP surface of the agent API.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use fleetbench_contracts::{Instructions, StateItem};
use serde_json::Value;

use crate::context::ApiContext;
use crate::error::ServiceError;

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route("/api/heartbeat", get(heartbeat))
        .route("/api/events", get(events_online).post(post_events))
        .route(
            "/api/state/{state_id}",
            get(get_state)
                .post(create_state)
                .put(update_state)
                .delete(delete_state),
        )
        .with_state(context)
}

/// Liveness only: answers as soon as the process serves HTTP, regardless
/// of whether it is ready for work.
async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Readiness: 200 once the hosting process has flipped itself online,
/// 423 while it is still starting up. Served for both GET and HEAD.
async fn events_online(State(context): State<ApiContext>) -> StatusCode {
    if context.is_online() {
        StatusCode::OK
    } else {
        StatusCode::LOCKED
    }
}

/// Accepts an instruction payload and fans it out on the bus. Two wire
/// shapes are accepted: a wrapped `StateItem<Instructions>` (current
/// clients) and bare `Instructions` (older clients, which get a fresh
/// correlation id assigned here). The accepted item is echoed back.
async fn post_events(
    State(context): State<ApiContext>,
    Json(payload): Json<Value>,
) -> Result<Json<StateItem<Instructions>>, ServiceError> {
    let item = parse_instruction_payload(payload)?;
    context.bus().publish(item.clone());
    Ok(Json(item))
}

fn parse_instruction_payload(payload: Value) -> Result<StateItem<Instructions>, ServiceError> {
    if payload.get("definition").is_some() {
        serde_json::from_value::<StateItem<Instructions>>(payload)
            .map_err(|err| ServiceError::InvalidPayload(err.to_string()))
    } else {
        let instructions = serde_json::from_value::<Instructions>(payload)
            .map_err(|err| ServiceError::InvalidPayload(err.to_string()))?;
        Ok(instructions.into_item())
    }
}

async fn get_state(
    State(context): State<ApiContext>,
    Path(state_id): Path<String>,
) -> Result<Response, ServiceError> {
    match context.store().get(&state_id).await? {
        Some(item) => Ok(Json(item).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn create_state(
    State(context): State<ApiContext>,
    Path(state_id): Path<String>,
    Json(definition): Json<Value>,
) -> Result<Response, ServiceError> {
    let item = context.store().create(&state_id, definition).await?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

async fn update_state(
    State(context): State<ApiContext>,
    Path(state_id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<StateItem<Value>>, ServiceError> {
    let item = serde_json::from_value::<StateItem<Value>>(payload)
        .map_err(|err| ServiceError::InvalidPayload(err.to_string()))?;
    let updated = context.store().update(&state_id, item).await?;
    Ok(Json(updated))
}

async fn delete_state(
    State(context): State<ApiContext>,
    Path(state_id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    context.store().delete(&state_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use fleetbench_contracts::InstructionType;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::store::StateStore;

    fn test_context() -> (tempfile::TempDir, ApiContext) {
        let dir = tempfile::tempdir().unwrap();
        let context = ApiContext::new(StateStore::new(dir.path()));
        (dir, context)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn heartbeat_answers_regardless_of_online_state() {
        let (_dir, context) = test_context();
        let response = router(context)
            .oneshot(empty_request("GET", "/api/heartbeat"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn events_reports_locked_until_the_process_goes_online() {
        let (_dir, context) = test_context();
        let app = router(context.clone());

        let response = app
            .clone()
            .oneshot(empty_request("HEAD", "/api/events"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::LOCKED);

        context.set_online(true);
        let response = app.oneshot(empty_request("HEAD", "/api/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn posted_instructions_reach_subscribers_in_order() {
        let (_dir, context) = test_context();
        let mut resets = context.bus().subscribe(InstructionType::ClientServerReset);
        let mut starts = context
            .bus()
            .subscribe(InstructionType::ClientServerStartExecution);
        let app = router(context);

        let wrapped = Instructions::new(InstructionType::ClientServerReset).into_item();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/events",
                serde_json::to_value(&wrapped).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/events",
                json!({ "type": "ClientServerStartExecution", "properties": { "scenario": "netperf" } }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Correlation id survives the wrapped shape end to end.
        assert_eq!(resets.try_recv().unwrap().id, wrapped.id);
        let start = starts.try_recv().unwrap();
        assert_eq!(start.definition.properties["scenario"], "netperf");
    }

    #[tokio::test]
    async fn malformed_instruction_payloads_are_rejected() {
        let (_dir, context) = test_context();
        let response = router(context)
            .oneshot(json_request(
                "POST",
                "/api/events",
                json!({ "type": "NotARealInstruction" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn state_lifecycle_over_http() {
        let (_dir, context) = test_context();
        let app = router(context);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/state/handshake"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/state/handshake",
                json!({ "status": "starting" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["id"], "handshake");

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/state/handshake",
                json!({
                    "id": "handshake",
                    "definition": { "status": "ready" },
                    "lastModified": created["lastModified"],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/state/handshake"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["definition"]["status"], "ready");

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/state/handshake"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request("GET", "/api/state/handshake"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_conflicts_when_the_item_exists() {
        let (_dir, context) = test_context();
        let app = router(context);

        let first = app
            .clone()
            .oneshot(json_request("POST", "/api/state/marker", json!({ "n": 1 })))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_request("POST", "/api/state/marker", json!({ "n": 2 })))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        // Distinguishable from a busy writer lock, which shares the 409.
        assert_eq!(body_json(second).await["code"], "already_exists");
    }

    #[tokio::test]
    async fn update_with_mismatched_id_is_rejected_and_leaves_the_file_untouched() {
        let (_dir, context) = test_context();
        let app = router(context.clone());

        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/state/expected",
                json!({ "n": 1 }),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(json_request(
                "PUT",
                "/api/state/expected",
                json!({
                    "id": "other",
                    "definition": { "n": 2 },
                    "lastModified": "2026-08-29T10:00:00Z",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let item = context.store().get("expected").await.unwrap().unwrap();
        assert_eq!(item.definition["n"], 1);
    }
}

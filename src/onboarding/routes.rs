//! REST endpoints driving the onboarding wizard.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::{Error, NavigationError, SessionError, SubmitError};

use super::manager::WizardManager;
use super::model::{IgnoredField, OnboardingType, SelectionOutcome};
use super::state::{SUBMISSION_FAILED, WizardSnapshot};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<WizardManager>,
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(manager: Arc<WizardManager>) -> Router {
    let state = OnboardingRouteState { manager };

    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/flows/{kind}", get(get_flow))
        .route("/api/onboarding/sessions", post(create_session))
        .route(
            "/api/onboarding/sessions/{id}",
            get(get_session).delete(discard_session),
        )
        .route("/api/onboarding/sessions/{id}/data", patch(update_data))
        .route("/api/onboarding/sessions/{id}/select", post(toggle_selection))
        .route("/api/onboarding/sessions/{id}/next", post(next_step))
        .route("/api/onboarding/sessions/{id}/back", post(previous_step))
        .route("/api/onboarding/sessions/{id}/goto/{index}", post(go_to_step))
        .route("/api/onboarding/sessions/{id}/review", get(get_review))
        .route("/api/onboarding/sessions/{id}/submit", post(submit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Request / response bodies ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    #[serde(rename = "type")]
    kind: OnboardingType,
}

#[derive(Debug, Deserialize)]
struct SelectRequest {
    field: String,
    option: String,
}

#[derive(Debug, Serialize)]
struct DataResponse {
    #[serde(flatten)]
    session: WizardSnapshot,
    changed: Vec<String>,
    ignored: Vec<IgnoredField>,
}

#[derive(Debug, Serialize)]
struct SelectResponse {
    #[serde(flatten)]
    session: WizardSnapshot,
    selection: SelectionOutcome,
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

fn parse_session_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|_| bad_request("Invalid session ID"))
}

/// Map a domain error onto its HTTP status and JSON body.
fn error_response(err: Error) -> Response {
    let (status, body) = match err {
        Error::Session(SessionError::NotFound(id)) => (
            StatusCode::NOT_FOUND,
            json!({ "error": format!("Session {id} not found") }),
        ),
        Error::Session(e @ SessionError::UnknownField { .. }) => {
            (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
        }
        Error::Session(e @ SessionError::ReadOnly { .. }) => {
            (StatusCode::CONFLICT, json!({ "error": e.to_string() }))
        }
        Error::Navigation(e @ NavigationError::OutOfRange { .. }) => {
            (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
        }
        Error::Navigation(NavigationError::StepInvalid { step, index, errors }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": "Step is not complete",
                "step": step,
                "index": index,
                "errors": errors,
            }),
        ),
        Error::Navigation(e @ NavigationError::Closed { .. }) => {
            (StatusCode::CONFLICT, json!({ "error": e.to_string() }))
        }
        Error::Submit(SubmitError::Incomplete { step, index, errors }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": "Onboarding is incomplete",
                "step": step,
                "index": index,
                "errors": errors,
            }),
        ),
        Error::Submit(SubmitError::Failed) => (
            StatusCode::BAD_GATEWAY,
            json!({ "error": SUBMISSION_FAILED }),
        ),
        Error::Submit(e) => (StatusCode::CONFLICT, json!({ "error": e.to_string() })),
    };
    (status, Json(body)).into_response()
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "onboarding"
    }))
}

async fn get_flow(
    State(state): State<OnboardingRouteState>,
    Path(kind): Path<String>,
) -> Response {
    let kind: OnboardingType = match kind.parse() {
        Ok(k) => k,
        Err(e) => return bad_request(e),
    };
    let flow = state.manager.flow(kind);
    let steps: Vec<Value> = flow
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let fields: Vec<Value> = step
                .schema
                .fields
                .iter()
                .map(|rule| {
                    json!({
                        "field": rule.field,
                        "label": rule.label,
                        "multiSelect": rule.is_multi_select(),
                        "maxSelections": rule.max_count(),
                        "options": rule.choices().unwrap_or_default(),
                    })
                })
                .collect();
            json!({
                "index": index,
                "id": step.id,
                "title": step.title,
                "fields": fields,
            })
        })
        .collect();

    Json(json!({ "type": kind, "steps": steps })).into_response()
}

async fn create_session(
    State(state): State<OnboardingRouteState>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e.body_text()),
    };
    let snapshot = state.manager.start(req.kind).await;
    (StatusCode::CREATED, Json(snapshot)).into_response()
}

async fn get_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.snapshot(id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e.into()),
    }
}

async fn update_data(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let partial = match body {
        Ok(Json(Value::Object(map))) => map,
        Ok(_) => return bad_request("Body must be a JSON object"),
        Err(e) => return bad_request(e.body_text()),
    };

    match state.manager.update_data(id, partial).await {
        Ok((outcome, session)) => Json(DataResponse {
            session,
            changed: outcome.changed,
            ignored: outcome.ignored,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn toggle_selection(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    body: Result<Json<SelectRequest>, JsonRejection>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e.body_text()),
    };

    match state
        .manager
        .toggle_selection(id, &req.field, &req.option)
        .await
    {
        Ok((selection, session)) => Json(SelectResponse { session, selection }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn next_step(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.next(id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

async fn previous_step(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.previous(id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

async fn go_to_step(
    State(state): State<OnboardingRouteState>,
    Path((id, index)): Path<(String, String)>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Ok(index) = index.parse::<usize>() else {
        return bad_request("Step index must be a non-negative integer");
    };
    match state.manager.go_to(id, index).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_review(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.review(id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(e.into()),
    }
}

async fn submit(State(state): State<OnboardingRouteState>, Path(id): Path<String>) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.submit(id).await {
        Ok(redirect) => Json(json!({ "submitted": true, "redirect": redirect })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn discard_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.discard(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.into()),
    }
}

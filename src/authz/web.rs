use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::authz::query::{CanQuery, HowCanQuery, WhatCanQuery, WhoCanQuery};
use crate::authz::types::{
    CanResponse, HowCanResponse, PolicyDraft, PolicyFilter, WhatCanResponse, WhoCanResponse,
};
use crate::authz::Otter;

pub fn router(state: Arc<Otter>) -> Router {
    Router::new()
        .route("/v1/can", post(handle_can))
        .route("/v1/who-can", post(handle_who_can))
        .route("/v1/what-can", post(handle_what_can))
        .route("/v1/how-can", post(handle_how_can))
        .route("/v1/policies", post(create_policy))
        .route("/v1/policies/search", post(search_policies))
        .route(
            "/v1/policies/{id}",
            get(get_policy).put(update_policy).delete(delete_policy),
        )
        .route("/healthz", get(health))
        .with_state(state)
}

async fn handle_can(
    State(state): State<Arc<Otter>>,
    Json(req): Json<CanQuery>,
) -> impl IntoResponse {
    match state.can(&req) {
        Ok(allowed) => Json(CanResponse { allowed }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_who_can(
    State(state): State<Arc<Otter>>,
    Json(req): Json<WhoCanQuery>,
) -> impl IntoResponse {
    match state.who_can(&req) {
        Ok(subjects) => Json(WhoCanResponse { subjects }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_what_can(
    State(state): State<Arc<Otter>>,
    Json(req): Json<WhatCanQuery>,
) -> impl IntoResponse {
    match state.what_can(&req) {
        Ok(resources) => Json(WhatCanResponse { resources }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle_how_can(
    State(state): State<Arc<Otter>>,
    Json(req): Json<HowCanQuery>,
) -> impl IntoResponse {
    match state.how_can(&req) {
        Ok(combinations) => Json(HowCanResponse { combinations }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn create_policy(
    State(state): State<Arc<Otter>>,
    Json(draft): Json<PolicyDraft>,
) -> impl IntoResponse {
    match state.create_policy(&draft) {
        Ok(policy) => (StatusCode::CREATED, Json(policy)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn search_policies(
    State(state): State<Arc<Otter>>,
    Json(filter): Json<PolicyFilter>,
) -> impl IntoResponse {
    match state.get_policies(&filter) {
        Ok(policies) => Json(policies).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_policy(
    State(state): State<Arc<Otter>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.get_policy(&id) {
        Ok(policy) => Json(policy).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn update_policy(
    State(state): State<Arc<Otter>>,
    Path(id): Path<String>,
    Json(draft): Json<PolicyDraft>,
) -> impl IntoResponse {
    let result = state
        .get_policy(&id)
        .and_then(|old| state.update_policy(&old, &draft));
    match result {
        Ok(policy) => Json(policy).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn delete_policy(
    State(state): State<Arc<Otter>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.delete_policy_by_id(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

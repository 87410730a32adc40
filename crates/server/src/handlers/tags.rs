//! Tag listing and API version handlers.

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use berth_core::validate_name;
use serde::Serialize;

/// Tag listing for one repository.
#[derive(Debug, Serialize)]
pub struct RepoTags {
    pub name: String,
    pub tags: Vec<String>,
}

/// GET /v2/ - API version probe.
pub async fn api_version() -> impl IntoResponse {
    (StatusCode::OK, "Welcome to the berth registry (API v2)\n")
}

/// GET /v2/{name}/tags/list - Tags for one repository.
pub async fn list_repo_tags(state: AppState, name: String) -> ApiResult<Response> {
    validate_name(&name)?;

    if !state.manifests.repo_exists(&name).await? {
        return Err(ApiError::registry(
            ErrorCode::NameUnknown,
            format!("repository not found: {name}"),
        ));
    }

    let tags = state.manifests.tags(&name).await;
    Ok(Json(RepoTags { name, tags }).into_response())
}

/// GET /v2/_catalog and /v2/tags/list - Tags for every repository.
pub async fn list_all_tags(State(state): State<AppState>) -> Json<Vec<RepoTags>> {
    let all = state.manifests.all_tags().await;
    Json(
        all.into_iter()
            .map(|(name, tags)| RepoTags { name, tags })
            .collect(),
    )
}

//! Route configuration and OCI URL dispatch.

use crate::error::{ApiError, ErrorCode};
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// Repository names span multiple path segments (`lib/alpine`), which
/// axum path parameters cannot capture mid-route, so only the fixed
/// paths are registered directly; every name-scoped route goes through
/// the fallback dispatcher below.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v2", get(handlers::api_version))
        .route("/v2/", get(handlers::api_version))
        .route("/v2/_catalog", get(handlers::list_all_tags))
        .route("/v2/tags/list", get(handlers::list_all_tags))
        .fallback(registry_fallback)
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("docker-distribution-api-version"),
            HeaderValue::from_static("registry/2.0"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A parsed name-scoped registry path.
///
/// The repository name is greedy: for each route shape the rightmost
/// occurrence of its marker wins, so a name like `a/blobs/b` still
/// resolves (the same matching gorilla-style `{name:.+}` patterns give).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryPath {
    /// `POST /v2/<name>/blobs/uploads/`
    UploadStart { name: String },
    /// `PATCH|PUT /v2/<name>/blobs/uploads/<id>`
    Upload { name: String, id: String },
    /// `GET|HEAD /v2/<name>/blobs/<digest>`
    Blob { name: String, digest: String },
    /// `GET|HEAD|PUT|DELETE /v2/<name>/manifests/<reference>`
    Manifest { name: String, reference: String },
    /// `GET /v2/<name>/tags/list`
    Tags { name: String },
}

impl RegistryPath {
    /// Parse a request path. Returns None for paths outside the v2 API
    /// or not matching any route shape.
    pub fn parse(path: &str) -> Option<Self> {
        let rest = path.strip_prefix("/v2/")?;
        if rest.is_empty() {
            return None;
        }

        if let Some(name) = rest.strip_suffix("/tags/list") {
            if !name.is_empty() {
                return Some(Self::Tags {
                    name: name.to_string(),
                });
            }
        }

        const UPLOADS: &str = "/blobs/uploads/";
        if let Some(idx) = rest.rfind(UPLOADS) {
            let name = &rest[..idx];
            let id = &rest[idx + UPLOADS.len()..];
            if !name.is_empty() && !id.contains('/') {
                return Some(if id.is_empty() {
                    Self::UploadStart {
                        name: name.to_string(),
                    }
                } else {
                    Self::Upload {
                        name: name.to_string(),
                        id: id.to_string(),
                    }
                });
            }
        }

        const BLOBS: &str = "/blobs/";
        if let Some(idx) = rest.rfind(BLOBS) {
            let name = &rest[..idx];
            let digest = &rest[idx + BLOBS.len()..];
            if !name.is_empty() && !digest.is_empty() && !digest.contains('/') {
                return Some(Self::Blob {
                    name: name.to_string(),
                    digest: digest.to_string(),
                });
            }
        }

        const MANIFESTS: &str = "/manifests/";
        if let Some(idx) = rest.rfind(MANIFESTS) {
            let name = &rest[..idx];
            let reference = &rest[idx + MANIFESTS.len()..];
            if !name.is_empty() && !reference.is_empty() && !reference.contains('/') {
                return Some(Self::Manifest {
                    name: name.to_string(),
                    reference: reference.to_string(),
                });
            }
        }

        None
    }
}

/// Fallback handler dispatching the name-scoped v2 routes.
async fn registry_fallback(State(state): State<AppState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let Some(route) = RegistryPath::parse(&path) else {
        tracing::debug!(method = %req.method(), path = %path, "no route");
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let method = req.method().clone();
    let unsupported = || {
        Err(ApiError::registry(
            ErrorCode::Unsupported,
            format!("{method} not supported for {path}"),
        ))
    };

    let result = match (route, method.as_str()) {
        (RegistryPath::UploadStart { name }, "POST") => {
            handlers::start_upload(state, name, req).await
        }
        (RegistryPath::Upload { name, id }, "PATCH") => {
            handlers::append_chunk(state, name, id, req).await
        }
        (RegistryPath::Upload { name, id }, "PUT") => {
            handlers::finalize_upload(state, name, id, req).await
        }
        (RegistryPath::Blob { name, digest }, "GET") => {
            handlers::get_blob(state, name, digest, false).await
        }
        (RegistryPath::Blob { name, digest }, "HEAD") => {
            handlers::get_blob(state, name, digest, true).await
        }
        (RegistryPath::Manifest { name, reference }, "GET") => {
            handlers::get_manifest(state, name, reference, false).await
        }
        (RegistryPath::Manifest { name, reference }, "HEAD") => {
            handlers::get_manifest(state, name, reference, true).await
        }
        (RegistryPath::Manifest { name, reference }, "PUT") => {
            handlers::put_manifest(state, name, reference, req).await
        }
        (RegistryPath::Manifest { name, reference }, "DELETE") => {
            handlers::delete_manifest(state, name, reference).await
        }
        (RegistryPath::Tags { name }, "GET") => handlers::list_repo_tags(state, name).await,
        _ => unsupported(),
    };

    match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

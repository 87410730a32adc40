//! Integration tests for the blob upload and read endpoints.

mod common;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use common::TestServer;
use serde_json::Value;
use tower::ServiceExt;

// sha256("hello")
const HELLO_DIGEST: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

/// Send a request and return status, headers, and body bytes.
async fn request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<&[u8]>,
) -> (StatusCode, HeaderMap, Bytes) {
    let builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(data) => Body::from(data.to_vec()),
        None => Body::empty(),
    };
    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}

/// The OCI code of the first error in an envelope body.
fn error_code(body: &Bytes) -> String {
    let value: Value = serde_json::from_slice(body).expect("error body is JSON");
    value["errors"][0]["code"]
        .as_str()
        .expect("error has a code")
        .to_string()
}

/// Start an upload and return the session id.
async fn start_upload(router: &axum::Router, name: &str) -> String {
    let (status, headers, _) =
        request(router, "POST", &format!("/v2/{name}/blobs/uploads/"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(header(&headers, "Range"), "0-0");
    assert_eq!(header(&headers, "Content-Length"), "0");

    let id = header(&headers, "Docker-Upload-UUID").to_string();
    assert!(header(&headers, "Location").contains(&id));
    id
}

#[tokio::test]
async fn two_stage_push_and_pull() {
    let server = TestServer::new().await;
    let id = start_upload(&server.router, "lib/alpine").await;

    let uri = format!("/v2/lib/alpine/blobs/uploads/{id}");
    let (status, headers, _) = request(&server.router, "PATCH", &uri, Some(b"hel")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(header(&headers, "Range"), "0-2");
    assert_eq!(header(&headers, "Docker-Upload-UUID"), id);

    let (status, headers, _) = request(&server.router, "PATCH", &uri, Some(b"lo")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(header(&headers, "Range"), "0-4");

    let (status, headers, _) = request(
        &server.router,
        "PUT",
        &format!("{uri}?digest={HELLO_DIGEST}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(header(&headers, "Docker-Content-Digest"), HELLO_DIGEST);
    assert_eq!(
        header(&headers, "Location"),
        format!("/v2/lib/alpine/blobs/{HELLO_DIGEST}")
    );

    let (status, headers, body) = request(
        &server.router,
        "GET",
        &format!("/v2/lib/alpine/blobs/{HELLO_DIGEST}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), b"hello");
    assert_eq!(header(&headers, "Content-Length"), "5");
    assert_eq!(header(&headers, "Content-Type"), "application/octet-stream");
    assert_eq!(header(&headers, "Docker-Content-Digest"), HELLO_DIGEST);
}

#[tokio::test]
async fn finalize_with_wrong_digest_leaves_nothing() {
    let server = TestServer::new().await;
    let id = start_upload(&server.router, "lib/alpine").await;

    let uri = format!("/v2/lib/alpine/blobs/uploads/{id}");
    request(&server.router, "PATCH", &uri, Some(b"hello")).await;

    let claimed = format!("sha256:{}", "0".repeat(64));
    let (status, _, body) = request(
        &server.router,
        "PUT",
        &format!("{uri}?digest={claimed}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "DIGEST_INVALID");

    // Nothing became visible under the claimed digest.
    let (status, _, body) = request(
        &server.router,
        "GET",
        &format!("/v2/lib/alpine/blobs/{claimed}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "BLOB_UNKNOWN");
}

#[tokio::test]
async fn monolithic_push_via_finalize_body() {
    let server = TestServer::new().await;
    let id = start_upload(&server.router, "library/busybox").await;

    let (status, headers, _) = request(
        &server.router,
        "PUT",
        &format!("/v2/library/busybox/blobs/uploads/{id}?digest={HELLO_DIGEST}"),
        Some(b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(header(&headers, "Docker-Content-Digest"), HELLO_DIGEST);

    let (status, _, body) = request(
        &server.router,
        "GET",
        &format!("/v2/library/busybox/blobs/{HELLO_DIGEST}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), b"hello");
}

#[tokio::test]
async fn empty_first_chunk_reports_zero_range() {
    let server = TestServer::new().await;
    let id = start_upload(&server.router, "alpine").await;

    let uri = format!("/v2/alpine/blobs/uploads/{id}");
    let (status, headers, _) = request(&server.router, "PATCH", &uri, Some(b"")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(header(&headers, "Range"), "0-0");
}

#[tokio::test]
async fn finalize_requires_digest_param() {
    let server = TestServer::new().await;
    let id = start_upload(&server.router, "alpine").await;

    let (status, _, body) = request(
        &server.router,
        "PUT",
        &format!("/v2/alpine/blobs/uploads/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "DIGEST_INVALID");
}

#[tokio::test]
async fn append_to_unknown_session_is_404() {
    let server = TestServer::new().await;

    let (status, _, body) = request(
        &server.router,
        "PATCH",
        "/v2/alpine/blobs/uploads/00000000-0000-0000-0000-000000000000",
        Some(b"data"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "BLOB_UPLOAD_UNKNOWN");
}

#[tokio::test]
async fn malformed_session_id_is_400() {
    let server = TestServer::new().await;

    let (status, _, body) = request(
        &server.router,
        "PATCH",
        "/v2/alpine/blobs/uploads/not-a-uuid",
        Some(b"data"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BLOB_UPLOAD_INVALID");
}

#[tokio::test]
async fn unknown_blob_is_404() {
    let server = TestServer::new().await;

    let digest = format!("sha256:{}", "a".repeat(64));
    let (status, _, body) =
        request(&server.router, "GET", &format!("/v2/x/blobs/{digest}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "BLOB_UNKNOWN");
}

#[tokio::test]
async fn malformed_digest_is_400() {
    let server = TestServer::new().await;

    let (status, _, body) = request(
        &server.router,
        "GET",
        "/v2/alpine/blobs/sha256:tooshort",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "DIGEST_INVALID");
}

#[tokio::test]
async fn head_matches_get() {
    let server = TestServer::new().await;
    let id = start_upload(&server.router, "alpine").await;
    request(
        &server.router,
        "PUT",
        &format!("/v2/alpine/blobs/uploads/{id}?digest={HELLO_DIGEST}"),
        Some(b"hello"),
    )
    .await;

    let uri = format!("/v2/alpine/blobs/{HELLO_DIGEST}");
    let (get_status, get_headers, get_body) = request(&server.router, "GET", &uri, None).await;
    let (head_status, head_headers, head_body) = request(&server.router, "HEAD", &uri, None).await;

    assert_eq!(get_status, StatusCode::OK);
    assert_eq!(head_status, StatusCode::OK);
    for name in ["Content-Length", "Content-Type", "Docker-Content-Digest"] {
        assert_eq!(header(&get_headers, name), header(&head_headers, name));
    }
    assert_eq!(get_body.as_ref(), b"hello");
    assert!(head_body.is_empty());
}

#[tokio::test]
async fn content_length_mismatch_is_size_invalid() {
    let server = TestServer::new().await;
    let id = start_upload(&server.router, "alpine").await;

    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/v2/alpine/blobs/uploads/{id}"))
        .header("Content-Length", "10")
        .body(Body::from("abc"))
        .unwrap();
    let response = server.router.clone().oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(error_code(&body), "SIZE_INVALID");
}

#[tokio::test]
async fn traversal_name_is_rejected() {
    let server = TestServer::new().await;

    let (status, _, body) = request(
        &server.router,
        "POST",
        "/v2/lib/../../etc/blobs/uploads/",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "NAME_INVALID");
}

#[tokio::test]
async fn wrong_method_is_405() {
    let server = TestServer::new().await;

    let digest = format!("sha256:{}", "a".repeat(64));
    let (status, _, body) = request(
        &server.router,
        "DELETE",
        &format!("/v2/alpine/blobs/{digest}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_code(&body), "UNSUPPORTED");
}

#[tokio::test]
async fn version_probe_and_api_header() {
    let server = TestServer::new().await;

    let (status, headers, body) = request(&server.router, "GET", "/v2/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        header(&headers, "Docker-Distribution-Api-Version"),
        "registry/2.0"
    );
    assert!(!body.is_empty());

    // The version header rides on every response, errors included.
    let (_, headers, _) = request(&server.router, "GET", "/v2/x/blobs/sha256:bad", None).await;
    assert_eq!(
        header(&headers, "Docker-Distribution-Api-Version"),
        "registry/2.0"
    );
}

#[tokio::test]
async fn upload_location_honors_forwarded_proto() {
    let server = TestServer::new().await;

    let req = Request::builder()
        .method("POST")
        .uri("/v2/alpine/blobs/uploads/")
        .header("Host", "registry.example:5000")
        .header("X-Forwarded-Proto", "https")
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone().oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let location = response
        .headers()
        .get("Location")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://registry.example:5000/v2/alpine/blobs/uploads/"));
}

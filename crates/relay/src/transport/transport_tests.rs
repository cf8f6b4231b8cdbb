// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::build_router;
use crate::test_support::{test_config, test_state};

#[tokio::test]
async fn health_is_plain_ok() -> anyhow::Result<()> {
    let app = build_router(test_state(test_config()));
    let req = Request::builder().uri("/health").body(Body::empty())?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), 64).await?;
    assert_eq!(&body[..], b"OK");
    Ok(())
}

#[tokio::test]
async fn cross_origin_requests_get_cors_headers() -> anyhow::Result<()> {
    let app = build_router(test_state(test_config()));
    let req = Request::builder()
        .uri("/health")
        .header("origin", "https://taiko.example")
        .body(Body::empty())?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("access-control-allow-origin"));
    Ok(())
}

#[tokio::test]
async fn health_rejects_post() -> anyhow::Result<()> {
    let app = build_router(test_state(test_config()));
    let req = Request::builder().method("POST").uri("/health").body(Body::empty())?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn unknown_path_is_not_found() -> anyhow::Result<()> {
    let app = build_router(test_state(test_config()));
    let req = Request::builder().uri("/missing").body(Body::empty())?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

//! Admin pass-through to the graph engine

use crate::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header::ACCEPT, header::CONTENT_TYPE, HeaderMap, HeaderName, Method, Uri},
    response::{IntoResponse, Response},
};
use chairs_common::{errors::Result, graph_engine::ProxyRequest};

fn header(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn proxy(
    state: AppState,
    rest: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let request = ProxyRequest {
        method,
        path: rest,
        query: uri.query().map(str::to_string),
        content_type: header(&headers, CONTENT_TYPE),
        accept: header(&headers, ACCEPT),
        body,
    };

    let upstream = state.graph_engine.forward(request).await?;

    let mut response = (upstream.status, Body::from(upstream.body)).into_response();
    if let Some(ct) = upstream.content_type.and_then(|ct| ct.parse().ok()) {
        response.headers_mut().insert(CONTENT_TYPE, ct);
    }

    Ok(response)
}

/// `/api/admin/graph`
pub async fn forward_root(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    proxy(state, String::new(), method, uri, headers, body).await
}

/// `/api/admin/graph/{*rest}`
pub async fn forward(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    proxy(state, rest, method, uri, headers, body).await
}

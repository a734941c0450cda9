//! Same-origin proxy in front of the catalog.
//!
//! Browsers cannot call the catalog directly, so the web front end talks to
//! `/api/book/searchByPage` and `/localPic/...` on this server, which
//! forwards to the upstream host.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context as _;
use axum::Router;
use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::api::search_endpoint;
use crate::formats::ApiEnvelope;

pub const SEARCH_ROUTE: &str = "/api/book/searchByPage";
pub const PICTURE_PREFIX: &str = "/localPic";

const UPSTREAM_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const FALLBACK_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    /// Upstream root, always ending in `/`.
    upstream: Url,
    search: Url,
}

impl ProxyState {
    pub fn new(upstream: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build proxy http client")?;
        Self::with_client(client, upstream)
    }

    pub fn with_client(client: reqwest::Client, upstream: &str) -> anyhow::Result<Self> {
        let search = search_endpoint(upstream)?;
        let root = format!("{}/", upstream.trim().trim_end_matches('/'));
        let upstream = Url::parse(&root).with_context(|| format!("invalid upstream {root:?}"))?;
        Ok(Self {
            client,
            upstream,
            search,
        })
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route(
            SEARCH_ROUTE,
            get(search_by_page).fallback(method_not_allowed),
        )
        .route(&format!("{PICTURE_PREFIX}/*path"), get(local_picture))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: ProxyState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, upstream = %state.upstream, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn envelope(status: StatusCode, code: String, msg: &str) -> Response {
    let body: ApiEnvelope<serde_json::Value> = ApiEnvelope {
        code,
        msg: msg.to_owned(),
        data: None,
    };
    (status, Json(body)).into_response()
}

async fn method_not_allowed() -> Response {
    envelope(
        StatusCode::METHOD_NOT_ALLOWED,
        "405".to_owned(),
        "Method Not Allowed",
    )
}

fn internal_error() -> Response {
    envelope(
        StatusCode::INTERNAL_SERVER_ERROR,
        "500".to_owned(),
        "internal server error",
    )
}

/// Keeps the first non-empty value of each key, in order.
pub fn forwarded_query(raw: Option<&str>) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or("").as_bytes()) {
        let value = value.trim();
        if value.is_empty() || value == "undefined" || value == "null" {
            continue;
        }
        if seen.iter().any(|k| *k == key) {
            continue;
        }
        serializer.append_pair(&key, value);
        seen.push(key.into_owned());
    }
    serializer.finish()
}

async fn search_by_page(
    State(state): State<ProxyState>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Response {
    let query = forwarded_query(raw.as_deref());
    let mut target = state.search.clone();
    target.set_query(Some(query.as_str()).filter(|q| !q.is_empty()));
    let referer = format!("{}?{query}", state.upstream);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(FALLBACK_USER_AGENT);

    tracing::debug!(%target, "proxy search");
    let upstream = match state
        .client
        .get(target)
        .header(reqwest::header::ACCEPT, UPSTREAM_ACCEPT)
        .header(reqwest::header::CACHE_CONTROL, "no-cache")
        .header(reqwest::header::USER_AGENT, user_agent)
        .header(reqwest::header::REFERER, referer)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "upstream search request failed");
            return internal_error();
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let raw = match upstream.bytes().await {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(error = %err, "read upstream search body");
            return internal_error();
        }
    };
    let body = serde_json::from_slice::<serde_json::Value>(&raw).ok();

    match body {
        Some(body) => (status, Json(body)).into_response(),
        None if status.is_success() => {
            tracing::warn!(%status, "upstream returned a non-json body");
            internal_error()
        }
        None => {
            tracing::warn!(%status, "upstream search failed");
            envelope(
                status,
                status.as_u16().to_string(),
                status.canonical_reason().unwrap_or("proxy request failed"),
            )
        }
    }
}

async fn local_picture(
    State(state): State<ProxyState>,
    Path(path): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Response, StatusCode> {
    let mut target = state
        .upstream
        .join(&format!("localPic/{}", path.trim_start_matches('/')))
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    target.set_query(raw.as_deref());

    let upstream = state.client.get(target).send().await.map_err(|err| {
        tracing::warn!(error = %err, "upstream picture request failed");
        StatusCode::BAD_GATEWAY
    })?;
    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream.headers().get(reqwest::header::CONTENT_TYPE).cloned();
    let cache_control = upstream.headers().get(reqwest::header::CACHE_CONTROL).cloned();
    let bytes = upstream.bytes().await.map_err(|_| StatusCode::BAD_GATEWAY)?;

    let mut resp = Response::new(Body::from(bytes));
    *resp.status_mut() = status;
    if let Some(value) = content_type.and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok()) {
        resp.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    if let Some(value) = cache_control.and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok()) {
        resp.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    Ok(resp)
}

// src/core/router/middleware.rs

//! Axum middleware wiring the router into the request path: every request
//! first asks [`resolve_route`] whether it belongs here, forwarding it over
//! `pools.skip_verify` when it doesn't, or handling it locally when it does.

use crate::core::cluster::node::Node;
use crate::core::cluster::ClusterHandle;
use crate::core::router::pool::RouterPools;
use crate::core::router::proxy::{self, ProxyError, RouteDecision};
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;
use std::sync::Arc;

/// Mirrors `proxy::MAX_PROXIED_BODY_BYTES`; this copy is buffered once here
/// so the same bytes can be replayed on retry.
const MAX_FORWARD_BODY_BYTES: usize = 256 * 1024 * 1024;

#[derive(Clone)]
pub struct RoutingState {
    pub cluster: Arc<ClusterHandle>,
    pub pools: Arc<RouterPools>,
}

/// Extracts the caller identity the cluster token should carry. Operator
/// auth *verification* is out of scope here; this only
/// reads whatever identity the inbound auth layer already attached.
fn caller_identity(parts: &Parts) -> String {
    parts
        .headers
        .get("x-fleetd-identity")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

fn rebuild_request(parts: &Parts, body: &Bytes) -> Request {
    let mut builder = Request::builder().method(parts.method.clone()).uri(parts.uri.clone());
    if let Some(headers) = builder.headers_mut() {
        *headers = parts.headers.clone();
    }
    builder.body(Body::from(body.clone())).unwrap_or_else(|_| Request::new(Body::empty()))
}

pub async fn route_or_forward(State(state): State<RoutingState>, req: Request, next: Next) -> Response {
    match proxy::resolve_route(&state.cluster, &req) {
        RouteDecision::Local => next.run(req).await,
        RouteDecision::Forward(target) => forward_with_retry(&state, target, req).await,
    }
}

/// Forwards to `target`; on anything but a client-cancelled call, retries
/// exactly once against a freshly resolved node (picking up membership
/// changes since the first attempt) instead of surfacing the first failure.
async fn forward_with_retry(state: &RoutingState, target: Node, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let body_bytes = match to_bytes(body, MAX_FORWARD_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => return ProxyError::BadGateway(e.to_string()).into_response(),
    };
    let identity = caller_identity(&parts);

    let first_attempt = rebuild_request(&parts, &body_bytes);
    match proxy::forward(&state.pools, &state.cluster.token_issuer, &target, &identity, first_attempt).await {
        Ok(resp) => resp,
        Err(ProxyError::Cancelled) => ProxyError::Cancelled.into_response(),
        Err(_first_err) => {
            let probe = rebuild_request(&parts, &body_bytes);
            let retry_target = match proxy::resolve_route(&state.cluster, &probe) {
                RouteDecision::Forward(node) => node,
                RouteDecision::Local => target,
            };
            let retry_attempt = rebuild_request(&parts, &body_bytes);
            match proxy::forward(&state.pools, &state.cluster.token_issuer, &retry_target, &identity, retry_attempt).await {
                Ok(resp) => resp,
                Err(e) => e.into_response(),
            }
        }
    }
}

// src/core/router/proxy.rs

//! Host-affinity resolution and forwarding: "steer each inbound
//! request to the node that owns the target resource, without the caller
//! noticing."

use crate::core::cluster::node::{Node, NodeStatus};
use crate::core::cluster::{ClusterHandle, ClusterTokenIssuer};
use crate::core::router::pool::RouterPools;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderValue, Method, Request, Response, StatusCode, Uri};
use tracing::warn;

const TARGET_HOST_HEADER: &str = "x-target-host";
const CLUSTER_TOKEN_HEADER: &str = "x-cluster-token";
const MAX_PROXIED_BODY_BYTES: usize = 256 * 1024 * 1024;

pub enum RouteDecision {
    /// No affinity found, or the owning node is this one: handle locally.
    Local,
    /// Forward to the given node's `api_endpoint`.
    Forward(Node),
}

/// Resolves which node owns the resource targeted by `req`: first an
/// explicit `X-Target-Host` header, then a hostname embedded in the path
/// (`/api/n/<hostname>/...`), falling back to local handling.
pub fn resolve_route(cluster: &ClusterHandle, req: &Request<Body>) -> RouteDecision {
    let fsm = cluster.fsm();

    let hostname = req
        .headers()
        .get(TARGET_HOST_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| path_embedded_hostname(req.uri()));

    let Some(hostname) = hostname else {
        return RouteDecision::Local;
    };

    if fsm.nodes.get(&cluster.self_id).map(|n| n.hostname == hostname).unwrap_or(false) {
        return RouteDecision::Local;
    }

    match fsm.nodes.by_hostname(&hostname) {
        Some(node) if node.status == NodeStatus::Online => RouteDecision::Forward(node.clone()),
        _ => RouteDecision::Local,
    }
}

fn path_embedded_hostname(uri: &Uri) -> Option<String> {
    let path = uri.path();
    let mut segments = path.trim_start_matches('/').split('/');
    if segments.next()? != "api" {
        return None;
    }
    if segments.next()? != "n" {
        return None;
    }
    segments.next().map(str::to_string)
}

/// Forwards `req` to `target`, preserving method, body, and trailers, and
/// rewriting the WebSocket `auth` query parameter (if present) to carry a
/// freshly minted cluster token instead of the caller's session token.
///
/// Errors surface as `502 Bad Gateway` unless the outbound call was
/// cancelled by the client disconnecting, in which case the caller should
/// drop the connection without writing a body.
pub async fn forward(
    pools: &RouterPools,
    token_issuer: &ClusterTokenIssuer,
    target: &Node,
    caller_identity: &str,
    req: Request<Body>,
) -> Result<Response<Body>, ProxyError> {
    let is_websocket = req
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = format!("{}{path_and_query}", target.api_endpoint.trim_end_matches('/'));

    let token = token_issuer
        .mint(caller_identity, &target.node_uuid.to_string())
        .map_err(|e| ProxyError::BadGateway(e.to_string()))?;

    let url = if is_websocket {
        rewrite_auth_query_param(&url, &token)
    } else {
        url
    };

    let body_bytes = to_bytes(body, MAX_PROXIED_BODY_BYTES)
        .await
        .map_err(|e| ProxyError::BadGateway(e.to_string()))?;

    let client = &pools.skip_verify;
    let mut builder = client.request(reqwest_method(&method), &url);
    for (name, value) in parts.headers.iter() {
        if name == header::HOST {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    builder = builder.header(CLUSTER_TOKEN_HEADER, HeaderValue::from_str(&token).unwrap_or_else(|_| HeaderValue::from_static("")));
    builder = builder.header(header::FORWARDED, forwarded_header_value(&parts));

    let upstream = builder
        .body(body_bytes.to_vec())
        .send()
        .await
        .map_err(|e| if e.is_connect() || e.is_timeout() {
            ProxyError::BadGateway(e.to_string())
        } else if e.is_request() {
            ProxyError::Cancelled
        } else {
            ProxyError::BadGateway(e.to_string())
        })?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::builder().status(status);
    for (name, value) in upstream.headers().iter() {
        response = response.header(name.as_str(), value.as_bytes());
    }
    let upstream_body = upstream.bytes().await.map_err(|e| ProxyError::BadGateway(e.to_string()))?;
    response
        .body(Body::from(upstream_body))
        .map_err(|e| ProxyError::BadGateway(e.to_string()))
}

pub enum ProxyError {
    BadGateway(String),
    /// The outbound call was cancelled because the client disconnected;
    /// callers must drop the connection rather than write a response body.
    Cancelled,
}

impl ProxyError {
    pub fn into_response(self) -> Response<Body> {
        match self {
            ProxyError::BadGateway(detail) => {
                warn!(%detail, "proxy forward failed");
                Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .body(Body::from("upstream unavailable"))
                    .unwrap_or_default()
            }
            ProxyError::Cancelled => Response::builder().status(StatusCode::OK).body(Body::empty()).unwrap_or_default(),
        }
    }
}

fn reqwest_method(m: &Method) -> reqwest::Method {
    reqwest::Method::from_bytes(m.as_str().as_bytes()).unwrap_or(reqwest::Method::GET)
}

fn forwarded_header_value(parts: &axum::http::request::Parts) -> String {
    let for_ = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    format!("for={for_};proto=https")
}

fn rewrite_auth_query_param(url: &str, cluster_token: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return format!("{url}?auth={cluster_token}");
    };
    let rewritten: Vec<String> = query
        .split('&')
        .map(|pair| {
            if pair.starts_with("auth=") {
                format!("auth={cluster_token}")
            } else {
                pair.to_string()
            }
        })
        .collect();
    format!("{base}?{}", rewritten.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_existing_auth_param() {
        let url = "https://node-b/ws?auth=session-token&rows=24";
        let rewritten = rewrite_auth_query_param(url, "cluster-tok");
        assert!(rewritten.contains("auth=cluster-tok"));
        assert!(!rewritten.contains("session-token"));
        assert!(rewritten.contains("rows=24"));
    }

    #[test]
    fn appends_auth_param_when_absent() {
        let url = "https://node-b/ws";
        let rewritten = rewrite_auth_query_param(url, "cluster-tok");
        assert_eq!(rewritten, "https://node-b/ws?auth=cluster-tok");
    }
}

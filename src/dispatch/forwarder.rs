//! Default dispatcher: forward to an upstream server over HTTP/1.1.
//!
//! # Responsibilities
//! - Pick a server of the service (round robin)
//! - Rewrite the request URI onto that server
//! - Maintain X-Forwarded-* headers, strip hop-by-hop headers
//! - Map upstream failures to 502, slow upstreams to 504

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri, Version};
use axum::response::Response;
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::dispatch::{Dispatch, ServiceTarget};
use crate::http::response;
use crate::security::client_ip::X_FORWARDED_FOR;

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Proxies requests to the servers of the matched service.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    response_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(response_timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            response_timeout,
        }
    }
}

impl Dispatch for HttpForwarder {
    fn dispatch(&self, target: Arc<ServiceTarget>, req: Request<Body>) -> BoxFuture<'static, Response> {
        let client = self.client.clone();
        let response_timeout = self.response_timeout;
        Box::pin(async move { forward(client, response_timeout, &target, req).await })
    }
}

async fn forward(
    client: Client<HttpConnector, Body>,
    response_timeout: Duration,
    target: &ServiceTarget,
    request: Request<Body>,
) -> Response {
    let Some(server) = target.next_server() else {
        tracing::warn!(service = %target, "Service has no servers");
        return response::service_unavailable();
    };

    let (mut parts, body) = request.into_parts();
    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    strip_hop_by_hop(&mut parts.headers);
    if let Some(ip) = client_ip {
        append_forwarded_for(&mut parts.headers, &ip.to_string());
    }
    if let Some(host) = parts.headers.get(header::HOST).cloned() {
        parts.headers.insert(X_FORWARDED_HOST, host);
    }
    parts
        .headers
        .insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    if !target.pass_host_header() {
        // The client sets Host from the rewritten URI when absent.
        parts.headers.remove(header::HOST);
    }

    let uri = match upstream_uri(&server.url, &parts.uri) {
        Some(uri) => uri,
        None => {
            tracing::error!(service = %target, server = %server.url, uri = %parts.uri, "Cannot build upstream URI");
            return response::bad_gateway();
        }
    };
    parts.uri = uri;
    parts.version = Version::HTTP_11;

    let started = Instant::now();
    let upstream = Request::from_parts(parts, body);
    match tokio::time::timeout(response_timeout, client.request(upstream)).await {
        Ok(Ok(resp)) => {
            tracing::debug!(
                service = %target,
                server = %server.url,
                status = %resp.status(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Upstream responded"
            );
            let (mut parts, body) = resp.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(service = %target, server = %server.url, error = %e, "Upstream error");
            response::bad_gateway()
        }
        Err(_) => {
            tracing::warn!(service = %target, server = %server.url, timeout = ?response_timeout, "Upstream timed out");
            response::gateway_timeout()
        }
    }
}

/// Join the server URL (which may carry a base path) with the request path and query.
fn upstream_uri(server: &Url, original: &Uri) -> Option<Uri> {
    let base = server.path().trim_end_matches('/');
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let authority = match server.port() {
        Some(port) => format!("{}:{}", server.host_str()?, port),
        None => server.host_str()?.to_string(),
    };
    format!("{}://{}{}{}", server.scheme(), authority, base, path_and_query)
        .parse()
        .ok()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: &str) {
    let chain = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ");
    let value = if chain.is_empty() {
        client.to_string()
    } else {
        format!("{chain}, {client}")
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

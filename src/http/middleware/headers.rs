//! Custom request/response headers.
//!
//! An empty value removes the header instead of setting it.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::response::Response;
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;

use crate::config::dynamic::HeadersSpec;
use crate::http::middleware::{Middleware, MiddlewareError, Next};

type HeaderEdits = Vec<(HeaderName, Option<HeaderValue>)>;

#[derive(Debug)]
pub struct Headers {
    request: HeaderEdits,
    response: HeaderEdits,
}

impl Headers {
    pub fn from_spec(spec: &HeadersSpec) -> Result<Self, MiddlewareError> {
        Ok(Self {
            request: parse_edits(&spec.custom_request_headers)?,
            response: parse_edits(&spec.custom_response_headers)?,
        })
    }
}

fn parse_edits(raw: &BTreeMap<String, String>) -> Result<HeaderEdits, MiddlewareError> {
    raw.iter()
        .map(|(name, value)| {
            let invalid = || MiddlewareError::InvalidHeader(name.clone());
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = if value.is_empty() {
                None
            } else {
                Some(HeaderValue::from_str(value).map_err(|_| invalid())?)
            };
            Ok((name, value))
        })
        .collect()
}

fn apply(edits: &HeaderEdits, headers: &mut HeaderMap) {
    for (name, value) in edits {
        match value {
            Some(value) => {
                headers.insert(name.clone(), value.clone());
            }
            None => {
                headers.remove(name);
            }
        }
    }
}

impl Middleware for Headers {
    fn handle<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        apply(&self.request, req.headers_mut());
        Box::pin(async move {
            let mut response = next.run(req).await;
            apply(&self.response, response.headers_mut());
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::test_support::chain;
    use std::sync::Arc;

    #[tokio::test]
    async fn sets_request_and_response_headers() {
        let spec = HeadersSpec {
            custom_request_headers: BTreeMap::from([
                ("x-test".to_string(), "from-edge".to_string()),
                ("x-remove-me".to_string(), String::new()),
            ]),
            custom_response_headers: BTreeMap::from([("x-served-by".to_string(), "edge".to_string())]),
        };
        let mw: Arc<dyn Middleware> = Arc::new(Headers::from_spec(&spec).unwrap());
        let req = Request::builder()
            .uri("/")
            .header("x-remove-me", "1")
            .header("x-untouched", "1")
            .body(Body::empty())
            .unwrap();
        let response = chain(vec![mw]).handle(req).await;
        assert_eq!(response.headers()["x-test-echo"], "from-edge");
        assert_eq!(response.headers()["x-untouched-echo"], "1");
        assert!(!response.headers().contains_key("x-remove-me-echo"));
        assert_eq!(response.headers()["x-served-by"], "edge");
    }

    #[test]
    fn rejects_invalid_header_names() {
        let spec = HeadersSpec {
            custom_request_headers: BTreeMap::from([("bad header".to_string(), "v".to_string())]),
            custom_response_headers: BTreeMap::new(),
        };
        assert_eq!(
            Headers::from_spec(&spec).unwrap_err(),
            MiddlewareError::InvalidHeader("bad header".into())
        );
    }
}

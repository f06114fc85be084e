//! Path rewriting middlewares.

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderValue, Request, Uri};
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::config::dynamic::{AddPrefixSpec, StripPrefixSpec};
use crate::http::middleware::{Middleware, MiddlewareError, Next};

pub const X_FORWARDED_PREFIX: &str = "x-forwarded-prefix";

/// Removes the first matching prefix from the request path.
#[derive(Debug)]
pub struct StripPrefix {
    prefixes: Vec<String>,
}

impl StripPrefix {
    pub fn from_spec(spec: &StripPrefixSpec) -> Result<Self, MiddlewareError> {
        if spec.prefixes.is_empty() {
            return Err(MiddlewareError::NoPrefixes);
        }
        for prefix in &spec.prefixes {
            check_prefix(prefix)?;
        }
        Ok(Self {
            prefixes: spec.prefixes.clone(),
        })
    }
}

impl Middleware for StripPrefix {
    fn handle<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        let path = req.uri().path().to_string();
        if let Some(prefix) = self.prefixes.iter().find(|p| path.starts_with(p.as_str())) {
            let stripped = &path[prefix.len()..];
            let stripped = if stripped.starts_with('/') {
                stripped.to_string()
            } else {
                format!("/{stripped}")
            };
            if let Some(uri) = with_path(req.uri(), &stripped) {
                *req.uri_mut() = uri;
                if let Ok(value) = HeaderValue::from_str(prefix) {
                    req.headers_mut().insert(X_FORWARDED_PREFIX, value);
                }
            }
        }
        next.run(req)
    }
}

/// Prepends a fixed prefix to the request path.
#[derive(Debug)]
pub struct AddPrefix {
    prefix: String,
}

impl AddPrefix {
    pub fn from_spec(spec: &AddPrefixSpec) -> Result<Self, MiddlewareError> {
        check_prefix(&spec.prefix)?;
        Ok(Self {
            prefix: spec.prefix.trim_end_matches('/').to_string(),
        })
    }
}

impl Middleware for AddPrefix {
    fn handle<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        let path = format!("{}{}", self.prefix, req.uri().path());
        if let Some(uri) = with_path(req.uri(), &path) {
            *req.uri_mut() = uri;
        }
        next.run(req)
    }
}

fn check_prefix(prefix: &str) -> Result<(), MiddlewareError> {
    if prefix.starts_with('/') {
        Ok(())
    } else {
        Err(MiddlewareError::InvalidPrefix(prefix.to_string()))
    }
}

/// Replace the path of `uri`, keeping its query and any scheme/authority.
pub(crate) fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::test_support::{body_text, chain};
    use std::sync::Arc;

    fn strip(prefixes: &[&str]) -> Arc<dyn Middleware> {
        Arc::new(
            StripPrefix::from_spec(&StripPrefixSpec {
                prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            })
            .unwrap(),
        )
    }

    async fn run(mw: Arc<dyn Middleware>, uri: &str) -> String {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        body_text(chain(vec![mw]).handle(req).await).await
    }

    #[tokio::test]
    async fn strips_first_matching_prefix_and_keeps_query() {
        let mw = strip(&["/api", "/v1"]);
        assert_eq!(run(mw.clone(), "/api/users?page=2").await, "svc /users?page=2");
        assert_eq!(run(mw.clone(), "/api").await, "svc /");
        assert_eq!(run(mw, "/other").await, "svc /other");
    }

    #[tokio::test]
    async fn adds_prefix() {
        let mw: Arc<dyn Middleware> = Arc::new(
            AddPrefix::from_spec(&AddPrefixSpec {
                prefix: "/v2/".into(),
            })
            .unwrap(),
        );
        assert_eq!(run(mw, "/items?x=1").await, "svc /v2/items?x=1");
    }

    #[test]
    fn prefixes_must_be_absolute() {
        let err = AddPrefix::from_spec(&AddPrefixSpec { prefix: "v2".into() }).unwrap_err();
        assert_eq!(err, MiddlewareError::InvalidPrefix("v2".into()));
        let err = StripPrefix::from_spec(&StripPrefixSpec { prefixes: vec![] }).unwrap_err();
        assert_eq!(err, MiddlewareError::NoPrefixes);
    }
}

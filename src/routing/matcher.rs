//! Route matching logic.
//!
//! # Responsibilities
//! - Match host header (case-insensitive, port ignored)
//! - Match exact path or path prefix (case-sensitive)
//! - Match request method
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Matchers see a [`RouteRequest`] view, so the trailing-slash policy can
//!   re-run matching against a rewritten path without cloning the request
//! - No regex to guarantee O(n) matching

use axum::http::{header, Method, Request};

use crate::aggregator::RouterEntry;

/// The parts of a request that routing looks at.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub host: Option<&'a str>,
    pub path: &'a str,
    pub method: &'a Method,
}

impl<'a> RouteRequest<'a> {
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().host());
        Self {
            host,
            path: req.uri().path(),
            method: req.method(),
        }
    }

    pub fn with_path(self, path: &'a str) -> Self {
        Self { path, ..self }
    }
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &RouteRequest<'_>) -> bool;
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &RouteRequest<'_>) -> bool {
        req.host
            .map(|h| strip_port(h).eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// Matches the request path exactly.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    path: String,
}

impl PathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &RouteRequest<'_>) -> bool {
        req.path == self.path
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &RouteRequest<'_>) -> bool {
        req.path.starts_with(&self.prefix)
    }
}

/// Matches any of a set of methods.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: Vec<Method>) -> Self {
        Self { methods }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &RouteRequest<'_>) -> bool {
        self.methods.iter().any(|m| m == req.method)
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// Build the matcher for a validated router.
    pub fn for_router(router: &RouterEntry) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &router.host {
            matchers.push(Box::new(HostMatcher::new(host.as_str())));
        }
        if let Some(path) = &router.path {
            matchers.push(Box::new(PathMatcher::new(path.as_str())));
        }
        if let Some(prefix) = &router.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.as_str())));
        }
        let methods: Vec<Method> = router
            .methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
            .collect();
        if !methods.is_empty() {
            matchers.push(Box::new(MethodMatcher::new(methods)));
        }
        Self::new(matchers)
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &RouteRequest<'_>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(host: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Host", host)
            .body(Body::default())
            .unwrap()
    }

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("example.com");

        let req = request("example.com", "/");
        assert!(matcher.matches(&RouteRequest::from_request(&req)));

        let req = request("EXAMPLE.COM:8080", "/");
        assert!(matcher.matches(&RouteRequest::from_request(&req)));

        let req = request("other.com", "/");
        assert!(!matcher.matches(&RouteRequest::from_request(&req)));
    }

    #[test]
    fn host_falls_back_to_uri_authority() {
        let req = Request::builder()
            .uri("http://example.com/x")
            .body(Body::default())
            .unwrap();
        assert!(HostMatcher::new("example.com").matches(&RouteRequest::from_request(&req)));
    }

    #[test]
    fn strips_ports() {
        assert_eq!(strip_port("example.com:80"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "::1");
        assert_eq!(strip_port("example.com"), "example.com");
    }

    #[test]
    fn test_path_matchers() {
        let req = request("example.com", "/api/v1");
        let view = RouteRequest::from_request(&req);
        assert!(PathPrefixMatcher::new("/api").matches(&view));
        assert!(!PathPrefixMatcher::new("/images").matches(&view));
        assert!(PathMatcher::new("/api/v1").matches(&view));
        assert!(!PathMatcher::new("/api").matches(&view));
        assert!(PathMatcher::new("/api").matches(&view.with_path("/api")));
    }

    #[test]
    fn test_and_matcher() {
        let matcher = AndMatcher::new(vec![
            Box::new(HostMatcher::new("example.com")),
            Box::new(MethodMatcher::new(vec![Method::POST])),
        ]);
        let mut req = request("example.com", "/");
        assert!(!matcher.matches(&RouteRequest::from_request(&req)));
        *req.method_mut() = Method::POST;
        assert!(matcher.matches(&RouteRequest::from_request(&req)));
    }
}

//! Per-request routing classification.
//!
//! Evaluated in priority order: non-GET requests pass through untouched,
//! static-manifest paths (and the root route) are cache-first, API-prefix
//! paths are network-first, and everything else is network-only.

/// How an intercepted request is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Not intercepted; the request goes to the network untouched.
    Passthrough,
    /// Serve from the static generation, populating it on miss.
    CacheFirst,
    /// Try the network, fall back to the store on transport failure.
    NetworkFirst,
    /// Straight to the network, no caching either direction.
    NetworkOnly,
}

/// Classify a request by method and path.
pub fn classify(method: &str, path: &str, static_manifest: &[String], api_prefix: &str) -> RouteClass {
    if !method.eq_ignore_ascii_case("GET") {
        return RouteClass::Passthrough;
    }
    if path == "/" || static_manifest.iter().any(|p| p == path) {
        return RouteClass::CacheFirst;
    }
    if path.starts_with(api_prefix) {
        return RouteClass::NetworkFirst;
    }
    RouteClass::NetworkOnly
}

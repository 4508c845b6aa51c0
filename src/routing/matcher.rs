//! Request path parsing.
//!
//! ```text
//! /{marker?}/{route}/{sub_route?}/{rest...}
//! ```
//!
//! - The route is the first segment, or the second when the first is the
//!   version marker
//! - The next segment is a sub-route only if it ends with the sub-route
//!   suffix; otherwise it belongs to the rest
//! - The bare root and favicon probes are reserved

use crate::config::RoutingConfig;
use crate::routing::error::DispatchError;

/// Route resolution rules.
#[derive(Debug, Clone)]
pub struct RouteRules {
    pub version_marker: String,
    pub sub_route_suffix: String,
}

impl From<&RoutingConfig> for RouteRules {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            version_marker: config.version_marker.clone(),
            sub_route_suffix: config.sub_route_suffix.clone(),
        }
    }
}

impl Default for RouteRules {
    fn default() -> Self {
        Self::from(&RoutingConfig::default())
    }
}

/// A parsed request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    pub versioned: bool,
    pub route: String,
    pub sub_route: Option<String>,
    /// Remaining segments joined with `/`, no leading slash.
    pub rest: String,
    /// Every segment after the version marker, joined with `/`.
    pub full: String,
}

impl RoutePath {
    pub fn parse(path: &str, rules: &RouteRules) -> Result<Self, DispatchError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() {
            return Err(DispatchError::Protocol("root path is reserved".into()));
        }
        if segments.iter().any(|s| s.contains("favicon")) {
            return Err(DispatchError::Protocol("favicon requests are not served".into()));
        }
        if segments.iter().any(|s| *s == "..") {
            return Err(DispatchError::Protocol(format!("malformed path '{path}'")));
        }

        let versioned = segments[0] == rules.version_marker;
        let segments = if versioned { &segments[1..] } else { &segments[..] };
        let Some((route, tail)) = segments.split_first() else {
            return Err(DispatchError::Protocol(format!(
                "'{}' must be followed by a route",
                rules.version_marker
            )));
        };

        let (sub_route, rest) = match tail.split_first() {
            Some((first, rest)) if first.ends_with(&rules.sub_route_suffix) => {
                (Some(first.to_string()), rest)
            }
            _ => (None, tail),
        };

        Ok(Self {
            versioned,
            route: route.to_string(),
            sub_route,
            rest: rest.join("/"),
            full: segments.join("/"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str) -> Result<RoutePath, DispatchError> {
        RoutePath::parse(path, &RouteRules::default())
    }

    #[test]
    fn route_with_sub_route() {
        let parsed = parse("/hello/HelloServlet/a/b").unwrap();
        assert_eq!(parsed.route, "hello");
        assert_eq!(parsed.sub_route.as_deref(), Some("HelloServlet"));
        assert_eq!(parsed.rest, "a/b");
        assert!(!parsed.versioned);
    }

    #[test]
    fn versioned_route() {
        let parsed = parse("/v1/hello/HelloServlet").unwrap();
        assert!(parsed.versioned);
        assert_eq!(parsed.route, "hello");
        assert_eq!(parsed.sub_route.as_deref(), Some("HelloServlet"));
        assert_eq!(parsed.rest, "");
        assert_eq!(parsed.full, "hello/HelloServlet");
    }

    #[test]
    fn plain_segment_is_not_a_sub_route() {
        let parsed = parse("/files/docs/readme.txt").unwrap();
        assert_eq!(parsed.route, "files");
        assert_eq!(parsed.sub_route, None);
        assert_eq!(parsed.rest, "docs/readme.txt");
    }

    #[test]
    fn reserved_paths_are_protocol_errors() {
        for path in ["/", "", "/favicon.ico", "/v1", "/files/../secret"] {
            assert!(
                matches!(parse(path), Err(DispatchError::Protocol(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn custom_rules() {
        let rules = RouteRules {
            version_marker: "api".into(),
            sub_route_suffix: "Handler".into(),
        };
        let parsed = RoutePath::parse("/api/users/ListHandler/7", &rules).unwrap();
        assert_eq!(parsed.route, "users");
        assert_eq!(parsed.sub_route.as_deref(), Some("ListHandler"));
        assert_eq!(parsed.rest, "7");
    }
}

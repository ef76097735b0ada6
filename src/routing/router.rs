//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled prefix rules in declared order
//! - Refuse to forward to unknown or unhealthy services
//! - Rewrite the path and forward through the upstream
//! - Map transport failures to gateway errors
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Health is read from the registry on every request, never cached
//! - The inbound method is preserved unless a rule overrides it

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use thiserror::Error;

use crate::config::RouteConfig;
use crate::registry::ServiceRegistry;
use crate::routing::matcher::PathPrefixMatcher;
use crate::upstream::{strip_hop_by_hop, Upstream, UpstreamRequest, UpstreamResponse};

/// A routing failure, rendered as `{"detail": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("Not Found")]
    NoRoute(String),

    #[error("Service {0} not found")]
    ServiceNotFound(String),

    #[error("Service {0} is not available")]
    ServiceUnavailable(String),

    #[error("{display_name} service timeout")]
    Timeout { service: String, display_name: String },

    #[error("Error communicating with {service}")]
    Upstream { service: String, reason: String },
}

impl RouteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RouteError::NoRoute(_) | RouteError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            RouteError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RouteError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RouteError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// One compiled prefix rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    matcher: PathPrefixMatcher,
    service: String,
    upstream_prefix: String,
    method: Option<Method>,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, service: impl Into<String>, upstream_prefix: impl Into<String>) -> Self {
        Self {
            matcher: PathPrefixMatcher::new(prefix),
            service: service.into(),
            upstream_prefix: upstream_prefix.into(),
            method: None,
        }
    }

    /// Force the upstream method for this rule.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

/// A matched rule and the path remainder after its prefix.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatch<'a> {
    pub rule: &'a RouteRule,
    pub rest: &'a str,
}

impl RouteMatch<'_> {
    /// Upstream path for this match, with the original query appended.
    pub fn upstream_path(&self, query: Option<&str>) -> String {
        let mut path = format!("{}{}", self.rule.upstream_prefix, self.rest);
        if let Some(query) = query {
            path.push('?');
            path.push_str(query);
        }
        path
    }
}

/// Ordered prefix rules; first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Compile route configs in declared order.
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let rules = configs
            .iter()
            .map(|config| {
                let rule = RouteRule::new(&config.prefix, &config.service, &config.upstream_prefix);
                match config.method.as_deref().map(|m| Method::from_bytes(m.as_bytes())) {
                    Some(Ok(method)) => rule.with_method(method),
                    Some(Err(_)) => {
                        tracing::warn!(prefix = %config.prefix, "Ignoring invalid method override");
                        rule
                    }
                    None => rule,
                }
            })
            .collect();
        Self { rules }
    }

    pub fn find<'a>(&'a self, path: &'a str) -> Option<RouteMatch<'a>> {
        self.rules.iter().find_map(|rule| {
            rule.matcher
                .strip(path)
                .map(|rest| RouteMatch { rule, rest })
        })
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}

/// Whether a path remainder stays under the upstream prefix once joined.
///
/// A leading slash would make the upstream path network-path relative, and
/// dot segments (plain or `%2e`-encoded) are collapsed by URL resolution.
fn is_plain_remainder(rest: &str) -> bool {
    if rest.starts_with(['/', '\\']) {
        return false;
    }
    rest.split(['/', '\\']).all(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded != "." && decoded != ".."
    })
}

/// Health-aware request router.
pub struct Router<U> {
    table: RouteTable,
    registry: Arc<ServiceRegistry>,
    upstream: Arc<U>,
}

impl<U: Upstream> Router<U> {
    pub fn new(table: RouteTable, registry: Arc<ServiceRegistry>, upstream: Arc<U>) -> Self {
        Self {
            table,
            registry,
            upstream,
        }
    }

    /// Whether `path` belongs to a backend service rather than the gateway.
    pub fn matches(&self, path: &str) -> bool {
        self.service_for(path).is_some()
    }

    /// Target service for `path`, if any rule matches.
    pub fn service_for(&self, path: &str) -> Option<&str> {
        self.table
            .rules()
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(RouteRule::service)
    }

    /// Route one request to its backend.
    pub async fn route(
        &self,
        method: Method,
        uri: &Uri,
        mut headers: HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, RouteError> {
        let path = uri.path();
        let matched = self
            .table
            .find(path)
            .ok_or_else(|| RouteError::NoRoute(path.to_string()))?;
        if !is_plain_remainder(matched.rest) {
            tracing::warn!(path = %path, "Refusing path that escapes the route prefix");
            return Err(RouteError::NoRoute(path.to_string()));
        }
        let service = matched.rule.service();

        let Some(record) = self.registry.get(service) else {
            tracing::error!(service = %service, "Service not found in registry");
            return Err(RouteError::ServiceNotFound(service.to_string()));
        };
        if !record.is_healthy() {
            tracing::error!(service = %service, status = %record.status, "Service is not healthy");
            return Err(RouteError::ServiceUnavailable(service.to_string()));
        }

        strip_hop_by_hop(&mut headers);
        let request = UpstreamRequest {
            method: matched.rule.method.clone().unwrap_or(method),
            path_and_query: matched.upstream_path(uri.query()),
            headers,
            body,
        };

        tracing::debug!(
            service = %service,
            method = %request.method,
            upstream_path = %request.path_and_query,
            "Forwarding request"
        );

        self.upstream
            .forward(service, request)
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::error!(service = %service, "Upstream request timed out");
                    RouteError::Timeout {
                        service: service.to_string(),
                        display_name: record.endpoint.display_name.clone(),
                    }
                } else {
                    tracing::error!(service = %service, error = %e, "Error communicating with service");
                    RouteError::Upstream {
                        service: service.to_string(),
                        reason: e.to_string(),
                    }
                }
            })
    }
}

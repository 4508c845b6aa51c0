//! Connection dispatcher.
//!
//! Turns a [`RequestEnvelope`] into a [`ResponseEnvelope`]: protocol check,
//! route and sub-route resolution, method dispatch. Failures before a handler
//! runs answer 400; handler errors and panics answer 500. Dispatch never
//! unwinds into the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method};

use crate::config::{FallbackPolicy, RoutingConfig};
use crate::http::request::{RequestEnvelope, HTTP_11};
use crate::http::response::ResponseEnvelope;
use crate::plugins::builtin::StaticFiles;
use crate::plugins::{serve, PluginRegistry, Reply, RequestContext, Servlet};
use crate::routing::error::DispatchError;
use crate::routing::matcher::{RoutePath, RouteRules};

const METHODS: [Method; 5] = [
    Method::GET,
    Method::PUT,
    Method::POST,
    Method::DELETE,
    Method::OPTIONS,
];

/// Routes requests to plugins.
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    rules: RouteRules,
    fallback: FallbackPolicy,
    server_root: PathBuf,
}

impl Dispatcher {
    pub fn new(registry: Arc<PluginRegistry>, config: &RoutingConfig) -> Self {
        Self {
            registry,
            rules: RouteRules::from(config),
            fallback: config.fallback,
            server_root: config.root_directory.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Handle one request. Service time covers the whole call.
    pub fn dispatch(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        let started = Instant::now();

        let reply = match self.route(request) {
            Ok(reply) => reply,
            Err(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(
                        correlation_id = %request.correlation_id,
                        uri = %request.uri,
                        error = %err,
                        "Handler failed"
                    );
                } else {
                    tracing::debug!(
                        correlation_id = %request.correlation_id,
                        uri = %request.uri,
                        error = %err,
                        "Request rejected"
                    );
                }
                Reply::text(status, err.to_string() + "\n")
            }
        };

        ResponseEnvelope::from_reply(request.correlation_id, reply, started.elapsed())
    }

    fn route(&self, request: &RequestEnvelope) -> Result<Reply, DispatchError> {
        if request.version != HTTP_11 {
            return Err(DispatchError::Protocol(format!(
                "unsupported protocol version {}",
                request.version
            )));
        }

        let method = Method::from_bytes(request.method.as_bytes())
            .ok()
            .filter(|m| METHODS.contains(m))
            .ok_or_else(|| DispatchError::UnsupportedMethod(request.method.clone()))?;

        let path = RoutePath::parse(request.path(), &self.rules)?;

        let fallback;
        let default_servlet;
        let plugin;
        let (servlet, relative): (&dyn Servlet, &str) = match self.registry.lookup(&path.route) {
            Ok(found) => {
                plugin = found;
                match &path.sub_route {
                    Some(name) => {
                        let servlet = plugin.servlet(name).ok_or_else(|| {
                            DispatchError::SubRouteNotFound {
                                route: path.route.clone(),
                                sub_route: name.clone(),
                            }
                        })?;
                        (servlet, path.rest.as_str())
                    }
                    None => {
                        default_servlet = StaticFiles::new(plugin.root_directory());
                        (&default_servlet, path.rest.as_str())
                    }
                }
            }
            Err(missing) if self.fallback == FallbackPolicy::Static => {
                tracing::debug!(route = %missing.0, "No plugin for route, serving static file");
                fallback = StaticFiles::new(&self.server_root);
                (&fallback, path.full.as_str())
            }
            Err(missing) => return Err(missing.into()),
        };

        tracing::info!(
            correlation_id = %request.correlation_id,
            client = %request.client,
            method = %method,
            uri = %request.uri,
            route = %path.route,
            sub_route = path.sub_route.as_deref().unwrap_or("-"),
            "Dispatching request"
        );

        let headers = header_map(&request.headers);
        let ctx = RequestContext {
            method: &method,
            path: relative,
            query: request.query(),
            headers: &headers,
            body: &request.body,
            client: request.client,
            correlation_id: request.correlation_id,
        };

        match catch_unwind(AssertUnwindSafe(|| serve(servlet, &ctx))) {
            Ok(result) => result.map_err(DispatchError::from),
            Err(panic) => Err(DispatchError::HandlerFailure(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }
}

fn header_map(pairs: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

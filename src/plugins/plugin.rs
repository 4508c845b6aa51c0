//! Handler unit traits.
//!
//! A [`Plugin`] owns one route name and a root directory, and exposes named
//! [`Servlet`]s (sub-routes). Every servlet method defaults to "unsupported".

use std::path::Path;

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, StatusCode};
use serde::Serialize;

use crate::net::{ClientId, CorrelationId};

/// Errors a servlet can return.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The servlet does not implement this method.
    #[error("method {0} not supported")]
    UnsupportedMethod(Method),

    /// The request is malformed for this servlet.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handler failed: {0}")]
    Failed(String),
}

pub type HandlerResult = Result<Reply, HandlerError>;

/// The request as seen by a servlet.
#[derive(Debug)]
pub struct RequestContext<'a> {
    pub method: &'a Method,
    /// Path below the route (and sub-route), without a leading slash.
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
    pub client: ClientId,
    pub correlation_id: CorrelationId,
}

/// What a servlet answers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> HandlerResult {
        let body = serde_json::to_vec(value).map_err(|e| HandlerError::Failed(e.to_string()))?;
        Ok(Self::new(status)
            .with_header(hyper::header::CONTENT_TYPE, "application/json")
            .with_body(body))
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }
}

/// A sub-route inside a plugin.
pub trait Servlet: Send + Sync {
    fn get(&self, req: &RequestContext<'_>) -> HandlerResult {
        Err(HandlerError::UnsupportedMethod(req.method.clone()))
    }

    fn put(&self, req: &RequestContext<'_>) -> HandlerResult {
        Err(HandlerError::UnsupportedMethod(req.method.clone()))
    }

    fn post(&self, req: &RequestContext<'_>) -> HandlerResult {
        Err(HandlerError::UnsupportedMethod(req.method.clone()))
    }

    fn delete(&self, req: &RequestContext<'_>) -> HandlerResult {
        Err(HandlerError::UnsupportedMethod(req.method.clone()))
    }

    fn options(&self, req: &RequestContext<'_>) -> HandlerResult {
        Err(HandlerError::UnsupportedMethod(req.method.clone()))
    }
}

/// Dispatch to the servlet method matching the request method.
pub fn serve(servlet: &dyn Servlet, req: &RequestContext<'_>) -> HandlerResult {
    match *req.method {
        Method::GET => servlet.get(req),
        Method::PUT => servlet.put(req),
        Method::POST => servlet.post(req),
        Method::DELETE => servlet.delete(req),
        Method::OPTIONS => servlet.options(req),
        _ => Err(HandlerError::UnsupportedMethod(req.method.clone())),
    }
}

/// A routable handler unit.
pub trait Plugin: Send + Sync + 'static {
    /// First path segment this plugin answers to.
    fn route_name(&self) -> &str;

    /// Directory the default static handler serves from.
    fn root_directory(&self) -> &Path;

    /// Look up a sub-route by name.
    fn servlet(&self, name: &str) -> Option<&dyn Servlet>;

    /// Names of all sub-routes.
    fn servlet_names(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Concrete implementing type. Only a plugin of the same type may
    /// replace a registered route.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

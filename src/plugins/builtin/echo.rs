//! `echo` route: reflects the request back as JSON.

use std::path::{Path, PathBuf};

use hyper::StatusCode;
use serde_json::json;

use crate::plugins::plugin::{HandlerResult, Plugin, Reply, RequestContext, Servlet};

pub const ROUTE: &str = "echo";

#[derive(Debug, Default)]
pub struct EchoServlet;

impl EchoServlet {
    fn echo(&self, req: &RequestContext<'_>) -> HandlerResult {
        Reply::json(
            StatusCode::OK,
            &json!({
                "method": req.method.as_str(),
                "path": req.path,
                "query": req.query,
                "body": String::from_utf8_lossy(req.body),
                "client": req.client,
                "correlation_id": req.correlation_id,
            }),
        )
    }
}

impl Servlet for EchoServlet {
    fn get(&self, req: &RequestContext<'_>) -> HandlerResult {
        self.echo(req)
    }

    fn put(&self, req: &RequestContext<'_>) -> HandlerResult {
        self.echo(req)
    }

    fn post(&self, req: &RequestContext<'_>) -> HandlerResult {
        self.echo(req)
    }

    fn delete(&self, req: &RequestContext<'_>) -> HandlerResult {
        self.echo(req)
    }
}

#[derive(Debug)]
pub struct EchoPlugin {
    root: PathBuf,
    servlet: EchoServlet,
}

impl EchoPlugin {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            servlet: EchoServlet,
        }
    }
}

impl Plugin for EchoPlugin {
    fn route_name(&self) -> &str {
        ROUTE
    }

    fn root_directory(&self) -> &Path {
        &self.root
    }

    fn servlet(&self, name: &str) -> Option<&dyn Servlet> {
        (name == "EchoServlet").then_some(&self.servlet as &dyn Servlet)
    }

    fn servlet_names(&self) -> Vec<&str> {
        vec!["EchoServlet"]
    }
}

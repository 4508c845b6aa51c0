//! `hello` route: a greeting servlet.

use std::path::{Path, PathBuf};

use hyper::header::CONTENT_TYPE;
use hyper::StatusCode;
use serde_json::json;

use crate::plugins::plugin::{HandlerResult, Plugin, Reply, RequestContext, Servlet};

pub const ROUTE: &str = "hello";

/// Serves `hello.json` from the plugin root when present, a generated
/// greeting otherwise. Mutating methods answer 505.
#[derive(Debug)]
pub struct HelloServlet {
    greeting_file: PathBuf,
}

impl Servlet for HelloServlet {
    fn get(&self, req: &RequestContext<'_>) -> HandlerResult {
        if let Ok(body) = std::fs::read(&self.greeting_file) {
            return Ok(Reply::new(StatusCode::OK)
                .with_header(CONTENT_TYPE, "application/json")
                .with_body(body));
        }
        Reply::json(
            StatusCode::OK,
            &json!({
                "message": "Hello, World!",
                "client": req.client,
            }),
        )
    }

    fn put(&self, _req: &RequestContext<'_>) -> HandlerResult {
        Ok(not_supported())
    }

    fn post(&self, _req: &RequestContext<'_>) -> HandlerResult {
        Ok(not_supported())
    }

    fn delete(&self, _req: &RequestContext<'_>) -> HandlerResult {
        Ok(not_supported())
    }
}

fn not_supported() -> Reply {
    Reply::text(StatusCode::HTTP_VERSION_NOT_SUPPORTED, "Not supported\n")
}

#[derive(Debug)]
pub struct HelloPlugin {
    root: PathBuf,
    servlet: HelloServlet,
}

impl HelloPlugin {
    pub fn new(root: PathBuf) -> Self {
        let servlet = HelloServlet {
            greeting_file: root.join("hello.json"),
        };
        Self { root, servlet }
    }
}

impl Plugin for HelloPlugin {
    fn route_name(&self) -> &str {
        ROUTE
    }

    fn root_directory(&self) -> &Path {
        &self.root
    }

    fn servlet(&self, name: &str) -> Option<&dyn Servlet> {
        (name == "HelloServlet").then_some(&self.servlet as &dyn Servlet)
    }

    fn servlet_names(&self) -> Vec<&str> {
        vec!["HelloServlet"]
    }
}

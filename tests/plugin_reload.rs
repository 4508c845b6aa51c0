//! Hot reload of handler packages through the plugin directory watcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sws::lifecycle::{start_server, Shutdown};
use sws::plugins::{Catalog, Plugin, Servlet};

mod common;

use common::Sandbox;

/// Claims the `hello` route with a different concrete type.
struct Impostor {
    root: PathBuf,
}

impl Plugin for Impostor {
    fn route_name(&self) -> &str {
        "hello"
    }

    fn root_directory(&self) -> &Path {
        &self.root
    }

    fn servlet(&self, _name: &str) -> Option<&dyn Servlet> {
        None
    }
}

fn catalog() -> Arc<Catalog> {
    let catalog = Catalog::builtin();
    catalog.register("impostor", |root| Arc::new(Impostor { root }));
    Arc::new(catalog)
}

#[tokio::test]
async fn test_packages_are_picked_up_at_runtime() {
    let sandbox = Sandbox::new();
    let shutdown = Shutdown::new();
    let server = start_server(sandbox.config(), catalog(), None, shutdown.clone())
        .await
        .unwrap();
    let registry = Arc::clone(&server.plugins.registry);
    let addr = server.local_addr;

    assert_eq!(common::get(addr, "/v1/hello/HelloServlet").await.status, 400);

    sandbox.install("hello.toml", "hello");
    assert!(common::eventually(|| registry.lookup("hello").is_ok()).await);
    assert_eq!(common::get(addr, "/v1/hello/HelloServlet").await.status, 200);

    // Rewriting the package swaps in a fresh instance of the same type.
    let before = registry.lookup("hello").unwrap();
    sandbox.install("hello.toml", "hello");
    assert!(common::eventually(|| !Arc::ptr_eq(&before, &registry.lookup("hello").unwrap())).await);
    assert_eq!(registry.len(), 1);

    // Rewriting it to a different type under the same name is refused.
    // Events are handled in order, so once echo shows up the rewrite is done.
    sandbox.install("hello.toml", "impostor");
    sandbox.install("echo.toml", "echo");
    assert!(common::eventually(|| registry.lookup("echo").is_ok()).await);
    let routes = registry.routes();
    let hello = routes.iter().find(|r| r.route == "hello").unwrap();
    assert!(hello.type_name.ends_with("HelloPlugin"));
    assert_eq!(common::get(addr, "/v1/hello/HelloServlet").await.status, 200);

    std::fs::remove_file(sandbox.plugins.path().join("hello.toml")).unwrap();
    assert!(common::eventually(|| registry.lookup("hello").is_err()).await);
    assert_eq!(common::get(addr, "/v1/hello/HelloServlet").await.status, 400);
    shutdown.trigger();
}

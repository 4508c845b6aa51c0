//! Route table.
//!
//! Lookups read an `ArcSwap` snapshot without locking. Writers serialize on
//! a mutex, copy the table, and publish the new version atomically.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::observability::metrics;
use crate::plugins::plugin::Plugin;

/// A registered route.
#[derive(Clone)]
pub struct RouteEntry {
    pub plugin: Arc<dyn Plugin>,
    pub type_name: &'static str,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("route", &self.plugin.route_name())
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Outcome of [`PluginRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    /// A plugin of the same type was swapped out.
    Replaced,
    /// A plugin of a different type already owns the route.
    Rejected { existing: &'static str },
}

/// Route lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no plugin registered for route '{0}'")]
pub struct RouteNotFound(pub String);

/// Route as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub route: String,
    pub type_name: &'static str,
    pub root_directory: PathBuf,
    pub servlets: Vec<String>,
}

type RouteTable = HashMap<String, RouteEntry>;

/// Hot-reloadable map of route name to plugin.
pub struct PluginRegistry {
    routes: ArcSwap<RouteTable>,
    write_lock: Mutex<()>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            routes: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Register a plugin under its route name.
    pub fn add(&self, plugin: Arc<dyn Plugin>) -> Registration {
        let route = plugin.route_name().to_string();
        let type_name = plugin.type_name();

        let _guard = self.write_lock.lock();
        let current = self.routes.load_full();

        let registration = match current.get(&route) {
            Some(existing) if existing.type_name != type_name => {
                tracing::warn!(
                    route = %route,
                    existing = existing.type_name,
                    rejected = type_name,
                    "Route already owned by a different plugin type, ignoring"
                );
                metrics::record_route_change("rejected");
                return Registration::Rejected {
                    existing: existing.type_name,
                };
            }
            Some(_) => Registration::Replaced,
            None => Registration::Inserted,
        };

        let mut next = (*current).clone();
        next.insert(route.clone(), RouteEntry { plugin, type_name });
        self.routes.store(Arc::new(next));

        match registration {
            Registration::Replaced => {
                tracing::info!(route = %route, type_name, "Plugin replaced");
                metrics::record_route_change("replaced");
            }
            _ => {
                tracing::info!(route = %route, type_name, "Plugin added");
                metrics::record_route_change("inserted");
            }
        }
        registration
    }

    /// Unregister a route. Returns the removed entry, if any.
    pub fn remove(&self, route: &str) -> Option<RouteEntry> {
        let _guard = self.write_lock.lock();
        let current = self.routes.load_full();
        if !current.contains_key(route) {
            return None;
        }

        let mut next = (*current).clone();
        let removed = next.remove(route);
        self.routes.store(Arc::new(next));

        tracing::info!(route = %route, "Plugin removed");
        metrics::record_route_change("removed");
        removed
    }

    pub fn lookup(&self, route: &str) -> Result<Arc<dyn Plugin>, RouteNotFound> {
        self.routes
            .load()
            .get(route)
            .map(|entry| Arc::clone(&entry.plugin))
            .ok_or_else(|| RouteNotFound(route.to_string()))
    }

    /// Snapshot of every route, sorted by name.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let table = self.routes.load();
        let mut routes: Vec<RouteInfo> = table
            .iter()
            .map(|(route, entry)| RouteInfo {
                route: route.clone(),
                type_name: entry.type_name,
                root_directory: entry.plugin.root_directory().to_path_buf(),
                servlets: entry
                    .plugin
                    .servlet_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();
        routes.sort_by(|a, b| a.route.cmp(&b.route));
        routes
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::builtin::{EchoPlugin, HelloPlugin};
    use crate::plugins::plugin::Servlet;
    use std::path::Path;

    /// Claims the `hello` route with a different type.
    struct Impostor(PathBuf);

    impl Plugin for Impostor {
        fn route_name(&self) -> &str {
            "hello"
        }

        fn root_directory(&self) -> &Path {
            &self.0
        }

        fn servlet(&self, _name: &str) -> Option<&dyn Servlet> {
            None
        }
    }

    #[test]
    fn add_then_lookup() {
        let registry = PluginRegistry::new();
        assert_eq!(
            registry.add(Arc::new(EchoPlugin::new("web/echo".into()))),
            Registration::Inserted
        );
        assert_eq!(registry.lookup("echo").unwrap().route_name(), "echo");
        assert_eq!(
            registry.lookup("nope").err(),
            Some(RouteNotFound("nope".into()))
        );
    }

    #[test]
    fn same_type_replaces() {
        let registry = PluginRegistry::new();
        registry.add(Arc::new(HelloPlugin::new("old".into())));
        assert_eq!(
            registry.add(Arc::new(HelloPlugin::new("new".into()))),
            Registration::Replaced
        );
        assert_eq!(
            registry.lookup("hello").unwrap().root_directory(),
            Path::new("new")
        );
    }

    #[test]
    fn different_type_is_rejected() {
        let registry = PluginRegistry::new();
        registry.add(Arc::new(HelloPlugin::new("web/hello".into())));

        let outcome = registry.add(Arc::new(Impostor("elsewhere".into())));
        assert!(matches!(outcome, Registration::Rejected { .. }));
        assert_eq!(
            registry.lookup("hello").unwrap().type_name(),
            std::any::type_name::<HelloPlugin>()
        );
    }

    #[test]
    fn remove_unregisters() {
        let registry = PluginRegistry::new();
        registry.add(Arc::new(HelloPlugin::new("web/hello".into())));
        assert!(registry.remove("hello").is_some());
        assert!(registry.remove("hello").is_none());
        assert!(registry.lookup("hello").is_err());
    }

    #[test]
    fn held_snapshot_survives_removal() {
        let registry = PluginRegistry::new();
        registry.add(Arc::new(HelloPlugin::new("web/hello".into())));
        let plugin = registry.lookup("hello").unwrap();
        registry.remove("hello");
        assert_eq!(plugin.route_name(), "hello");
    }
}

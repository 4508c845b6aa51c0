//! Handler kinds available to plugin packages.
//!
//! Each kind maps to a constructor taking the unit's root directory,
//! `<server root>/<kind>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::plugins::builtin::{EchoPlugin, FilesPlugin, HelloPlugin};
use crate::plugins::plugin::Plugin;

/// Constructor for a handler kind.
pub type PluginFactory = Arc<dyn Fn(PathBuf) -> Arc<dyn Plugin> + Send + Sync>;

/// Registry of handler kinds.
pub struct Catalog {
    kinds: RwLock<BTreeMap<String, PluginFactory>>,
}

impl Catalog {
    /// An empty catalog.
    pub fn empty() -> Self {
        Self {
            kinds: RwLock::new(BTreeMap::new()),
        }
    }

    /// The catalog with every built-in kind.
    pub fn builtin() -> Self {
        let catalog = Self::empty();
        catalog.register("hello", |root| Arc::new(HelloPlugin::new(root)));
        catalog.register("echo", |root| Arc::new(EchoPlugin::new(root)));
        catalog.register("files", |root| Arc::new(FilesPlugin::new(root)));
        catalog
    }

    /// Add or replace a kind.
    pub fn register<F>(&self, kind: impl Into<String>, factory: F)
    where
        F: Fn(PathBuf) -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.kinds.write().insert(kind.into(), Arc::new(factory));
    }

    /// Instantiate `kind` rooted under `server_root`.
    pub fn build(&self, kind: &str, server_root: &Path) -> Option<Arc<dyn Plugin>> {
        let factory = self.kinds.read().get(kind).cloned()?;
        Some(factory(server_root.join(kind)))
    }

    pub fn kinds(&self) -> Vec<String> {
        self.kinds.read().keys().cloned().collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").field("kinds", &self.kinds()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_kinds_are_rooted_by_kind() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.kinds(), vec!["echo", "files", "hello"]);

        let plugin = catalog.build("hello", Path::new("/srv/web")).unwrap();
        assert_eq!(plugin.route_name(), "hello");
        assert_eq!(plugin.root_directory(), Path::new("/srv/web/hello"));
    }

    #[test]
    fn unknown_kind_builds_nothing() {
        assert!(Catalog::builtin().build("nope", Path::new("/")).is_none());
    }
}

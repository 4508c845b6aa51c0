//! Plugin directory scanning and hot reload.
//!
//! Packages are loaded once at startup. A `notify` watcher then forwards
//! filesystem events to a tokio task: a created or modified package is
//! (re)registered, a removed one unregisters the route it installed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::plugins::catalog::Catalog;
use crate::plugins::manifest::{is_package, PackageError, PackageManifest};
use crate::plugins::registry::{PluginRegistry, Registration};

/// Loads handler packages from a directory into a registry.
pub struct PluginLoader {
    registry: Arc<PluginRegistry>,
    catalog: Arc<Catalog>,
    server_root: PathBuf,
    plugin_dir: PathBuf,
    /// Package path → route it registered.
    installed: Mutex<HashMap<PathBuf, String>>,
}

impl PluginLoader {
    pub fn new(
        registry: Arc<PluginRegistry>,
        catalog: Arc<Catalog>,
        server_root: impl Into<PathBuf>,
        plugin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            catalog,
            server_root: server_root.into(),
            plugin_dir: plugin_dir.into(),
            installed: Mutex::new(HashMap::new()),
        }
    }

    /// Load every package currently in the plugin directory.
    /// Returns how many registered a route.
    pub fn scan(&self) -> std::io::Result<usize> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.plugin_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_package(path) && path.is_file())
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match self.load_package(&path) {
                Ok(Registration::Inserted | Registration::Replaced) => loaded += 1,
                Ok(Registration::Rejected { .. }) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping plugin package"),
            }
        }

        tracing::info!(
            directory = %self.plugin_dir.display(),
            loaded,
            "Plugin directory scanned"
        );
        Ok(loaded)
    }

    /// Register the plugin a package describes.
    pub fn load_package(&self, path: &Path) -> Result<Registration, PackageError> {
        let manifest = PackageManifest::load(path)?;
        let plugin = self
            .catalog
            .build(&manifest.kind, &self.server_root)
            .ok_or_else(|| PackageError::UnknownKind {
                path: path.display().to_string(),
                kind: manifest.kind.clone(),
            })?;
        let route = plugin.route_name().to_string();

        let registration = self.registry.add(plugin);
        if matches!(registration, Registration::Rejected { .. }) {
            return Ok(registration);
        }

        let previous = self.installed.lock().insert(path.to_path_buf(), route.clone());
        if let Some(previous) = previous.filter(|prev| *prev != route) {
            self.release_route(&previous);
        }

        tracing::info!(
            package = %path.display(),
            kind = %manifest.kind,
            route = %route,
            "Plugin package loaded"
        );
        Ok(registration)
    }

    /// Unregister whatever a package installed.
    pub fn unload_package(&self, path: &Path) {
        let route = self.installed.lock().remove(path);
        if let Some(route) = route {
            self.release_route(&route);
            tracing::info!(package = %path.display(), route = %route, "Plugin package unloaded");
        }
    }

    /// Remove a route unless another package still provides it.
    fn release_route(&self, route: &str) {
        let still_provided = self.installed.lock().values().any(|r| r == route);
        if !still_provided {
            self.registry.remove(route);
        }
    }

    fn handle_event(&self, event: Event) {
        for path in event.paths.iter().filter(|p| is_package(p)) {
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) if path.is_file() => {
                    if let Err(e) = self.load_package(path) {
                        tracing::warn!(error = %e, "Failed to load plugin package");
                    }
                }
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                    self.unload_package(path);
                }
                _ => {}
            }
        }
    }

    /// Start watching the plugin directory until shutdown.
    pub fn watch(self: Arc<Self>, shutdown: &Shutdown) -> Result<PluginWatcher, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => tracing::error!(error = %e, "Plugin watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.plugin_dir, RecursiveMode::NonRecursive)?;

        let mut shutdown_rx = shutdown.subscribe();
        let loader = Arc::clone(&self);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => loader.handle_event(event),
                        None => break,
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
            tracing::debug!("Plugin watcher stopped");
        });

        tracing::info!(directory = %self.plugin_dir.display(), "Plugin watcher started");
        Ok(PluginWatcher {
            _watcher: watcher,
            task,
        })
    }
}

/// Keeps the filesystem watcher alive. Dropping it stops watching.
pub struct PluginWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for PluginWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//! Plugin subsystem.
//!
//! # Data Flow
//! ```text
//! plugin directory (*.toml packages)
//!     → manifest.rs (parse package)
//!     → catalog.rs (kind → constructor, rooted at <server root>/<kind>)
//!     → registry.rs (route name → plugin, lock-free lookups)
//!
//! notify watcher → loader.rs → registry add/replace/remove at runtime
//! ```

pub mod builtin;
pub mod catalog;
pub mod loader;
pub mod manifest;
pub mod plugin;
pub mod registry;

pub use catalog::{Catalog, PluginFactory};
pub use loader::{PluginLoader, PluginWatcher};
pub use manifest::{PackageError, PackageManifest};
pub use plugin::{serve, HandlerError, HandlerResult, Plugin, Reply, RequestContext, Servlet};
pub use registry::{PluginRegistry, Registration, RouteEntry, RouteInfo, RouteNotFound};

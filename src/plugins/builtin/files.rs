//! `files` route: no sub-routes, everything goes to the static handler.

use std::path::{Path, PathBuf};

use crate::plugins::plugin::{Plugin, Servlet};

pub const ROUTE: &str = "files";

#[derive(Debug)]
pub struct FilesPlugin {
    root: PathBuf,
}

impl FilesPlugin {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl Plugin for FilesPlugin {
    fn route_name(&self) -> &str {
        ROUTE
    }

    fn root_directory(&self) -> &Path {
        &self.root
    }

    fn servlet(&self, _name: &str) -> Option<&dyn Servlet> {
        None
    }
}

//! Handler package manifests.
//!
//! A package is a `*.toml` file in the plugin directory:
//!
//! ```toml
//! kind = "hello"
//! ```

use std::path::Path;

use serde::Deserialize;

/// Parsed package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageManifest {
    /// Catalog kind to instantiate.
    pub kind: String,
}

/// Errors reading a package.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("failed to read package {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid package manifest {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("package {path} names unknown kind '{kind}'")]
    UnknownKind { path: String, kind: String },
}

/// Whether a path looks like a handler package.
pub fn is_package(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

impl PackageManifest {
    pub fn load(path: &Path) -> Result<Self, PackageError> {
        let content = std::fs::read_to_string(path).map_err(|source| PackageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| PackageError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_packages_by_extension() {
        assert!(is_package(Path::new("plugins/hello.toml")));
        assert!(!is_package(Path::new("plugins/hello.jar")));
        assert!(!is_package(Path::new("plugins/README")));
    }

    #[test]
    fn rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "kind = \"hello\"\nextra = 1\n").unwrap();
        assert!(matches!(PackageManifest::load(&path), Err(PackageError::Parse { .. })));
    }
}

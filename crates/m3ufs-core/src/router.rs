//! Classification of mount paths into the virtual manifest or real paths.

use crate::config::M3uConfig;
use std::path::{Path, PathBuf};

/// Where an incoming mount path resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The synthesized manifest file. Holds the virtual path string.
    Virtual(String),
    /// A real filesystem location.
    Real(PathBuf),
}

impl Route {
    pub fn is_virtual(&self) -> bool {
        matches!(self, Route::Virtual(_))
    }

    /// Path handed to pass-through primitives.
    ///
    /// For the virtual route this is the virtual path string itself. No real
    /// inode backs it, so those primitives are expected to fail.
    pub fn delegate_path(&self) -> &Path {
        match self {
            Route::Virtual(path) => Path::new(path),
            Route::Real(path) => path,
        }
    }
}

/// Applies the same routing rule for every operation.
#[derive(Debug, Clone)]
pub struct PathRouter {
    virtual_path: Option<String>,
    strip_prefix: Option<String>,
}

impl PathRouter {
    pub fn new(config: &M3uConfig) -> Self {
        Self {
            virtual_path: config
                .emulate_manifest()
                .then(|| config.virtual_path().to_string()),
            strip_prefix: config.strip_prefix().map(str::to_string),
        }
    }

    /// Classifies `path`.
    ///
    /// An exact match on the virtual path wins over prefix rewriting.
    /// Everything else is real, with the strip prefix restored in front.
    ///
    /// The virtual path is only reserved while manifest emulation is on.
    /// Unlike an unconditional exact match, with emulation off there is no
    /// content to serve, so that path is routed to the real filesystem like
    /// any other.
    pub fn classify(&self, path: &str) -> Route {
        if self.virtual_path.as_deref() == Some(path) {
            return Route::Virtual(path.to_string());
        }
        Route::Real(self.real_path(path))
    }

    /// Inverse of manifest prefix stripping.
    pub fn real_path(&self, path: &str) -> PathBuf {
        match &self.strip_prefix {
            Some(prefix) => PathBuf::from(format!("{prefix}{path}")),
            None => PathBuf::from(path),
        }
    }
}

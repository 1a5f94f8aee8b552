//! Startup configuration for the playlist filesystem.
//!
//! [`M3uConfig`] is built once from validated CLI input and never mutated
//! afterwards, so it can be shared freely between concurrent requests.

use crate::error::{M3uError, M3uResult};
use std::path::{Path, PathBuf};

/// Immutable configuration describing which playlist to expose and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M3uConfig {
    manifest_path: PathBuf,
    mount_name: String,
    virtual_path: String,
    strip_prefix: Option<String>,
    emulate_manifest: bool,
}

impl M3uConfig {
    /// Creates a configuration for the given playlist.
    ///
    /// A non-empty `strip_prefix` forces `emulate_manifest` on. An empty
    /// prefix is treated as no prefix.
    ///
    /// # Errors
    ///
    /// Returns [`M3uError::Config`] if the manifest path has no final
    /// component to name the virtual file after.
    pub fn new(
        manifest_path: impl Into<PathBuf>,
        strip_prefix: Option<String>,
        emulate_manifest: bool,
    ) -> M3uResult<Self> {
        let manifest_path = manifest_path.into();
        let mount_name = manifest_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                M3uError::Config(format!(
                    "manifest path has no file name: {}",
                    manifest_path.display()
                ))
            })?;

        let strip_prefix = strip_prefix.filter(|p| !p.is_empty());
        let emulate_manifest = emulate_manifest || strip_prefix.is_some();

        Ok(Self {
            virtual_path: format!("/{mount_name}"),
            manifest_path,
            mount_name,
            strip_prefix,
            emulate_manifest,
        })
    }

    /// Path of the playlist file on the real filesystem.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Name of the virtual manifest file in the mount root.
    pub fn mount_name(&self) -> &str {
        &self.mount_name
    }

    /// The single reserved path (`"/" + mount_name`).
    pub fn virtual_path(&self) -> &str {
        &self.virtual_path
    }

    pub fn strip_prefix(&self) -> Option<&str> {
        self.strip_prefix.as_deref()
    }

    pub fn emulate_manifest(&self) -> bool {
        self.emulate_manifest
    }

    /// Real path whose metadata is borrowed for the virtual manifest file.
    ///
    /// This is the strip prefix when one is configured, otherwise the
    /// playlist file itself.
    pub fn reference_path(&self) -> &Path {
        self.strip_prefix
            .as_deref()
            .map_or(self.manifest_path.as_path(), Path::new)
    }
}

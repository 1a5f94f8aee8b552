//! Path-based filesystem operations.
//!
//! [`Operations`] is the dispatch facade handed to a transport. Each verb
//! takes a mount path, runs it through the shared [`PathRouter`], and
//! either answers from the manifest or delegates to [`RealFs`].
//!
//! | Verb | Virtual path | Real path |
//! |------|--------------|-----------|
//! | readdir | (listing is never routed) | (listing is never routed) |
//! | getattr | donor stat, re-typed as a file | lstat |
//! | read | slice of the rewritten manifest | positional read on the handle |
//! | open | read-only virtual handle | open(2) |
//! | chown, chmod, readlink, mkdir, mknod | attempted on the virtual path string | forwarded |

use crate::attr::{FileStat, real_attributes, virtual_attributes};
use crate::config::M3uConfig;
use crate::error::{M3uError, M3uResult};
use crate::listing::list_directory;
use crate::manifest::read_rewritten;
use crate::realfs::{HostFs, RealFs};
use crate::router::{PathRouter, Route};
use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// An open file as seen by the facade.
#[derive(Debug)]
pub enum OpenHandle {
    /// The synthesized manifest. Reads are served from memory.
    Virtual,
    /// A real file, closed when the handle is dropped.
    Real(File),
}

impl OpenHandle {
    pub fn is_virtual(&self) -> bool {
        matches!(self, OpenHandle::Virtual)
    }
}

/// Filesystem verbs over a playlist-backed namespace.
///
/// Holds only immutable state after construction, so a single instance can
/// serve concurrent requests by shared reference.
#[derive(Debug)]
pub struct Operations<F = HostFs> {
    config: M3uConfig,
    router: PathRouter,
    /// Rewritten manifest text, present when emulation is on.
    manifest_text: Option<Box<[u8]>>,
    fs: F,
}

impl Operations<HostFs> {
    /// Creates operations backed by the host filesystem.
    ///
    /// # Errors
    ///
    /// With emulation on, fails with [`M3uError::ManifestUnavailable`] if the
    /// manifest cannot be read to build the virtual file's content.
    pub fn new(config: M3uConfig) -> M3uResult<Self> {
        Self::with_fs(config, HostFs)
    }
}

impl<F: RealFs> Operations<F> {
    /// Creates operations over a custom [`RealFs`].
    pub fn with_fs(config: M3uConfig, fs: F) -> M3uResult<Self> {
        let manifest_text = if config.emulate_manifest() {
            let text = read_rewritten(config.manifest_path(), config.strip_prefix())?;
            debug!(bytes = text.len(), "rewritten manifest loaded");
            Some(text.into_bytes().into_boxed_slice())
        } else {
            None
        };

        Ok(Self {
            router: PathRouter::new(&config),
            config,
            manifest_text,
            fs,
        })
    }

    pub fn config(&self) -> &M3uConfig {
        &self.config
    }

    pub fn router(&self) -> &PathRouter {
        &self.router
    }

    /// Content served for the virtual manifest file.
    pub fn manifest_text(&self) -> &[u8] {
        self.manifest_text.as_deref().unwrap_or_default()
    }

    fn route(&self, op: &'static str, path: &str) -> Route {
        let route = self.router.classify(path);
        debug!(op, path, ?route, "route");
        route
    }

    /// Child names of `path`, recomputed from the manifest on every call.
    pub fn readdir(&self, path: &str) -> M3uResult<BTreeSet<String>> {
        debug!(path, "readdir");
        list_directory(&self.config, path)
    }

    pub fn getattr(&self, path: &str) -> M3uResult<FileStat> {
        match self.route("getattr", path) {
            Route::Virtual(_) => virtual_attributes(&self.fs, self.config.reference_path()),
            Route::Real(real) => real_attributes(&self.fs, &real),
        }
    }

    /// Reads up to `size` bytes at `offset`.
    ///
    /// For the virtual file the range is clamped to the content, so reading
    /// past the end returns fewer bytes or none.
    pub fn read(
        &self,
        path: &str,
        handle: &OpenHandle,
        offset: u64,
        size: usize,
    ) -> M3uResult<Vec<u8>> {
        match (self.route("read", path), handle) {
            (Route::Virtual(_), _) => Ok(self.read_virtual(offset, size).to_vec()),
            (Route::Real(real), OpenHandle::Real(file)) => self
                .fs
                .read_at(file, offset, size)
                .map_err(|e| M3uError::from_real(real, e)),
            (Route::Real(_), OpenHandle::Virtual) => {
                Err(io::Error::from_raw_os_error(libc::EBADF).into())
            }
        }
    }

    /// Byte range of the rewritten manifest, clamped to its bounds.
    pub fn read_virtual(&self, offset: u64, size: usize) -> &[u8] {
        let text = self.manifest_text();
        let start = usize::try_from(offset).map_or(text.len(), |o| o.min(text.len()));
        let end = start.saturating_add(size).min(text.len());
        &text[start..end]
    }

    /// Opens `path`.
    ///
    /// The virtual file only supports read access; asking for write access
    /// fails with `EACCES`.
    pub fn open(&self, path: &str, flags: i32) -> M3uResult<OpenHandle> {
        match self.route("open", path) {
            Route::Virtual(_) => {
                if flags & libc::O_ACCMODE != libc::O_RDONLY {
                    return Err(io::Error::from_raw_os_error(libc::EACCES).into());
                }
                Ok(OpenHandle::Virtual)
            }
            Route::Real(real) => self
                .fs
                .open(&real, flags)
                .map(OpenHandle::Real)
                .map_err(|e| M3uError::from_real(real, e)),
        }
    }

    /// Releases a handle obtained from [`open`](Self::open).
    pub fn release(&self, path: &str, handle: OpenHandle) {
        debug!(path, virtual_handle = handle.is_virtual(), "release");
        drop(handle);
    }

    pub fn chown(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> M3uResult<()> {
        let route = self.route("chown", path);
        let target = route.delegate_path();
        self.fs
            .chown(target, uid, gid)
            .map_err(|e| M3uError::from_real(target, e))
    }

    pub fn chmod(&self, path: &str, mode: u32) -> M3uResult<()> {
        let route = self.route("chmod", path);
        let target = route.delegate_path();
        self.fs
            .chmod(target, mode)
            .map_err(|e| M3uError::from_real(target, e))
    }

    pub fn readlink(&self, path: &str) -> M3uResult<PathBuf> {
        let route = self.route("readlink", path);
        let target = route.delegate_path();
        self.fs
            .readlink(target)
            .map_err(|e| M3uError::from_real(target, e))
    }

    pub fn mkdir(&self, path: &str, mode: u32) -> M3uResult<()> {
        let route = self.route("mkdir", path);
        let target = route.delegate_path();
        self.fs
            .mkdir(target, mode)
            .map_err(|e| M3uError::from_real(target, e))
    }

    pub fn mknod(&self, path: &str, mode: u32, rdev: u64) -> M3uResult<()> {
        let route = self.route("mknod", path);
        let target = route.delegate_path();
        self.fs
            .mknod(target, mode, rdev)
            .map_err(|e| M3uError::from_real(target, e))
    }
}

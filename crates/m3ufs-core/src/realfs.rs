//! Access to the real filesystem behind rewritten paths.
//!
//! [`RealFs`] is the seam between routing logic and actual syscalls.
//! [`HostFs`] forwards to the host kernel; tests and embedders can supply
//! their own implementation.

use crate::attr::FileStat;
use nix::sys::stat::{Mode, SFlag};
use std::fs::{self, DirBuilder, File, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, FileExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Primitive operations on real paths.
///
/// Implementations must be shareable across concurrently dispatched
/// requests.
pub trait RealFs: Send + Sync {
    /// Stats `path` without following a final symlink.
    fn lstat(&self, path: &Path) -> io::Result<FileStat>;

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Changes ownership; `None` leaves that id unchanged.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()>;

    fn readlink(&self, path: &Path) -> io::Result<PathBuf>;

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Creates a filesystem node. `mode` carries both type and permission bits.
    fn mknod(&self, path: &Path, mode: u32, rdev: u64) -> io::Result<()>;

    /// Opens `path` with `open(2)` style flags.
    fn open(&self, path: &Path, flags: i32) -> io::Result<File>;

    /// Reads up to `size` bytes at `offset`. Short reads are returned as is.
    fn read_at(&self, file: &File, offset: u64, size: usize) -> io::Result<Vec<u8>>;
}

/// [`RealFs`] backed by the host operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

impl RealFs for HostFs {
    fn lstat(&self, path: &Path) -> io::Result<FileStat> {
        fs::symlink_metadata(path).map(|meta| FileStat::from(&meta))
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, Permissions::from_mode(mode))
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        std::os::unix::fs::chown(path, uid, gid)
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        DirBuilder::new().mode(mode).create(path)
    }

    fn mknod(&self, path: &Path, mode: u32, rdev: u64) -> io::Result<()> {
        let kind = SFlag::from_bits_truncate((mode & libc::S_IFMT as u32) as libc::mode_t);
        let perm = Mode::from_bits_truncate((mode & 0o7777) as libc::mode_t);
        nix::sys::stat::mknod(path, kind, perm, rdev as libc::dev_t).map_err(io::Error::from)
    }

    fn open(&self, path: &Path, flags: i32) -> io::Result<File> {
        let mut options = OpenOptions::new();
        match flags & libc::O_ACCMODE {
            libc::O_WRONLY => {
                options.write(true);
            }
            libc::O_RDWR => {
                options.read(true).write(true);
            }
            _ => {
                options.read(true);
            }
        }
        if flags & libc::O_APPEND != 0 {
            options.append(true);
        }
        if flags & libc::O_TRUNC != 0 {
            options.truncate(true);
        }
        options.custom_flags(
            flags & !(libc::O_ACCMODE | libc::O_APPEND | libc::O_TRUNC | libc::O_CREAT),
        );
        options.open(path)
    }

    fn read_at(&self, file: &File, offset: u64, size: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let n = file.read_at(&mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }
}

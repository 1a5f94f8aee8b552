//! File attributes for real paths and for the virtual manifest file.
//!
//! The virtual manifest has no inode of its own. Its attributes are
//! borrowed from a donor path (the strip prefix, normally a directory) and
//! re-typed as a regular file. Permission bits, owner, times, link count
//! and size all come from the donor unchanged.

use crate::error::{M3uError, M3uResult};
use crate::realfs::RealFs;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Type bit for regular files.
pub const S_IFREG: u32 = libc::S_IFREG as u32;
/// Type bit for directories.
pub const S_IFDIR: u32 = libc::S_IFDIR as u32;
/// Mask of all file type bits.
pub const S_IFMT: u32 = libc::S_IFMT as u32;

/// The subset of `stat` fields exposed through the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub atime: SystemTime,
    pub ctime: SystemTime,
    pub mtime: SystemTime,
    pub gid: u32,
    pub uid: u32,
    /// Type and permission bits, as in `st_mode`.
    pub mode: u32,
    pub nlink: u64,
    pub size: u64,
}

impl FileStat {
    /// Permission bits (including setuid/setgid/sticky).
    pub fn perm(&self) -> u16 {
        (self.mode & 0o7777) as u16
    }

    /// File type bits.
    pub fn file_type(&self) -> u32 {
        self.mode & S_IFMT
    }

    /// Presents this record as a regular file.
    ///
    /// Sets the regular-file bit and clears the directory bit. Permission
    /// bits are left alone.
    #[must_use]
    pub fn as_regular_file(mut self) -> Self {
        self.mode = (self.mode | S_IFREG) & !S_IFDIR;
        self
    }
}

impl From<&Metadata> for FileStat {
    fn from(meta: &Metadata) -> Self {
        Self {
            atime: unix_time(meta.atime(), meta.atime_nsec()),
            ctime: unix_time(meta.ctime(), meta.ctime_nsec()),
            mtime: unix_time(meta.mtime(), meta.mtime_nsec()),
            gid: meta.gid(),
            uid: meta.uid(),
            mode: meta.mode(),
            nlink: meta.nlink(),
            size: meta.size(),
        }
    }
}

fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = Duration::from_nanos(nsecs.clamp(0, 999_999_999) as u64);
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64) + nanos
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + nanos
    }
}

/// Attributes for the virtual manifest file, borrowed from `reference_path`.
///
/// # Errors
///
/// Returns [`M3uError::ReferenceUnavailable`] if the donor cannot be stat'ed.
pub fn virtual_attributes<F: RealFs + ?Sized>(
    fs: &F,
    reference_path: &Path,
) -> M3uResult<FileStat> {
    let stat = fs
        .lstat(reference_path)
        .map_err(|source| M3uError::ReferenceUnavailable {
            path: reference_path.to_path_buf(),
            source,
        })?;
    Ok(stat.as_regular_file())
}

/// Attributes of a real path, without overrides.
pub fn real_attributes<F: RealFs + ?Sized>(fs: &F, real_path: &Path) -> M3uResult<FileStat> {
    fs.lstat(real_path)
        .map_err(|e| M3uError::from_real(real_path, e))
}

//! FUSE filesystem implementation for playlist mounts.
//!
//! This module implements the fuser `Filesystem` trait on top of the
//! path-based [`Operations`] facade. Every callback resolves its inode to a
//! mount path through the [`InodeTable`] and hands that path to the facade,
//! which applies the routing rules.
//!
//! ## Operation Summary
//!
//! | Operation | Notes |
//! |-----------|-------|
//! | lookup | getattr on the joined child path |
//! | forget/batch_forget | decrements nlookup, evicts at 0 |
//! | getattr | virtual file or lstat of the real path |
//! | setattr | mode/uid/gid forwarded; size refused with EROFS; times ignored |
//! | readlink, mkdir, mknod | forwarded to the real path |
//! | open/read/release | virtual file opened with direct I/O |
//! | write | EROFS |
//! | opendir/readdir/releasedir | listing synthesized from the playlist |
//! | getxattr/listxattr | ENOSYS |

use crate::config::MountConfig;
use crate::handles::{FuseHandle, FuseHandleTable};
use crate::inode::{InodeTable, ROOT_INODE, child_path, parent_path};
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use m3ufs_core::attr::S_IFMT;
use m3ufs_core::listing::{DOT, DOTDOT};
use m3ufs_core::{FileStat, Operations, RealFs};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::time::SystemTime;
use tracing::{debug, info, trace};

/// Block size reported in attributes.
const BLOCK_SIZE: u32 = 4096;

/// A listed directory entry: inode, type hint, name.
pub type DirEntry = (u64, FileType, String);

/// FUSE filesystem exposing a playlist as a directory tree.
pub struct M3uFS<F: RealFs = m3ufs_core::HostFs> {
    /// Path-based operations (routing, listing, attribute emulation).
    ops: Operations<F>,
    /// Inode table for path/inode mapping.
    inodes: InodeTable,
    /// Open file handles.
    handles: FuseHandleTable,
    config: MountConfig,
}

impl<F: RealFs> M3uFS<F> {
    pub fn new(ops: Operations<F>, config: MountConfig) -> Self {
        Self {
            ops,
            inodes: InodeTable::new(),
            handles: FuseHandleTable::new(),
            config,
        }
    }

    pub fn operations(&self) -> &Operations<F> {
        &self.ops
    }

    fn path_of(&self, ino: u64) -> Result<String, c_int> {
        self.inodes.path(ino).ok_or(libc::ENOENT)
    }

    fn child_of(&self, parent: u64, name: &OsStr) -> Result<String, c_int> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        Ok(child_path(&self.path_of(parent)?, name))
    }

    /// Attributes for an already known inode.
    fn attr_of(&self, ino: u64) -> Result<FileAttr, c_int> {
        let path = self.path_of(ino)?;
        let stat = self.ops.getattr(&path).map_err(|e| e.to_errno())?;
        Ok(file_attr(ino, &stat))
    }

    /// Resolves `path` and counts a kernel lookup reference on success.
    fn lookup_path(&self, path: &str) -> Result<FileAttr, c_int> {
        let stat = self.ops.getattr(path).map_err(|e| e.to_errno())?;
        let ino = self.inodes.get_or_insert(path);
        Ok(file_attr(ino, &stat))
    }

    /// Synthesizes the entries of directory `ino`.
    ///
    /// Child types come from a stat of each child and fall back to a
    /// regular file when the child cannot be stat'ed.
    fn directory_entries(&self, ino: u64) -> Result<Vec<DirEntry>, c_int> {
        let path = self.path_of(ino)?;
        let names = self.ops.readdir(&path).map_err(|e| e.to_errno())?;

        let entries = names
            .into_iter()
            .map(|name| match name.as_str() {
                DOT => (ino, FileType::Directory, name),
                DOTDOT => {
                    let parent = self
                        .inodes
                        .get_inode(parent_path(&path))
                        .unwrap_or(ROOT_INODE);
                    (parent, FileType::Directory, name)
                }
                _ => {
                    let child = child_path(&path, &name);
                    let kind = self
                        .ops
                        .getattr(&child)
                        .map_or(FileType::RegularFile, |stat| file_type_of(stat.mode));
                    (self.inodes.get_or_insert_no_lookup_inc(&child), kind, name)
                }
            })
            .collect();
        Ok(entries)
    }

    fn apply_setattr(
        &self,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
    ) -> Result<FileAttr, c_int> {
        let path = self.path_of(ino)?;
        if size.is_some() {
            return Err(libc::EROFS);
        }
        if let Some(mode) = mode {
            self.ops.chmod(&path, mode).map_err(|e| e.to_errno())?;
        }
        if uid.is_some() || gid.is_some() {
            self.ops.chown(&path, uid, gid).map_err(|e| e.to_errno())?;
        }
        self.attr_of(ino)
    }

    fn open_path(&self, ino: u64, flags: i32) -> Result<(u64, u32), c_int> {
        let path = self.path_of(ino)?;
        let handle = self.ops.open(&path, flags).map_err(|e| e.to_errno())?;
        // The virtual file borrows its size from the donor, so the kernel
        // must not clamp reads to it.
        let open_flags = if handle.is_virtual() {
            fuser::consts::FOPEN_DIRECT_IO
        } else {
            0
        };
        let fh = self.handles.insert(FuseHandle { path, handle });
        Ok((fh, open_flags))
    }

    fn read_handle(&self, fh: u64, offset: i64, size: u32) -> Result<Vec<u8>, c_int> {
        let offset = u64::try_from(offset).map_err(|_| libc::EINVAL)?;
        let handle = self.handles.get(fh).ok_or(libc::EBADF)?;
        self.ops
            .read(&handle.path, &handle.handle, offset, size as usize)
            .map_err(|e| e.to_errno())
    }
}

/// Maps `st_mode` type bits to a FUSE file type.
pub fn file_type_of(mode: u32) -> FileType {
    match (mode & S_IFMT) as libc::mode_t {
        libc::S_IFDIR => FileType::Directory,
        libc::S_IFLNK => FileType::Symlink,
        libc::S_IFCHR => FileType::CharDevice,
        libc::S_IFBLK => FileType::BlockDevice,
        libc::S_IFIFO => FileType::NamedPipe,
        libc::S_IFSOCK => FileType::Socket,
        _ => FileType::RegularFile,
    }
}

/// Builds a FUSE attribute record from a stat subset.
pub fn file_attr(ino: u64, stat: &FileStat) -> FileAttr {
    FileAttr {
        ino,
        size: stat.size,
        blocks: stat.size.div_ceil(512),
        atime: stat.atime,
        mtime: stat.mtime,
        ctime: stat.ctime,
        crtime: stat.ctime,
        kind: file_type_of(stat.mode),
        perm: stat.perm(),
        nlink: u32::try_from(stat.nlink).unwrap_or(u32::MAX),
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

impl<F: RealFs> Filesystem for M3uFS<F> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!(
            manifest = %self.ops.config().manifest_path().display(),
            virtual_path = self.ops.config().emulate_manifest().then(|| self.ops.config().virtual_path()),
            "FUSE filesystem initialized"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        info!(open_handles = self.handles.len(), "FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent, ?name, "lookup");
        match self.child_of(parent, name).and_then(|path| self.lookup_path(&path)) {
            Ok(attr) => reply.entry(&self.config.attr_ttl, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        trace!(inode = ino, nlookup, "forget");
        self.inodes.forget(ino, nlookup);
    }

    fn batch_forget(&mut self, _req: &Request<'_>, nodes: &[fuser::fuse_forget_one]) {
        trace!(count = nodes.len(), "batch_forget");
        for node in nodes {
            self.inodes.forget(node.nodeid, node.nlookup);
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");
        match self.attr_of(ino) {
            Ok(attr) => reply.attr(&self.config.attr_ttl, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!(inode = ino, ?mode, ?uid, ?gid, ?size, "setattr");
        match self.apply_setattr(ino, mode, uid, gid, size) {
            Ok(attr) => reply.attr(&self.config.attr_ttl, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        trace!(inode = ino, "readlink");
        let result = self
            .path_of(ino)
            .and_then(|path| self.ops.readlink(&path).map_err(|e| e.to_errno()));
        match result {
            Ok(target) => reply.data(target.as_os_str().as_bytes()),
            Err(errno) => reply.error(errno),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent, ?name, mode, rdev, "mknod");
        let result = self.child_of(parent, name).and_then(|path| {
            self.ops
                .mknod(&path, mode & !umask, u64::from(rdev))
                .map_err(|e| e.to_errno())?;
            self.lookup_path(&path)
        });
        match result {
            Ok(attr) => reply.entry(&self.config.attr_ttl, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        trace!(parent, ?name, mode, "mkdir");
        let result = self.child_of(parent, name).and_then(|path| {
            self.ops
                .mkdir(&path, mode & !umask)
                .map_err(|e| e.to_errno())?;
            self.lookup_path(&path)
        });
        match result {
            Ok(attr) => reply.entry(&self.config.attr_ttl, &attr, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, flags, "open");
        match self.open_path(ino, flags) {
            Ok((fh, open_flags)) => reply.opened(fh, open_flags),
            Err(errno) => {
                debug!(inode = ino, errno, "open failed");
                reply.error(errno);
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, fh, offset, size, "read");
        match self.read_handle(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(errno) => reply.error(errno),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!(inode = ino, fh, offset, size = data.len(), "write");
        reply.error(libc::EROFS);
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(fh, "release");
        if let Some(FuseHandle { path, handle }) = self.handles.remove(fh) {
            self.ops.release(&path, handle);
        }
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, "opendir");
        if self.inodes.get(ino).is_some() {
            reply.opened(0, 0);
        } else {
            reply.error(libc::ENOENT);
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(inode = ino, offset, "readdir");

        // The listing is recomputed on every call; BTreeSet ordering keeps
        // offsets stable as long as the playlist does not change in between.
        let entries = match self.directory_entries(ino) {
            Ok(entries) => entries,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (entry_ino, kind, name)) in entries.iter().enumerate().skip(skip) {
            // reply.add returns true when the buffer is full
            if reply.add(*entry_ino, (i + 1) as i64, *kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok();
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _name: &OsStr,
        _size: u32,
        reply: fuser::ReplyXattr,
    ) {
        reply.error(libc::ENOSYS);
    }

    fn listxattr(&mut self, _req: &Request<'_>, _ino: u64, _size: u32, reply: fuser::ReplyXattr) {
        reply.error(libc::ENOSYS);
    }
}

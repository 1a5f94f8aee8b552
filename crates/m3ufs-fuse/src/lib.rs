//! FUSE filesystem for m3u playlists.
//!
//! Mounts a playlist as a read-mostly directory tree: the directories are
//! synthesized from the playlist entries, file content and attributes come
//! from the real files, and the playlist itself can appear at the root with
//! its paths rewritten relative to the mount.
//!
//! # Usage
//!
//! ```ignore
//! use m3ufs_core::{M3uConfig, Operations};
//! use m3ufs_fuse::{M3uFS, MountConfig};
//!
//! let config = M3uConfig::new("road.m3u", Some("/music".into()), true)?;
//! let mount = MountConfig::default();
//! let options = mount.mount_options();
//! let fs = M3uFS::new(Operations::new(config)?, mount);
//! let session = fuser::spawn_mount2(fs, "/mnt/road", &options)?;
//! ```

pub mod config;
pub mod filesystem;
pub mod handles;
pub mod inode;

pub use config::MountConfig;
pub use filesystem::M3uFS;
pub use handles::{FuseHandle, FuseHandleTable};
pub use inode::{InodeEntry, InodeTable, ROOT_INODE};

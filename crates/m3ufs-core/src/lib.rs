//! Core of the m3u playlist filesystem.
//!
//! A playlist (one absolute media path per line) is exposed as a directory
//! tree mirroring the path components it lists. Content and metadata of
//! listed files come straight from the real filesystem; optionally the mount
//! root also contains a copy of the playlist with a path prefix stripped, so
//! players opening it see paths relative to the mount.
//!
//! # Usage
//!
//! ```ignore
//! use m3ufs_core::{M3uConfig, Operations};
//!
//! let config = M3uConfig::new("/home/me/road.m3u", Some("/srv/music".into()), true)?;
//! let ops = Operations::new(config)?;
//! let names = ops.readdir("/")?;
//! ```

pub mod attr;
pub mod config;
pub mod error;
pub mod listing;
pub mod manifest;
pub mod ops;
pub mod realfs;
pub mod router;

pub use attr::FileStat;
pub use config::M3uConfig;
pub use error::{M3uError, M3uResult, ToErrno};
pub use ops::{OpenHandle, Operations};
pub use realfs::{HostFs, RealFs};
pub use router::{PathRouter, Route};

//! Test mount harness for FUSE integration tests.
//!
//! `TestMount` builds a small music library and playlist in a temp dir,
//! mounts the playlist, and unmounts on drop.

// Not all tests use all TestMount methods
#![allow(dead_code)]

use fuser::{BackgroundSession, MountOption};
use m3ufs_core::{M3uConfig, Operations};
use m3ufs_fuse::{M3uFS, MountConfig};
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// How long to wait for mount to become ready.
const MOUNT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait between mount readiness checks.
const MOUNT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Name of the playlist file inside the temp dir.
pub const PLAYLIST_NAME: &str = "road.m3u";

/// A mounted playlist for testing.
pub struct TestMount {
    /// The FUSE session (unmounts on drop).
    _session: BackgroundSession,
    pub mount_path: PathBuf,
    /// Real files behind the playlist entries.
    pub library: PathBuf,
    _temp: TempDir,
}

impl TestMount {
    /// Mounts a playlist over `music/song1.mp3` and `music/sub/song2.mp3`
    /// with the library directory stripped from every entry.
    pub fn with_stripped_library() -> Result<Self, String> {
        let temp = TempDir::new().map_err(|e| format!("Failed to create temp dir: {e}"))?;
        let library = temp.path().join("music");
        fs::create_dir_all(library.join("sub")).map_err(|e| e.to_string())?;
        fs::write(library.join("song1.mp3"), b"first song").map_err(|e| e.to_string())?;
        fs::write(library.join("sub/song2.mp3"), b"second").map_err(|e| e.to_string())?;

        let prefix = library.to_string_lossy().into_owned();
        let playlist = temp.path().join(PLAYLIST_NAME);
        fs::write(
            &playlist,
            format!("#EXTM3U\n{prefix}/song1.mp3\n{prefix}/sub/song2.mp3\n"),
        )
        .map_err(|e| e.to_string())?;

        let mount_path = temp.path().join("mnt");
        fs::create_dir(&mount_path).map_err(|e| format!("Failed to create mount point: {e}"))?;

        let config = M3uConfig::new(&playlist, Some(prefix), true).map_err(|e| e.to_string())?;
        let ops = Operations::new(config).map_err(|e| e.to_string())?;
        let fs = M3uFS::new(ops, MountConfig::default().fs_name("m3ufs-test"));

        let options = vec![
            MountOption::FSName("m3ufs-test".to_string()),
            MountOption::AutoUnmount,
        ];

        let session = fuser::spawn_mount2(fs, &mount_path, &options)
            .map_err(|e| format!("Failed to mount: {e}"))?;

        Self::wait_for_mount(&mount_path)?;

        Ok(Self {
            _session: session,
            mount_path,
            library,
            _temp: temp,
        })
    }

    /// Wait until the mount point's device differs from its parent's.
    fn wait_for_mount(mount_path: &Path) -> Result<(), String> {
        let parent_dev = mount_path
            .parent()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.dev())
            .ok_or_else(|| "Failed to stat mount parent".to_string())?;

        let deadline = Instant::now() + MOUNT_READY_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(mount_meta) = fs::metadata(mount_path)
                && mount_meta.dev() != parent_dev
            {
                return Ok(());
            }
            thread::sleep(MOUNT_CHECK_INTERVAL);
        }
        Err("Mount did not become ready in time (device ID unchanged)".to_string())
    }

    /// Build a full path from a relative path.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.mount_path.join(relative.trim_start_matches('/'))
    }

    pub fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path(path))
    }

    pub fn symlink_metadata(&self, path: &str) -> io::Result<Metadata> {
        fs::symlink_metadata(self.path(path))
    }

    /// List directory entries (names only, sorted).
    pub fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(self.path(path))?
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Check if FUSE is available on this system.
pub fn fuse_available() -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new("/dev/fuse").exists()
    }
    #[cfg(target_os = "macos")]
    {
        Path::new("/Library/Filesystems/macfuse.fs").exists()
            || Path::new("/Library/Filesystems/osxfuse.fs").exists()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        false
    }
}

/// Skip test if FUSE is not available.
#[macro_export]
macro_rules! skip_if_no_fuse {
    () => {
        if !$crate::common::fuse_available() {
            eprintln!("Skipping test: FUSE not available on this system");
            return;
        }
    };
}

/// Skip test if mounting fails (common in CI environments).
#[macro_export]
macro_rules! require_mount {
    ($mount_result:expr) => {
        match $mount_result {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Skipping test: {}", e);
                return;
            }
        }
    };
}

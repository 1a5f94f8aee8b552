//! Mount configuration for the FUSE filesystem.

use fuser::MountOption;
use std::time::Duration;

/// Default kernel attribute/entry cache TTL.
///
/// Kept short: listings are recomputed from the playlist on every request
/// and the kernel should not hide edits for long.
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(1);

/// Options controlling how the playlist tree is presented to the kernel.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Time-to-live the kernel may cache attributes and lookups for.
    pub attr_ttl: Duration,

    /// Let users other than the mounting one access the tree.
    ///
    /// Non-root users need `user_allow_other` in `/etc/fuse.conf`.
    pub allow_other: bool,

    /// Filesystem name shown in the mount table.
    pub fs_name: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            attr_ttl: DEFAULT_ATTR_TTL,
            allow_other: false,
            fs_name: "m3ufs".to_string(),
        }
    }
}

impl MountConfig {
    /// Sets the cache TTL for attributes and entries.
    #[must_use]
    pub fn attr_ttl(mut self, ttl: Duration) -> Self {
        self.attr_ttl = ttl;
        self
    }

    #[must_use]
    pub fn allow_other(mut self, allow: bool) -> Self {
        self.allow_other = allow;
        self
    }

    #[must_use]
    pub fn fs_name(mut self, name: impl Into<String>) -> Self {
        self.fs_name = name.into();
        self
    }

    /// Options passed to `fuser` when mounting.
    pub fn mount_options(&self) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName(self.fs_name.clone()),
            MountOption::Subtype("m3ufs".to_string()),
        ];

        if self.allow_other {
            options.push(MountOption::AllowOther);
            options.push(MountOption::AutoUnmount);
        }

        #[cfg(target_os = "macos")]
        options.push(MountOption::CUSTOM(format!("volname={}", self.fs_name)));

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MountConfig::default();
        assert_eq!(config.attr_ttl, Duration::from_secs(1));
        assert!(!config.allow_other);
        assert_eq!(config.fs_name, "m3ufs");
    }

    #[test]
    fn test_builder_pattern() {
        let config = MountConfig::default()
            .attr_ttl(Duration::from_secs(5))
            .allow_other(true)
            .fs_name("m3ufs:road.m3u");
        assert_eq!(config.attr_ttl, Duration::from_secs(5));
        assert!(config.allow_other);
        assert_eq!(config.fs_name, "m3ufs:road.m3u");
    }

    #[test]
    fn test_mount_options() {
        let options = MountConfig::default().mount_options();
        assert!(options.contains(&MountOption::FSName("m3ufs".to_string())));
        assert!(!options.contains(&MountOption::AllowOther));

        let options = MountConfig::default().allow_other(true).mount_options();
        assert!(options.contains(&MountOption::AllowOther));
        assert!(options.contains(&MountOption::AutoUnmount));
    }
}

//! Directory listings derived from the manifest.
//!
//! There is no tree structure. Each listing rereads the manifest and keeps
//! the entries that textually start with the directory path, then takes the
//! component just below that directory from each of them. This trades a
//! rescan per `readdir` for listings that always match the file on disk.
//!
//! The prefix match is not component-aware: listing `/a/b` also picks up
//! `/a/bc/d`, yielding `d`.

use crate::config::M3uConfig;
use crate::error::M3uResult;
use crate::manifest::read_entries;
use std::collections::BTreeSet;

/// Name of the directory itself.
pub const DOT: &str = ".";
/// Name of the parent directory.
pub const DOTDOT: &str = "..";

/// Lists the direct children of `path` from the current manifest.
pub fn list_directory(config: &M3uConfig, path: &str) -> M3uResult<BTreeSet<String>> {
    let entries = read_entries(config.manifest_path(), config.strip_prefix())?;
    let virtual_name = config.emulate_manifest().then(|| config.mount_name());
    Ok(synthesize_listing(&entries, path, virtual_name))
}

/// Derives the child names of `path` from a snapshot.
///
/// `virtual_name` is added at the root when manifest emulation is on.
pub fn synthesize_listing(
    entries: &[String],
    path: &str,
    virtual_name: Option<&str>,
) -> BTreeSet<String> {
    let dir = anchored(path);
    let depth = components(path).count();

    let mut listing: BTreeSet<String> = entries
        .iter()
        .filter(|entry| anchored(entry.as_str()).starts_with(&*dir))
        .filter_map(|entry| components(entry.as_str()).nth(depth))
        .map(str::to_string)
        .collect();

    listing.insert(DOT.to_string());
    listing.insert(DOTDOT.to_string());

    if depth == 0
        && let Some(name) = virtual_name
    {
        listing.insert(name.to_string());
    }

    listing
}

/// Named components of a slash-separated path.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

fn anchored(path: &str) -> std::borrow::Cow<'_, str> {
    if path.starts_with('/') {
        path.into()
    } else {
        format!("/{path}").into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn sample() -> Vec<String> {
        vec!["a/b/c".into(), "a/b/d".into(), "x/y".into()]
    }

    #[test]
    fn test_root_listing() {
        let listing = synthesize_listing(&sample(), "/", None);
        assert_eq!(listing, set(&["a", "x", ".", ".."]));
    }

    #[test]
    fn test_root_listing_with_virtual_file() {
        let listing = synthesize_listing(&sample(), "/", Some("list.m3u"));
        assert_eq!(listing, set(&["a", "x", ".", "..", "list.m3u"]));
    }

    #[test]
    fn test_nested_listing() {
        let entries = sample();
        assert_eq!(synthesize_listing(&entries, "a/b", None), set(&["c", "d", ".", ".."]));
        assert_eq!(synthesize_listing(&entries, "/a/b", None), set(&["c", "d", ".", ".."]));
    }

    #[test]
    fn test_virtual_file_only_at_root() {
        let listing = synthesize_listing(&sample(), "/a", Some("list.m3u"));
        assert_eq!(listing, set(&["b", ".", ".."]));
    }

    #[test]
    fn test_duplicates_collapse() {
        let entries = vec!["/a/1.mp3".into(), "/a/2.mp3".into(), "/a/1.mp3".into()];
        assert_eq!(synthesize_listing(&entries, "/", None), set(&["a", ".", ".."]));
    }

    #[test]
    fn test_partial_component_prefix_is_matched() {
        let entries = vec!["/a/b/c.mp3".into(), "/a/bc/d.mp3".into()];
        let listing = synthesize_listing(&entries, "/a/b", None);
        // `/a/bc/d.mp3` textually starts with `/a/b`.
        assert_eq!(listing, set(&["c.mp3", "d.mp3", ".", ".."]));
    }

    #[test]
    fn test_entry_equal_to_directory_is_bounded() {
        let entries = vec!["/a/b".into(), "/a/b/c".into()];
        assert_eq!(synthesize_listing(&entries, "/a/b", None), set(&["c", ".", ".."]));
    }

    #[test]
    fn test_empty_entries_are_ignored() {
        let entries = vec![String::new(), "/song.mp3".into()];
        assert_eq!(synthesize_listing(&entries, "/", None), set(&["song.mp3", ".", ".."]));
    }

    #[test]
    fn test_unrelated_directory_is_empty() {
        let listing = synthesize_listing(&sample(), "/nope", Some("list.m3u"));
        assert_eq!(listing, set(&[".", ".."]));
    }

    #[test]
    fn test_list_directory_rereads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("list.m3u");
        std::fs::write(&manifest, "#comment\n \n/music/song1.mp3\n/music/sub/song2.mp3\n").unwrap();
        let config = M3uConfig::new(&manifest, Some("/music".to_string()), false).unwrap();

        let listing = list_directory(&config, "/").unwrap();
        assert_eq!(listing, set(&["song1.mp3", "sub", ".", "..", "list.m3u"]));

        std::fs::write(&manifest, "/music/other/x.mp3\n").unwrap();
        let listing = list_directory(&config, "/").unwrap();
        assert_eq!(listing, set(&["other", ".", "..", "list.m3u"]));
    }
}

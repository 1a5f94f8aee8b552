//! Playlist parsing.
//!
//! The manifest is re-read on every call that needs it; nothing here keeps
//! state between calls. Two views are derived from the same file:
//!
//! - the **snapshot**, an ordered list of member paths used to synthesize
//!   directory listings, and
//! - the **rewritten text**, the byte content served for the virtual
//!   manifest file.
//!
//! Prefix handling differs slightly between the two. The snapshot cuts a
//! fixed number of characters (`strip_prefix.len()`) from every entry
//! without checking what is removed, so `/music/a.mp3` becomes `/a.mp3`.
//! The rewritten text removes `strip_prefix + "/"` only right after a
//! newline, so the same entry becomes `a.mp3`, a path relative to the mount
//! root where the virtual file lives. The first line has no newline in
//! front of it and is served unchanged.

use crate::error::{M3uError, M3uResult};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reads the ordered member paths of a manifest.
///
/// # Errors
///
/// Returns [`M3uError::ManifestUnavailable`] if the file cannot be read.
/// There is no partial result.
pub fn read_entries(manifest_path: &Path, strip_prefix: Option<&str>) -> M3uResult<Vec<String>> {
    let raw = read_raw(manifest_path)?;
    Ok(parse_entries(&raw, strip_prefix))
}

/// Reads the manifest and returns its rewritten text.
pub fn read_rewritten(manifest_path: &Path, strip_prefix: Option<&str>) -> M3uResult<String> {
    let raw = read_raw(manifest_path)?;
    Ok(rewrite_manifest(&raw, strip_prefix))
}

fn read_raw(manifest_path: &Path) -> M3uResult<String> {
    let bytes = fs::read(manifest_path).map_err(|source| M3uError::ManifestUnavailable {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses manifest text into entry paths, in file order.
///
/// Comment lines (first non-blank character `#`) and blank lines are
/// skipped. Every other line loses its first `strip_prefix.len()`
/// characters, then trailing whitespace. A line shorter than the prefix
/// yields an empty entry, which is kept.
pub fn parse_entries(raw: &str, strip_prefix: Option<&str>) -> Vec<String> {
    let cut = strip_prefix.map_or(0, |p| p.chars().count());

    raw.lines()
        .filter_map(|line| {
            debug!(line, "manifest line");
            let head = line.trim_start();
            if head.is_empty() || head.starts_with('#') {
                return None;
            }
            Some(skip_chars(line, cut).trim_end().to_string())
        })
        .collect()
}

/// Removes every `strip_prefix + "/"` that directly follows a newline.
///
/// Without a prefix the text is returned unchanged.
pub fn rewrite_manifest(raw: &str, strip_prefix: Option<&str>) -> String {
    match strip_prefix {
        Some(prefix) => raw.replace(&format!("\n{prefix}/"), "\n"),
        None => raw.to_string(),
    }
}

fn skip_chars(s: &str, n: usize) -> &str {
    s.char_indices().nth(n).map_or("", |(i, _)| &s[i..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let raw = "#EXTM3U\n\n   \n  # indented comment\n/a/b.mp3\n";
        assert_eq!(parse_entries(raw, None), vec!["/a/b.mp3"]);
    }

    #[test]
    fn test_preserves_order_and_duplicates() {
        let raw = "/z.mp3\n/a.mp3\n/z.mp3\n";
        assert_eq!(parse_entries(raw, None), vec!["/z.mp3", "/a.mp3", "/z.mp3"]);
    }

    #[test]
    fn test_trims_trailing_whitespace_only() {
        let raw = "  /a.mp3  \r\n/b.mp3\t\n";
        assert_eq!(parse_entries(raw, None), vec!["  /a.mp3", "/b.mp3"]);
    }

    #[test]
    fn test_prefix_is_a_fixed_length_cut() {
        let raw = "/music/song1.mp3\n/other/song2.mp3\n";
        let entries = parse_entries(raw, Some("/music"));
        // Nothing checks that the removed characters match the prefix.
        assert_eq!(entries, vec!["/song1.mp3", "/song2.mp3"]);
    }

    #[test]
    fn test_entry_shorter_than_prefix_becomes_empty() {
        let raw = "/mu\n/music/a.mp3\n";
        let entries = parse_entries(raw, Some("/music"));
        assert_eq!(entries, vec!["", "/a.mp3"]);
    }

    #[test]
    fn test_cut_counts_characters_not_bytes() {
        let raw = "/müsik/lied.mp3\n";
        let entries = parse_entries(raw, Some("/müsik"));
        assert_eq!(entries, vec!["/lied.mp3"]);
    }

    #[test]
    fn test_scenario_with_comment_and_blank() {
        let raw = "#comment\n \n/music/song1.mp3\n/music/sub/song2.mp3\n";
        let entries = parse_entries(raw, Some("/music"));
        assert_eq!(entries, vec!["/song1.mp3", "/sub/song2.mp3"]);
    }

    #[test]
    fn test_rewrite_without_prefix_is_identity() {
        let raw = "/a/b.mp3\n/c/d.mp3\n";
        assert_eq!(rewrite_manifest(raw, None), raw);
    }

    #[test]
    fn test_rewrite_strips_prefix_after_newline() {
        let raw = "#EXTM3U\n/music/a.mp3\n/music/sub/b.mp3\n/elsewhere/music/c.mp3\n";
        let rewritten = rewrite_manifest(raw, Some("/music"));
        assert_eq!(
            rewritten,
            "#EXTM3U\na.mp3\nsub/b.mp3\n/elsewhere/music/c.mp3\n"
        );
    }

    #[test]
    fn test_rewrite_leaves_first_line_alone() {
        let raw = "/music/a.mp3\n/music/b.mp3\n";
        assert_eq!(rewrite_manifest(raw, Some("/music")), "/music/a.mp3\nb.mp3\n");
    }

    #[test]
    fn test_rewrite_requires_separator_after_prefix() {
        let raw = "/musical/a.mp3\n";
        assert_eq!(rewrite_manifest(raw, Some("/music")), raw);
    }

    #[test]
    fn test_read_entries_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#EXTM3U").unwrap();
        writeln!(file, "/music/x/y.flac").unwrap();
        let entries = read_entries(file.path(), Some("/music")).unwrap();
        assert_eq!(entries, vec!["/x/y.flac"]);

        let text = read_rewritten(file.path(), Some("/music")).unwrap();
        assert_eq!(text, "#EXTM3U\nx/y.flac\n");
    }

    #[test]
    fn test_missing_manifest_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_entries(&dir.path().join("gone.m3u"), None).unwrap_err();
        assert!(matches!(err, M3uError::ManifestUnavailable { .. }));
        assert_eq!(err.to_errno(), libc::ENOENT);
    }
}

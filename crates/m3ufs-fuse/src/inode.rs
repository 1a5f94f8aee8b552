//! Inode management for the FUSE filesystem.
//!
//! The kernel speaks in inode numbers while the playlist logic works on
//! mount paths. This table keeps the bidirectional mapping plus the FUSE
//! `nlookup` reference count needed to honor `forget()`.

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use std::sync::atomic::{AtomicU64, Ordering};

/// The root inode number (FUSE convention).
pub const ROOT_INODE: u64 = 1;

/// Mount path of the root directory.
pub const ROOT_PATH: &str = "/";

/// An entry in the inode table.
#[derive(Debug)]
pub struct InodeEntry {
    /// Mount path (always absolute, no trailing slash except for the root).
    pub path: String,
    /// Lookup count for proper `forget()` handling.
    nlookup: AtomicU64,
}

impl InodeEntry {
    /// Creates a new inode entry with nlookup = 1.
    pub fn new(path: String) -> Self {
        Self {
            path,
            nlookup: AtomicU64::new(1),
        }
    }

    /// Creates an entry the kernel has not looked up yet (from `readdir()`).
    pub fn new_no_lookup(path: String) -> Self {
        Self {
            path,
            nlookup: AtomicU64::new(0),
        }
    }

    /// Increments the lookup count and returns the new value.
    pub fn inc_nlookup(&self) -> u64 {
        self.nlookup.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrements the lookup count by the given amount and returns the new value.
    /// Returns `None` if the count would go negative.
    pub fn dec_nlookup(&self, count: u64) -> Option<u64> {
        let old = self.nlookup.fetch_sub(count, Ordering::AcqRel);
        if old < count {
            self.nlookup.fetch_add(count, Ordering::Relaxed);
            None
        } else {
            Some(old - count)
        }
    }

    /// Returns the current lookup count.
    pub fn nlookup(&self) -> u64 {
        self.nlookup.load(Ordering::Relaxed)
    }
}

/// Thread-safe table mapping between inodes and mount paths.
pub struct InodeTable {
    path_to_inode: DashMap<String, u64>,
    entries: DashMap<u64, InodeEntry>,
    next_inode: AtomicU64,
}

impl InodeTable {
    /// Creates a new inode table with the root directory pre-allocated.
    pub fn new() -> Self {
        let table = Self {
            path_to_inode: DashMap::new(),
            entries: DashMap::new(),
            next_inode: AtomicU64::new(ROOT_INODE + 1),
        };
        table.path_to_inode.insert(ROOT_PATH.to_string(), ROOT_INODE);
        table
            .entries
            .insert(ROOT_INODE, InodeEntry::new(ROOT_PATH.to_string()));
        table
    }

    fn get_or_insert_with(&self, path: &str, make_entry: impl FnOnce() -> InodeEntry) -> u64 {
        if let Some(inode) = self.path_to_inode.get(path) {
            return *inode;
        }

        // Entry API avoids a TOCTOU race between concurrent lookups.
        *self
            .path_to_inode
            .entry(path.to_string())
            .or_insert_with(|| {
                let inode = self.next_inode.fetch_add(1, Ordering::Relaxed);
                self.entries.insert(inode, make_entry());
                inode
            })
    }

    /// Returns the inode for `path`, allocating one if needed, and
    /// increments its lookup count.
    pub fn get_or_insert(&self, path: &str) -> u64 {
        if let Some(inode) = self.get_inode(path) {
            if let Some(entry) = self.entries.get(&inode) {
                entry.inc_nlookup();
            }
            return inode;
        }
        self.get_or_insert_with(path, || InodeEntry::new(path.to_string()))
    }

    /// Returns the inode for `path` without counting a kernel reference.
    ///
    /// Plain `readdir()` replies do not add to nlookup.
    pub fn get_or_insert_no_lookup_inc(&self, path: &str) -> u64 {
        self.get_or_insert_with(path, || InodeEntry::new_no_lookup(path.to_string()))
    }

    /// Looks up an entry by inode number.
    pub fn get(&self, inode: u64) -> Option<Ref<'_, u64, InodeEntry>> {
        self.entries.get(&inode)
    }

    /// Returns a copy of the mount path for `inode`.
    pub fn path(&self, inode: u64) -> Option<String> {
        self.entries.get(&inode).map(|e| e.path.clone())
    }

    /// Looks up an inode by mount path.
    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode.get(path).map(|r| *r)
    }

    /// Decrements the lookup count for an inode.
    /// Returns `true` if the inode was evicted.
    pub fn forget(&self, inode: u64, nlookup: u64) -> bool {
        if inode == ROOT_INODE {
            return false;
        }

        if let Some(entry) = self.entries.get(&inode)
            && let Some(remaining) = entry.dec_nlookup(nlookup)
            && remaining == 0
        {
            drop(entry);
            return self.evict(inode);
        }
        false
    }

    fn evict(&self, inode: u64) -> bool {
        let Some((_, entry)) = self.entries.remove(&inode) else {
            return false;
        };
        self.path_to_inode
            .remove_if(&entry.path, |_, mapped| *mapped == inode);
        true
    }

    /// Returns the number of inodes currently in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table only contains the root inode.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins a directory mount path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Mount path of the directory containing `path`.
pub fn parent_path(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => ROOT_PATH,
        Some(i) => &path[..i],
    }
}

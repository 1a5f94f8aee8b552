//! File handles for open FUSE files.
//!
//! `open()` stores the facade's [`OpenHandle`] here under a fresh 64-bit id
//! which the kernel echoes back on `read()` and `release()`. Removing the
//! entry on release drops the underlying `File`.

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use m3ufs_core::OpenHandle;
use std::sync::atomic::{AtomicU64, Ordering};

/// An open file together with the mount path it was opened through.
#[derive(Debug)]
pub struct FuseHandle {
    pub path: String,
    pub handle: OpenHandle,
}

/// Thread-safe table of open file handles with auto-incrementing ids.
#[derive(Debug)]
pub struct FuseHandleTable {
    handles: DashMap<u64, FuseHandle>,
    next_id: AtomicU64,
}

impl FuseHandleTable {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            // 0 is left unused so a zero fh never aliases a real handle.
            next_id: AtomicU64::new(1),
        }
    }

    /// Stores `handle` and returns its id.
    pub fn insert(&self, handle: FuseHandle) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(id, handle);
        id
    }

    pub fn get(&self, id: u64) -> Option<Ref<'_, u64, FuseHandle>> {
        self.handles.get(&id)
    }

    /// Removes and returns the handle.
    pub fn remove(&self, id: u64) -> Option<FuseHandle> {
        self.handles.remove(&id).map(|(_, h)| h)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Default for FuseHandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn virtual_handle() -> FuseHandle {
        FuseHandle {
            path: "/list.m3u".to_string(),
            handle: OpenHandle::Virtual,
        }
    }

    #[test]
    fn test_ids_are_unique_and_nonzero() {
        let table = FuseHandleTable::new();
        let a = table.insert(virtual_handle());
        let b = table.insert(virtual_handle());
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_releases_handle() {
        let table = FuseHandleTable::new();
        let id = table.insert(virtual_handle());

        assert_eq!(table.get(id).unwrap().path, "/list.m3u");
        let removed = table.remove(id).unwrap();
        assert!(removed.handle.is_virtual());
        assert!(table.get(id).is_none());
        assert!(table.remove(id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_real_file_handle() {
        let file = tempfile::tempfile().unwrap();
        let table = FuseHandleTable::new();
        let id = table.insert(FuseHandle {
            path: "/a.mp3".to_string(),
            handle: OpenHandle::Real(file),
        });
        assert!(!table.get(id).unwrap().handle.is_virtual());
    }
}

//! Backend-independent entry and metadata types

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Backend-specific locator carried by an [`Entry`].
///
/// Callers never need to look inside; views use it to skip a second lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryHandle {
    /// Host path of a local entry
    Local(PathBuf),
    /// Remote path as reported by the server
    Remote(String),
    /// Slot in the archive index
    ArchiveRecord(usize),
    /// Directory synthesized from deeper archive paths
    ArchiveImplicit,
}

/// One child of a listed directory
#[derive(Clone, Debug)]
pub struct Entry {
    /// File/directory name (not full path)
    pub name: String,
    /// Full path in the owning view's addressing
    pub path: String,
    /// Whether this is a directory
    pub is_dir: bool,
    /// File size in bytes (0 for directories)
    pub size: u64,
    /// Last modification time, when the backend knows it
    pub modified: Option<SystemTime>,
    pub handle: EntryHandle,
}

/// Metadata for a single path, independent of listing order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stat {
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
}

impl Stat {
    pub fn directory(modified: Option<SystemTime>) -> Self {
        Self { size: 0, modified, is_dir: true }
    }

    pub fn file(size: u64, modified: Option<SystemTime>) -> Self {
        Self { size, modified, is_dir: false }
    }

    /// Stat of a local path, following symlinks
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let is_dir = metadata.is_dir();
        Self {
            size: if is_dir { 0 } else { metadata.len() },
            modified: metadata.modified().ok(),
            is_dir,
        }
    }
}

impl Entry {
    /// Create an Entry from a local path.
    ///
    /// Symlinks report their target's type and size; a dangling link falls
    /// back to the link's own metadata.
    pub fn from_local_path(path: &Path) -> std::io::Result<Self> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(_) => fs::symlink_metadata(path)?,
        };
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let stat = Stat::from_metadata(&metadata);

        Ok(Self {
            name,
            path: path.to_string_lossy().into_owned(),
            is_dir: stat.is_dir,
            size: stat.size,
            modified: stat.modified,
            handle: EntryHandle::Local(path.to_path_buf()),
        })
    }

    /// Whether this is a hidden file (starts with '.')
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

//! Local filesystem operations

use std::fs;
use std::io;
use std::path::Path;

use super::entry::Entry;

/// Read the direct children of a local directory.
///
/// Children whose metadata can't be read are skipped rather than failing
/// the whole listing.
pub fn read_directory(path: &Path) -> io::Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("skipping unreadable entry in {}: {}", path.display(), e);
                continue;
            }
        };
        match Entry::from_local_path(&entry.path()) {
            Ok(file_entry) => entries.push(file_entry),
            Err(e) => {
                log::warn!("skipping {}: {}", entry.path().display(), e);
            }
        }
    }

    Ok(entries)
}

/// Remove a file, or a directory with everything below it
pub fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

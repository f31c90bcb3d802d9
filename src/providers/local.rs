//! Local filesystem view

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use super::{FileSystemView, SeekableStream, ViewKind, VfsStream};
use crate::errors::{VfsError, VfsResult};
use crate::fs::utils::normalize_lexical;
use crate::fs::{Entry, Stat};

/// View over the local filesystem.
///
/// Every instance keeps its own current directory; the process working
/// directory is never changed, so two local panels navigate independently.
#[derive(Debug)]
pub struct LocalView {
    cwd: RwLock<PathBuf>,
}

impl LocalView {
    /// Create a local view rooted at `cwd`
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd: RwLock::new(normalize_lexical(&cwd)),
        }
    }

    /// Local view at the directory the process was started in
    pub fn at_startup_dir() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::new(cwd)
    }

    fn cwd(&self) -> PathBuf {
        self.cwd.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn host_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            normalize_lexical(p)
        } else {
            normalize_lexical(&self.cwd().join(p))
        }
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl FileSystemView for LocalView {
    fn kind(&self) -> ViewKind {
        ViewKind::Local
    }

    fn label(&self) -> String {
        "Local".to_string()
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn is_navigable(&self) -> bool {
        true
    }

    fn list_directory(&self, path: &str) -> VfsResult<Vec<Entry>> {
        let path = self.host_path(path);
        crate::fs::read_directory(&path).map_err(|e| VfsError::from_io(e, display(&path)))
    }

    fn open(&self, path: &str) -> VfsResult<Box<dyn VfsStream>> {
        let path = self.host_path(path);
        let file = File::open(&path).map_err(|e| VfsError::from_io(e, display(&path)))?;
        let metadata = file.metadata().map_err(|e| VfsError::from_io(e, display(&path)))?;
        if metadata.is_dir() {
            return Err(VfsError::Unsupported(format!("{} is a directory", path.display())));
        }
        Ok(Box::new(SeekableStream::new(file, metadata.len())))
    }

    fn stat(&self, path: &str) -> VfsResult<Stat> {
        let path = self.host_path(path);
        fs::metadata(&path)
            .map(|m| Stat::from_metadata(&m))
            .map_err(|e| VfsError::from_io(e, display(&path)))
    }

    fn change_directory(&self, path: &str) -> VfsResult<()> {
        let target = self.host_path(path);
        let stat = self.stat(&display(&target))?;
        if !stat.is_dir {
            return Err(VfsError::NotFound(format!("{} is not a directory", target.display())));
        }
        *self.cwd.write().unwrap_or_else(|e| e.into_inner()) = target;
        Ok(())
    }

    fn current_directory(&self) -> String {
        display(&self.cwd())
    }

    fn resolve(&self, path: &str) -> String {
        display(&self.host_path(path))
    }

    fn join(&self, dir: &str, name: &str) -> String {
        display(&Path::new(dir).join(name))
    }

    fn local_path(&self, path: &str) -> Option<PathBuf> {
        Some(self.host_path(path))
    }

    fn create_file(&self, path: &str) -> VfsResult<Box<dyn Write + Send>> {
        let path = self.host_path(path);
        let file = File::create(&path).map_err(|e| VfsError::from_io(e, display(&path)))?;
        Ok(Box::new(file))
    }

    fn create_dir(&self, path: &str) -> VfsResult<()> {
        let path = self.host_path(path);
        fs::create_dir_all(&path).map_err(|e| VfsError::from_io(e, display(&path)))
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from = self.host_path(from);
        let to = self.host_path(to);
        fs::rename(&from, &to).map_err(|e| VfsError::from_io(e, display(&from)))
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        let path = self.host_path(path);
        crate::fs::ops::remove_path(&path).map_err(|e| VfsError::from_io(e, display(&path)))
    }

    fn set_modified(&self, path: &str, modified: SystemTime) -> VfsResult<()> {
        let path = self.host_path(path);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(modified))
            .map_err(|e| VfsError::from_io(e, display(&path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn fixture() -> (tempfile::TempDir, LocalView) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/nested")).unwrap();
        fs::write(dir.path().join("docs/readme.txt"), b"read me").unwrap();
        fs::write(dir.path().join("docs/nested/deep.txt"), b"deep").unwrap();
        fs::write(dir.path().join("top.bin"), vec![0u8; 300]).unwrap();
        let view = LocalView::new(dir.path().to_path_buf());
        (dir, view)
    }

    #[test]
    fn test_listing_matches_stat() {
        let (dir, view) = fixture();
        let entries = view.list_directory(&display(&dir.path().join("docs"))).unwrap();
        let mut names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["nested", "readme.txt"]);

        for entry in &entries {
            let stat = view.stat(&entry.path).unwrap();
            assert_eq!(stat.is_dir, entry.is_dir, "{}", entry.path);
        }
    }

    #[test]
    fn test_relative_paths_follow_own_cwd() {
        let (_dir, view) = fixture();
        view.change_directory("docs").unwrap();
        assert!(view.current_directory().ends_with("docs"));

        let mut content = String::new();
        view.open("readme.txt").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "read me");

        view.change_directory("..").unwrap();
        assert!(view.stat("top.bin").is_ok());
    }

    #[test]
    fn test_two_views_do_not_share_cwd() {
        let (dir, left) = fixture();
        let right = LocalView::new(dir.path().to_path_buf());
        let process_cwd = std::env::current_dir().unwrap();

        left.change_directory("docs/nested").unwrap();
        assert_eq!(right.current_directory(), display(dir.path()));
        assert_eq!(std::env::current_dir().unwrap(), process_cwd);
    }

    #[test]
    fn test_change_directory_validates_target() {
        let (_dir, view) = fixture();
        let before = view.current_directory();
        assert!(view.change_directory("missing").unwrap_err().is_not_found());
        assert!(view.change_directory("top.bin").unwrap_err().is_not_found());
        assert_eq!(view.current_directory(), before);
    }

    #[test]
    fn test_open_missing_and_directory() {
        let (_dir, view) = fixture();
        assert!(view.open("nope.txt").err().unwrap().is_not_found());
        assert!(view.open("docs").err().unwrap().is_unsupported());
    }

    #[test]
    fn test_capabilities() {
        let (_dir, view) = fixture();
        assert!(view.is_writable());
        assert!(view.supports_seek());
        assert!(view.is_navigable());
        assert_eq!(view.kind(), ViewKind::Local);
    }
}

//! Filesystem views for panels
//!
//! A view abstracts the storage a panel is rooted in, so every operation
//! works the same way against:
//! - the local filesystem
//! - a remote host over SFTP
//! - a mounted archive (zip, tar, tar.gz)

mod archive;
pub mod archive_index;
mod local;
mod remote;
mod stream;

pub use archive::ArchiveView;
pub use archive_index::{ArchiveIndex, ArchiveKind};
pub use local::LocalView;
pub use remote::{RemoteAuth, RemoteTarget, RemoteView};
pub use stream::{ForwardStream, SeekableStream, VfsStream};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::Config;
use crate::errors::{VfsError, VfsResult};
use crate::fs::{Entry, Stat};

/// A view shared between its panel and running transfer jobs
pub type SharedView = Arc<dyn FileSystemView>;

/// Which backend a view is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Local,
    Remote,
    Archive,
}

/// Uniform contract over every storage backend.
///
/// Paths are view-relative strings: host paths for local views, `/`-separated
/// absolute paths for remote views, archive-internal or anchored paths for
/// archives. Relative paths are resolved against [`current_directory`].
///
/// Mutating calls fail with [`VfsError::Unsupported`] unless the view
/// overrides them; callers check [`is_writable`] first instead of relying
/// on the error.
///
/// [`current_directory`]: FileSystemView::current_directory
/// [`is_writable`]: FileSystemView::is_writable
pub trait FileSystemView: Send + Sync {
    fn kind(&self) -> ViewKind;

    /// Display name, e.g. "Local", "sftp://user@host", "data.zip [ZIP]"
    fn label(&self) -> String;

    /// Whether create/rename/remove are supported
    fn is_writable(&self) -> bool;

    /// Whether streams from [`open`](FileSystemView::open) can seek
    fn supports_seek(&self) -> bool;

    /// Whether `change_directory` moves the current path
    fn is_navigable(&self) -> bool;

    /// Direct children of `path`, in no particular order
    fn list_directory(&self, path: &str) -> VfsResult<Vec<Entry>>;

    fn open(&self, path: &str) -> VfsResult<Box<dyn VfsStream>>;

    fn stat(&self, path: &str) -> VfsResult<Stat>;

    /// Validate `path` and make it the current directory
    fn change_directory(&self, path: &str) -> VfsResult<()>;

    fn current_directory(&self) -> String;

    /// Absolute form of `path`, relative paths taken from the current directory
    fn resolve(&self, path: &str) -> String;

    /// Join a child name onto a directory path in this view's addressing
    fn join(&self, dir: &str, name: &str) -> String;

    /// Host path for views backed by the local filesystem
    fn local_path(&self, _path: &str) -> Option<PathBuf> {
        None
    }

    /// Create (or truncate) a file for writing
    fn create_file(&self, path: &str) -> VfsResult<Box<dyn Write + Send>> {
        Err(VfsError::read_only(&self.label(), path))
    }

    /// Create a directory and any missing parents
    fn create_dir(&self, path: &str) -> VfsResult<()> {
        Err(VfsError::read_only(&self.label(), path))
    }

    /// Atomic rename within this view
    fn rename(&self, from: &str, _to: &str) -> VfsResult<()> {
        Err(VfsError::read_only(&self.label(), from))
    }

    /// Remove a file, or a directory recursively
    fn remove(&self, path: &str) -> VfsResult<()> {
        Err(VfsError::read_only(&self.label(), path))
    }

    /// Set the modification time of a written file
    fn set_modified(&self, path: &str, _modified: SystemTime) -> VfsResult<()> {
        Err(VfsError::read_only(&self.label(), path))
    }
}

/// Where a panel should be mounted
#[derive(Debug, Clone)]
pub enum MountTarget {
    Local(PathBuf),
    Remote(RemoteTarget),
    Archive(PathBuf),
}

impl MountTarget {
    /// Classify a navigation argument: remote targets and archive files get
    /// their own backend, anything else stays on the current view.
    pub fn classify(arg: &str, current: &dyn FileSystemView) -> Option<Self> {
        if RemoteTarget::looks_remote(arg) {
            return RemoteTarget::parse(arg).ok().map(MountTarget::Remote);
        }
        if ArchiveKind::from_path(Path::new(arg)).is_some() {
            let host_path = current.local_path(&current.resolve(arg))?;
            if host_path.is_file() {
                return Some(MountTarget::Archive(host_path));
            }
        }
        None
    }
}

/// Open a new backend. The caller replaces the panel's previous view with it.
pub fn mount(target: &MountTarget, config: &Config) -> VfsResult<SharedView> {
    let view: SharedView = match target {
        MountTarget::Local(path) => Arc::new(LocalView::new(path.clone())),
        MountTarget::Remote(remote) => Arc::new(RemoteView::connect(remote.clone(), &config.remote)?),
        MountTarget::Archive(path) => Arc::new(ArchiveView::open(path, &config.archive)?),
    };
    log::debug!("mounted {}", view.label());
    Ok(view)
}

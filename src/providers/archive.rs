//! Archive view: a zip, tar or tar.gz file mounted in place of a directory

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use flate2::read::GzDecoder;
use zip::ZipArchive;
use zip::result::ZipError;

use super::archive_index::{normalize_entry_path, ArchiveIndex, ArchiveKind, Locator};
use super::{FileSystemView, ForwardStream, SeekableStream, ViewKind, VfsStream};
use crate::config::ArchiveConfig;
use crate::errors::{VfsError, VfsResult};
use crate::fs::utils::join_slash;
use crate::fs::{Entry, EntryHandle, Stat};

/// Read-only view over an archive file.
///
/// The index is built once by [`ArchiveView::open`]; a parse failure fails
/// the whole mount. Paths are accepted archive-internal (`docs/a.txt`) or
/// anchored under the archive file path (`/home/u/data.zip/docs/a.txt`).
pub struct ArchiveView {
    archive_path: PathBuf,
    /// Archive file path as a string, the prefix of every anchored path
    anchor: String,
    kind: ArchiveKind,
    index: ArchiveIndex,
    zip: Option<Mutex<ZipArchive<File>>>,
    /// Zip entries up to this size are decompressed into memory on open;
    /// larger ones are spooled to an anonymous temporary file
    buffer_limit: u64,
    cache: Option<EntryCache>,
}

/// Lazily filled per-entry content cache
struct EntryCache {
    max_entry_bytes: u64,
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl EntryCache {
    fn get(&self, path: &str) -> Option<Arc<[u8]>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(path).cloned()
    }

    fn insert(&self, path: &str, data: Vec<u8>) -> Arc<[u8]> {
        let data: Arc<[u8]> = data.into();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), Arc::clone(&data));
        data
    }
}

fn corrupt(archive: &Path, e: impl std::fmt::Display) -> VfsError {
    VfsError::Corrupt(format!("{}: {}", archive.display(), e))
}

/// Map a zip error raised while reading one entry of a mounted archive
fn zip_entry_error(e: ZipError, path: &str) -> VfsError {
    match e {
        ZipError::Io(err) => VfsError::from_io(err, path),
        ZipError::UnsupportedArchive(why) => VfsError::Unsupported(format!("{}: {}", path, why)),
        ZipError::FileNotFound => VfsError::NotFound(path.to_string()),
        other => VfsError::Io {
            path: path.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        },
    }
}

impl ArchiveView {
    /// Open an archive and scan its index
    pub fn open(path: &Path, config: &ArchiveConfig) -> VfsResult<Self> {
        let kind = ArchiveKind::from_path(path)
            .ok_or_else(|| VfsError::Unsupported(format!("not an archive: {}", path.display())))?;
        let file = File::open(path).map_err(|e| VfsError::from_io(e, path.display().to_string()))?;

        let (index, zip) = match kind {
            ArchiveKind::Zip => {
                let mut archive = ZipArchive::new(file).map_err(|e| corrupt(path, e))?;
                let index = ArchiveIndex::scan_zip(&mut archive)?;
                (index, Some(Mutex::new(archive)))
            }
            ArchiveKind::Tar => (ArchiveIndex::scan_tar(BufReader::new(file))?, None),
            ArchiveKind::TarGz => (ArchiveIndex::scan_tar(GzDecoder::new(BufReader::new(file)))?, None),
        };

        log::debug!(
            "indexed {} ({} entries, {})",
            path.display(),
            index.len(),
            kind.display_name()
        );

        let cache = config.cache_entries.then(|| EntryCache {
            max_entry_bytes: config.cache_max_entry_bytes,
            entries: Mutex::new(HashMap::new()),
        });

        Ok(Self {
            archive_path: path.to_path_buf(),
            anchor: path.to_string_lossy().trim_end_matches('/').to_string(),
            kind,
            index,
            zip,
            buffer_limit: config.cache_max_entry_bytes,
            cache,
        })
    }

    /// Archive-internal form of an anchored or internal path
    fn inner_path(&self, path: &str) -> String {
        let path = path.replace('\\', "/");
        if path == self.anchor {
            return String::new();
        }
        match path.strip_prefix(self.anchor.as_str()) {
            Some(rest) if rest.starts_with('/') => normalize_entry_path(rest),
            _ => normalize_entry_path(&path),
        }
    }

    fn anchored(&self, inner: &str) -> String {
        if inner.is_empty() {
            self.anchor.clone()
        } else {
            format!("{}/{}", self.anchor, inner)
        }
    }

    /// Decompress a small entry through the shared reader
    fn read_zip_entry(&self, index: usize, size: u64, path: &str) -> VfsResult<Vec<u8>> {
        let zip = self
            .zip
            .as_ref()
            .ok_or_else(|| corrupt(&self.archive_path, "zip reader missing"))?;
        let mut archive = zip.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = archive.by_index(index).map_err(|e| zip_entry_error(e, path))?;
        let mut data = Vec::with_capacity(size.min(self.buffer_limit) as usize);
        file.read_to_end(&mut data).map_err(|e| VfsError::from_io(e, path))?;
        Ok(data)
    }

    /// Decompress a large entry into an unnamed temporary file, using a
    /// reader of its own so other entries are not held up
    fn spool_zip_entry(&self, index: usize, path: &str) -> VfsResult<File> {
        let file = File::open(&self.archive_path).map_err(|e| VfsError::from_io(e, self.anchor.clone()))?;
        let mut archive = ZipArchive::new(file).map_err(|e| zip_entry_error(e, path))?;
        let mut entry = archive.by_index(index).map_err(|e| zip_entry_error(e, path))?;

        let mut spool = tempfile::tempfile().map_err(|e| VfsError::from_io(e, path))?;
        io::copy(&mut entry, &mut spool).map_err(|e| VfsError::from_io(e, path))?;
        spool.seek(SeekFrom::Start(0)).map_err(|e| VfsError::from_io(e, path))?;
        Ok(spool)
    }

    fn open_tar_section(&self, offset: u64, size: u64) -> VfsResult<TarSection> {
        let file = File::open(&self.archive_path)
            .map_err(|e| VfsError::from_io(e, self.anchor.clone()))?;
        TarSection::new(file, offset, size).map_err(|e| VfsError::from_io(e, self.anchor.clone()))
    }

    /// Re-decompress from the start and skip forward to `offset`
    fn open_gz_section(&self, offset: u64, size: u64) -> VfsResult<io::Take<GzDecoder<BufReader<File>>>> {
        let file = File::open(&self.archive_path)
            .map_err(|e| VfsError::from_io(e, self.anchor.clone()))?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        let skipped = io::copy(&mut (&mut decoder).take(offset), &mut io::sink())
            .map_err(|e| corrupt(&self.archive_path, e))?;
        if skipped != offset {
            return Err(corrupt(&self.archive_path, "entry data past end of stream"));
        }
        Ok(decoder.take(size))
    }

    fn cacheable(&self, size: u64) -> Option<&EntryCache> {
        self.cache.as_ref().filter(|c| size <= c.max_entry_bytes)
    }
}

impl FileSystemView for ArchiveView {
    fn kind(&self) -> ViewKind {
        ViewKind::Archive
    }

    fn label(&self) -> String {
        let name = self
            .archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.anchor.clone());
        format!("{} [{}]", name, self.kind.display_name())
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn supports_seek(&self) -> bool {
        self.kind != ArchiveKind::TarGz
    }

    fn is_navigable(&self) -> bool {
        false
    }

    fn list_directory(&self, path: &str) -> VfsResult<Vec<Entry>> {
        let inner = self.inner_path(path);
        let children = self
            .index
            .children(&inner)
            .map_err(|_| VfsError::NotFound(self.anchored(&inner)))?;

        Ok(children
            .into_iter()
            .map(|child| {
                let record = child.slot.and_then(|slot| self.index.record(slot));
                let is_dir = record.is_none_or(|r| r.is_dir) || self.index.is_dir(&child.path);
                Entry {
                    path: self.anchored(&child.path),
                    name: child.name,
                    is_dir,
                    size: match record {
                        Some(r) if !is_dir => r.size,
                        _ => 0,
                    },
                    modified: record.and_then(|r| r.modified),
                    handle: match child.slot {
                        Some(slot) => EntryHandle::ArchiveRecord(slot),
                        None => EntryHandle::ArchiveImplicit,
                    },
                }
            })
            .collect())
    }

    fn open(&self, path: &str) -> VfsResult<Box<dyn VfsStream>> {
        let inner = self.inner_path(path);
        if self.index.is_dir(&inner) {
            return Err(VfsError::Unsupported(format!("{} is a directory", self.anchored(&inner))));
        }
        let (_, record) = self
            .index
            .get(&inner)
            .ok_or_else(|| VfsError::NotFound(self.anchored(&inner)))?;
        let size = record.size;

        if let Some(cache) = self.cache.as_ref()
            && let Some(data) = cache.get(&inner)
        {
            return Ok(Box::new(SeekableStream::new(Cursor::new(data), size)));
        }

        match record.locator {
            Locator::Zip(index) => {
                let display = self.anchored(&inner);
                if size > self.buffer_limit {
                    log::debug!("spooling {} ({} bytes)", display, size);
                    let spool = self.spool_zip_entry(index, &display)?;
                    return Ok(Box::new(SeekableStream::new(spool, size)));
                }
                let data = self.read_zip_entry(index, size, &display)?;
                let data: Arc<[u8]> = match self.cacheable(size) {
                    Some(cache) => cache.insert(&inner, data),
                    None => data.into(),
                };
                Ok(Box::new(SeekableStream::new(Cursor::new(data), size)))
            }
            Locator::Tar(offset) => {
                if self.kind == ArchiveKind::Tar {
                    let mut section = self.open_tar_section(offset, size)?;
                    if let Some(cache) = self.cacheable(size) {
                        let mut data = Vec::with_capacity(size as usize);
                        section
                            .read_to_end(&mut data)
                            .map_err(|e| VfsError::from_io(e, self.anchored(&inner)))?;
                        let data = cache.insert(&inner, data);
                        return Ok(Box::new(SeekableStream::new(Cursor::new(data), size)));
                    }
                    return Ok(Box::new(SeekableStream::new(section, size)));
                }

                let mut section = self.open_gz_section(offset, size)?;
                if let Some(cache) = self.cacheable(size) {
                    let mut data = Vec::with_capacity(size as usize);
                    section.read_to_end(&mut data).map_err(|e| corrupt(&self.archive_path, e))?;
                    let data = cache.insert(&inner, data);
                    return Ok(Box::new(SeekableStream::new(Cursor::new(data), size)));
                }
                Ok(Box::new(ForwardStream::new(section, size)))
            }
        }
    }

    fn stat(&self, path: &str) -> VfsResult<Stat> {
        let inner = self.inner_path(path);
        self.index
            .stat(&inner)
            .ok_or_else(|| VfsError::NotFound(self.anchored(&inner)))
    }

    /// Archives keep no navigation state; the panel always shows the mount
    /// anchor and `list_directory` takes explicit paths.
    fn change_directory(&self, path: &str) -> VfsResult<()> {
        log::debug!("{}: change_directory({}) ignored", self.label(), path);
        Ok(())
    }

    fn current_directory(&self) -> String {
        self.anchor.clone()
    }

    fn resolve(&self, path: &str) -> String {
        self.anchored(&self.inner_path(path))
    }

    fn join(&self, dir: &str, name: &str) -> String {
        join_slash(dir, name)
    }
}

/// Bounded, seekable window over one entry of a plain tar file
struct TarSection {
    file: File,
    start: u64,
    size: u64,
    pos: u64,
}

impl TarSection {
    fn new(mut file: File, start: u64, size: u64) -> io::Result<Self> {
        file.seek(SeekFrom::Start(start))?;
        Ok(Self { file, start, size, pos: 0 })
    }
}

impl Read for TarSection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        if remaining == 0 {
            return Ok(0);
        }
        let want = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        let n = self.file.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for TarSection {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
            SeekFrom::End(d) => self.size as i128 + d as i128,
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start of entry"));
        }
        let target = (target as u64).min(self.size);
        self.file.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::io::Write;

    const TREE: &[(&str, &[u8])] = &[
        ("top.txt", b"top level"),
        ("docs/a.txt", b"alpha"),
        ("docs/b.txt", b"bravo bravo"),
        ("docs/deep/c.bin", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
    ];

    fn write_zip(path: &Path) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("docs/", options).unwrap();
        for (name, data) in TREE {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn tar_bytes<W: Write>(out: W) -> W {
        let mut builder = tar::Builder::new(out);
        for (name, data) in TREE {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(1_700_000_000);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_tar(path: &Path) {
        tar_bytes(File::create(path).unwrap());
    }

    fn write_tar_gz(path: &Path) {
        let encoder = flate2::write::GzEncoder::new(File::create(path).unwrap(), flate2::Compression::default());
        tar_bytes(encoder).finish().unwrap();
    }

    fn fixture(name: &str, write: fn(&Path)) -> (tempfile::TempDir, ArchiveView) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        write(&path);
        let view = ArchiveView::open(&path, &ArchiveConfig::default()).unwrap();
        (dir, view)
    }

    fn child_set(view: &ArchiveView, path: &str) -> BTreeSet<(String, bool)> {
        view.list_directory(path)
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.is_dir))
            .collect()
    }

    fn read_all(view: &ArchiveView, path: &str) -> Vec<u8> {
        let mut data = Vec::new();
        view.open(path).unwrap().read_to_end(&mut data).unwrap();
        data
    }

    #[test]
    fn test_listing_is_direct_children_matching_stat() {
        for (name, write) in [("t.zip", write_zip as fn(&Path)), ("t.tar", write_tar), ("t.tgz", write_tar_gz)] {
            let (_dir, view) = fixture(name, write);
            for dir in ["", "docs", "docs/deep"] {
                for entry in view.list_directory(dir).unwrap() {
                    assert!(!entry.name.contains('/'), "{}: {}", name, entry.name);
                    assert_eq!(view.stat(&entry.path).unwrap().is_dir, entry.is_dir, "{}", entry.path);
                }
            }
        }
    }

    #[test]
    fn test_zip_and_tar_expose_the_same_tree() {
        let (_z, zip_view) = fixture("same.zip", write_zip);
        let (_t, tar_view) = fixture("same.tar", write_tar);

        for dir in ["", "docs", "docs/deep"] {
            assert_eq!(child_set(&zip_view, dir), child_set(&tar_view, dir), "dir {:?}", dir);
        }
        for (name, data) in TREE {
            assert_eq!(read_all(&zip_view, name), *data);
            assert_eq!(read_all(&tar_view, name), *data);
        }
    }

    #[test]
    fn test_anchored_and_internal_paths_agree() {
        let (_dir, view) = fixture("a.zip", write_zip);
        let anchored = format!("{}/docs/a.txt", view.current_directory());
        assert_eq!(read_all(&view, &anchored), read_all(&view, "docs/a.txt"));

        let root = view.list_directory(&view.current_directory()).unwrap();
        let docs = root.iter().find(|e| e.name == "docs").unwrap();
        assert_eq!(docs.path, format!("{}/docs", view.current_directory()));
        assert_eq!(docs.handle, EntryHandle::ArchiveRecord(0));
    }

    #[test]
    fn test_change_directory_never_moves() {
        let (_dir, view) = fixture("nav.tar", write_tar);
        let anchor = view.current_directory();
        for target in ["docs", "missing", "..", "/elsewhere", "top.txt"] {
            assert!(view.change_directory(target).is_ok());
            assert_eq!(view.current_directory(), anchor);
        }
        assert!(!view.is_navigable());
    }

    #[test]
    fn test_mutations_fail_and_touch_nothing() {
        let (dir, view) = fixture("ro.zip", write_zip);
        let before = std::fs::read(dir.path().join("ro.zip")).unwrap();

        assert!(!view.is_writable());
        assert!(view.create_file("new.txt").err().unwrap().is_unsupported());
        assert!(view.create_dir("newdir").unwrap_err().is_unsupported());
        assert!(view.rename("top.txt", "moved.txt").unwrap_err().is_unsupported());
        assert!(view.remove("docs/a.txt").unwrap_err().is_unsupported());
        assert!(view.set_modified("top.txt", std::time::SystemTime::now()).unwrap_err().is_unsupported());

        assert_eq!(std::fs::read(dir.path().join("ro.zip")).unwrap(), before);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(read_all(&view, "docs/a.txt"), b"alpha");
    }

    #[test]
    fn test_seek_capability_per_kind() {
        let (_t, tar_view) = fixture("s.tar", write_tar);
        let mut stream = tar_view.open("docs/b.txt").unwrap();
        assert!(stream.is_seekable());
        stream.seek_to(6).unwrap();
        let mut rest = String::new();
        stream.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "bravo");

        let (_g, gz_view) = fixture("s.tar.gz", write_tar_gz);
        assert!(!gz_view.supports_seek());
        let mut stream = gz_view.open("docs/b.txt").unwrap();
        assert!(!stream.is_seekable());
        assert!(stream.seek_to(0).unwrap_err().is_unsupported());
        assert_eq!(stream.size(), 11);
        let mut all = Vec::new();
        stream.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"bravo bravo");
    }

    #[test]
    fn test_cached_gz_entries_become_seekable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.tgz");
        write_tar_gz(&path);
        let config = ArchiveConfig {
            cache_entries: true,
            ..ArchiveConfig::default()
        };
        let view = ArchiveView::open(&path, &config).unwrap();

        for _ in 0..2 {
            let mut stream = view.open("top.txt").unwrap();
            assert!(stream.is_seekable());
            stream.seek_to(4).unwrap();
            let mut rest = String::new();
            stream.read_to_string(&mut rest).unwrap();
            assert_eq!(rest, "level");
        }
    }

    #[test]
    fn test_open_errors() {
        let (_dir, view) = fixture("e.zip", write_zip);
        assert!(view.open("docs").err().unwrap().is_unsupported());
        assert!(view.open("docs/deep").err().unwrap().is_unsupported());
        assert!(view.open("nope.txt").err().unwrap().is_not_found());
        assert!(view.list_directory("nope").unwrap_err().is_not_found());
        assert!(view.stat("docs/nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_corrupt_tar_fails_mount() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tar");
        std::fs::write(&path, vec![0x41u8; 1024]).unwrap();
        let err = ArchiveView::open(&path, &ArchiveConfig::default()).err().unwrap();
        assert!(matches!(err, VfsError::Corrupt(_)));

        let path = dir.path().join("bad.tgz");
        std::fs::write(&path, b"plain text, no gzip header").unwrap();
        let err = ArchiveView::open(&path, &ArchiveConfig::default()).err().unwrap();
        assert!(matches!(err, VfsError::Corrupt(_)));
    }

    #[test]
    fn test_label_names_kind() {
        let (_dir, view) = fixture("data.zip", write_zip);
        assert_eq!(view.label(), "data.zip [ZIP]");
    }

    #[test]
    fn test_large_zip_entries_stream_from_a_spool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.zip");
        write_zip(&path);
        let config = ArchiveConfig {
            cache_entries: true,
            cache_max_entry_bytes: 6,
        };
        let view = ArchiveView::open(&path, &config).unwrap();

        // "bravo bravo" is over the limit, "alpha" is under it
        let mut stream = view.open("docs/b.txt").unwrap();
        assert!(stream.is_seekable());
        assert_eq!(stream.size(), 11);
        stream.seek_to(6).unwrap();
        let mut rest = String::new();
        stream.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "bravo");
        assert!(view.cache.as_ref().unwrap().get("docs/b.txt").is_none());

        assert_eq!(read_all(&view, "docs/a.txt"), b"alpha");
        assert!(view.cache.as_ref().unwrap().get("docs/a.txt").is_some());

        // spooled and buffered reads can overlap
        let mut first = view.open("docs/b.txt").unwrap();
        let mut second = view.open("docs/a.txt").unwrap();
        let mut a = Vec::new();
        let mut b = Vec::new();
        first.read_to_end(&mut a).unwrap();
        second.read_to_end(&mut b).unwrap();
        assert_eq!((a.as_slice(), b.as_slice()), (&b"bravo bravo"[..], &b"alpha"[..]));
    }

    #[test]
    fn test_unreadable_zip_entries_are_not_corrupt_archives() {
        let err = zip_entry_error(ZipError::UnsupportedArchive("Password required to decrypt file"), "/a.zip/s");
        assert!(err.is_unsupported());
        assert!(zip_entry_error(ZipError::FileNotFound, "/a.zip/s").is_not_found());
        let err = zip_entry_error(ZipError::Io(io::Error::from(io::ErrorKind::PermissionDenied)), "/a.zip/s");
        assert!(matches!(err, VfsError::PermissionDenied(_)));
    }
}

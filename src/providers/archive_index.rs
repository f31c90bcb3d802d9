//! Archive index: every entry of a container, scanned once at mount
//!
//! Records live in an arena (`Vec`) addressed by slot; a path map points
//! into it. Directory structure is derived from path prefixes, so
//! containers without explicit directory records still list correctly.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Seek};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::errors::{VfsError, VfsResult};
use crate::fs::Stat;

/// Supported archive types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Tar,
    /// gzip-compressed tar (`.tar.gz`, `.tgz`, `.gz`)
    TarGz,
}

impl ArchiveKind {
    /// Detect archive type from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();

        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".gz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "ZIP",
            ArchiveKind::Tar => "TAR",
            ArchiveKind::TarGz => "TAR.GZ",
        }
    }
}

/// Where an entry's data lives inside the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Index in the zip central directory
    Zip(usize),
    /// Byte offset of the data in the (decompressed) tar stream
    Tar(u64),
}

/// One indexed container entry
#[derive(Debug, Clone)]
pub struct ArchiveRecord {
    /// Normalized path inside the archive, no leading or trailing '/'
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub locator: Locator,
}

/// A direct child produced by [`ArchiveIndex::children`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexChild {
    pub name: String,
    /// Archive-internal path of the child
    pub path: String,
    /// Record slot; `None` for directories implied by deeper paths
    pub slot: Option<usize>,
}

/// Normalize archive paths: backslashes to '/', strip "./" and '/' at the
/// ends
pub fn normalize_entry_path(p: &str) -> String {
    let p = p.replace('\\', "/");
    let mut s = p.as_str();
    loop {
        let next = s.trim_start_matches("./").trim_start_matches('/');
        if next.len() == s.len() {
            break;
        }
        s = next;
    }
    s.trim_end_matches('/').to_string()
}

/// Immutable path → record index for one archive
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    records: Vec<ArchiveRecord>,
    by_path: HashMap<String, usize>,
    implicit_dirs: HashSet<String>,
}

impl ArchiveIndex {
    /// Build from records; a later record with the same path replaces the
    /// earlier one, as tar extraction would.
    pub fn from_records(input: Vec<ArchiveRecord>) -> Self {
        let mut records: Vec<ArchiveRecord> = Vec::with_capacity(input.len());
        let mut by_path = HashMap::with_capacity(input.len());

        for record in input {
            if record.path.is_empty() {
                continue;
            }
            match by_path.get(&record.path) {
                Some(&slot) => records[slot] = record,
                None => {
                    by_path.insert(record.path.clone(), records.len());
                    records.push(record);
                }
            }
        }

        let mut implicit_dirs = HashSet::new();
        for record in &records {
            let mut end = 0;
            while let Some(pos) = record.path[end..].find('/') {
                end += pos;
                implicit_dirs.insert(record.path[..end].to_string());
                end += 1;
            }
        }

        Self { records, by_path, implicit_dirs }
    }

    /// Scan a zip central directory
    pub fn scan_zip<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> VfsResult<Self> {
        let mut records = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| VfsError::Corrupt(format!("zip entry {}: {}", i, e)))?;
            records.push(ArchiveRecord {
                path: normalize_entry_path(file.name()),
                is_dir: file.is_dir(),
                size: if file.is_dir() { 0 } else { file.size() },
                modified: file.last_modified().and_then(zip_time),
                locator: Locator::Zip(i),
            });
        }
        Ok(Self::from_records(records))
    }

    /// Scan a tar stream from start to end
    pub fn scan_tar<R: Read>(reader: R) -> VfsResult<Self> {
        let corrupt = |e: std::io::Error| VfsError::Corrupt(format!("tar: {}", e));
        let mut archive = tar::Archive::new(reader);
        let mut records = Vec::new();

        for entry in archive.entries().map_err(corrupt)? {
            let entry = entry.map_err(corrupt)?;
            let header = entry.header();
            if header.entry_type().is_pax_global_extensions() {
                continue;
            }
            let path = normalize_entry_path(&entry.path().map_err(corrupt)?.to_string_lossy());
            let is_dir = header.entry_type().is_dir();
            records.push(ArchiveRecord {
                path,
                is_dir,
                size: if is_dir { 0 } else { entry.size() },
                modified: header
                    .mtime()
                    .ok()
                    .and_then(|t| UNIX_EPOCH.checked_add(Duration::from_secs(t))),
                locator: Locator::Tar(entry.raw_file_position()),
            });
        }
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, slot: usize) -> Option<&ArchiveRecord> {
        self.records.get(slot)
    }

    /// Record for an exact path
    pub fn get(&self, path: &str) -> Option<(usize, &ArchiveRecord)> {
        let slot = *self.by_path.get(path)?;
        Some((slot, &self.records[slot]))
    }

    /// Directory either recorded explicitly or implied by deeper paths.
    /// The empty path is the archive root.
    pub fn is_dir(&self, path: &str) -> bool {
        path.is_empty()
            || self.implicit_dirs.contains(path)
            || self.get(path).is_some_and(|(_, r)| r.is_dir)
    }

    /// Metadata for a path, synthesizing implicit directories
    pub fn stat(&self, path: &str) -> Option<Stat> {
        match self.get(path) {
            Some((_, r)) if r.is_dir => Some(Stat::directory(r.modified)),
            Some((_, r)) if !self.implicit_dirs.contains(path) => Some(Stat::file(r.size, r.modified)),
            _ if self.is_dir(path) => Some(Stat::directory(None)),
            _ => None,
        }
    }

    /// Direct children of `dir`, derived by prefix matching.
    ///
    /// Every key is stripped of `dir + "/"`; remainders without '/' are
    /// direct children, remainders with '/' contribute their first component
    /// as a synthesized directory. Children are de-duplicated by name, an
    /// explicit record winning over a synthesized entry.
    pub fn children(&self, dir: &str) -> VfsResult<Vec<IndexChild>> {
        if !self.is_dir(dir) {
            return Err(match self.get(dir) {
                Some(_) => VfsError::NotFound(format!("{} is not a directory", dir)),
                None => VfsError::NotFound(dir.to_string()),
            });
        }

        let prefix = if dir.is_empty() { String::new() } else { format!("{}/", dir) };
        let mut children: BTreeMap<&str, IndexChild> = BTreeMap::new();

        for (slot, record) in self.records.iter().enumerate() {
            let Some(rest) = record.path.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.split_once('/') {
                Some((first, _)) => {
                    children.entry(first).or_insert_with(|| IndexChild {
                        name: first.to_string(),
                        path: format!("{}{}", prefix, first),
                        slot: None,
                    });
                }
                None => {
                    children.insert(rest, IndexChild {
                        name: rest.to_string(),
                        path: record.path.clone(),
                        slot: Some(slot),
                    });
                }
            }
        }

        Ok(children.into_values().collect())
    }
}

/// Convert a zip DOS timestamp to SystemTime
fn zip_time(dt: zip::DateTime) -> Option<SystemTime> {
    let days = days_from_civil(dt.year() as i64, dt.month() as i64, dt.day() as i64);
    let secs = days * 86_400 + dt.hour() as i64 * 3600 + dt.minute() as i64 * 60 + dt.second() as i64;
    u64::try_from(secs).ok().map(|s| UNIX_EPOCH + Duration::from_secs(s))
}

/// Days since 1970-01-01 for a proleptic Gregorian date
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

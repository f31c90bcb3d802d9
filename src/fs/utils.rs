use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Default chunk size for streamed copies
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Resolve `.` and `..` components without touching the filesystem.
///
/// Symlinks are not followed, so `a/link/..` becomes `a`.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !path.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(if path.has_root() { "/" } else { "." });
    }
    out
}

/// Normalize a `/`-separated absolute path (remote hosts).
pub fn normalize_slash_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Join a name onto a `/`-separated base path
pub fn join_slash(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Last component of a `/`-separated (or host) path
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', std::path::MAIN_SEPARATOR]);
    trimmed
        .rsplit(['/', std::path::MAIN_SEPARATOR])
        .next()
        .unwrap_or(trimmed)
}

/// Stream `reader` into `writer` through a fixed-size buffer.
///
/// `progress` receives the running byte count after each chunk. The cancel
/// flag is checked before every chunk; a cancelled copy returns
/// `ErrorKind::Interrupted` and leaves cleanup of the partial output to the
/// caller.
pub fn copy_stream_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    chunk_size: usize,
    cancel: &AtomicBool,
    progress: &mut dyn FnMut(u64),
) -> io::Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total: u64 = 0;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"));
        }

        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
        progress(total);
    }

    writer.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_normalize_lexical() {
        assert_eq!(normalize_lexical(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_lexical(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_lexical(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn test_normalize_slash_path() {
        assert_eq!(normalize_slash_path("/home/user/../other/"), "/home/other");
        assert_eq!(normalize_slash_path(""), "/");
        assert_eq!(normalize_slash_path("/../.."), "/");
    }

    #[test]
    fn test_join_and_base_name() {
        assert_eq!(join_slash("/srv/", "/data"), "/srv/data");
        assert_eq!(join_slash("", "top.txt"), "top.txt");
        assert_eq!(base_name("/srv/data/file.txt"), "file.txt");
        assert_eq!(base_name("dir/sub/"), "sub");
        assert_eq!(base_name("plain"), "plain");
    }

    #[test]
    fn test_copy_stream_reports_running_total() {
        let data = vec![7u8; 10_000];
        let mut out = Vec::new();
        let mut seen = Vec::new();
        let cancel = AtomicBool::new(false);

        let n = copy_stream_with_progress(
            &mut Cursor::new(&data),
            &mut out,
            4096,
            &cancel,
            &mut |done| seen.push(done),
        )
        .unwrap();

        assert_eq!(n, 10_000);
        assert_eq!(out, data);
        assert_eq!(seen, vec![4096, 8192, 10_000]);
    }

    #[test]
    fn test_copy_stream_honours_cancel() {
        let cancel = AtomicBool::new(true);
        let mut out = Vec::new();
        let err = copy_stream_with_progress(
            &mut Cursor::new(vec![1u8; 16]),
            &mut out,
            4,
            &cancel,
            &mut |_| {},
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert!(out.is_empty());
    }
}

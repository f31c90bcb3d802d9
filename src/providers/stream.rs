//! Readable streams returned by `FileSystemView::open`

use std::io::{Read, Seek, SeekFrom};

use crate::errors::{VfsError, VfsResult};

/// A readable byte stream with an explicit close.
///
/// Seeking is backend-dependent: check [`is_seekable`](VfsStream::is_seekable)
/// before calling [`seek_to`](VfsStream::seek_to). A caller that needs to
/// restart a non-seekable stream re-opens it instead.
pub trait VfsStream: Read {
    /// Total length in bytes
    fn size(&self) -> u64;

    fn is_seekable(&self) -> bool {
        false
    }

    /// Move to an absolute byte offset
    fn seek_to(&mut self, _pos: u64) -> VfsResult<u64> {
        Err(VfsError::Unsupported("stream is not seekable".to_string()))
    }

    fn close(self: Box<Self>) -> VfsResult<()> {
        Ok(())
    }
}

/// Stream over any seekable reader (local files, SFTP files, cached bytes)
pub struct SeekableStream<R> {
    inner: R,
    size: u64,
}

impl<R: Read + Seek> SeekableStream<R> {
    pub fn new(inner: R, size: u64) -> Self {
        Self { inner, size }
    }
}

impl<R: Read> Read for SeekableStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Seek> VfsStream for SeekableStream<R> {
    fn size(&self) -> u64 {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn seek_to(&mut self, pos: u64) -> VfsResult<u64> {
        self.inner
            .seek(SeekFrom::Start(pos))
            .map_err(|e| VfsError::from_io(e, "stream"))
    }
}

/// Forward-only stream, e.g. an entry inside a compressed tar
pub struct ForwardStream<R> {
    inner: R,
    size: u64,
}

impl<R: Read> ForwardStream<R> {
    pub fn new(inner: R, size: u64) -> Self {
        Self { inner, size }
    }
}

impl<R: Read> Read for ForwardStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read> VfsStream for ForwardStream<R> {
    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_seekable_stream_restarts() {
        let mut s: Box<dyn VfsStream> = Box::new(SeekableStream::new(Cursor::new(b"abcdef".to_vec()), 6));
        assert!(s.is_seekable());
        let mut buf = [0u8; 3];
        s.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        s.seek_to(1).unwrap();
        s.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"bcd");
        s.close().unwrap();
    }

    #[test]
    fn test_forward_stream_refuses_seek() {
        let mut s: Box<dyn VfsStream> = Box::new(ForwardStream::new(Cursor::new(vec![1u8, 2]), 2));
        assert!(!s.is_seekable());
        assert!(s.seek_to(0).unwrap_err().is_unsupported());
        let mut all = Vec::new();
        s.read_to_end(&mut all).unwrap();
        assert_eq!(all, vec![1, 2]);
        assert_eq!(s.size(), 2);
    }
}

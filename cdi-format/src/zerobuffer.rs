use std::io::{self, Seek, SeekFrom, Write};

use once_cell::sync::Lazy;

/// Size of the process-wide zero buffer (spec.md §5, "a single process-wide 32 MiB zero buffer,
/// allocated lazily, read-only after init").
pub const ZERO_BUFFER_SIZE: usize = 32 * 1024 * 1024;

static ZERO_BUFFER: Lazy<Vec<u8>> = Lazy::new(|| vec![0_u8; ZERO_BUFFER_SIZE]);

/// The process-wide zero buffer, allocated on first use and never mutated afterward.
#[must_use]
pub fn zero_buffer() -> &'static [u8] {
    &ZERO_BUFFER
}

/// A `Write` wrapper that skips writing runs of all-zero bytes, relying on the destination
/// already being a sparse, preallocated file so the skipped range reads back as zero. Used when
/// populating a blank/preallocated image so disk usage tracks actual content rather than the
/// declared size.
pub struct SparseWriter<W> {
    inner: W,
    pos: u64,
}

impl<W: Write + Seek> SparseWriter<W> {
    /// Wrap `inner`, writing from its current position.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the current position cannot be determined.
    pub fn new(mut inner: W) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self { inner, pos })
    }

    /// Finish writing, returning the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> Write for SparseWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if is_all_zero(buf) {
            self.inner.seek(SeekFrom::Start(self.pos.saturating_add(buf.len() as u64)))?;
            self.pos = self.pos.saturating_add(buf.len() as u64);
            return Ok(buf.len());
        }
        let written = self.inner.write(buf)?;
        self.pos = self.pos.saturating_add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn is_all_zero(buf: &[u8]) -> bool {
    let zero = zero_buffer();
    let mut remaining = buf;
    while !remaining.is_empty() {
        let chunk_len = remaining.len().min(zero.len());
        let (chunk, rest) = remaining.split_at(chunk_len);
        if chunk != &zero[..chunk_len] {
            return false;
        }
        remaining = rest;
    }
    true
}

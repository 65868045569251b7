use std::io::{self, Read};

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// Total bytes read off the reader stack, labeled by the owning `DataVolume`'s UID, so
    /// progress can be derived without scraping the worker pod's stdout (spec.md §4.5, §5
    /// "progress counters are process-wide; updates are atomic").
    static ref BYTES_READ: IntCounterVec = IntCounterVec::new(
        Opts::new("cdi_import_bytes_read_total", "Bytes read from the import source stream"),
        &["owner_uid"],
    )
    .expect("failed to create cdi_import_bytes_read_total counter");
}

/// Register this module's metrics with `registry`.
///
/// # Errors
///
/// Returns `Err` if the counter is already registered.
pub fn register(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(BYTES_READ.clone()))
}

/// Outer `Read` wrapper that tallies bytes consumed off the reader stack into a Prometheus
/// counter keyed by the owning `DataVolume`'s UID (spec.md §4.6, "progress is advertised via an
/// outer `CountingReader`").
pub struct CountingReader<R> {
    inner: R,
    owner_uid: String,
    count: u64,
}

impl<R: Read> CountingReader<R> {
    /// Wrap `inner`, counting bytes under the `owner_uid` label.
    #[must_use]
    pub fn new(inner: R, owner_uid: impl Into<String>) -> Self {
        Self { inner, owner_uid: owner_uid.into(), count: 0 }
    }

    /// Bytes read so far through this wrapper
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.count
    }

    /// Unwrap back to the inner reader.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count = self.count.saturating_add(n as u64);
        if let Ok(counter) = BYTES_READ.get_metric_with_label_values(&[&self.owner_uid]) {
            counter.inc_by(n as u64);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Read};

    use super::CountingReader;

    #[test]
    fn tallies_bytes_read() {
        let mut reader = CountingReader::new(Cursor::new(vec![0_u8; 100]), "uid-1");
        let mut buf = [0_u8; 32];
        let first = reader.read(&mut buf).unwrap();
        assert_eq!(reader.bytes_read(), first as u64);
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(reader.bytes_read(), 100);
    }
}

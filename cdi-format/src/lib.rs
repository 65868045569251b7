//! Import/population format pipeline: detects and unwraps compressed/archived payloads and
//! dispatches disk-image formats to out-of-band conversion (spec.md §4.6).

/// Outer `Read` wrapper that tracks a monotonic byte count, both in-process and as a
/// `Prometheus` counter keyed by owner UID
mod counting;
/// Known compression and disk-image header signatures
pub mod format;
/// Registers and serves this pipeline's Prometheus counters over the worker pod's metrics port
pub mod metrics;
/// The decorating reader stack that peels off compression layers one header read at a time
mod reader_stack;
/// Process-wide zero buffer and the sparse writer built on top of it
mod zerobuffer;

pub use counting::CountingReader;
pub use format::Format;
pub use reader_stack::{Outcome, ReaderStack};
pub use zerobuffer::{zero_buffer, SparseWriter, ZERO_BUFFER_SIZE};

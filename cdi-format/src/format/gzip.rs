use std::io::Read;

use flate2::read::MultiGzDecoder;

/// gzip magic bytes, RFC 1952 §2.3.1
pub const MAGIC: &[u8] = &[0x1f, 0x8b];

/// Wrap `source` in a gzip-decompressing reader. `MultiGzDecoder` transparently concatenates
/// multiple gzip members, which is what a stream produced by `gzip --rsyncable` or similar
/// chunked tooling looks like.
pub(crate) fn decompress(source: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
    Box::new(MultiGzDecoder::new(source))
}

use std::io::Read;

use xz2::read::XzDecoder;

/// xz magic bytes
pub const MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];

/// Wrap `source` in an xz-decompressing reader.
pub(crate) fn decompress(source: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
    Box::new(XzDecoder::new(source))
}

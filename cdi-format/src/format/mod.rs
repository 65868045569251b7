use std::collections::HashSet;
use std::io::Read;

/// gzip header signature and decompressor
pub mod gzip;
/// xz header signature and decompressor
pub mod xz;
/// Disk-image header signatures (qcow2, vmdk, vdi, vhd, vhdx)
pub mod diskimage;

/// Bytes read from the top of the reader stack before matching against the signature registry.
/// Large enough to cover every signature's offset plus magic length.
pub const HEADER_SIZE: usize = 512;

/// A format recognized by the header-sniffing registry (spec.md §4.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Format {
    /// gzip-compressed stream
    Gzip,
    /// xz-compressed stream
    Xz,
    /// QEMU qcow2 disk image
    Qcow2,
    /// VMware VMDK disk image
    Vmdk,
    /// VirtualBox VDI disk image
    Vdi,
    /// Microsoft VHD disk image
    Vhd,
    /// Microsoft VHDX disk image
    Vhdx,
}

impl Format {
    /// Every format the registry knows about, used to seed the per-stream "not yet matched" set
    pub const ALL: [Self; 7] = [
        Self::Gzip,
        Self::Xz,
        Self::Qcow2,
        Self::Vmdk,
        Self::Vdi,
        Self::Vhd,
        Self::Vhdx,
    ];

    /// Whether this format is a compression layer that should be unwrapped, as opposed to a
    /// terminal disk-image format
    #[must_use]
    pub fn is_compression(self) -> bool {
        matches!(self, Self::Gzip | Self::Xz)
    }

    /// Whether this format is a terminal disk-image format requiring out-of-band conversion
    /// after the stream is fully written (spec.md §4.6)
    #[must_use]
    pub fn is_disk_image(self) -> bool {
        !self.is_compression()
    }

    /// Wrap `source` with the decompressing reader for this format.
    ///
    /// # Panics
    ///
    /// Panics if called on a disk-image format; only compression formats decompress.
    pub(crate) fn decompress(self, source: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
        match self {
            Self::Gzip => gzip::decompress(source),
            Self::Xz => xz::decompress(source),
            _ => unreachable!("decompress is only called on compression formats"),
        }
    }
}

/// One known header signature: a byte offset and the magic bytes expected there
struct Signature {
    format: Format,
    offset: usize,
    magic: &'static [u8],
}

/// The header-sniffing registry. Checked in order; the first match wins, mirroring the real
/// world where a gzip-compressed qcow2 image must be unwrapped before the qcow2 magic is visible.
const SIGNATURES: &[Signature] = &[
    Signature { format: Format::Gzip, offset: 0, magic: gzip::MAGIC },
    Signature { format: Format::Xz, offset: 0, magic: xz::MAGIC },
    Signature { format: Format::Qcow2, offset: 0, magic: diskimage::QCOW2_MAGIC },
    Signature { format: Format::Vhdx, offset: 0, magic: diskimage::VHDX_MAGIC },
    Signature { format: Format::Vhd, offset: 0, magic: diskimage::VHD_MAGIC },
    Signature { format: Format::Vmdk, offset: 0, magic: diskimage::VMDK_MAGIC },
    Signature { format: Format::Vdi, offset: diskimage::VDI_SIGNATURE_OFFSET, magic: diskimage::VDI_MAGIC },
];

/// Match `header` against every signature not yet present in `remaining`, removing the matched
/// format so it can never be matched again on this stream (spec.md §4.6 invariant: "each known
/// header format is matched at most once per stream").
#[must_use]
pub fn detect(header: &[u8], remaining: &mut HashSet<Format>) -> Option<Format> {
    let signature = SIGNATURES
        .iter()
        .filter(|sig| remaining.contains(&sig.format))
        .find(|sig| {
            header.len() >= sig.offset.saturating_add(sig.magic.len())
                && header.get(sig.offset..sig.offset + sig.magic.len()) == Some(sig.magic)
        })?;
    remaining.remove(&signature.format);
    Some(signature.format)
}

#[cfg(test)]
mod test {
    use super::{detect, Format};

    fn fresh() -> std::collections::HashSet<Format> {
        Format::ALL.into_iter().collect()
    }

    #[test]
    fn detects_gzip() {
        let mut remaining = fresh();
        assert_eq!(detect(&[0x1f, 0x8b, 0, 0], &mut remaining), Some(Format::Gzip));
    }

    #[test]
    fn detects_qcow2() {
        let mut remaining = fresh();
        assert_eq!(detect(b"QFI\xfb\x00\x00\x00\x03", &mut remaining), Some(Format::Qcow2));
    }

    #[test]
    fn each_format_matches_at_most_once() {
        let mut remaining = fresh();
        let header = [0x1f, 0x8b, 0, 0];
        assert_eq!(detect(&header, &mut remaining), Some(Format::Gzip));
        assert_eq!(detect(&header, &mut remaining), None);
    }

    #[test]
    fn unrecognized_header_is_none() {
        let mut remaining = fresh();
        assert_eq!(detect(b"not a known format header", &mut remaining), None);
    }

    #[test]
    fn vdi_signature_at_offset_64() {
        let mut remaining = fresh();
        let mut header = vec![0_u8; 128];
        header[64..68].copy_from_slice(&[0x7f, 0x10, 0xda, 0xbe]);
        assert_eq!(detect(&header, &mut remaining), Some(Format::Vdi));
    }
}

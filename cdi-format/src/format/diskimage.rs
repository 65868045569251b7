//! Header signatures for the disk-image formats the pipeline recognizes but does not itself
//! decode; once one of these matches, the pipeline stops and records a "convert" flag for the
//! out-of-band conversion tool (spec.md §4.6).

/// QEMU qcow2: "QFI\xfb" at offset 0
pub const QCOW2_MAGIC: &[u8] = b"QFI\xfb";
/// VMware VMDK (sparse extent): "KDMV" at offset 0
pub const VMDK_MAGIC: &[u8] = b"KDMV";
/// Microsoft VHD footer: "conectix" at offset 0
pub const VHD_MAGIC: &[u8] = b"conectix";
/// Microsoft VHDX file identifier: "vhdxfile" at offset 0
pub const VHDX_MAGIC: &[u8] = b"vhdxfile";
/// VirtualBox VDI image signature, little-endian `0xbeda107f`
pub const VDI_MAGIC: &[u8] = &[0x7f, 0x10, 0xda, 0xbe];
/// Byte offset of [`VDI_MAGIC`] within the VDI header block
pub const VDI_SIGNATURE_OFFSET: usize = 64;

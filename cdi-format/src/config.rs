use std::path::PathBuf;

use clap::Parser;

/// CLI for the worker-pod format pipeline: reads the import source stream, unwraps known
/// compression layers, writes the result to `--dest`, and on a disk-image format prints a
/// conversion contract for the out-of-band conversion tool to act on (spec.md §4.6).
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Path to read the import payload from; `-` reads stdin
    #[arg(long, default_value = "-")]
    pub source: String,
    /// Path to write the unwrapped payload to
    #[arg(long)]
    pub dest: PathBuf,
    /// UID of the owning `DataVolume`, used to label the bytes-read counter
    #[arg(long)]
    pub owner_uid: String,
    /// Whether the destination is a preallocated sparse file, enabling zero-run skipping
    #[arg(long, default_value = "false")]
    pub sparse: bool,
    /// Address the progress metrics endpoint listens on
    #[arg(long, default_value = "0.0.0.0:8443")]
    pub metrics_addr: String,
}

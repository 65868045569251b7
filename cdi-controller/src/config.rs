use clap::Parser;

/// CDI DataVolume reconciliation engine config
#[derive(Debug, Clone, Parser)]
#[non_exhaustive]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The namespace to work, default to cluster wide
    #[arg(long, value_parser = namespace_mode_parser, default_value = "")]
    pub namespace: Namespace,
    /// The address on which the metrics/healthz HTTP server will listen
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen_addr: String,
    /// Whether to create CRDs regardless of the version already installed on the cluster
    #[arg(long, default_value = "false")]
    pub create_crds: bool,
    /// Whether to auto-migrate installed CRDs whose storage version is behind this binary
    #[arg(long, default_value = "false")]
    pub auto_migration: bool,
    /// Default TTL, in seconds, before a terminal DataVolume is garbage collected; unset disables GC
    #[arg(long)]
    pub data_volume_ttl_seconds: Option<u64>,
    /// Whether to honor `WaitForFirstConsumer` binding mode (spec.md §4.1 transition rule)
    #[arg(long, default_value = "true")]
    pub honor_wait_for_first_consumer: bool,
}

/// The namespace to work, `ClusterWide` means work with all namespaces
#[allow(clippy::exhaustive_enums)] // it is clear that this enum is exhaustive
#[derive(Clone, Debug)]
pub enum Namespace {
    /// A single namespace
    Single(String),
    /// All namespaces
    ClusterWide,
}

/// parse namespace mode
#[allow(clippy::unnecessary_wraps)] // required by clap
fn namespace_mode_parser(value: &str) -> Result<Namespace, String> {
    if value.is_empty() {
        return Ok(Namespace::ClusterWide);
    }
    Ok(Namespace::Single(value.to_owned()))
}

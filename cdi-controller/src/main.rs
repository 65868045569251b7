use anyhow::Result;
use cdi_controller::config::Config;
use cdi_controller::operator::Operator;
use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    debug!("{:?}", config);

    Operator::new(config).run().await
}

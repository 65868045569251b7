use anyhow::Result;
use cdi_controller::config::Config;
use cdi_controller::operator::Operator;
use clap::Parser;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::parse();
    Operator::new(config).generate_crds()
}

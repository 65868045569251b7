use std::fs::File;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use cdi_format::{zero_buffer, CountingReader, ReaderStack, SparseWriter};
use clap::Parser;
use tracing::{debug, info};

mod config;

use config::Config;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    debug!("{config:?}");
    cdi_format::metrics::serve(&config.metrics_addr).context("starting metrics server")?;
    // touch the zero buffer once up front so its one-time allocation cost is paid before the
    // first write rather than mid-stream
    let _ = zero_buffer();

    let source: Box<dyn Read + Send> = if config.source == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(&config.source).with_context(|| format!("opening {}", config.source))?)
    };

    let (stack, outcome) = ReaderStack::build(source).context("building format pipeline")?;
    let mut counting = CountingReader::new(stack, config.owner_uid.clone());

    let dest = File::create(&config.dest).with_context(|| format!("creating {}", config.dest.display()))?;
    let written = if config.sparse {
        let mut writer = SparseWriter::new(dest).context("seeking destination")?;
        io::copy(&mut counting, &mut writer).context("copying import payload")?;
        writer.flush().context("flushing destination")?;
        counting.bytes_read()
    } else {
        let mut writer = dest;
        io::copy(&mut counting, &mut writer).context("copying import payload")?;
        writer.flush().context("flushing destination")?;
        counting.bytes_read()
    };

    info!("wrote {written} bytes to {}", config.dest.display());
    counting.into_inner().close().context("closing format pipeline")?;

    if outcome.convert {
        let format = outcome.format.expect("convert flag implies a detected format");
        println!("{{\"convert\":true,\"format\":\"{format:?}\"}}");
    } else {
        println!("{{\"convert\":false}}");
    }

    Ok(())
}

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pcap-dispatch")]
#[command(about = "Routes pcap packets across three filtering lanes and writes per-lane result files")]
#[command(version)]
struct Args {
    /// Path to the input .pcap file; result files are written next to it
    input: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    pcap_dispatch::pipeline::run(&args.input)?;
    Ok(())
}

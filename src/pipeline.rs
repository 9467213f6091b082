//! End-to-end run: open the capture, fan packets out across the lanes, drain
//! and report. Process-exit decisions stay with the binary; everything here
//! propagates errors.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, bail};
use tracing::info;

use crate::classify::{LANE_COUNT, LaneId};
use crate::dispatch::{Dispatcher, LaneStats};
use crate::error::Error;
use crate::packet::PacketRecord;
use crate::pcap::PcapReader;

/// Counters for one completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub submitted: u64,
    pub lanes: [LaneStats; LANE_COUNT],
}

/// Runs the whole pipeline over `input`, writing the three result files next
/// to it. Fails before any worker starts on a bad suffix, unopenable input,
/// bad magic or unopenable result file; fails after a full drain on a
/// malformed record or a lane sink failure.
pub fn run(input: &Path) -> anyhow::Result<RunSummary> {
    if input.extension().and_then(|e| e.to_str()) != Some("pcap") {
        bail!("input file {} does not have a .pcap suffix", input.display());
    }

    let file = File::open(input)
        .with_context(|| format!("failed to open input file {}", input.display()))?;
    let mut reader = PcapReader::new(BufReader::new(file))
        .with_context(|| format!("failed to read capture header of {}", input.display()))?;

    let out_dir = match input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut dispatcher = Dispatcher::open(&reader.global, out_dir)
        .context("failed to open lane result files")?;
    dispatcher.start()?;

    let mut submitted = 0u64;
    let feed_result = feed(&mut reader, &dispatcher, &mut submitted);

    // Drain whatever made it into the queues before reporting any ingest
    // failure, so the result files stay consistent with what was accepted.
    let drain_result = dispatcher.stop();

    feed_result.with_context(|| format!("failed while reading {}", input.display()))?;
    let lanes = drain_result.context("lane processing failed")?;

    info!("dispatched {submitted} packets");
    for lane in LaneId::ALL {
        let stats = lanes[lane.index()];
        info!(
            "lane {lane}: {} seen, {} written, {} dropped",
            stats.seen, stats.written, stats.dropped
        );
    }

    Ok(RunSummary { submitted, lanes })
}

fn feed<R: Read>(
    reader: &mut PcapReader<R>,
    dispatcher: &Dispatcher<std::io::BufWriter<File>>,
    submitted: &mut u64,
) -> Result<(), Error> {
    while let Some((header, data)) = reader.next_record()? {
        dispatcher.submit(PacketRecord::parse(header, data)?);
        *submitted += 1;
    }
    Ok(())
}

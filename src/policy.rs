//! Per-lane processing policies: each one consumes a record and decides
//! whether it reaches the lane's result file.

use std::io::Write;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::error::Result;
use crate::packet::{ETH_HEADER_LEN, IPV4_HEADER_LEN, PacketRecord, TransportHeader};
use crate::pcap::PcapWriter;

/// Outcome of running a policy on one record. A drop is a normal, terminal
/// outcome for that record, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Written,
    Dropped,
}

/// Lane-local decision logic. Runs on the lane's worker thread only, with the
/// queue lock released; a sink write failure is fatal to the lane.
pub trait LanePolicy<W: Write>: Send {
    fn process(&mut self, packet: PacketRecord, sink: &mut PcapWriter<W>) -> Result<Verdict>;
}

/// Destination port filtered out by [`CountingFilter`].
pub const FILTERED_DST_PORT: u16 = 7070;

/// Lane A: numbers every record it sees and filters out destination port
/// 7070; everything else is written unmodified.
#[derive(Debug, Default)]
pub struct CountingFilter {
    seen: u64,
}

impl CountingFilter {
    /// Running count of records handed to this policy, dropped ones included.
    pub fn seen(&self) -> u64 {
        self.seen
    }
}

impl<W: Write> LanePolicy<W> for CountingFilter {
    fn process(&mut self, packet: PacketRecord, sink: &mut PcapWriter<W>) -> Result<Verdict> {
        self.seen += 1;

        if packet.transport.dst_port() == FILTERED_DST_PORT {
            info!(
                "counting filter: ignoring packet #{} (dst port {})",
                self.seen, FILTERED_DST_PORT
            );
            return Ok(Verdict::Dropped);
        }

        sink.write_record(&packet.header, packet.data())?;
        Ok(Verdict::Written)
    }
}

const TRUNCATION_MARKER: u8 = b'x';

/// Lane B: re-cuts the record at the first `'x'` byte inside its transport
/// header and drops records that contain none.
#[derive(Debug, Default)]
pub struct ContentTruncate;

impl<W: Write> LanePolicy<W> for ContentTruncate {
    fn process(&mut self, mut packet: PacketRecord, sink: &mut PcapWriter<W>) -> Result<Verdict> {
        let l4_start = ETH_HEADER_LEN + IPV4_HEADER_LEN;
        let span = &packet.data()[l4_start..l4_start + packet.transport.header_len()];

        match span.iter().position(|&b| b == TRUNCATION_MARKER) {
            Some(k) => {
                // Keep everything up to and including the marker byte.
                packet.header.incl_len = (l4_start + k + 1) as u32;
                sink.write_record(&packet.header, packet.data())?;
                Ok(Verdict::Written)
            }
            None => Ok(Verdict::Dropped),
        }
    }
}

const TCP_GATE_DELAY: Duration = Duration::from_secs(2);

/// Lane C: TCP records pass a two-second timed gate and are admitted only on
/// an even wall-clock second; UDP records are admitted only when source and
/// destination ports match.
#[derive(Debug, Default)]
pub struct TimedAdmission;

impl<W: Write> LanePolicy<W> for TimedAdmission {
    fn process(&mut self, packet: PacketRecord, sink: &mut PcapWriter<W>) -> Result<Verdict> {
        match packet.transport {
            TransportHeader::Tcp(_) => {
                // Lane-local throttle; sibling lanes keep draining meanwhile.
                thread::sleep(TCP_GATE_DELAY);

                let now_sec = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                if now_sec % 2 == 0 {
                    sink.write_record(&packet.header, packet.data())?;
                    Ok(Verdict::Written)
                } else {
                    Ok(Verdict::Dropped)
                }
            }
            TransportHeader::Udp(udp) => {
                if udp.src_port == udp.dst_port {
                    sink.write_record(&packet.header, packet.data())?;
                    info!("timed admission: matching ports, port = {}", udp.src_port());
                    Ok(Verdict::Written)
                } else {
                    Ok(Verdict::Dropped)
                }
            }
        }
    }
}

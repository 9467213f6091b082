//! Pure classification of packets onto lanes.

use std::fmt;
use std::ops::RangeInclusive;

use crate::packet::PacketRecord;

/// Number of lanes; fixed at build time.
pub const LANE_COUNT: usize = 3;

/// Identifier of one processing lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneId {
    A,
    B,
    C,
}

impl LaneId {
    pub const ALL: [LaneId; LANE_COUNT] = [LaneId::A, LaneId::B, LaneId::C];

    pub fn index(self) -> usize {
        match self {
            LaneId::A => 0,
            LaneId::B => 1,
            LaneId::C => 2,
        }
    }

    /// Name of this lane's result file.
    pub fn result_file(self) -> &'static str {
        match self {
            LaneId::A => "result_1.pcap",
            LaneId::B => "result_2.pcap",
            LaneId::C => "result_3.pcap",
        }
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LaneId::A => "A",
            LaneId::B => "B",
            LaneId::C => "C",
        })
    }
}

const fn addr(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_be_bytes([a, b, c, d])
}

const LANE_A_DST: RangeInclusive<u32> = addr(11, 0, 0, 3)..=addr(11, 0, 0, 200);
const LANE_B_DST: RangeInclusive<u32> = addr(12, 0, 0, 3)..=addr(12, 0, 0, 200);
const LANE_B_DST_PORT: u16 = 8080;

/// Assigns a packet to exactly one lane. Pure, total and deterministic; rules
/// apply in order and the first match wins.
pub fn classify(packet: &PacketRecord) -> LaneId {
    let dst = u32::from(packet.dst_ip());

    if LANE_A_DST.contains(&dst) {
        LaneId::A
    } else if LANE_B_DST.contains(&dst) && packet.transport.dst_port() == LANE_B_DST_PORT {
        LaneId::B
    } else {
        LaneId::C
    }
}

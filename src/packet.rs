//! Parsed packet model: a capture header plus Ethernet, IPv4 and a TCP-or-UDP
//! transport header view over the raw frame bytes.
//!
//! Multi-byte network fields are stored exactly as captured, as network
//! byte-order arrays; the accessors convert to host order at the point of
//! comparison. The raw frame is kept verbatim in the record so emission stays
//! bit-exact to the input capture.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::pcap::RecordHeader;

pub const ETH_HEADER_LEN: usize = 14;
pub const IPV4_HEADER_LEN: usize = 20;
pub const TCP_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;

pub const IPPROTO_TCP: u8 = 0x06;
pub const IPPROTO_UDP: u8 = 0x11;

/// Copies `N` bytes out of `bytes` starting at `at`. Callers check the total
/// length once, up front.
fn take<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

#[derive(Debug, Clone, Copy)]
pub struct EthHeader {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    pub ether_type: [u8; 2],
}

impl EthHeader {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            dst_mac: take(bytes, 0),
            src_mac: take(bytes, 6),
            ether_type: take(bytes, 12),
        }
    }

    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes(self.ether_type)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub flags_frag: [u8; 2],
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl Ipv4Header {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            version_ihl: bytes[0],
            tos: bytes[1],
            total_len: take(bytes, 2),
            ident: take(bytes, 4),
            flags_frag: take(bytes, 6),
            ttl: bytes[8],
            protocol: bytes[9],
            checksum: take(bytes, 10),
            src: take(bytes, 12),
            dst: take(bytes, 16),
        }
    }

    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes(self.total_len)
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src)
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpHeader {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub seq: [u8; 4],
    pub ack: [u8; 4],
    pub offset_flags: [u8; 2],
    pub window: [u8; 2],
    pub checksum: [u8; 2],
    pub urgent: [u8; 2],
}

impl TcpHeader {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            src_port: take(bytes, 0),
            dst_port: take(bytes, 2),
            seq: take(bytes, 4),
            ack: take(bytes, 8),
            offset_flags: take(bytes, 12),
            window: take(bytes, 14),
            checksum: take(bytes, 16),
            urgent: take(bytes, 18),
        }
    }

    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes(self.src_port)
    }

    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes(self.dst_port)
    }

    pub fn seq(&self) -> u32 {
        u32::from_be_bytes(self.seq)
    }

    pub fn ack(&self) -> u32 {
        u32::from_be_bytes(self.ack)
    }

    pub fn window(&self) -> u16 {
        u16::from_be_bytes(self.window)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UdpHeader {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub length: [u8; 2],
    pub checksum: [u8; 2],
}

impl UdpHeader {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            src_port: take(bytes, 0),
            dst_port: take(bytes, 2),
            length: take(bytes, 4),
            checksum: take(bytes, 6),
        }
    }

    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes(self.src_port)
    }

    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes(self.dst_port)
    }

    pub fn length(&self) -> u16 {
        u16::from_be_bytes(self.length)
    }
}

/// Transport header view, selected once at construction by the IPv4 protocol
/// byte. There is no access path to the wrong variant.
#[derive(Debug, Clone, Copy)]
pub enum TransportHeader {
    Tcp(TcpHeader),
    Udp(UdpHeader),
}

impl TransportHeader {
    pub fn src_port(&self) -> u16 {
        match self {
            Self::Tcp(tcp) => tcp.src_port(),
            Self::Udp(udp) => udp.src_port(),
        }
    }

    pub fn dst_port(&self) -> u16 {
        match self {
            Self::Tcp(tcp) => tcp.dst_port(),
            Self::Udp(udp) => udp.dst_port(),
        }
    }

    /// On-wire length of this header variant.
    pub fn header_len(&self) -> usize {
        match self {
            Self::Tcp(_) => TCP_HEADER_LEN,
            Self::Udp(_) => UDP_HEADER_LEN,
        }
    }
}

/// One captured packet: read-only from construction until its lane policy is
/// done with it, except for `header.incl_len` which a policy may re-cut
/// before emission.
#[derive(Debug, Clone)]
pub struct PacketRecord {
    pub header: RecordHeader,
    pub eth: EthHeader,
    pub ipv4: Ipv4Header,
    pub transport: TransportHeader,
    data: Vec<u8>,
}

impl PacketRecord {
    /// Builds a record from one capture record. The transport variant is
    /// selected by the IPv4 protocol byte; any protocol other than TCP or UDP
    /// fails construction, as does a frame shorter than its fixed headers.
    pub fn parse(header: RecordHeader, data: Vec<u8>) -> Result<Self> {
        let l4_start = ETH_HEADER_LEN + IPV4_HEADER_LEN;
        if data.len() < l4_start {
            return Err(Error::TruncatedFrame {
                len: data.len(),
                need: l4_start,
            });
        }

        let eth = EthHeader::parse(&data);
        let ipv4 = Ipv4Header::parse(&data[ETH_HEADER_LEN..]);

        let l4_len = match ipv4.protocol {
            IPPROTO_TCP => TCP_HEADER_LEN,
            IPPROTO_UDP => UDP_HEADER_LEN,
            protocol => return Err(Error::UnsupportedProtocol { protocol }),
        };
        if data.len() < l4_start + l4_len {
            return Err(Error::TruncatedFrame {
                len: data.len(),
                need: l4_start + l4_len,
            });
        }

        let transport = match ipv4.protocol {
            IPPROTO_TCP => TransportHeader::Tcp(TcpHeader::parse(&data[l4_start..])),
            _ => TransportHeader::Udp(UdpHeader::parse(&data[l4_start..])),
        };

        Ok(Self {
            header,
            eth,
            ipv4,
            transport,
            data,
        })
    }

    /// Raw frame bytes, exactly as captured.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn dst_ip(&self) -> Ipv4Addr {
        self.ipv4.dst_addr()
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self.transport, TransportHeader::Tcp(_))
    }
}

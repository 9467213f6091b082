//! Synthetic frame builders shared by the unit tests.

use crate::packet::{IPPROTO_TCP, IPPROTO_UDP, PacketRecord};
use crate::pcap::RecordHeader;

pub fn eth_header() -> Vec<u8> {
    let mut h = Vec::new();
    h.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    h.extend_from_slice(&[0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
    h.extend_from_slice(&0x0800u16.to_be_bytes());
    h
}

pub fn ipv4_header(protocol: u8, dst: [u8; 4], l4_len: u16) -> Vec<u8> {
    let mut h = Vec::new();
    h.push(0x45);
    h.push(0x00);
    h.extend_from_slice(&(20 + l4_len).to_be_bytes());
    h.extend_from_slice(&[0x00, 0x00]); // ident
    h.extend_from_slice(&0x4000u16.to_be_bytes());
    h.push(64); // ttl
    h.push(protocol);
    h.extend_from_slice(&[0x00, 0x00]); // checksum, not verified
    h.extend_from_slice(&[10, 0, 0, 1]);
    h.extend_from_slice(&dst);
    h
}

/// 20-byte TCP header with no `0x78` byte unless the ports carry one.
pub fn tcp_header(src_port: u16, dst_port: u16) -> Vec<u8> {
    let mut h = Vec::new();
    h.extend_from_slice(&src_port.to_be_bytes());
    h.extend_from_slice(&dst_port.to_be_bytes());
    h.extend_from_slice(&0u32.to_be_bytes()); // seq
    h.extend_from_slice(&0u32.to_be_bytes()); // ack
    h.extend_from_slice(&0x5002u16.to_be_bytes()); // data offset 5, SYN
    h.extend_from_slice(&0xFFFFu16.to_be_bytes()); // window
    h.extend_from_slice(&[0x00, 0x00]); // checksum
    h.extend_from_slice(&[0x00, 0x00]); // urgent pointer
    h
}

pub fn udp_header(src_port: u16, dst_port: u16, payload_len: u16) -> Vec<u8> {
    let mut h = Vec::new();
    h.extend_from_slice(&src_port.to_be_bytes());
    h.extend_from_slice(&dst_port.to_be_bytes());
    h.extend_from_slice(&(8 + payload_len).to_be_bytes());
    h.extend_from_slice(&[0x00, 0x00]); // checksum
    h
}

pub fn tcp_frame(dst: [u8; 4], src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let l4 = tcp_header(src_port, dst_port);
    let ip = ipv4_header(IPPROTO_TCP, dst, (l4.len() + payload.len()) as u16);
    [eth_header(), ip, l4, payload.to_vec()].concat()
}

pub fn udp_frame(dst: [u8; 4], src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let l4 = udp_header(src_port, dst_port, payload.len() as u16);
    let ip = ipv4_header(IPPROTO_UDP, dst, (l4.len() + payload.len()) as u16);
    [eth_header(), ip, l4, payload.to_vec()].concat()
}

pub fn header_for(frame: &[u8]) -> RecordHeader {
    RecordHeader {
        ts_sec: 1_700_000_000,
        ts_usec: 0,
        incl_len: frame.len() as u32,
        orig_len: frame.len() as u32,
    }
}

pub fn record(frame: Vec<u8>) -> PacketRecord {
    PacketRecord::parse(header_for(&frame), frame).expect("test frame must parse")
}

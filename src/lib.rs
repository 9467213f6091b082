//! Routes packets from a pcap capture file across three independent
//! processing lanes.
//!
//! Each packet is classified by its destination address and port, pushed onto
//! the matching lane's FIFO queue, and consumed by that lane's worker thread.
//! Every lane applies its own admission policy before appending accepted
//! packets to its result pcap file.

pub mod classify;
pub mod dispatch;
pub mod error;
pub mod packet;
pub mod pcap;
pub mod pipeline;
pub mod policy;

#[cfg(test)]
pub(crate) mod testutil;

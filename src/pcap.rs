//! Legacy pcap file codec: a little-endian global header followed by
//! sequential records, each carrying its own timestamp/length header.
//!
//! Records pass through the pipeline with their raw frame bytes untouched, so
//! re-emitting an unmodified record produces output byte-identical to the
//! input capture.

use std::io::{self, ErrorKind, Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Magic number of a little-endian, microsecond-resolution pcap file.
/// Anything else is rejected.
pub const PCAP_MAGIC: u32 = 0xA1B2_C3D4;

/// On-disk size of the global header.
pub const GLOBAL_HEADER_LEN: usize = 24;
/// On-disk size of a per-record header.
pub const RECORD_HEADER_LEN: usize = 16;

/// File-level pcap header, copied verbatim into every result file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeader {
    pub magic: u32,
    pub version_major: u16,
    pub version_minor: u16,
    pub this_zone: i32,
    pub sig_figs: u32,
    pub snap_len: u32,
    pub network: u32,
}

impl GlobalHeader {
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != PCAP_MAGIC {
            return Err(Error::BadMagic { found: magic });
        }

        Ok(Self {
            magic,
            version_major: reader.read_u16::<LittleEndian>()?,
            version_minor: reader.read_u16::<LittleEndian>()?,
            this_zone: reader.read_i32::<LittleEndian>()?,
            sig_figs: reader.read_u32::<LittleEndian>()?,
            snap_len: reader.read_u32::<LittleEndian>()?,
            network: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.magic)?;
        writer.write_u16::<LittleEndian>(self.version_major)?;
        writer.write_u16::<LittleEndian>(self.version_minor)?;
        writer.write_i32::<LittleEndian>(self.this_zone)?;
        writer.write_u32::<LittleEndian>(self.sig_figs)?;
        writer.write_u32::<LittleEndian>(self.snap_len)?;
        writer.write_u32::<LittleEndian>(self.network)
    }
}

impl Default for GlobalHeader {
    /// Plain Ethernet capture header, pcap version 2.4.
    fn default() -> Self {
        Self {
            magic: PCAP_MAGIC,
            version_major: 2,
            version_minor: 4,
            this_zone: 0,
            sig_figs: 0,
            snap_len: 65_535,
            network: 1,
        }
    }
}

/// Per-record capture header. `incl_len` is the number of frame bytes stored
/// in the file and may be rewritten by a lane policy before re-emission;
/// `orig_len` always keeps the on-wire length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub incl_len: u32,
    pub orig_len: u32,
}

impl RecordHeader {
    fn from_bytes(bytes: &[u8; RECORD_HEADER_LEN]) -> Self {
        Self {
            ts_sec: LittleEndian::read_u32(&bytes[0..4]),
            ts_usec: LittleEndian::read_u32(&bytes[4..8]),
            incl_len: LittleEndian::read_u32(&bytes[8..12]),
            orig_len: LittleEndian::read_u32(&bytes[12..16]),
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.ts_sec)?;
        writer.write_u32::<LittleEndian>(self.ts_usec)?;
        writer.write_u32::<LittleEndian>(self.incl_len)?;
        writer.write_u32::<LittleEndian>(self.orig_len)
    }
}

/// Sequential reader over the records of one capture file.
#[derive(Debug)]
pub struct PcapReader<R> {
    reader: R,
    pub global: GlobalHeader,
}

impl<R: Read> PcapReader<R> {
    /// Reads and validates the global header before any record is available.
    pub fn new(mut reader: R) -> Result<Self> {
        let global = GlobalHeader::read_from(&mut reader)?;
        Ok(Self { reader, global })
    }

    /// Returns the next record header and its `incl_len` frame bytes, or
    /// `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<(RecordHeader, Vec<u8>)>> {
        let mut buf = [0u8; RECORD_HEADER_LEN];
        if !read_full_or_eof(&mut self.reader, &mut buf)? {
            return Ok(None);
        }
        let header = RecordHeader::from_bytes(&buf);

        let mut data = vec![0u8; header.incl_len as usize];
        self.reader
            .read_exact(&mut data)
            .map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => Error::TruncatedCapture,
                _ => Error::Io(e),
            })?;

        Ok(Some((header, data)))
    }
}

/// Fills `buf` completely, returning `false` on end of file before the first
/// byte. Running dry part-way through is a truncated capture.
fn read_full_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(Error::TruncatedCapture),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(true)
}

/// Append-only writer for one result file. The global header goes out once at
/// construction; records follow in the order they are written.
pub struct PcapWriter<W> {
    writer: W,
}

impl<W: Write> PcapWriter<W> {
    pub fn new(mut writer: W, global: &GlobalHeader) -> io::Result<Self> {
        global.write_to(&mut writer)?;
        Ok(Self { writer })
    }

    /// Appends one record: the header followed by exactly `incl_len` leading
    /// bytes of `data`.
    pub fn write_record(&mut self, header: &RecordHeader, data: &[u8]) -> io::Result<()> {
        header.write_to(&mut self.writer)?;
        self.writer.write_all(&data[..header.incl_len as usize])
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

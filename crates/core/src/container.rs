//! Bitstream container: header and length-prefixed packet records.
//!
//! # Stream Format
//!
//! ```text
//! +----------------------+
//! | [marker (1)]         |  legacy layout only; written as 0x02
//! +----------------------+
//! | "#!SILK_V3" (9)      |  magic
//! +----------------------+
//! | len (2)              |  i16 little-endian payload length
//! +----------------------+
//! | payload              |  len bytes
//! | (variable)           |
//! +----------------------+
//! | ... more records ... |
//! +----------------------+
//! | [-1 (2)]             |  optional end-of-stream sentinel
//! +----------------------+
//! ```
//!
//! The reader takes any byte other than `#` in front of the magic as a
//! legacy marker. Zero-length records are valid (DTX periods). The reader treats a clean
//! end of input, a truncated record and the sentinel alike: the stream is
//! over.

use crate::error::{FormatError, Result};
use crate::packet::{checked_len, Packet, MAX_PACKET_BYTES};
use crate::wire;
use std::io::{Read, Write};

/// Magic identifying the container format.
pub const MAGIC: &[u8; 9] = b"#!SILK_V3";

/// Marker byte that precedes the magic in the legacy layout.
pub const LEGACY_MARKER: u8 = 0x02;

/// Record length value that terminates a stream.
pub const END_OF_STREAM: i16 = -1;

/// Which of the two recognized header layouts a stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderLayout {
    /// `#!SILK_V3`
    #[default]
    Modern,
    /// `0x02 #!SILK_V3`
    Legacy,
}

impl HeaderLayout {
    /// Header bytes for this layout.
    pub fn bytes(self) -> Vec<u8> {
        let mut header = Vec::with_capacity(MAGIC.len() + 1);
        if self == HeaderLayout::Legacy {
            header.push(LEGACY_MARKER);
        }
        header.extend_from_slice(MAGIC);
        header
    }
}

/// Writes a container stream.
pub struct BitstreamWriter<W: Write> {
    inner: W,
    layout: HeaderLayout,
    end_marker: bool,
    header_written: bool,
    packets_written: u64,
}

impl<W: Write> BitstreamWriter<W> {
    /// Create a writer for the given header layout.
    pub fn new(inner: W, layout: HeaderLayout) -> Self {
        Self {
            inner,
            layout,
            end_marker: false,
            header_written: false,
            packets_written: 0,
        }
    }

    /// Also write the -1 sentinel record on `finish`.
    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }

    /// Write the header. Later calls are no-ops.
    pub fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.inner.write_all(&self.layout.bytes())?;
        self.header_written = true;
        Ok(())
    }

    /// Write one length-prefixed record.
    ///
    /// # Errors
    /// `FormatError::OversizedPacket` if the payload cannot be represented.
    pub fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PACKET_BYTES {
            return Err(FormatError::OversizedPacket {
                size: payload.len(),
                max: MAX_PACKET_BYTES,
            }
            .into());
        }

        self.write_header()?;
        wire::write_i16_le(&mut self.inner, payload.len() as i16)?;
        self.inner.write_all(payload)?;
        self.packets_written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Terminate the stream and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.write_header()?;
        if self.end_marker {
            wire::write_i16_le(&mut self.inner, END_OF_STREAM)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads a container stream.
pub struct BitstreamReader<R: Read> {
    inner: R,
    layout: Option<HeaderLayout>,
}

impl<R: Read> BitstreamReader<R> {
    /// Create a reader. `read_header` must be called before `read_packet`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            layout: None,
        }
    }

    /// Layout detected by `read_header`, if it succeeded.
    pub fn layout(&self) -> Option<HeaderLayout> {
        self.layout
    }

    /// Validate the header against both recognized layouts.
    ///
    /// # Errors
    /// `FormatError::BadHeader` with the bytes actually read.
    pub fn read_header(&mut self) -> Result<HeaderLayout> {
        let mut first = [0u8; 1];
        if wire::read_full(&mut self.inner, &mut first)? == 0 {
            return Err(FormatError::BadHeader { actual: Vec::new() }.into());
        }

        let (layout, expected): (HeaderLayout, &[u8]) = if first[0] == MAGIC[0] {
            (HeaderLayout::Modern, &MAGIC[1..])
        } else {
            (HeaderLayout::Legacy, &MAGIC[..])
        };

        let mut rest = vec![0u8; expected.len()];
        let n = wire::read_full(&mut self.inner, &mut rest)?;
        if rest[..n] != *expected {
            let mut actual = first.to_vec();
            actual.extend_from_slice(&rest[..n]);
            return Err(FormatError::BadHeader { actual }.into());
        }

        self.layout = Some(layout);
        Ok(layout)
    }

    /// Read the next record.
    ///
    /// # Returns
    /// - `Ok(Some(packet))` for a complete record (possibly zero-length)
    /// - `Ok(None)` at end of input, on a truncated record, or on the sentinel
    ///
    /// # Errors
    /// `FormatError` for negative or oversized lengths.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        let len = match wire::read_i16_le(&mut self.inner)? {
            Some(len) => len,
            None => return Ok(None),
        };

        if len == END_OF_STREAM {
            tracing::trace!("end-of-stream sentinel");
            return Ok(None);
        }

        let size = checked_len(len)?;
        let mut payload = vec![0u8; size];
        let n = wire::read_full(&mut self.inner, &mut payload)?;
        if n < size {
            tracing::debug!(expected = size, actual = n, "truncated record at end of stream");
            return Ok(None);
        }

        Ok(Some(Packet::new(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Cursor;

    fn stream(layout: HeaderLayout, records: &[&[u8]]) -> Vec<u8> {
        let mut writer = BitstreamWriter::new(Vec::new(), layout);
        writer.write_header().unwrap();
        for record in records {
            writer.write_packet(record).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_modern_header_bytes() {
        let bytes = stream(HeaderLayout::Modern, &[]);
        assert_eq!(bytes, b"#!SILK_V3".to_vec());
    }

    #[test]
    fn test_legacy_header_bytes() {
        let bytes = stream(HeaderLayout::Legacy, &[]);
        assert_eq!(bytes[0], LEGACY_MARKER);
        assert_eq!(&bytes[1..], MAGIC);
    }

    #[test]
    fn test_record_layout() {
        let bytes = stream(HeaderLayout::Modern, &[&[0xAA, 0xBB], &[]]);

        assert_eq!(&bytes[9..11], &[2, 0]);
        assert_eq!(&bytes[11..13], &[0xAA, 0xBB]);
        assert_eq!(&bytes[13..15], &[0, 0]);
        assert_eq!(bytes.len(), 15);
    }

    #[test]
    fn test_header_written_once() {
        let mut writer = BitstreamWriter::new(Vec::new(), HeaderLayout::Modern);
        writer.write_header().unwrap();
        writer.write_header().unwrap();
        writer.write_packet(&[1]).unwrap();

        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), 9 + 2 + 1);
    }

    #[test]
    fn test_end_marker_only_when_requested() {
        let plain = stream(HeaderLayout::Modern, &[&[1]]);
        assert_eq!(&plain[plain.len() - 1..], &[1]);

        let mut writer =
            BitstreamWriter::new(Vec::new(), HeaderLayout::Legacy).with_end_marker(true);
        writer.write_packet(&[1]).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_read_both_layouts() {
        for layout in [HeaderLayout::Modern, HeaderLayout::Legacy] {
            let bytes = stream(layout, &[&[7, 8, 9]]);
            let mut reader = BitstreamReader::new(Cursor::new(bytes));

            assert_eq!(reader.read_header().unwrap(), layout);
            assert_eq!(reader.layout(), Some(layout));
            assert_eq!(reader.read_packet().unwrap(), Some(Packet::new(vec![7, 8, 9])));
            assert_eq!(reader.read_packet().unwrap(), None);
        }
    }

    #[test]
    fn test_any_legacy_marker_accepted() {
        for marker in [0x00, 0x01, 0x02, 0xFF] {
            let mut bytes = vec![marker];
            bytes.extend_from_slice(MAGIC);
            bytes.extend_from_slice(&[1, 0, 42]);
            let mut reader = BitstreamReader::new(Cursor::new(bytes));

            assert_eq!(reader.read_header().unwrap(), HeaderLayout::Legacy);
            assert_eq!(reader.read_packet().unwrap(), Some(Packet::new(vec![42])));
        }
    }

    #[test]
    fn test_bad_header() {
        let mut reader = BitstreamReader::new(Cursor::new(b"RIFF....WAVE".to_vec()));
        assert!(matches!(
            reader.read_header(),
            Err(Error::Format(FormatError::BadHeader { .. }))
        ));

        let mut reader = BitstreamReader::new(Cursor::new(b"#!SILK_V2".to_vec()));
        match reader.read_header() {
            Err(Error::Format(FormatError::BadHeader { actual })) => {
                assert_eq!(actual, b"#!SILK_V2".to_vec());
            }
            other => panic!("expected bad header, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_truncated_and_empty_header() {
        let mut reader = BitstreamReader::new(Cursor::new(b"#!SIL".to_vec()));
        assert!(reader.read_header().is_err());

        let mut reader = BitstreamReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_header().is_err());
        assert_eq!(reader.layout(), None);
    }

    #[test]
    fn test_sentinel_ends_stream() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0, 0x42, 0xFF, 0xFF, 1, 0, 0x43]);
        let mut reader = BitstreamReader::new(Cursor::new(bytes));
        reader.read_header().unwrap();

        assert_eq!(reader.read_packet().unwrap(), Some(Packet::new(vec![0x42])));
        assert_eq!(reader.read_packet().unwrap(), None);
    }

    #[test]
    fn test_truncated_payload_ends_stream() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[4, 0, 1, 2]);
        let mut reader = BitstreamReader::new(Cursor::new(bytes));
        reader.read_header().unwrap();

        assert_eq!(reader.read_packet().unwrap(), None);
    }

    #[test]
    fn test_negative_length_is_format_error() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&(-2i16).to_le_bytes());
        let mut reader = BitstreamReader::new(Cursor::new(bytes));
        reader.read_header().unwrap();

        assert!(matches!(
            reader.read_packet(),
            Err(Error::Format(FormatError::NegativeLength(-2)))
        ));
    }

    #[test]
    fn test_oversized_length_is_format_error() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&6000i16.to_le_bytes());
        bytes.extend(std::iter::repeat(0).take(6000));
        let mut reader = BitstreamReader::new(Cursor::new(bytes));
        reader.read_header().unwrap();

        assert!(matches!(
            reader.read_packet(),
            Err(Error::Format(FormatError::OversizedPacket { size: 6000, .. }))
        ));
    }

    #[test]
    fn test_writer_rejects_oversized() {
        let mut writer = BitstreamWriter::new(Vec::new(), HeaderLayout::Modern);
        let payload = vec![0u8; MAX_PACKET_BYTES + 1];
        assert!(writer.write_packet(&payload).is_err());
        assert_eq!(writer.packets_written(), 0);
    }
}

//! Canonical little-endian I/O for record lengths and PCM samples.
//!
//! Every multi-byte value that crosses the file boundary goes through this
//! module. Values are always little-endian on the wire, independent of the
//! host byte order, so no other module ever swaps bytes.
//!
//! Short reads are not errors here: callers get the number of complete
//! units that were available and decide whether that means end of stream.

use std::io::{self, Read, Write};

/// Read into `buf` until it is full or the reader reaches end of input.
///
/// Returns the number of bytes actually read. Unlike `read_exact`, a short
/// count is reported rather than turned into an error.
pub fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read one little-endian i16.
///
/// Returns `None` if fewer than two bytes remain.
pub fn read_i16_le<R: Read>(reader: &mut R) -> io::Result<Option<i16>> {
    let mut bytes = [0u8; 2];
    if read_full(reader, &mut bytes)? < bytes.len() {
        return Ok(None);
    }
    Ok(Some(i16::from_le_bytes(bytes)))
}

/// Write one little-endian i16.
pub fn write_i16_le<W: Write>(writer: &mut W, value: i16) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read up to `count` PCM samples, replacing the contents of `samples`.
///
/// Returns the number of complete samples read. A trailing odd byte is
/// dropped.
pub fn read_samples<R: Read>(
    reader: &mut R,
    samples: &mut Vec<i16>,
    count: usize,
) -> io::Result<usize> {
    let mut bytes = vec![0u8; count * 2];
    let n = read_full(reader, &mut bytes)? / 2;

    samples.clear();
    samples.extend(
        bytes[..n * 2]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );

    Ok(n)
}

/// Write PCM samples as little-endian i16.
pub fn write_samples<W: Write>(writer: &mut W, samples: &[i16]) -> io::Result<()> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    writer.write_all(&bytes)
}

/// Decode a little-endian PCM byte buffer into samples.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

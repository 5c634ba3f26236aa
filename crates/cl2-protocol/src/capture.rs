//! Capture file format
//!
//! A capture is a plain sequence of records with no file header, trailer,
//! record count or checksum:
//!
//! ```text
//! [timestamp: f64 LE][length: u32 LE][data: length bytes] ...
//! ```
//!
//! End of file, a partial record header, or a record whose length exceeds the
//! remaining bytes all mark the end of the stream. A truncated final record is
//! still yielded (flagged incomplete) so partial captures can be inspected.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::{debug, trace, warn};

use crate::error::CaptureError;
use crate::frame::Frame;

/// Size of the per-record header (timestamp + length)
pub const RECORD_HEADER_LEN: usize = 12;

/// Encode one capture record
pub fn encode_record(timestamp: f64, data: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let len = u32::try_from(data.len()).map_err(|_| CaptureError::FrameTooLarge(data.len()))?;
    let mut out = Vec::with_capacity(RECORD_HEADER_LEN + data.len());
    out.write_f64::<LittleEndian>(timestamp)?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(data);
    Ok(out)
}

fn parse_record_header(header: &[u8]) -> (f64, u32) {
    (
        LittleEndian::read_f64(&header[0..8]),
        LittleEndian::read_u32(&header[8..12]),
    )
}

/// Segment an in-memory capture into frames
///
/// The returned iterator is cheap to clone, so a capture can be walked any
/// number of times.
pub fn segment(bytes: &[u8]) -> RecordSegmenter<'_> {
    RecordSegmenter::new(bytes)
}

/// Lazy frame iterator over an in-memory capture
#[derive(Debug, Clone)]
pub struct RecordSegmenter<'a> {
    remaining: &'a [u8],
    done: bool,
}

impl<'a> RecordSegmenter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            remaining: bytes,
            done: false,
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> &'a [u8] {
        self.remaining
    }
}

impl Iterator for RecordSegmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.done || self.remaining.len() < RECORD_HEADER_LEN {
            self.done = true;
            return None;
        }

        let (timestamp, len) = parse_record_header(&self.remaining[..RECORD_HEADER_LEN]);
        let body = &self.remaining[RECORD_HEADER_LEN..];

        let wanted = len as usize;
        if body.len() < wanted {
            warn!(
                "Truncated capture record: declared {} bytes, {} available",
                len,
                body.len()
            );
            self.done = true;
            self.remaining = &[];
            return Some(Frame::with_declared_len(body.to_vec(), timestamp, len));
        }

        trace!("Capture record at {:.3}: {} bytes", timestamp, len);
        self.remaining = &body[wanted..];
        Some(Frame::new(body[..wanted].to_vec(), timestamp))
    }
}

/// Read into `buf` until it is full or the reader hits EOF
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Streaming frame reader over any [`Read`] source
///
/// Yields `Err` only for genuine I/O failures; truncation simply ends the
/// stream after the partial frame.
pub struct CaptureReader<R> {
    reader: R,
    done: bool,
}

impl CaptureReader<BufReader<File>> {
    /// Open a capture file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        debug!("Opening capture {}", path.display());
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> CaptureReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        let got = read_full(&mut self.reader, &mut header)?;
        if got < RECORD_HEADER_LEN {
            if got > 0 {
                debug!("Ignoring {} trailing bytes of a partial record header", got);
            }
            self.done = true;
            return Ok(None);
        }

        let (timestamp, len) = parse_record_header(&header);
        let mut data = Vec::new();
        (&mut self.reader)
            .take(u64::from(len))
            .read_to_end(&mut data)?;

        if data.len() < len as usize {
            warn!(
                "Truncated capture record: declared {} bytes, {} available",
                len,
                data.len()
            );
            self.done = true;
            return Ok(Some(Frame::with_declared_len(data, timestamp, len)));
        }

        Ok(Some(Frame::new(data, timestamp)))
    }
}

impl<R: Read> Iterator for CaptureReader<R> {
    type Item = Result<Frame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(frame) => frame.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Load every frame of a capture file
pub fn read_capture_file(path: impl AsRef<Path>) -> Result<Vec<Frame>, CaptureError> {
    CaptureReader::open(path)?.collect()
}

/// Appends frames to a capture stream, flushing after each record
pub struct CaptureWriter<W: Write> {
    writer: W,
    records: u64,
    bytes: u64,
}

impl CaptureWriter<BufWriter<File>> {
    /// Create (or truncate) a capture file
    pub fn create(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records: 0,
            bytes: 0,
        }
    }

    /// Write a single record and flush it to the underlying sink
    pub fn write_record(&mut self, timestamp: f64, data: &[u8]) -> Result<(), CaptureError> {
        let record = encode_record(timestamp, data)?;
        self.writer.write_all(&record)?;
        self.writer.flush()?;
        self.records += 1;
        self.bytes += data.len() as u64;
        Ok(())
    }

    /// Write a frame as a record
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), CaptureError> {
        self.write_record(frame.timestamp(), frame.data())
    }

    /// Records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Frame payload bytes written so far (excluding record headers)
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_records() -> Vec<u8> {
        let mut bytes = encode_record(1.25, &[0xAA, 0xBB]).unwrap();
        bytes.extend(encode_record(2.5, &[0x01, 0x02, 0x03]).unwrap());
        bytes
    }

    #[test]
    fn test_record_layout_is_little_endian() {
        let record = encode_record(1.0, &[0x42]).unwrap();
        assert_eq!(&record[0..8], &1.0f64.to_le_bytes());
        assert_eq!(&record[8..12], &[1, 0, 0, 0]);
        assert_eq!(record[12], 0x42);
    }

    #[test]
    fn test_segment_reads_all_records() {
        let bytes = two_records();
        let frames: Vec<_> = segment(&bytes).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data(), &[0xAA, 0xBB]);
        assert_eq!(frames[0].timestamp(), 1.25);
        assert_eq!(frames[1].data(), &[0x01, 0x02, 0x03]);
        assert!(frames.iter().all(Frame::is_complete));
    }

    #[test]
    fn test_segment_is_restartable() {
        let bytes = two_records();
        let segmenter = segment(&bytes);
        let first: Vec<_> = segmenter.clone().collect();
        let second: Vec<_> = segmenter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_header_ends_stream() {
        let mut bytes = two_records();
        bytes.extend_from_slice(&[0u8; 5]);
        assert_eq!(segment(&bytes).count(), 2);
    }

    #[test]
    fn test_truncated_record_is_yielded_incomplete() {
        let mut bytes = encode_record(0.5, &[9, 9]).unwrap();
        let mut partial = encode_record(0.75, &[1, 2, 3, 4, 5, 6]).unwrap();
        partial.truncate(RECORD_HEADER_LEN + 3);
        bytes.extend(partial);

        let frames: Vec<_> = segment(&bytes).collect();
        assert_eq!(frames.len(), 2);
        assert!(!frames[1].is_complete());
        assert_eq!(frames[1].data(), &[1, 2, 3]);
        assert_eq!(frames[1].declared_len(), 6);
    }

    #[test]
    fn test_reader_matches_segmenter() {
        let mut bytes = two_records();
        bytes.extend(&encode_record(3.0, &[7; 20]).unwrap()[..RECORD_HEADER_LEN + 4]);

        let from_reader: Vec<_> = CaptureReader::new(&bytes[..])
            .collect::<Result<_, _>>()
            .unwrap();
        let from_slice: Vec<_> = segment(&bytes).collect();
        assert_eq!(from_reader, from_slice);
        assert!(!from_reader[2].is_complete());
    }

    #[test]
    fn test_writer_roundtrip() {
        let mut writer = CaptureWriter::new(Vec::new());
        writer.write_record(10.0, &[1, 2, 3]).unwrap();
        writer.write_frame(&Frame::new(vec![4, 5], 11.0)).unwrap();
        assert_eq!(writer.records(), 2);
        assert_eq!(writer.bytes(), 5);

        let bytes = writer.into_inner();
        let frames: Vec<_> = segment(&bytes).collect();
        assert_eq!(frames[1].data(), &[4, 5]);
        assert_eq!(frames[1].timestamp(), 11.0);
    }

    #[test]
    fn test_empty_capture() {
        assert_eq!(segment(&[]).count(), 0);
        assert_eq!(CaptureReader::new(&[][..]).count(), 0);
    }
}

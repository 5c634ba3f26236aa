//! Replaying captured frames onto the bus
//!
//! Injected frames reach real HVAC equipment. Callers are expected to confirm
//! with the operator before replaying to a live port; [`Replayer::preview`]
//! supports a dry run.

use std::ops::Range;
use std::path::Path;
use std::time::Duration;

use cl2_protocol::display::{hex_string, truncated_hex};
use cl2_protocol::{read_capture_file, Frame};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::ReplayError;

/// Frames listed by a dry run before the rest are summarized
pub const PREVIEW_LIMIT: usize = 10;

/// Hex characters shown per frame in sequence logs and previews
const PREVIEW_HEX_CHARS: usize = 60;

/// One line of a dry-run listing
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewLine {
    pub index: usize,
    pub hex: String,
}

/// What a replay would send
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayPreview {
    pub range: Range<usize>,
    pub lines: Vec<PreviewLine>,
    /// Frames in the range beyond the listed ones
    pub remaining: usize,
}

/// Frames loaded from a capture, ready to be written to a sink
#[derive(Debug, Clone, Default)]
pub struct Replayer {
    frames: Vec<Frame>,
}

impl Replayer {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Load every record of a capture file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let frames = read_capture_file(path)?;
        info!("Loaded {} packets", frames.len());
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Result<&Frame, ReplayError> {
        self.frames.get(index).ok_or(ReplayError::IndexOutOfRange {
            index,
            len: self.frames.len(),
        })
    }

    /// Validate `start..end` against the loaded frames; `end` defaults to all
    pub fn range(&self, start: usize, end: Option<usize>) -> Result<Range<usize>, ReplayError> {
        let len = self.frames.len();
        let end = end.unwrap_or(len);
        if start > end || end > len {
            return Err(ReplayError::InvalidRange { start, end, len });
        }
        Ok(start..end)
    }

    /// List what replaying `range` would send, without sending anything
    pub fn preview(&self, range: Range<usize>) -> Result<ReplayPreview, ReplayError> {
        let range = self.range(range.start, Some(range.end))?;
        let lines = self.frames[range.clone()]
            .iter()
            .zip(range.clone())
            .take(PREVIEW_LIMIT)
            .map(|(frame, index)| PreviewLine {
                index,
                hex: truncated_hex(frame.data(), PREVIEW_HEX_CHARS),
            })
            .collect::<Vec<_>>();
        let remaining = range.len() - lines.len();
        Ok(ReplayPreview {
            range,
            lines,
            remaining,
        })
    }

    /// Write one frame to `sink`
    pub async fn replay_single<W>(&self, index: usize, sink: &mut W) -> Result<(), ReplayError>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.frame(index)?;
        info!("Sending packet {}: {}", index, hex_string(frame.data(), " "));
        sink.write_all(frame.data()).await?;
        sink.flush().await?;
        Ok(())
    }

    /// Write frames `range` to `sink` in order, returning how many were sent
    ///
    /// With `preserve_timing`, the gap between consecutive capture timestamps
    /// is slept before each frame after the first. Non-positive gaps are not
    /// waited on.
    pub async fn replay_sequence<W>(
        &self,
        range: Range<usize>,
        preserve_timing: bool,
        sink: &mut W,
    ) -> Result<usize, ReplayError>
    where
        W: AsyncWrite + Unpin,
    {
        let range = self.range(range.start, Some(range.end))?;
        if range.is_empty() {
            return Ok(0);
        }
        info!("Replaying packets {} to {}", range.start, range.end - 1);

        for i in range.clone() {
            let frame = &self.frames[i];

            if preserve_timing && i > range.start {
                let gap = frame.timestamp() - self.frames[i - 1].timestamp();
                if let Ok(delay) = Duration::try_from_secs_f64(gap) {
                    if !delay.is_zero() {
                        debug!("Waiting {:?} before packet {}", delay, i);
                        sleep(delay).await;
                    }
                }
            }

            debug!("{}: {}", i, truncated_hex(frame.data(), PREVIEW_HEX_CHARS));
            sink.write_all(frame.data()).await?;
        }
        sink.flush().await?;

        info!("Sequence complete");
        Ok(range.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::time::Instant;

    fn replayer() -> Replayer {
        Replayer::new(vec![
            Frame::new(vec![0x01, 0x02], 100.0),
            Frame::new(vec![0x03], 100.5),
            Frame::new(vec![0x04, 0x05, 0x06], 100.25),
            Frame::new(vec![0x07], 102.25),
        ])
    }

    #[test]
    fn test_range_validation() {
        let r = replayer();
        assert_eq!(r.range(0, None).unwrap(), 0..4);
        assert_eq!(r.range(1, Some(3)).unwrap(), 1..3);
        assert!(matches!(
            r.range(0, Some(5)),
            Err(ReplayError::InvalidRange { end: 5, len: 4, .. })
        ));
        assert!(r.range(3, Some(2)).is_err());
        assert!(matches!(
            r.frame(4),
            Err(ReplayError::IndexOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_preview_limits_listing() {
        let frames = (0..25).map(|i| Frame::new(vec![i as u8], f64::from(i))).collect();
        let r = Replayer::new(frames);
        let preview = r.preview(5..25).unwrap();
        assert_eq!(preview.lines.len(), PREVIEW_LIMIT);
        assert_eq!(preview.lines[0].index, 5);
        assert_eq!(preview.lines[0].hex, "05");
        assert_eq!(preview.remaining, 10);
    }

    #[tokio::test]
    async fn test_replay_single() {
        let r = replayer();
        let mut sink = Vec::new();
        r.replay_single(2, &mut sink).await.unwrap();
        assert_eq!(sink, vec![0x04, 0x05, 0x06]);
        assert!(r.replay_single(9, &mut sink).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_sequence_preserves_timing() {
        let r = replayer();
        let (mut sink, mut bus) = tokio::io::duplex(64);

        let started = Instant::now();
        let sent = r.replay_sequence(0..4, true, &mut sink).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(sent, 4);
        // 0.5s, then a negative gap (skipped), then 2.0s
        assert!(elapsed >= Duration::from_millis(2500));
        assert!(elapsed < Duration::from_millis(2600));

        drop(sink);
        let mut received = Vec::new();
        bus.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_sequence_without_timing() {
        let r = replayer();
        let mut sink = Vec::new();
        let started = Instant::now();
        let sent = r.replay_sequence(1..3, false, &mut sink).await.unwrap();
        assert_eq!(sent, 2);
        assert_eq!(sink, vec![3, 4, 5, 6]);
        assert!(started.elapsed() < Duration::from_millis(1));
    }
}

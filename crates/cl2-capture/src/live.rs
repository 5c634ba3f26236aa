//! Live frame segmentation
//!
//! The bus has no known start-of-frame marker, so frames are delimited by
//! silence: once bytes have been buffered and nothing new has arrived for the
//! quiet interval, the buffer is emitted as one frame.
//!
//! [`run_live_segmenter`] is an actor task that owns the buffer and uses a
//! `select!` loop to:
//! - Read bytes from the port and append them
//! - Check the quiet interval on a fixed tick
//! - Stop on a shutdown signal

use std::io;
use std::time::Duration;

use cl2_protocol::Frame;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Default silence that ends a frame
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(50);

/// Default boundary check period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Silence after the last byte that closes a frame
    pub quiet_interval: Duration,
    /// How often the quiet interval is checked
    pub poll_interval: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            quiet_interval: DEFAULT_QUIET_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SegmenterConfig {
    pub fn with_quiet_interval(quiet_interval: Duration) -> Self {
        Self {
            quiet_interval,
            ..Default::default()
        }
    }
}

/// Byte buffer with quiet-interval boundary detection
#[derive(Debug)]
pub struct FrameAccumulator {
    buffer: Vec<u8>,
    last_byte_at: Option<Instant>,
    quiet_interval: Duration,
}

impl FrameAccumulator {
    pub fn new(quiet_interval: Duration) -> Self {
        Self {
            buffer: Vec::new(),
            last_byte_at: None,
            quiet_interval,
        }
    }

    /// Append bytes received at `now`
    pub fn push(&mut self, bytes: &[u8], now: Instant) {
        if bytes.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(bytes);
        self.last_byte_at = Some(now);
    }

    /// Take the buffered frame if the bus has been quiet long enough
    pub fn poll(&mut self, now: Instant) -> Option<Vec<u8>> {
        let last = self.last_byte_at?;
        if self.buffer.is_empty() || now.saturating_duration_since(last) < self.quiet_interval {
            return None;
        }
        self.last_byte_at = None;
        Some(std::mem::take(&mut self.buffer))
    }

    /// Bytes waiting for a boundary
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial frame, returning how many bytes were dropped
    pub fn discard(&mut self) -> usize {
        self.last_byte_at = None;
        std::mem::take(&mut self.buffer).len()
    }
}

/// Wall-clock capture timestamp in seconds since the Unix epoch
pub fn capture_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Run the segmenter task
///
/// Frames are sent on `frame_tx` as their boundaries are detected. The task
/// ends when the stream closes, the frame receiver is dropped, or
/// `shutdown_rx` flips to `true` (or its sender is dropped). Bytes still
/// buffered at that point are discarded.
pub async fn run_live_segmenter<S>(
    mut stream: S,
    config: SegmenterConfig,
    frame_tx: mpsc::Sender<Frame>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut accumulator = FrameAccumulator::new(config.quiet_interval);
    let mut tick = interval(config.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = [0u8; 1024];

    debug!(
        "Starting segmenter (quiet interval {:?})",
        config.quiet_interval
    );

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Bus stream closed");
                        break;
                    }
                    Ok(n) => {
                        trace!("Received {} bytes: {:02X?}", n, &buf[..n]);
                        accumulator.push(&buf[..n], Instant::now());
                    }
                    Err(e) => {
                        warn!("Bus read error: {}", e);
                        return Err(e);
                    }
                }
            }

            _ = tick.tick() => {
                if let Some(data) = accumulator.poll(Instant::now()) {
                    let frame = Frame::new(data, capture_timestamp());
                    if frame_tx.send(frame).await.is_err() {
                        debug!("Frame receiver dropped");
                        break;
                    }
                }
            }

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown requested for segmenter");
                    break;
                }
            }
        }
    }

    let discarded = accumulator.discard();
    if discarded > 0 {
        debug!("Discarded {} bytes of partial frame", discarded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::time::sleep;

    #[test]
    fn test_accumulator_boundary() {
        let start = Instant::now();
        let mut acc = FrameAccumulator::new(Duration::from_millis(50));

        assert!(acc.poll(start).is_none());

        acc.push(&[1, 2, 3], start);
        acc.push(&[4], start + Duration::from_millis(30));
        assert!(acc.poll(start + Duration::from_millis(60)).is_none());
        assert_eq!(acc.pending(), 4);

        let frame = acc.poll(start + Duration::from_millis(80)).unwrap();
        assert_eq!(frame, vec![1, 2, 3, 4]);
        assert_eq!(acc.pending(), 0);
        assert!(acc.poll(start + Duration::from_millis(200)).is_none());
    }

    #[test]
    fn test_accumulator_discard() {
        let mut acc = FrameAccumulator::new(Duration::from_millis(50));
        let now = Instant::now();
        acc.push(&[9, 9], now);
        assert_eq!(acc.discard(), 2);
        assert!(acc.poll(now + Duration::from_secs(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_segmenter_splits_on_silence() {
        let (mut bus, port) = tokio::io::duplex(1024);
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_live_segmenter(
            port,
            SegmenterConfig::default(),
            frame_tx,
            shutdown_rx,
        ));

        bus.write_all(&[0x20, 0x01, 0x40]).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        bus.write_all(&[0x01, 0x02]).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        bus.write_all(&[0xAA, 0xBB]).await.unwrap();
        sleep(Duration::from_millis(100)).await;

        let first = frame_rx.recv().await.unwrap();
        assert_eq!(first.data(), &[0x20, 0x01, 0x40, 0x01, 0x02]);
        let second = frame_rx.recv().await.unwrap();
        assert_eq!(second.data(), &[0xAA, 0xBB]);
        assert!(second.timestamp() >= first.timestamp());

        // Trailing bytes without a boundary are dropped at end of stream
        bus.write_all(&[0xFF]).await.unwrap();
        drop(bus);
        assert!(frame_rx.recv().await.is_none());
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_segmenter_shutdown_discards_partial_frame() {
        let (mut bus, port) = tokio::io::duplex(1024);
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_live_segmenter(
            port,
            SegmenterConfig::default(),
            frame_tx,
            shutdown_rx,
        ));

        bus.write_all(&[1, 2, 3]).await.unwrap();
        sleep(Duration::from_millis(5)).await;
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .unwrap();
        assert!(result.unwrap().is_ok());
        assert!(frame_rx.recv().await.is_none());
    }
}

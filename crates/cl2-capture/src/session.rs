//! Capture sessions
//!
//! A session wires a bus stream through the live segmenter into a capture
//! file. Every frame is written and flushed as soon as it is framed, so an
//! interrupted capture loses at most the frame still being assembled.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use cl2_protocol::display::truncated_hex;
use cl2_protocol::{CaptureWriter, Frame};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::CaptureError;
use crate::live::{run_live_segmenter, SegmenterConfig};
use crate::serial::SerialSettings;

/// Frames buffered between the segmenter and the recorder
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Longest hex rendering logged per frame
const LOG_HEX_CHARS: usize = 80;

/// `capture_YYYYMMDD_HHMMSS.bin`
pub fn capture_file_name(now: DateTime<Local>) -> String {
    format!("capture_{}.bin", now.format("%Y%m%d_%H%M%S"))
}

/// Totals for a finished capture
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureStats {
    pub frames: u64,
    pub bytes: u64,
    pub duration: Duration,
}

/// Writes framed traffic to a capture file and keeps running totals
pub struct FrameRecorder<W: Write> {
    writer: CaptureWriter<W>,
    stats: CaptureStats,
    started: Instant,
    first_timestamp: Option<f64>,
}

impl<W: Write> FrameRecorder<W> {
    pub fn new(writer: CaptureWriter<W>) -> Self {
        Self {
            writer,
            stats: CaptureStats::default(),
            started: Instant::now(),
            first_timestamp: None,
        }
    }

    /// Write and flush one frame
    pub fn record(&mut self, frame: &Frame) -> Result<(), CaptureError> {
        self.writer.write_frame(frame)?;
        self.stats.frames += 1;
        self.stats.bytes += frame.len() as u64;

        let first = *self.first_timestamp.get_or_insert(frame.timestamp());
        info!(
            "{:8.3}s [{:3}] {}",
            frame.timestamp() - first,
            frame.len(),
            truncated_hex(frame.data(), LOG_HEX_CHARS)
        );
        Ok(())
    }

    /// Record frames until the channel closes
    pub async fn record_all(
        &mut self,
        frame_rx: &mut mpsc::Receiver<Frame>,
    ) -> Result<(), CaptureError> {
        while let Some(frame) = frame_rx.recv().await {
            self.record(&frame)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            duration: self.started.elapsed(),
            ..self.stats.clone()
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Capture from `stream` into `recorder` until `shutdown` resolves or the
/// stream ends
///
/// Frames already framed when shutdown arrives are still written. A read
/// error on the stream ends the capture with that error after the
/// already-framed traffic has been saved.
pub async fn run_capture<S, W, F>(
    stream: S,
    recorder: &mut FrameRecorder<W>,
    config: SegmenterConfig,
    shutdown: F,
) -> Result<CaptureStats, CaptureError>
where
    S: AsyncRead + Unpin + Send + 'static,
    W: Write,
    F: Future<Output = ()>,
{
    let (frame_tx, mut frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let segmenter = tokio::spawn(run_live_segmenter(stream, config, frame_tx, shutdown_rx));

    let recorded = tokio::select! {
        result = recorder.record_all(&mut frame_rx) => result,
        _ = shutdown => {
            info!("Stopping capture");
            let _ = shutdown_tx.send(true);
            recorder.record_all(&mut frame_rx).await
        }
    };

    if let Err(e) = recorded {
        // Release the port before reporting the write failure
        let _ = shutdown_tx.send(true);
        drop(frame_rx);
        let _ = segmenter.await;
        return Err(e);
    }

    match segmenter.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(CaptureError::Io(e)),
        Err(e) => warn!("Segmenter task failed: {}", e),
    }

    Ok(recorder.stats())
}

/// A capture from a serial port to a timestamped file
#[derive(Debug, Clone)]
pub struct CaptureSession {
    serial: SerialSettings,
    segmenter: SegmenterConfig,
    output_dir: PathBuf,
}

/// Where a session wrote and how much
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSummary {
    pub path: PathBuf,
    pub stats: CaptureStats,
}

impl CaptureSession {
    pub fn new(
        serial: SerialSettings,
        segmenter: SegmenterConfig,
        output_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            serial,
            segmenter,
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Capture until `shutdown` resolves, e.g. `tokio::signal::ctrl_c`
    pub async fn run<F>(&self, shutdown: F) -> Result<CaptureSummary, CaptureError>
    where
        F: Future<Output = ()>,
    {
        let stream = self.serial.open()?;

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(capture_file_name(Local::now()));
        let writer = CaptureWriter::create(&path)?;
        info!("Writing to {}", path.display());

        let mut recorder = FrameRecorder::new(writer);
        let stats = run_capture(stream, &mut recorder, self.segmenter, shutdown).await?;
        debug!("Capture file closed");

        info!(
            "Capture complete: {} packets, {} bytes, {:.1}s",
            stats.frames,
            stats.bytes,
            stats.duration.as_secs_f64()
        );

        Ok(CaptureSummary { path, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cl2_protocol::segment;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    #[test]
    fn test_capture_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(capture_file_name(now), "capture_20240309_070501.bin");
    }

    #[test]
    fn test_recorder_counts() {
        let mut recorder = FrameRecorder::new(CaptureWriter::new(Vec::new()));
        recorder.record(&Frame::new(vec![1, 2, 3], 10.0)).unwrap();
        recorder.record(&Frame::new(vec![4], 10.5)).unwrap();

        let stats = recorder.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.bytes, 4);

        let bytes = recorder.into_inner();
        let frames: Vec<_> = segment(&bytes).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].data(), &[4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_until_shutdown() {
        let (mut bus, port) = tokio::io::duplex(1024);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut recorder = FrameRecorder::new(CaptureWriter::new(Vec::new()));

        let feeder = tokio::spawn(async move {
            bus.write_all(&[0x20, 0x01, 0x40, 0x01]).await.unwrap();
            sleep(Duration::from_millis(100)).await;
            bus.write_all(&[0x40, 0x01, 0x20, 0x01]).await.unwrap();
            sleep(Duration::from_millis(100)).await;
            bus.write_all(&[0xEE]).await.unwrap();
            let _ = stop_tx.send(());
            // Keep the bus open so shutdown, not EOF, ends the capture
            sleep(Duration::from_secs(10)).await;
            drop(bus);
        });

        let shutdown = async {
            let _ = stop_rx.await;
        };
        let stats = run_capture(port, &mut recorder, SegmenterConfig::default(), shutdown)
            .await
            .unwrap();

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.bytes, 8);

        let bytes = recorder.into_inner();
        let frames: Vec<_> = segment(&bytes).collect();
        assert_eq!(frames[0].data(), &[0x20, 0x01, 0x40, 0x01]);
        assert_eq!(frames[1].data(), &[0x40, 0x01, 0x20, 0x01]);
        feeder.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_ends_with_stream() {
        let (mut bus, port) = tokio::io::duplex(1024);
        let mut recorder = FrameRecorder::new(CaptureWriter::new(Vec::new()));

        tokio::spawn(async move {
            bus.write_all(&[1, 2, 3]).await.unwrap();
            sleep(Duration::from_millis(100)).await;
            drop(bus);
        });

        let stats = run_capture(
            port,
            &mut recorder,
            SegmenterConfig::default(),
            std::future::pending::<()>(),
        )
        .await
        .unwrap();
        assert_eq!(stats.frames, 1);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_stops_segmenter() {
        let (mut bus, port) = tokio::io::duplex(1024);
        let mut recorder = FrameRecorder::new(CaptureWriter::new(FullDisk));

        bus.write_all(&[0x20, 0x01, 0x40, 0x01]).await.unwrap();
        let result = run_capture(
            port,
            &mut recorder,
            SegmenterConfig::default(),
            std::future::pending::<()>(),
        )
        .await;
        assert!(result.is_err());

        // The segmenter has exited and dropped its end of the bus
        assert!(bus.write_all(&[0x00]).await.is_err());
    }
}

//! ComfortLink II Live Capture
//!
//! Bus I/O for the toolkit:
//!
//! - [`live`]: quiet-interval framing of a live byte stream
//! - [`session`]: recording framed traffic to capture files
//! - [`replay`]: writing captured frames back onto the bus
//! - [`serial`]: port and line settings for the RS-485 adapter
//!
//! # Example
//!
//! ```rust,no_run
//! use cl2_capture::{CaptureSession, SegmenterConfig, SerialSettings};
//!
//! # async fn run() -> Result<(), cl2_capture::CaptureError> {
//! let session = CaptureSession::new(
//!     SerialSettings::new("/dev/ttyUSB0", 19200),
//!     SegmenterConfig::default(),
//!     "./captures/raw",
//! );
//! let summary = session
//!     .run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! println!("{} packets in {}", summary.stats.frames, summary.path.display());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod live;
pub mod replay;
pub mod serial;
pub mod session;

pub use error::{CaptureError, ReplayError};
pub use live::{run_live_segmenter, FrameAccumulator, SegmenterConfig};
pub use replay::{PreviewLine, ReplayPreview, Replayer, PREVIEW_LIMIT};
pub use serial::{Parity, SerialSettings};
pub use session::{
    capture_file_name, run_capture, CaptureSession, CaptureStats, CaptureSummary, FrameRecorder,
};

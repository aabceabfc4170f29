//! # frame-capture-sources
//!
//! Frame sources for frame-capture-kit.
//!
//! Provides:
//! - `CounterSource` — synthetic pattern writing the frame number into every element
//! - `RawFileSource` — replays back-to-back raw frames from a file or any reader
//!
//! ## Usage
//! ```ignore
//! use frame_capture_core::CaptureController;
//! use frame_capture_sources::RawFileSource;
//!
//! let source = RawFileSource::open("capture.raw", 3, 1280 * 720)?;
//! let controller = CaptureController::owned(source)?;
//! ```

pub mod counter;
pub mod raw_file;

pub use counter::CounterSource;
pub use raw_file::RawFileSource;

//! # frame-capture-core
//!
//! Multi-buffer frame capture core.
//!
//! Decouples one periodic producer from any number of readers through a
//! fixed pool of four reusable buffers. The producer runs on its own thread
//! and fills slots in place; readers get shared read-only views of the newest
//! complete frame without copying. Concrete producers implement the
//! `FrameSource` trait and plug into the generic `CaptureController`.
//!
//! ## Architecture
//!
//! ```text
//! frame-capture-core (this crate)
//! ├── buffer/   ← FixedBuffer, BufferPool (slot roles + rotation), FrameView
//! ├── sync/     ← FrameSignal (first frame / end of stream), Latch
//! ├── session/  ← CaptureController (producer thread lifecycle, reads)
//! ├── traits/   ← FrameSource, SourceHandle, CaptureObserver
//! └── models/   ← CaptureError, ControllerState, ControllerConfig, CaptureStats, Timestamp
//! ```
//!
//! ## Usage
//! ```ignore
//! use frame_capture_core::CaptureController;
//!
//! let controller = CaptureController::owned(my_source)?;
//! controller.setup()?;
//! controller.start_capture()?;
//! while let Some(frame) = controller.read() {
//!     render(&frame, frame.timestamp());
//! }
//! controller.finish_capture()?;
//! ```

pub mod buffer;
pub mod models;
pub mod session;
pub mod sync;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use buffer::fixed_buffer::FixedBuffer;
pub use buffer::pool::{BufferPool, FrameView, SlotRoles, WriteSlot, POOL_SLOTS};
pub use models::config::ControllerConfig;
pub use models::error::CaptureError;
pub use models::state::ControllerState;
pub use models::stats::CaptureStats;
pub use models::timestamp::Timestamp;
pub use session::controller::CaptureController;
pub use sync::signal::{FrameSignal, Latch, SignalState};
pub use traits::capture_observer::CaptureObserver;
pub use traits::frame_source::{FrameSource, SourceHandle};

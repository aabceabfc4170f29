use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::fixed_buffer::FixedBuffer;
use crate::models::error::CaptureError;

/// Interface for a producer of fixed-size frames.
///
/// Implemented by:
/// - `CounterSource` (synthetic test pattern)
/// - `RawFileSource` (raw frame file replay)
///
/// `fill` is called from the controller's producer thread, once per loop
/// iteration while capture is active.
pub trait FrameSource: Send {
    /// Bytes per element.
    fn element_size(&self) -> usize;

    /// Elements per frame.
    fn element_count(&self) -> usize;

    /// Write one frame into `buffer`, which is exactly
    /// `element_size() * element_count()` bytes.
    ///
    /// Any error ends the stream. Sources that can fail transiently must
    /// retry internally before returning one.
    fn fill(&mut self, buffer: &mut FixedBuffer) -> Result<(), CaptureError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn element_size(&self) -> usize {
        (**self).element_size()
    }

    fn element_count(&self) -> usize {
        (**self).element_count()
    }

    fn fill(&mut self, buffer: &mut FixedBuffer) -> Result<(), CaptureError> {
        (**self).fill(buffer)
    }
}

/// How the controller holds its source.
///
/// - `Owned`: the controller drops the source when capture finishes.
/// - `Shared`: the caller keeps its own handle; the controller only drops its
///   clone of the `Arc` and the source outlives the controller.
pub enum SourceHandle<S> {
    Owned(S),
    Shared(Arc<Mutex<S>>),
}

impl<S: FrameSource> SourceHandle<S> {
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    pub fn element_size(&self) -> usize {
        match self {
            Self::Owned(source) => source.element_size(),
            Self::Shared(source) => source.lock().element_size(),
        }
    }

    pub fn element_count(&self) -> usize {
        match self {
            Self::Owned(source) => source.element_count(),
            Self::Shared(source) => source.lock().element_count(),
        }
    }

    pub fn fill(&mut self, buffer: &mut FixedBuffer) -> Result<(), CaptureError> {
        match self {
            Self::Owned(source) => source.fill(buffer),
            Self::Shared(source) => source.lock().fill(buffer),
        }
    }

    /// Drop the controller's hold on the source.
    pub(crate) fn release(self) {
        match self {
            Self::Owned(source) => {
                log::debug!("releasing owned frame source");
                drop(source);
            }
            Self::Shared(source) => {
                log::debug!(
                    "detaching shared frame source ({} other holders)",
                    Arc::strong_count(&source) - 1
                );
            }
        }
    }
}

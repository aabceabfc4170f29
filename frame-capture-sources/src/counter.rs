//! Synthetic counter source.
//!
//! Writes the frame number into every element of each frame. Useful as a
//! stand-in camera: a reader can tell from any single element which frame it
//! is looking at, and whether the frame is torn.

use std::thread;
use std::time::Duration;

use frame_capture_core::{CaptureError, FixedBuffer, FrameSource};

/// Test pattern generator.
///
/// Frame `n` (0-based) stores `n` little-endian in every element, truncated
/// or zero-padded to the element size.
#[derive(Debug, Clone)]
pub struct CounterSource {
    element_size: usize,
    element_count: usize,
    next_frame: u64,
    frame_limit: Option<u64>,
    frame_interval: Duration,
}

impl CounterSource {
    pub fn new(element_size: usize, element_count: usize) -> Self {
        Self {
            element_size,
            element_count,
            next_frame: 0,
            frame_limit: None,
            frame_interval: Duration::ZERO,
        }
    }

    /// Report `SourceExhausted` after `frames` successful fills.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Sleep this long in every fill, like a camera with a fixed frame rate.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Number of frames produced so far.
    pub fn frames_filled(&self) -> u64 {
        self.next_frame
    }

    /// Recover the frame number from a frame written by this source.
    ///
    /// Returns `None` if the elements disagree (a torn or foreign frame).
    pub fn decode_counter(data: &[u8], element_size: usize) -> Option<u64> {
        if element_size == 0 || data.is_empty() || data.len() % element_size != 0 {
            return None;
        }
        let mut elements = data.chunks_exact(element_size);
        let first = elements.next()?;
        if !elements.all(|e| e == first) {
            return None;
        }

        let mut bytes = [0u8; 8];
        let n = element_size.min(8);
        bytes[..n].copy_from_slice(&first[..n]);
        Some(u64::from_le_bytes(bytes))
    }

    fn encode(counter: u64, element: &mut [u8]) {
        let bytes = counter.to_le_bytes();
        let n = element.len().min(bytes.len());
        element[..n].copy_from_slice(&bytes[..n]);
        element[n..].fill(0);
    }
}

impl FrameSource for CounterSource {
    fn element_size(&self) -> usize {
        self.element_size
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn fill(&mut self, buffer: &mut FixedBuffer) -> Result<(), CaptureError> {
        if self.frame_limit.is_some_and(|limit| self.next_frame >= limit) {
            return Err(CaptureError::SourceExhausted);
        }
        if !self.frame_interval.is_zero() {
            thread::sleep(self.frame_interval);
        }

        let counter = self.next_frame;
        for element in buffer.elements_mut() {
            Self::encode(counter, element);
        }
        self.next_frame += 1;
        Ok(())
    }
}

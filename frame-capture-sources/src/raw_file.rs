//! Raw frame file replay.
//!
//! Reads back-to-back fixed-size frames (no header, no framing) from a file
//! or any other byte stream, one frame per `fill`. The end of the stream ends
//! capture, the same way a decoder reaching the end of a movie would.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;

use frame_capture_core::{CaptureError, FixedBuffer, FrameSource};

/// Frame source backed by a reader of raw frame bytes.
pub struct RawFileSource<R> {
    reader: R,
    element_size: usize,
    element_count: usize,
    frame_interval: Duration,
    frames_read: u64,
}

impl RawFileSource<BufReader<File>> {
    /// Open a raw frame file.
    pub fn open(path: impl AsRef<Path>, element_size: usize, element_count: usize) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| CaptureError::SourceFailed(format!("failed to open {}: {}", path.display(), e)))?;
        log::debug!("opened raw frame file {}", path.display());
        Self::from_reader(BufReader::new(file), element_size, element_count)
    }
}

impl<R: Read + Send> RawFileSource<R> {
    /// Wrap any byte stream.
    pub fn from_reader(reader: R, element_size: usize, element_count: usize) -> Result<Self, CaptureError> {
        if element_size == 0 || element_count == 0 {
            return Err(CaptureError::InvalidArgument(format!(
                "frame shape must be positive: {} x {}",
                element_count, element_size
            )));
        }
        Ok(Self {
            reader,
            element_size,
            element_count,
            frame_interval: Duration::ZERO,
            frames_read: 0,
        })
    }

    /// Sleep this long per frame to replay at a fixed rate.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Send> FrameSource for RawFileSource<R> {
    fn element_size(&self) -> usize {
        self.element_size
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn fill(&mut self, buffer: &mut FixedBuffer) -> Result<(), CaptureError> {
        // read_exact retries Interrupted on its own.
        match self.reader.read_exact(buffer.as_mut_slice()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                log::info!("raw frame stream ended after {} frames", self.frames_read);
                return Err(CaptureError::SourceExhausted);
            }
            Err(e) => {
                return Err(CaptureError::SourceFailed(format!(
                    "read failed at frame {}: {}",
                    self.frames_read, e
                )))
            }
        }

        self.frames_read += 1;
        if !self.frame_interval.is_zero() {
            thread::sleep(self.frame_interval);
        }
        Ok(())
    }
}

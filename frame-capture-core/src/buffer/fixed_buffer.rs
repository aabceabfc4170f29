use crate::models::error::CaptureError;

/// Storage for one capture unit: `element_count` elements of
/// `element_size` bytes each.
///
/// The descriptor is fixed at construction. Only the bytes change, and only
/// through `as_mut_slice` while the producer holds the slot.
#[derive(Debug)]
pub struct FixedBuffer {
    storage: Box<[u8]>,
    element_size: usize,
    element_count: usize,
}

impl FixedBuffer {
    /// Wrap existing storage.
    ///
    /// Fails with `InvalidArgument` when the storage is empty, a dimension
    /// is zero, or `storage.len() != element_size * element_count`.
    pub fn new(storage: Box<[u8]>, element_size: usize, element_count: usize) -> Result<Self, CaptureError> {
        if storage.is_empty() {
            return Err(CaptureError::InvalidArgument("buffer storage is empty".into()));
        }
        let expected = checked_len(element_size, element_count)?;
        if storage.len() != expected {
            return Err(CaptureError::InvalidArgument(format!(
                "buffer storage is {} bytes, expected {} ({} x {})",
                storage.len(),
                expected,
                element_count,
                element_size
            )));
        }
        Ok(Self {
            storage,
            element_size,
            element_count,
        })
    }

    /// Allocate zeroed storage for the given dimensions.
    pub fn zeroed(element_size: usize, element_count: usize) -> Result<Self, CaptureError> {
        let len = checked_len(element_size, element_count)?;
        Self::new(vec![0u8; len].into_boxed_slice(), element_size, element_count)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Bytes per element.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Total bytes (`element_size * element_count`).
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Never true for a constructed buffer.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Iterate over the buffer one element at a time.
    pub fn elements(&self) -> std::slice::ChunksExact<'_, u8> {
        self.storage.chunks_exact(self.element_size)
    }

    pub fn elements_mut(&mut self) -> std::slice::ChunksExactMut<'_, u8> {
        self.storage.chunks_exact_mut(self.element_size)
    }
}

/// Validate dimensions and compute the byte length.
pub(crate) fn checked_len(element_size: usize, element_count: usize) -> Result<usize, CaptureError> {
    if element_size == 0 {
        return Err(CaptureError::InvalidArgument("element size must be positive".into()));
    }
    if element_count == 0 {
        return Err(CaptureError::InvalidArgument("element count must be positive".into()));
    }
    element_size.checked_mul(element_count).ok_or_else(|| {
        CaptureError::InvalidArgument(format!(
            "buffer size overflows: {} x {}",
            element_count, element_size
        ))
    })
}

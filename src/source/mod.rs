//! Candidate private key sources.
//!
//! Two interchangeable variants produce batches behind [`KeySource`]:
//! - [`CpuSource`]: cryptographically secure entropy, one instance per worker
//! - `GpuSource` (feature `gpu`): OpenCL batch generator, driven by a
//!   [`Producer`] thread that feeds workers through a bounded queue

mod cpu;
pub mod philox;
mod producer;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use cpu::CpuSource;
pub use producer::Producer;

/// A 32-byte candidate private key. Not guaranteed to be a valid scalar.
pub type Candidate = [u8; 32];

/// Errors raised by key sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The accelerator is missing or failed to initialize.
    #[error("accelerator unavailable: {0}")]
    AcceleratorUnavailable(String),

    /// The accelerator failed while producing a batch.
    #[error("accelerator failure: {0}")]
    Device(String),
}

/// Produces batches of candidate keys, indefinitely.
pub trait KeySource: Send {
    /// Returns `size` fresh candidates. Blocks until the batch is in host memory.
    fn next_batch(&mut self, size: usize) -> Result<KeyBatch, SourceError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// An ordered, fixed-size group of candidates moved between pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBatch(Vec<Candidate>);

impl KeyBatch {
    /// Wraps existing candidates.
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self(candidates)
    }

    /// Allocates `len` zeroed candidates, ready to be filled in place.
    pub fn zeroed(len: usize) -> Self {
        Self(vec![[0u8; 32]; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [Candidate] {
        &mut self.0
    }

    /// Contiguous byte view (`len * 32` bytes) for bulk fills and device reads.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.0.as_flattened_mut()
    }
}

impl From<Vec<Candidate>> for KeyBatch {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self(candidates)
    }
}

impl<'a> IntoIterator for &'a KeyBatch {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Opens the accelerator key source on the given device.
#[cfg(feature = "gpu")]
pub fn open_accelerator(
    device_index: usize,
    batch_size: usize,
) -> Result<Box<dyn KeySource>, SourceError> {
    Ok(Box::new(gpu::GpuSource::open(device_index, batch_size)?))
}

/// Opens the accelerator key source on the given device.
#[cfg(not(feature = "gpu"))]
pub fn open_accelerator(
    _device_index: usize,
    _batch_size: usize,
) -> Result<Box<dyn KeySource>, SourceError> {
    Err(SourceError::AcceleratorUnavailable(
        "this binary was built without GPU support; rebuild with \
         `cargo build --release --features gpu` and install an OpenCL driver"
            .into(),
    ))
}

/// Lists accelerator devices usable with `--gpu-device`.
pub fn list_accelerators() -> Vec<String> {
    #[cfg(feature = "gpu")]
    {
        gpu::list_devices()
    }
    #[cfg(not(feature = "gpu"))]
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_byte_view() {
        let mut batch = KeyBatch::zeroed(3);
        assert_eq!(batch.bytes_mut().len(), 96);
        batch.bytes_mut()[32] = 7;
        assert_eq!(batch.as_slice()[1][0], 7);
        assert_eq!(batch.iter().count(), 3);
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_accelerator_unavailable_without_feature() {
        let err = open_accelerator(0, 1024).err().expect("must fail");
        assert!(matches!(err, SourceError::AcceleratorUnavailable(_)));
        assert!(err.to_string().contains("--features gpu"));
        assert!(list_accelerators().is_empty());
    }
}

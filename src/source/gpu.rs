//! OpenCL accelerator key source.
//!
//! 1. A seed is drawn once from the operating system
//! 2. Each call launches one work item per candidate (Philox4x32-10)
//! 3. The host waits for the kernel and reads the batch back
//!
//! The device only generates candidates; derivation and matching stay on
//! the CPU workers.

use std::ptr;

use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{get_all_devices, Device, CL_DEVICE_TYPE_GPU};
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_WRITE_ONLY};
use opencl3::program::Program;
use opencl3::types::{cl_uchar, cl_uint, cl_ulong, CL_BLOCKING};
use tracing::{debug, info};

use super::philox::{self, Philox};
use super::{KeyBatch, KeySource, SourceError};

/// OpenCL kernel source
const KERNEL_SOURCE: &str = include_str!("../../kernels/keygen.cl");

/// Candidates compared against the host generator when the device is opened.
const SELF_CHECK_LEN: usize = 256;

/// Lists available OpenCL GPU devices.
pub fn list_devices() -> Vec<String> {
    match get_all_devices(CL_DEVICE_TYPE_GPU) {
        Ok(device_ids) => device_ids
            .iter()
            .filter_map(|&id| Device::new(id).name().ok())
            .collect(),
        Err(_) => vec![],
    }
}

fn unavailable(detail: impl Into<String>) -> SourceError {
    SourceError::AcceleratorUnavailable(detail.into())
}

/// GPU-backed batch generator.
pub struct GpuSource {
    /// Device name, for logs
    name: String,
    /// OpenCL context; owns the device allocations below
    context: Context,
    /// OpenCL command queue
    queue: CommandQueue,
    /// Compiled `generate_keys` kernel
    kernel: Kernel,
    /// Device output buffer, `capacity * 32` bytes
    keys_buf: Buffer<cl_uchar>,
    /// Candidates the output buffer can hold
    capacity: usize,
    /// Generator seed shared by every batch of this run
    seed: u64,
    /// Counter separating batches
    batch_index: u64,
}

impl GpuSource {
    /// Opens GPU `device_index`, compiles the kernel and verifies its output.
    pub fn open(device_index: usize, batch_size: usize) -> Result<Self, SourceError> {
        let device_ids = get_all_devices(CL_DEVICE_TYPE_GPU).map_err(|e| {
            unavailable(format!(
                "OpenCL platform query failed ({e}); install the vendor OpenCL driver"
            ))
        })?;

        let device_id = *device_ids.get(device_index).ok_or_else(|| {
            unavailable(format!(
                "no OpenCL GPU at index {device_index} ({} found); check `clinfo` or run with --list-devices",
                device_ids.len()
            ))
        })?;

        let device = Device::new(device_id);
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        info!(device = %name, "using accelerator");

        let context = Context::from_device(&device)
            .map_err(|e| unavailable(format!("context creation failed: {e}")))?;

        let queue =
            CommandQueue::create_default_with_properties(&context, CL_QUEUE_PROFILING_ENABLE, 0)
                .map_err(|e| unavailable(format!("command queue creation failed: {e}")))?;

        debug!(device = %name, "compiling key generation kernel");
        let program = Program::create_and_build_from_source(&context, KERNEL_SOURCE, "")
            .map_err(|e| unavailable(format!("kernel compilation failed: {e}")))?;

        let kernel = Kernel::create(&program, "generate_keys")
            .map_err(|e| unavailable(format!("kernel creation failed: {e}")))?;

        let capacity = batch_size.max(SELF_CHECK_LEN);
        let keys_buf = Self::allocate(&context, capacity)
            .map_err(|e| unavailable(format!("device allocation failed: {e}")))?;

        let mut source = Self {
            name,
            context,
            queue,
            kernel,
            keys_buf,
            capacity,
            seed: philox::random_seed(),
            batch_index: 0,
        };
        source.self_check()?;

        Ok(source)
    }

    fn allocate(context: &Context, candidates: usize) -> Result<Buffer<cl_uchar>, SourceError> {
        unsafe {
            Buffer::<cl_uchar>::create(context, CL_MEM_WRITE_ONLY, candidates * 32, ptr::null_mut())
                .map_err(|e| SourceError::Device(e.to_string()))
        }
    }

    /// Generates one batch on the device and copies it to host memory.
    fn dispatch(&mut self, size: usize) -> Result<(KeyBatch, u64), SourceError> {
        if size > self.capacity {
            self.keys_buf = Self::allocate(&self.context, size)?;
            self.capacity = size;
        }

        let count = cl_uint::try_from(size)
            .map_err(|_| SourceError::Device(format!("batch size {size} exceeds device limit")))?;
        let seed: cl_ulong = self.seed;
        let batch: cl_ulong = self.batch_index;
        self.batch_index += 1;

        let mut keys = KeyBatch::zeroed(size);
        if size == 0 {
            return Ok((keys, batch));
        }

        let kernel_event = unsafe {
            ExecuteKernel::new(&self.kernel)
                .set_arg(&self.keys_buf)
                .set_arg(&seed)
                .set_arg(&batch)
                .set_arg(&count)
                .set_global_work_size(size)
                .enqueue_nd_range(&self.queue)
                .map_err(|e| SourceError::Device(e.to_string()))?
        };

        kernel_event
            .wait()
            .map_err(|e| SourceError::Device(e.to_string()))?;

        unsafe {
            self.queue
                .enqueue_read_buffer(&self.keys_buf, CL_BLOCKING, 0, keys.bytes_mut(), &[])
                .map_err(|e| SourceError::Device(e.to_string()))?;
        }

        Ok((keys, batch))
    }

    /// Compares a device batch with the host generator.
    fn self_check(&mut self) -> Result<(), SourceError> {
        let (batch, index) = self
            .dispatch(SELF_CHECK_LEN)
            .map_err(|e| unavailable(format!("self-check dispatch failed: {e}")))?;

        let mut expected = vec![[0u8; 32]; SELF_CHECK_LEN];
        Philox::new(self.seed).fill(index, &mut expected);

        if batch.as_slice() != expected.as_slice() {
            return Err(unavailable(format!(
                "kernel output on {} does not match the host generator",
                self.name
            )));
        }

        debug!(device = %self.name, "accelerator self-check passed");
        Ok(())
    }
}

impl KeySource for GpuSource {
    fn next_batch(&mut self, size: usize) -> Result<KeyBatch, SourceError> {
        self.dispatch(size).map(|(keys, _)| keys)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

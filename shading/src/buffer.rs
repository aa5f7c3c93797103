//! GPU buffer objects.

use std::sync::{Arc, Weak};

use bytemuck::Pod;

use crate::driver::{BufferClass, BufferId, Driver};
use crate::error::{ShadingError, ShadingResult};

/// One driver buffer allocation of a fixed class.
///
/// Buffers hold a weak reference back to the driver that created them and
/// release the allocation when dropped. Share them as `Arc<GpuBuffer>` to hand
/// one allocation to several catalogs.
///
/// # Example
///
/// ```
/// # #[cfg(feature = "headless")] {
/// use std::sync::Arc;
/// use redlilium_shading::{BufferClass, Driver, GpuBuffer, HeadlessDriver};
///
/// let driver: Arc<dyn Driver> = Arc::new(HeadlessDriver::new());
/// let buffer = GpuBuffer::create(&driver, BufferClass::Storage).unwrap();
/// buffer.write(&[1.0f32, 2.0, 3.0]).unwrap();
///
/// let mut out = [0.0f32; 2];
/// assert_eq!(buffer.read(&mut out, 4).unwrap(), 8);
/// assert_eq!(out, [2.0, 3.0]);
/// # }
/// ```
pub struct GpuBuffer {
    id: BufferId,
    class: BufferClass,
    driver: Weak<dyn Driver>,
}

impl GpuBuffer {
    /// Allocate an empty buffer of the given class.
    pub fn create(driver: &Arc<dyn Driver>, class: BufferClass) -> ShadingResult<Self> {
        let id = driver.create_buffer(class).inspect_err(|e| {
            log::error!("Failed to create {:?} buffer: {}", class, e);
        })?;
        Ok(Self {
            id,
            class,
            driver: Arc::downgrade(driver),
        })
    }

    /// Get the driver handle.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Get the buffer class.
    pub fn class(&self) -> BufferClass {
        self.class
    }

    /// Get the owning driver, if it still exists.
    pub fn driver(&self) -> Option<Arc<dyn Driver>> {
        self.driver.upgrade()
    }

    fn live_driver(&self) -> ShadingResult<Arc<dyn Driver>> {
        self.driver.upgrade().ok_or(ShadingError::DriverLost)
    }

    /// Replace the whole contents with `data`.
    pub fn write<T: Pod>(&self, data: &[T]) -> ShadingResult<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    /// Replace the whole contents with raw bytes.
    pub fn write_bytes(&self, data: &[u8]) -> ShadingResult<()> {
        self.live_driver()?.buffer_data(self.id, data)?;
        Ok(())
    }

    /// Reallocate the buffer to exactly `size` bytes. Prior contents are lost.
    pub fn resize(&self, size: u64) -> ShadingResult<()> {
        self.live_driver()?.resize_buffer(self.id, size)?;
        Ok(())
    }

    /// Current allocation size in bytes.
    pub fn size(&self) -> ShadingResult<u64> {
        Ok(self.live_driver()?.buffer_size(self.id)?)
    }

    /// Copy contents starting at `byte_offset` into `out`.
    ///
    /// Copies `min(size - byte_offset, size_of_val(out))` bytes and returns the
    /// number of bytes copied. An offset at or past the end copies nothing.
    pub fn read<T: Pod>(&self, out: &mut [T], byte_offset: u64) -> ShadingResult<u64> {
        self.read_bytes(bytemuck::cast_slice_mut(out), byte_offset)
    }

    /// Byte-level variant of [`GpuBuffer::read`].
    pub fn read_bytes(&self, out: &mut [u8], byte_offset: u64) -> ShadingResult<u64> {
        let driver = self.live_driver()?;
        let size = driver.buffer_size(self.id)?;
        if byte_offset >= size {
            return Ok(0);
        }
        let count = (size - byte_offset).min(out.len() as u64);
        driver.read_buffer(self.id, byte_offset, &mut out[..count as usize])?;
        Ok(count)
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.upgrade() {
            driver.destroy_buffer(self.id);
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("class", &self.class)
            .finish()
    }
}

// Ensure GpuBuffer is Send + Sync
static_assertions::assert_impl_all!(GpuBuffer: Send, Sync);

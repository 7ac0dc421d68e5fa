use std::{marker::PhantomData, mem::size_of, num::NonZeroU64, ops::DerefMut};

use bytemuck::Pod;
use wgpu::{Buffer, BufferAddress, BufferDescriptor, BufferUsages, Device, Queue};

use crate::{util::typedefs::SsoString, BufferWriteError, CapacityError};

/// Fixed capacity GPU buffer of `T` records.
///
/// Every write replaces the contents from record 0; anything past the written
/// records is stale and must not be read by shaders.
pub struct StructuredBuffer<T> {
    inner: Buffer,
    capacity: usize,
    label: SsoString,
    _phantom: PhantomData<T>,
}

impl<T: Pod> StructuredBuffer<T> {
    pub fn new(device: &Device, capacity: usize, usage: BufferUsages, label: &str) -> Self {
        // Zero sized bindings are invalid, keep room for one record.
        let size = (capacity.max(1) * size_of::<T>()) as BufferAddress;
        Self {
            inner: device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size,
                usage: usage | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            capacity,
            label: SsoString::from(label),
            _phantom: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn buffer(&self) -> &Buffer {
        &self.inner
    }

    /// Writes exactly `records` starting at record 0, discarding the previous contents.
    pub fn write_discard(&self, queue: &Queue, records: &[T]) -> Result<(), BufferWriteError> {
        check_capacity(records.len(), self.capacity, &self.label)?;

        let bytes: &[u8] = bytemuck::cast_slice(records);
        let Some(size) = NonZeroU64::new(bytes.len() as u64) else {
            return Ok(());
        };

        fill_staging(queue.write_buffer_with(&self.inner, 0, size), bytes, &self.label)
    }
}

/// Copies `bytes` into a staging view handed out by the queue.
pub(crate) fn fill_staging<V>(view: Option<V>, bytes: &[u8], label: &str) -> Result<(), BufferWriteError>
where
    V: DerefMut<Target = [u8]>,
{
    match view {
        Some(mut view) => {
            view.copy_from_slice(bytes);
            Ok(())
        }
        None => {
            log::error!("Failed to map {} for writing", label);
            Err(BufferWriteError::StagingUnavailable {
                buffer: SsoString::from(label),
            })
        }
    }
}

pub(crate) fn check_capacity(requested: usize, capacity: usize, label: &str) -> Result<(), CapacityError> {
    if requested > capacity {
        return Err(CapacityError {
            buffer: SsoString::from(label),
            requested,
            capacity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{check_capacity, fill_staging};
    use crate::BufferWriteError;

    #[test]
    fn capacity_checks() {
        assert!(check_capacity(0, 0, "empty").is_ok());
        assert!(check_capacity(16, 16, "full").is_ok());

        let err = check_capacity(17, 16, "over").unwrap_err();
        assert_eq!(err.requested, 17);
        assert_eq!(err.capacity, 16);
        assert_eq!(err.buffer.as_str(), "over");
    }

    #[test]
    fn staging_view_receives_records() {
        let mut staging = [0_u8; 4];
        fill_staging(Some(&mut staging[..]), &[1, 2, 3, 4], "lights").unwrap();
        assert_eq!(staging, [1, 2, 3, 4]);
    }

    #[test]
    fn missing_staging_view_is_an_error() {
        let err = fill_staging(None::<&mut [u8]>, &[1, 2, 3, 4], "point lights").unwrap_err();
        assert!(matches!(err, BufferWriteError::StagingUnavailable { ref buffer } if buffer.as_str() == "point lights"));
    }
}

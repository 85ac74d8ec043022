//! General-purpose GPU buffer with optional persistent mapping
//!
//! Sized as `instance_count` elements of `instance_size` bytes, with each
//! element rounded up to a caller-supplied minimum offset alignment so
//! per-element descriptor offsets stay legal for uniform buffers.

use ash::vk;
use std::sync::Arc;

use super::device::{DeviceContext, VulkanError, VulkanResult};

/// Round an element size up to the next multiple of `min_offset_alignment`.
/// An alignment of zero means tightly packed.
pub fn alignment(instance_size: vk::DeviceSize, min_offset_alignment: vk::DeviceSize) -> vk::DeviceSize {
    if min_offset_alignment > 0 {
        (instance_size + min_offset_alignment - 1) & !(min_offset_alignment - 1)
    } else {
        instance_size
    }
}

/// GPU buffer with RAII cleanup
pub struct Buffer {
    device: Arc<DeviceContext>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: Option<*mut std::ffi::c_void>,
    buffer_size: vk::DeviceSize,
    instance_size: vk::DeviceSize,
    instance_count: u64,
    alignment_size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    memory_properties: vk::MemoryPropertyFlags,
}

impl Buffer {
    /// Allocate a buffer for `instance_count` elements of `instance_size`
    /// bytes each. Pass the device's minimum uniform buffer offset alignment
    /// when elements will be addressed through dynamic or per-index offsets.
    pub fn new(
        device: Arc<DeviceContext>,
        instance_size: vk::DeviceSize,
        instance_count: u64,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        assert!(instance_size > 0, "buffer element size must be nonzero");
        assert!(instance_count > 0, "buffer element count must be nonzero");

        let alignment_size = alignment(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * instance_count;

        let (buffer, memory) = device.create_buffer(buffer_size, usage, memory_properties)?;

        Ok(Self {
            device,
            buffer,
            memory,
            mapped: None,
            buffer_size,
            instance_size,
            instance_count,
            alignment_size,
            usage,
            memory_properties,
        })
    }

    /// Map the whole buffer into host memory
    pub fn map(&mut self) -> VulkanResult<()> {
        assert!(
            self.memory_properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE),
            "cannot map non host-visible buffer memory"
        );

        let mapped = unsafe {
            self.device.device()
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
        };

        self.mapped = Some(mapped);
        Ok(())
    }

    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe {
                self.device.device().unmap_memory(self.memory);
            }
        }
    }

    /// Copy `data` into the mapped region at `offset` bytes.
    /// Panics if the buffer is not mapped or the write would overflow.
    pub fn write_to_buffer(&mut self, data: &[u8], offset: vk::DeviceSize) {
        let mapped = self.mapped.expect("buffer must be mapped before writing");
        assert!(
            offset + data.len() as vk::DeviceSize <= self.buffer_size,
            "write of {} bytes at offset {} exceeds buffer size {}",
            data.len(),
            offset,
            self.buffer_size
        );

        unsafe {
            let dst = (mapped as *mut u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
    }

    /// Read `len` bytes back from the mapped region at `offset`
    pub fn read_from_buffer(&self, len: usize, offset: vk::DeviceSize) -> Vec<u8> {
        let mapped = self.mapped.expect("buffer must be mapped before reading");
        assert!(offset + len as vk::DeviceSize <= self.buffer_size);

        let mut out = vec![0u8; len];
        unsafe {
            let src = (mapped as *const u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(src, out.as_mut_ptr(), len);
        }
        out
    }

    /// Flush a mapped range to make host writes visible to the device
    pub fn flush(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> VulkanResult<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(self.memory)
            .offset(offset)
            .size(size);

        unsafe {
            self.device.device()
                .flush_mapped_memory_ranges(&[range.build()])
                .map_err(VulkanError::Api)
        }
    }

    /// Invalidate a mapped range to make device writes visible to the host
    pub fn invalidate(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> VulkanResult<()> {
        let range = vk::MappedMemoryRange::builder()
            .memory(self.memory)
            .offset(offset)
            .size(size);

        unsafe {
            self.device.device()
                .invalidate_mapped_memory_ranges(&[range.build()])
                .map_err(VulkanError::Api)
        }
    }

    /// Descriptor info covering `size` bytes at `offset`
    pub fn descriptor_info(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset,
            range: size,
        }
    }

    /// Descriptor info covering the whole buffer
    pub fn descriptor_info_whole(&self) -> vk::DescriptorBufferInfo {
        self.descriptor_info(vk::WHOLE_SIZE, 0)
    }

    /// Write one element at its aligned slot
    pub fn write_to_index(&mut self, data: &[u8], index: u64) {
        assert!(index < self.instance_count, "element index out of range");
        assert!(data.len() as vk::DeviceSize <= self.instance_size);
        self.write_to_buffer(data, index * self.alignment_size);
    }

    /// Flush one element's aligned slot
    pub fn flush_index(&self, index: u64) -> VulkanResult<()> {
        assert!(index < self.instance_count, "element index out of range");
        self.flush(self.alignment_size, index * self.alignment_size)
    }

    /// Descriptor info for one element's aligned slot
    pub fn descriptor_info_for_index(&self, index: u64) -> vk::DescriptorBufferInfo {
        self.descriptor_info(self.instance_size, index * self.alignment_size)
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.buffer_size
    }

    pub fn instance_count(&self) -> u64 {
        self.instance_count
    }

    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }

    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.device.device().destroy_buffer(self.buffer, None);
            self.device.device().free_memory(self.memory, None);
        }
    }
}

// The mapped pointer is only dereferenced behind &mut self.
unsafe impl Send for Buffer {}

#[cfg(test)]
mod tests {
    use super::alignment;

    #[test]
    fn alignment_rounds_up_to_power_of_two() {
        assert_eq!(alignment(1, 64), 64);
        assert_eq!(alignment(64, 64), 64);
        assert_eq!(alignment(65, 64), 128);
        assert_eq!(alignment(200, 256), 256);
    }

    #[test]
    fn zero_alignment_means_tightly_packed() {
        assert_eq!(alignment(48, 0), 48);
        assert_eq!(alignment(1, 0), 1);
    }
}

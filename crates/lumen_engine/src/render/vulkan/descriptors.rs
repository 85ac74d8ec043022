//! Descriptor set layouts, pools and a write-batching helper
//!
//! Layouts and pools are constructed from explicit configuration values
//! rather than fluent builders. Pool exhaustion is an expected outcome and
//! surfaces as `None`; device-level failures stay `VulkanError`.

use ash::vk;
use std::collections::HashMap;
use std::sync::Arc;

use super::device::{DeviceContext, VulkanError, VulkanResult};

/// One binding slot in a descriptor set layout
#[derive(Debug, Clone, Copy)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub stage_flags: vk::ShaderStageFlags,
    pub count: u32,
}

/// Panics if two bindings share an index. Factored out of the constructor
/// so the precondition is checkable without a device.
pub(crate) fn validate_bindings(bindings: &[LayoutBinding]) {
    let mut seen = std::collections::HashSet::new();
    for binding in bindings {
        assert!(
            seen.insert(binding.binding),
            "duplicate descriptor binding index {}",
            binding.binding
        );
    }
}

/// Descriptor set layout with RAII cleanup
pub struct DescriptorSetLayout {
    device: Arc<DeviceContext>,
    layout: vk::DescriptorSetLayout,
    bindings: HashMap<u32, LayoutBinding>,
}

impl DescriptorSetLayout {
    /// Create a layout from an explicit binding list.
    /// Duplicate binding indices are a precondition violation and panic.
    pub fn new(device: Arc<DeviceContext>, bindings: Vec<LayoutBinding>) -> VulkanResult<Self> {
        validate_bindings(&bindings);

        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(b.count)
                    .stage_flags(b.stage_flags)
                    .build()
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(&vk_bindings);

        let layout = unsafe {
            device.device()
                .create_descriptor_set_layout(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let bindings = bindings.into_iter().map(|b| (b.binding, b)).collect();

        Ok(Self { device, layout, bindings })
    }

    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Look up the declaration for a binding index
    pub fn binding(&self, index: u32) -> Option<&LayoutBinding> {
        self.bindings.get(&index)
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Capacity for one descriptor type in a pool
#[derive(Debug, Clone, Copy)]
pub struct PoolSize {
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
}

/// Fixed-capacity descriptor pool. Does not grow; size it for the scene.
pub struct DescriptorPool {
    device: Arc<DeviceContext>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool from explicit capacities
    pub fn new(
        device: Arc<DeviceContext>,
        max_sets: u32,
        flags: vk::DescriptorPoolCreateFlags,
        pool_sizes: Vec<PoolSize>,
    ) -> VulkanResult<Self> {
        assert!(!pool_sizes.is_empty(), "descriptor pool needs at least one size");

        let vk_sizes: Vec<vk::DescriptorPoolSize> = pool_sizes
            .iter()
            .map(|s| vk::DescriptorPoolSize {
                ty: s.descriptor_type,
                descriptor_count: s.count,
            })
            .collect();

        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .flags(flags)
            .pool_sizes(&vk_sizes);

        let pool = unsafe {
            device.device()
                .create_descriptor_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, pool })
    }

    /// Allocate one set with the given layout. Returns `None` when the pool
    /// is exhausted; previously allocated sets stay valid.
    pub fn allocate_descriptor(&self, layout: vk::DescriptorSetLayout) -> Option<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        match unsafe { self.device.device().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => Some(sets[0]),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                log::warn!("Descriptor pool exhausted");
                None
            }
            Err(e) => {
                log::error!("Descriptor set allocation failed: {:?}", e);
                None
            }
        }
    }

    /// Return sets to the pool. Requires FREE_DESCRIPTOR_SET on the pool.
    pub fn free_descriptors(&self, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        unsafe {
            self.device.device()
                .free_descriptor_sets(self.pool, sets)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset the whole pool, invalidating every set allocated from it
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device.device()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.device().destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum PendingWrite {
    Buffer {
        binding: u32,
        descriptor_type: vk::DescriptorType,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        binding: u32,
        descriptor_type: vk::DescriptorType,
        info: vk::DescriptorImageInfo,
    },
}

/// Accumulates writes against a layout, then allocates and applies them.
///
/// Writes are stored by value and the `vk::WriteDescriptorSet` array is
/// materialized only inside [`overwrite`](Self::overwrite), so the info
/// pointers are taken from stable storage.
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    pool: &'a DescriptorPool,
    writes: Vec<PendingWrite>,
}

impl<'a> DescriptorWriter<'a> {
    pub fn new(layout: &'a DescriptorSetLayout, pool: &'a DescriptorPool) -> Self {
        Self { layout, pool, writes: Vec::new() }
    }

    /// Queue a buffer write for `binding`.
    /// The binding must exist in the layout and declare a count of one.
    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        let decl = self.layout.binding(binding)
            .unwrap_or_else(|| panic!("layout has no binding {}", binding));
        assert_eq!(decl.count, 1, "binding {} expects a descriptor array", binding);

        self.writes.push(PendingWrite::Buffer {
            binding,
            descriptor_type: decl.descriptor_type,
            info,
        });
        self
    }

    /// Queue an image write for `binding`.
    /// The binding must exist in the layout and declare a count of one.
    pub fn write_image(mut self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        let decl = self.layout.binding(binding)
            .unwrap_or_else(|| panic!("layout has no binding {}", binding));
        assert_eq!(decl.count, 1, "binding {} expects a descriptor array", binding);

        self.writes.push(PendingWrite::Image {
            binding,
            descriptor_type: decl.descriptor_type,
            info,
        });
        self
    }

    /// Allocate a set from the pool and apply the queued writes.
    /// `None` means the pool was exhausted; nothing is written.
    pub fn build(&self) -> Option<vk::DescriptorSet> {
        let set = self.pool.allocate_descriptor(self.layout.handle())?;
        self.overwrite(set);
        Some(set)
    }

    /// Apply the queued writes to an already-allocated set
    pub fn overwrite(&self, set: vk::DescriptorSet) {
        let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = self.writes.iter()
            .filter_map(|w| match w {
                PendingWrite::Buffer { info, .. } => Some([*info]),
                PendingWrite::Image { .. } => None,
            })
            .collect();
        let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = self.writes.iter()
            .filter_map(|w| match w {
                PendingWrite::Image { info, .. } => Some([*info]),
                PendingWrite::Buffer { .. } => None,
            })
            .collect();

        let mut vk_writes = Vec::with_capacity(self.writes.len());
        let mut next_buffer = 0;
        let mut next_image = 0;

        for write in &self.writes {
            match write {
                PendingWrite::Buffer { binding, descriptor_type, .. } => {
                    vk_writes.push(
                        vk::WriteDescriptorSet::builder()
                            .dst_set(set)
                            .dst_binding(*binding)
                            .descriptor_type(*descriptor_type)
                            .buffer_info(&buffer_infos[next_buffer])
                            .build(),
                    );
                    next_buffer += 1;
                }
                PendingWrite::Image { binding, descriptor_type, .. } => {
                    vk_writes.push(
                        vk::WriteDescriptorSet::builder()
                            .dst_set(set)
                            .dst_binding(*binding)
                            .descriptor_type(*descriptor_type)
                            .image_info(&image_infos[next_image])
                            .build(),
                    );
                    next_image += 1;
                }
            }
        }

        unsafe {
            self.pool.device.device().update_descriptor_sets(&vk_writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_bindings, LayoutBinding};
    use ash::vk;

    fn uniform_binding(index: u32) -> LayoutBinding {
        LayoutBinding {
            binding: index,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            stage_flags: vk::ShaderStageFlags::ALL_GRAPHICS,
            count: 1,
        }
    }

    #[test]
    fn distinct_binding_indices_are_accepted() {
        validate_bindings(&[uniform_binding(0), uniform_binding(1), uniform_binding(7)]);
    }

    #[test]
    #[should_panic(expected = "duplicate descriptor binding index 3")]
    fn duplicate_binding_index_panics() {
        validate_bindings(&[uniform_binding(3), uniform_binding(3)]);
    }

    #[test]
    fn empty_binding_list_is_valid() {
        validate_bindings(&[]);
    }
}

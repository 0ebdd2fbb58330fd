mod slots;
mod table;

pub use slots::*;
pub use table::*;

use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::{device::Device, AccelerationStructure, Buffer, Context, ImageView, Sampler};

pub struct DescriptorSetLayout {
    device: Arc<Device>,
    pub(crate) inner: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub(crate) fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
        binding_flags: Option<&[vk::DescriptorBindingFlags]>,
    ) -> Result<Self> {
        let mut flags_info = binding_flags
            .map(|flags| vk::DescriptorSetLayoutBindingFlagsCreateInfo::builder().binding_flags(flags));

        let mut dsl_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);
        if let Some(flags_info) = flags_info.as_mut() {
            dsl_info = dsl_info.push_next(flags_info);
        }

        let inner = unsafe { device.inner.create_descriptor_set_layout(&dsl_info, None)? };

        Ok(Self { device, inner })
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .inner
                .destroy_descriptor_set_layout(self.inner, None);
        }
    }
}

pub struct DescriptorPool {
    device: Arc<Device>,
    pub(crate) inner: vk::DescriptorPool,
}

impl DescriptorPool {
    pub(crate) fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<Self> {
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        let inner = unsafe { device.inner.create_descriptor_pool(&pool_info, None)? };

        Ok(Self { device, inner })
    }

    pub fn allocate_sets(
        &self,
        layout: &DescriptorSetLayout,
        count: u32,
    ) -> Result<Vec<DescriptorSet>> {
        let layouts = (0..count).map(|_| layout.inner).collect::<Vec<_>>();
        let sets_alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.inner)
            .set_layouts(&layouts);
        let sets = unsafe {
            self.device
                .inner
                .allocate_descriptor_sets(&sets_alloc_info)?
        };

        Ok(sets
            .into_iter()
            .map(|inner| DescriptorSet {
                device: self.device.clone(),
                inner,
            })
            .collect())
    }

    pub fn allocate_set(&self, layout: &DescriptorSetLayout) -> Result<DescriptorSet> {
        self.allocate_sets(layout, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Descriptor pool returned no set"))
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_descriptor_pool(self.inner, None) };
    }
}

pub struct DescriptorSet {
    device: Arc<Device>,
    pub(crate) inner: vk::DescriptorSet,
}

impl DescriptorSet {
    pub fn update(&self, writes: &[WriteDescriptorSet]) {
        use WriteDescriptorSetKind::*;

        // the info structs must outlive the vk::WriteDescriptorSet pointing at them
        let mut img_infos = Vec::with_capacity(writes.len());
        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut as_infos = Vec::with_capacity(writes.len());
        let mut as_handles = Vec::with_capacity(writes.len());

        for write in writes {
            match write.kind {
                StorageImage { view, layout } => img_infos.push(
                    vk::DescriptorImageInfo::builder()
                        .image_view(view.inner)
                        .image_layout(layout)
                        .build(),
                ),
                CombinedImageSampler {
                    view,
                    sampler,
                    layout,
                } => img_infos.push(
                    vk::DescriptorImageInfo::builder()
                        .image_view(view.inner)
                        .sampler(sampler.inner)
                        .image_layout(layout)
                        .build(),
                ),
                UniformBuffer { buffer } | StorageBuffer { buffer } => buffer_infos.push(
                    vk::DescriptorBufferInfo::builder()
                        .buffer(buffer.inner)
                        .range(vk::WHOLE_SIZE)
                        .build(),
                ),
                AccelerationStructure {
                    acceleration_structure,
                } => as_handles.push(acceleration_structure.inner),
            }
        }
        for handle in as_handles.iter() {
            as_infos.push(
                vk::WriteDescriptorSetAccelerationStructureKHR::builder()
                    .acceleration_structures(std::slice::from_ref(handle))
                    .build(),
            );
        }

        let (mut next_img, mut next_buffer, mut next_as) = (0, 0, 0);
        let descriptor_writes = writes
            .iter()
            .map(|write| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(self.inner)
                    .dst_binding(write.binding)
                    .dst_array_element(write.array_element);

                match write.kind {
                    StorageImage { .. } | CombinedImageSampler { .. } => {
                        let ty = if matches!(write.kind, StorageImage { .. }) {
                            vk::DescriptorType::STORAGE_IMAGE
                        } else {
                            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
                        };
                        next_img += 1;
                        builder
                            .descriptor_type(ty)
                            .image_info(std::slice::from_ref(&img_infos[next_img - 1]))
                            .build()
                    }
                    UniformBuffer { .. } | StorageBuffer { .. } => {
                        let ty = if matches!(write.kind, UniformBuffer { .. }) {
                            vk::DescriptorType::UNIFORM_BUFFER
                        } else {
                            vk::DescriptorType::STORAGE_BUFFER
                        };
                        next_buffer += 1;
                        builder
                            .descriptor_type(ty)
                            .buffer_info(std::slice::from_ref(&buffer_infos[next_buffer - 1]))
                            .build()
                    }
                    AccelerationStructure { .. } => {
                        next_as += 1;
                        let mut write = builder
                            .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
                            .push_next(&mut as_infos[next_as - 1])
                            .build();
                        write.descriptor_count = 1;
                        write
                    }
                }
            })
            .collect::<Vec<_>>();

        unsafe {
            self.device
                .inner
                .update_descriptor_sets(&descriptor_writes, &[])
        };
    }
}

impl Context {
    pub fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> Result<DescriptorSetLayout> {
        DescriptorSetLayout::new(self.device.clone(), bindings, None)
    }

    pub fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<DescriptorPool> {
        DescriptorPool::new(self.device.clone(), max_sets, pool_sizes)
    }
}

#[derive(Clone, Copy)]
pub struct WriteDescriptorSet<'a> {
    pub binding: u32,
    pub array_element: u32,
    pub kind: WriteDescriptorSetKind<'a>,
}

impl<'a> WriteDescriptorSet<'a> {
    pub fn new(binding: u32, kind: WriteDescriptorSetKind<'a>) -> Self {
        Self {
            binding,
            array_element: 0,
            kind,
        }
    }
}

#[derive(Clone, Copy)]
pub enum WriteDescriptorSetKind<'a> {
    StorageImage {
        view: &'a ImageView,
        layout: vk::ImageLayout,
    },
    AccelerationStructure {
        acceleration_structure: &'a AccelerationStructure,
    },
    UniformBuffer {
        buffer: &'a Buffer,
    },
    StorageBuffer {
        buffer: &'a Buffer,
    },
    CombinedImageSampler {
        view: &'a ImageView,
        sampler: &'a Sampler,
        layout: vk::ImageLayout,
    },
}

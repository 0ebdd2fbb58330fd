use std::mem::size_of;

use app::anyhow::Result;
use app::vulkan::ash::vk;
use app::vulkan::gpu_allocator::MemoryLocation;
use app::vulkan::{
    AccelerationStructure, Buffer, Context, DescriptorPool, DescriptorSet, DescriptorSetLayout,
    ImageView, WriteDescriptorSet, WriteDescriptorSetKind,
};

use crate::constants::SceneConstants;

pub const AS_BIND: u32 = 0;
pub const STORAGE_BIND: u32 = 1;
pub const UNIFORM_BIND: u32 = 2;

/// Set 0 of the tracing layouts, one set and one constant buffer per in flight frame.
pub struct FrameDescriptors {
    pub layout: DescriptorSetLayout,
    _pool: DescriptorPool,
    sets: Vec<DescriptorSet>,
    ubo_buffers: Vec<Buffer>,
}

impl FrameDescriptors {
    pub fn new(
        context: &Context,
        stages: vk::ShaderStageFlags,
        frame_count: u32,
        top_as: &AccelerationStructure,
        output: &ImageView,
    ) -> Result<Self> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::builder()
                .binding(AS_BIND)
                .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
                .descriptor_count(1)
                .stage_flags(stages)
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(STORAGE_BIND)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(1)
                .stage_flags(stages)
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(UNIFORM_BIND)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stages)
                .build(),
        ];
        let layout = context.create_descriptor_set_layout(&bindings)?;

        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
                .descriptor_count(frame_count)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(frame_count)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(frame_count)
                .build(),
        ];
        let pool = context.create_descriptor_pool(frame_count, &pool_sizes)?;
        let sets = pool.allocate_sets(&layout, frame_count)?;

        let ubo_buffers = (0..frame_count)
            .map(|_| {
                context.create_buffer(
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    MemoryLocation::CpuToGpu,
                    size_of::<SceneConstants>() as _,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        for (set, ubo) in sets.iter().zip(&ubo_buffers) {
            set.update(&[
                WriteDescriptorSet::new(
                    AS_BIND,
                    WriteDescriptorSetKind::AccelerationStructure {
                        acceleration_structure: top_as,
                    },
                ),
                WriteDescriptorSet::new(
                    STORAGE_BIND,
                    WriteDescriptorSetKind::StorageImage {
                        view: output,
                        layout: vk::ImageLayout::GENERAL,
                    },
                ),
                WriteDescriptorSet::new(
                    UNIFORM_BIND,
                    WriteDescriptorSetKind::UniformBuffer { buffer: ubo },
                ),
            ]);
        }

        Ok(Self {
            layout,
            _pool: pool,
            sets,
            ubo_buffers,
        })
    }

    pub fn set(&self, frame_index: usize) -> &DescriptorSet {
        &self.sets[frame_index]
    }

    /// Points every frame at a recreated output image.
    pub fn write_output(&self, output: &ImageView) {
        for set in &self.sets {
            set.update(&[WriteDescriptorSet::new(
                STORAGE_BIND,
                WriteDescriptorSetKind::StorageImage {
                    view: output,
                    layout: vk::ImageLayout::GENERAL,
                },
            )]);
        }
    }

    pub fn write_constants(&self, frame_index: usize, constants: &SceneConstants) -> Result<()> {
        self.ubo_buffers[frame_index].copy_data_to_buffer(std::slice::from_ref(constants))
    }
}

//! Device copies of the scene: shared buffers, textures and acceleration structures.

use std::mem::size_of;

use anyhow::Result;
use log::{debug, info};
use vulkan::ash::vk;
use vulkan::ash::vk::Packed24_8;
use vulkan::gpu_allocator::MemoryLocation;
use vulkan::utils::{create_gpu_only_buffer_from_data, create_host_visible_buffer_from_data};
use vulkan::{
    AccelerationStructure, AccelerationStructureInput, Buffer, CommandBuffer, Context, Image,
    ImageBarrier, ImageView, Sampler, SlotTable,
};

use crate::{check_buffer_slots, DemoScene, GeometryTable, TextureId, TextureImage};

const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

const TRANSFORM_SIZE: u32 = size_of::<vk::TransformMatrixKHR>() as u32;

fn readers_stage() -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR
        | vk::PipelineStageFlags2::COMPUTE_SHADER
        | vk::PipelineStageFlags2::FRAGMENT_SHADER
}

/// Shared vertex and index buffers plus per-geometry data.
pub struct SceneBuffers {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    /// One row major 3x4 matrix per geometry, rewritten on every refit.
    pub transform_buffer: Buffer,
    /// `HitPayload` per geometry, for shaders without hit records.
    pub payload_buffer: Buffer,
    vertex_count: u32,
}

impl SceneBuffers {
    pub fn new(context: &Context, scene: &DemoScene, table: &GeometryTable) -> Result<Self> {
        let as_input = vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
            | vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR;

        let vertex_buffer = create_gpu_only_buffer_from_data(
            context,
            as_input | vk::BufferUsageFlags::STORAGE_BUFFER,
            &scene.vertices,
        )?;

        // Shaders read indices in pairs.
        let mut indices = scene.indices.clone();
        if indices.len() % 2 == 1 {
            indices.push(0);
        }
        let index_buffer = create_gpu_only_buffer_from_data(
            context,
            as_input | vk::BufferUsageFlags::STORAGE_BUFFER,
            &indices,
        )?;

        let transform_buffer =
            create_host_visible_buffer_from_data(context, as_input, &table.transforms())?;

        let payload_buffer = create_gpu_only_buffer_from_data(
            context,
            vk::BufferUsageFlags::STORAGE_BUFFER,
            &table.payloads(),
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            transform_buffer,
            payload_buffer,
            vertex_count: scene.vertices.len() as u32,
        })
    }

    /// Binds index, vertex and payload buffers to consecutive slots.
    pub fn bind(&self, slots: &mut SlotTable) -> Result<()> {
        let index_slot = slots.create_buffer_view(&self.index_buffer, None)?;
        let vertex_slot = slots.create_buffer_view(&self.vertex_buffer, None)?;
        check_buffer_slots(index_slot, vertex_slot)?;
        slots.create_buffer_view(&self.payload_buffer, None)?;

        Ok(())
    }

    pub fn write_transforms(&self, table: &GeometryTable) -> Result<()> {
        self.transform_buffer.copy_data_to_buffer(&table.transforms())
    }
}

/// Owns the vk structs an acceleration structure build reads.
struct BottomLevelInput {
    geometries: Vec<vk::AccelerationStructureGeometryKHR>,
    ranges: Vec<vk::AccelerationStructureBuildRangeInfoKHR>,
    max_primitive_counts: Vec<u32>,
}

impl BottomLevelInput {
    /// One geometry per table entry, in table order.
    fn new(buffers: &SceneBuffers, table: &GeometryTable) -> Self {
        let vertex_address = buffers.vertex_buffer.get_device_address();
        let index_address = buffers.index_buffer.get_device_address();
        let transform_address = buffers.transform_buffer.get_device_address();

        let mut input = Self {
            geometries: Vec::with_capacity(table.len()),
            ranges: Vec::with_capacity(table.len()),
            max_primitive_counts: Vec::with_capacity(table.len()),
        };

        for (id, entry) in table.entries().iter().enumerate() {
            let descriptor = &entry.descriptor;
            let triangles = vk::AccelerationStructureGeometryTrianglesDataKHR::builder()
                .vertex_format(vk::Format::R32G32B32_SFLOAT)
                .vertex_data(vk::DeviceOrHostAddressConstKHR {
                    device_address: vertex_address,
                })
                .vertex_stride(descriptor.vertex_stride)
                .max_vertex(buffers.vertex_count.saturating_sub(1))
                .index_type(vk::IndexType::UINT16)
                .index_data(vk::DeviceOrHostAddressConstKHR {
                    device_address: index_address,
                })
                .transform_data(vk::DeviceOrHostAddressConstKHR {
                    device_address: transform_address,
                })
                .build();

            let flags = if descriptor.opaque {
                vk::GeometryFlagsKHR::OPAQUE
            } else {
                vk::GeometryFlagsKHR::empty()
            };
            input.geometries.push(
                vk::AccelerationStructureGeometryKHR::builder()
                    .geometry_type(vk::GeometryTypeKHR::TRIANGLES)
                    .flags(flags)
                    .geometry(vk::AccelerationStructureGeometryDataKHR { triangles })
                    .build(),
            );
            input.ranges.push(
                vk::AccelerationStructureBuildRangeInfoKHR::builder()
                    .first_vertex(0)
                    .primitive_count(descriptor.primitive_count())
                    .primitive_offset(descriptor.index_byte_offset as u32)
                    .transform_offset(id as u32 * TRANSFORM_SIZE)
                    .build(),
            );
            input.max_primitive_counts.push(descriptor.primitive_count());
        }

        input
    }

    fn as_input(&self) -> AccelerationStructureInput {
        AccelerationStructureInput {
            geometries: &self.geometries,
            ranges: &self.ranges,
            max_primitive_counts: &self.max_primitive_counts,
        }
    }
}

struct TopLevelInput {
    geometry: vk::AccelerationStructureGeometryKHR,
    range: vk::AccelerationStructureBuildRangeInfoKHR,
}

impl TopLevelInput {
    fn new(instance_buffer: &Buffer) -> Self {
        let geometry = vk::AccelerationStructureGeometryKHR::builder()
            .geometry_type(vk::GeometryTypeKHR::INSTANCES)
            .flags(vk::GeometryFlagsKHR::OPAQUE)
            .geometry(vk::AccelerationStructureGeometryDataKHR {
                instances: vk::AccelerationStructureGeometryInstancesDataKHR::builder()
                    .array_of_pointers(false)
                    .data(vk::DeviceOrHostAddressConstKHR {
                        device_address: instance_buffer.get_device_address(),
                    })
                    .build(),
            })
            .build();
        let range = vk::AccelerationStructureBuildRangeInfoKHR::builder()
            .primitive_count(1)
            .build();

        Self { geometry, range }
    }

    fn as_input(&self) -> AccelerationStructureInput {
        AccelerationStructureInput {
            geometries: std::slice::from_ref(&self.geometry),
            ranges: std::slice::from_ref(&self.range),
            max_primitive_counts: &[1],
        }
    }
}

/// One bottom level structure holding every geometry, under a single instance.
pub struct SceneAccelerationStructures {
    pub tlas: AccelerationStructure,
    pub blas: AccelerationStructure,
    instance_buffer: Buffer,
}

impl SceneAccelerationStructures {
    pub fn flags() -> vk::BuildAccelerationStructureFlagsKHR {
        vk::BuildAccelerationStructureFlagsKHR::ALLOW_UPDATE
            | vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE
    }

    pub fn new(context: &Context, buffers: &SceneBuffers, table: &GeometryTable) -> Result<Self> {
        let blas_input = BottomLevelInput::new(buffers, table);
        let blas =
            context.create_bottom_level_acceleration_structure(Self::flags(), blas_input.as_input())?;

        let instance = vk::AccelerationStructureInstanceKHR {
            transform: vk::TransformMatrixKHR {
                matrix: [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            },
            instance_custom_index_and_mask: Packed24_8::new(0, 0xFF),
            instance_shader_binding_table_record_offset_and_flags: Packed24_8::new(
                0,
                vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE.as_raw() as _,
            ),
            acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
                device_handle: blas.address,
            },
        };
        let instance_buffer = create_gpu_only_buffer_from_data(
            context,
            vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
                | vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR,
            &[instance],
        )?;

        let tlas = context.create_top_level_acceleration_structure(
            Self::flags(),
            TopLevelInput::new(&instance_buffer).as_input(),
        )?;
        info!("Built acceleration structures for {} geometries", table.len());

        Ok(Self {
            tlas,
            blas,
            instance_buffer,
        })
    }

    /// Rewrites the geometry transforms and refits both levels in place.
    ///
    /// The GPU must not be reading the transform buffer.
    pub fn refit(&self, context: &Context, buffers: &SceneBuffers, table: &GeometryTable) -> Result<()> {
        buffers.write_transforms(table)?;

        let blas_input = BottomLevelInput::new(buffers, table);
        let tlas_input = TopLevelInput::new(&self.instance_buffer);
        context.execute_one_time_commands(|cmd| -> Result<()> {
            self.blas.cmd_update(cmd, blas_input.as_input())?;
            self.tlas.cmd_update(cmd, tlas_input.as_input())
        })??;
        debug!("Refitted {} geometries", table.len());

        Ok(())
    }
}

/// A sampled RGBA8 texture.
pub struct GpuTexture {
    pub id: TextureId,
    pub image: Image,
    pub view: ImageView,
}

impl GpuTexture {
    /// Uploads `texture` and leaves it in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn new(context: &Context, texture: &TextureImage) -> Result<Self> {
        let staging = context.create_buffer(
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            texture.pixels.len() as _,
        )?;
        staging.copy_data_to_buffer(&texture.pixels)?;

        let image = context.create_image(
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            MemoryLocation::GpuOnly,
            TEXTURE_FORMAT,
            texture.width,
            texture.height,
        )?;

        context.execute_one_time_commands(|cmd| {
            cmd.pipeline_image_barriers(&[ImageBarrier {
                image: &image,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                src_access_mask: vk::AccessFlags2::NONE,
                dst_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
                src_stage_mask: vk::PipelineStageFlags2::NONE,
                dst_stage_mask: vk::PipelineStageFlags2::TRANSFER,
            }]);
            cmd.copy_buffer_to_image(&staging, &image, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            cmd.pipeline_image_barriers(&[to_shader_read(&image)]);
        })?;
        let view = image.create_image_view()?;

        Ok(Self {
            id: texture.id,
            image,
            view,
        })
    }

    /// Records a copy from `staging`, bracketed by layout transitions from and back to
    /// `SHADER_READ_ONLY_OPTIMAL`.
    pub fn cmd_update(&self, cmd: &CommandBuffer, staging: &Buffer) {
        cmd.pipeline_image_barriers(&[ImageBarrier {
            image: &self.image,
            old_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            src_access_mask: vk::AccessFlags2::SHADER_READ,
            dst_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
            src_stage_mask: readers_stage(),
            dst_stage_mask: vk::PipelineStageFlags2::TRANSFER,
        }]);
        cmd.copy_buffer_to_image(staging, &self.image, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        cmd.pipeline_image_barriers(&[to_shader_read(&self.image)]);
    }
}

fn to_shader_read(image: &Image) -> ImageBarrier {
    ImageBarrier {
        image,
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        src_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
        dst_access_mask: vk::AccessFlags2::SHADER_READ,
        src_stage_mask: vk::PipelineStageFlags2::TRANSFER,
        dst_stage_mask: readers_stage(),
    }
}

/// Every scene texture, uploaded once at startup.
pub struct SceneTextures {
    pub textures: Vec<GpuTexture>,
    pub sampler: Sampler,
}

impl SceneTextures {
    pub fn new(context: &Context, images: &[TextureImage]) -> Result<Self> {
        let textures = images
            .iter()
            .map(|image| GpuTexture::new(context, image))
            .collect::<Result<Vec<_>>>()?;
        let sampler = context.create_linear_sampler(vk::SamplerAddressMode::REPEAT)?;

        Ok(Self { textures, sampler })
    }

    pub fn get(&self, id: TextureId) -> Result<&GpuTexture> {
        self.textures
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| anyhow::anyhow!("Texture {id:?} was not uploaded"))
    }

    /// Writes every texture sampled while tracing at its fixed slot.
    pub fn bind(&self, slots: &mut SlotTable) -> Result<()> {
        for texture in self.textures.iter().filter(|t| t.id != TextureId::TvNoise) {
            slots.create_texture_view(&texture.view, &self.sampler, Some(texture.id.slot()))?;
        }
        Ok(())
    }
}

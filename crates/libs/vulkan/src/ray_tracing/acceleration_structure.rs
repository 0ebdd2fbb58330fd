use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use gpu_allocator::MemoryLocation;

use crate::{utils::align_up, Buffer, CommandBuffer, Context, RayTracingContext};

/// Geometry array plus ranges fed to a build or a refit.
#[derive(Clone, Copy)]
pub struct AccelerationStructureInput<'a> {
    pub geometries: &'a [vk::AccelerationStructureGeometryKHR],
    pub ranges: &'a [vk::AccelerationStructureBuildRangeInfoKHR],
    pub max_primitive_counts: &'a [u32],
}

pub struct AccelerationStructure {
    ray_tracing: Arc<RayTracingContext>,
    pub(crate) inner: vk::AccelerationStructureKHR,
    level: vk::AccelerationStructureTypeKHR,
    flags: vk::BuildAccelerationStructureFlagsKHR,
    _buffer: Buffer,
    // kept alive for in-place updates
    scratch: Option<(Buffer, u64)>,
    pub address: u64,
}

impl AccelerationStructure {
    pub(crate) fn new(
        context: &Context,
        ray_tracing: Arc<RayTracingContext>,
        level: vk::AccelerationStructureTypeKHR,
        flags: vk::BuildAccelerationStructureFlagsKHR,
        input: AccelerationStructureInput,
    ) -> Result<Self> {
        let build_geo_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
            .ty(level)
            .flags(flags)
            .geometries(input.geometries);

        let build_size = unsafe {
            ray_tracing
                .acceleration_structure_fn
                .get_acceleration_structure_build_sizes(
                    vk::AccelerationStructureBuildTypeKHR::DEVICE,
                    &build_geo_info,
                    input.max_primitive_counts,
                )
        };
        log::debug!(
            "{level:?}: {} bytes, scratch {} / update {}",
            build_size.acceleration_structure_size,
            build_size.build_scratch_size,
            build_size.update_scratch_size
        );

        let buffer = context.create_buffer(
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            MemoryLocation::GpuOnly,
            build_size.acceleration_structure_size,
        )?;

        let create_info = vk::AccelerationStructureCreateInfoKHR::builder()
            .buffer(buffer.inner)
            .size(build_size.acceleration_structure_size)
            .ty(level);
        let inner = unsafe {
            ray_tracing
                .acceleration_structure_fn
                .create_acceleration_structure(&create_info, None)?
        };

        let allows_update = flags.contains(vk::BuildAccelerationStructureFlagsKHR::ALLOW_UPDATE);
        let scratch_size = if allows_update {
            build_size
                .build_scratch_size
                .max(build_size.update_scratch_size)
        } else {
            build_size.build_scratch_size
        };
        let (scratch_buffer, scratch_address) =
            create_scratch_buffer(context, &ray_tracing, scratch_size)?;

        let build_geo_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
            .ty(level)
            .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
            .flags(flags)
            .geometries(input.geometries)
            .dst_acceleration_structure(inner)
            .scratch_data(vk::DeviceOrHostAddressKHR {
                device_address: scratch_address,
            });

        context.execute_one_time_commands(|cmd_buffer| {
            cmd_buffer.build_acceleration_structures(&build_geo_info, input.ranges);
        })?;

        let address_info =
            vk::AccelerationStructureDeviceAddressInfoKHR::builder().acceleration_structure(inner);
        let address = unsafe {
            ray_tracing
                .acceleration_structure_fn
                .get_acceleration_structure_device_address(&address_info)
        };

        Ok(Self {
            ray_tracing,
            inner,
            level,
            flags,
            _buffer: buffer,
            scratch: allows_update.then_some((scratch_buffer, scratch_address)),
            address,
        })
    }

    /// Records an in-place refit. Geometry count and primitive counts must match the build.
    pub fn cmd_update(&self, cmd_buffer: &CommandBuffer, input: AccelerationStructureInput) -> Result<()> {
        let (_, scratch_address) = self.scratch.as_ref().ok_or_else(|| {
            anyhow::anyhow!("{:?} was not built with ALLOW_UPDATE", self.level)
        })?;

        let update_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
            .ty(self.level)
            .mode(vk::BuildAccelerationStructureModeKHR::UPDATE)
            .flags(self.flags)
            .geometries(input.geometries)
            .src_acceleration_structure(self.inner)
            .dst_acceleration_structure(self.inner)
            .scratch_data(vk::DeviceOrHostAddressKHR {
                device_address: *scratch_address,
            });

        cmd_buffer.build_acceleration_structures(&update_info, input.ranges);
        cmd_buffer.acceleration_structure_barrier();

        Ok(())
    }
}

fn create_scratch_buffer(
    context: &Context,
    ray_tracing: &RayTracingContext,
    size: u64,
) -> Result<(Buffer, u64)> {
    let alignment = ray_tracing
        .acceleration_structure_properties
        .min_acceleration_structure_scratch_offset_alignment as u64;
    let buffer = context.create_buffer(
        vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        MemoryLocation::GpuOnly,
        size + alignment,
    )?;
    let address = align_up(buffer.get_device_address(), alignment);

    Ok((buffer, address))
}

impl Context {
    pub fn create_bottom_level_acceleration_structure(
        &self,
        flags: vk::BuildAccelerationStructureFlagsKHR,
        input: AccelerationStructureInput,
    ) -> Result<AccelerationStructure> {
        AccelerationStructure::new(
            self,
            self.ray_tracing()?.clone(),
            vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
            flags,
            input,
        )
    }

    pub fn create_top_level_acceleration_structure(
        &self,
        flags: vk::BuildAccelerationStructureFlagsKHR,
        input: AccelerationStructureInput,
    ) -> Result<AccelerationStructure> {
        AccelerationStructure::new(
            self,
            self.ray_tracing()?.clone(),
            vk::AccelerationStructureTypeKHR::TOP_LEVEL,
            flags,
            input,
        )
    }
}

impl Drop for AccelerationStructure {
    fn drop(&mut self) {
        unsafe {
            self.ray_tracing
                .acceleration_structure_fn
                .destroy_acceleration_structure(self.inner, None);
        }
    }
}

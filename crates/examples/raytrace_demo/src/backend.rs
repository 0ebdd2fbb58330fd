//! The two ways of tracing the scene. One is picked when the device is created.

use std::mem::size_of;

use app::anyhow::Result;
use app::vulkan::ash::vk;
use app::vulkan::{
    CommandBuffer, ComputePipeline, Context, DescriptorSet, DescriptorSetLayout, PipelineLayout,
    RayTracingPipeline, RayTracingPipelineCreateInfo, RayTracingShaderCreateInfo,
    RayTracingShaderGroup, ShaderRecordBuilder, ShaderRecordTables, SlotTable,
};
use app::TracingPath;
use resource_manager::Resources;
use scene::{GeometryTable, HitPayload, RAY_TYPE_COUNT};

/// Everything a dispatch binds, in set order.
pub struct FrameResources<'a> {
    pub frame_set: &'a DescriptorSet,
    pub buffers: &'a SlotTable,
    pub textures: &'a SlotTable,
}

impl<'a> FrameResources<'a> {
    fn sets(&self) -> [&'a DescriptorSet; 3] {
        [self.frame_set, self.buffers.set(), self.textures.set()]
    }
}

pub trait RayTracingBackend {
    /// Shown next to the frame statistics.
    fn label(&self) -> &'static str;

    /// Writes every pixel of the output image.
    fn record(&self, cmd: &CommandBuffer, frame: &FrameResources, extent: vk::Extent2D);

    fn on_resize(&mut self, extent: vk::Extent2D) {
        let _ = extent;
    }
}

/// Shader stages reading the tracing descriptor sets.
pub fn shader_stages(path: TracingPath) -> vk::ShaderStageFlags {
    match path {
        TracingPath::Pipeline => {
            vk::ShaderStageFlags::RAYGEN_KHR
                | vk::ShaderStageFlags::CLOSEST_HIT_KHR
                | vk::ShaderStageFlags::MISS_KHR
        }
        TracingPath::RayQuery => vk::ShaderStageFlags::COMPUTE,
    }
}

pub fn create_backend(
    context: &Context,
    path: TracingPath,
    resources: &Resources,
    set_layouts: &[&DescriptorSetLayout; 3],
    table: &GeometryTable,
    extent: vk::Extent2D,
) -> Result<Box<dyn RayTracingBackend>> {
    let backend: Box<dyn RayTracingBackend> = match path {
        TracingPath::Pipeline => Box::new(PipelineBackend::new(context, resources, set_layouts, table)?),
        TracingPath::RayQuery => Box::new(ComputeBackend::new(context, resources, set_layouts, extent)?),
    };
    log::info!("Tracing backend {}", backend.label());

    Ok(backend)
}

const RAYGEN_GROUP: usize = 0;
const MISS_GROUPS: [usize; 3] = [1, 2, 3];
/// Primary then shadow, matching the ray type offsets the shaders pass.
const HIT_GROUPS: [usize; RAY_TYPE_COUNT as usize] = [4, 5];

const MAX_RAY_RECURSION_DEPTH: u32 = 2;

pub struct PipelineBackend {
    pipeline: RayTracingPipeline,
    layout: PipelineLayout,
    tables: ShaderRecordTables,
}

impl PipelineBackend {
    pub fn new(
        context: &Context,
        resources: &Resources,
        set_layouts: &[&DescriptorSetLayout; 3],
        table: &GeometryTable,
    ) -> Result<Self> {
        let layout = context.create_pipeline_layout(set_layouts, &[])?;

        let raygen = resources.load_spv("raygen.rgen.spv")?;
        let miss = resources.load_spv("miss.rmiss.spv")?;
        let shadow_miss = resources.load_spv("shadow.rmiss.spv")?;
        let reflection_miss = resources.load_spv("reflection.rmiss.spv")?;
        let closest_hit = resources.load_spv("closesthit.rchit.spv")?;

        let shaders = [
            RayTracingShaderCreateInfo {
                source: &raygen,
                stage: vk::ShaderStageFlags::RAYGEN_KHR,
            },
            RayTracingShaderCreateInfo {
                source: &miss,
                stage: vk::ShaderStageFlags::MISS_KHR,
            },
            RayTracingShaderCreateInfo {
                source: &shadow_miss,
                stage: vk::ShaderStageFlags::MISS_KHR,
            },
            RayTracingShaderCreateInfo {
                source: &reflection_miss,
                stage: vk::ShaderStageFlags::MISS_KHR,
            },
            RayTracingShaderCreateInfo {
                source: &closest_hit,
                stage: vk::ShaderStageFlags::CLOSEST_HIT_KHR,
            },
        ];
        let groups = [
            RayTracingShaderGroup::General(0),
            RayTracingShaderGroup::General(1),
            RayTracingShaderGroup::General(2),
            RayTracingShaderGroup::General(3),
            RayTracingShaderGroup::Triangles {
                closest_hit: Some(4),
                any_hit: None,
            },
            // shadow rays only need to know something was hit
            RayTracingShaderGroup::Triangles {
                closest_hit: None,
                any_hit: None,
            },
        ];

        let pipeline = context.create_ray_tracing_pipeline(
            &layout,
            RayTracingPipelineCreateInfo {
                shaders: &shaders,
                groups: &groups,
                max_ray_recursion_depth: MAX_RAY_RECURSION_DEPTH,
            },
        )?;

        let tables = create_shader_record_tables(context, &pipeline, table)?;

        Ok(Self {
            pipeline,
            layout,
            tables,
        })
    }
}

/// Hit record `i` belongs to geometry `i / RAY_TYPE_COUNT` since both come from `table`.
fn create_shader_record_tables(
    context: &Context,
    pipeline: &RayTracingPipeline,
    table: &GeometryTable,
) -> Result<ShaderRecordTables> {
    let handles = context.shader_group_handles(pipeline)?;

    let plain = context.shader_record_layout(0)?;
    let mut raygen = ShaderRecordBuilder::new(plain);
    raygen.append(&handles[RAYGEN_GROUP], &[])?;

    let mut miss = ShaderRecordBuilder::new(plain);
    for group in MISS_GROUPS {
        miss.append(&handles[group], &[])?;
    }

    let mut hit = ShaderRecordBuilder::new(context.shader_record_layout(size_of::<HitPayload>() as _)?);
    for (i, payload) in table.hit_records().enumerate() {
        let ray_type = i % RAY_TYPE_COUNT as usize;
        hit.append(&handles[HIT_GROUPS[ray_type]], payload.as_bytes())?;
    }
    log::debug!(
        "Shader records: 1 raygen, {} miss, {} hit of {} bytes",
        miss.len(),
        hit.len(),
        hit.stride()
    );

    Ok(ShaderRecordTables {
        raygen: context.upload_shader_record_table(&raygen)?,
        miss: context.upload_shader_record_table(&miss)?,
        hit: context.upload_shader_record_table(&hit)?,
    })
}

impl RayTracingBackend for PipelineBackend {
    fn label(&self) -> &'static str {
        "(DXR)"
    }

    fn record(&self, cmd: &CommandBuffer, frame: &FrameResources, extent: vk::Extent2D) {
        cmd.bind_rt_pipeline(&self.pipeline);
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::RAY_TRACING_KHR,
            &self.layout,
            0,
            &frame.sets(),
        );
        cmd.trace_rays(&self.tables, extent.width, extent.height);
    }
}

const WORKGROUP_SIZE: u32 = 8;

fn dispatch_size(extent: vk::Extent2D) -> [u32; 2] {
    [
        (extent.width + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
        (extent.height + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
    ]
}

/// Traces with ray queries from a compute shader, reading hit constants from the
/// payload storage buffer instead of shader records.
pub struct ComputeBackend {
    pipeline: ComputePipeline,
    layout: PipelineLayout,
    groups: [u32; 2],
}

impl ComputeBackend {
    pub fn new(
        context: &Context,
        resources: &Resources,
        set_layouts: &[&DescriptorSetLayout; 3],
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let layout = context.create_pipeline_layout(set_layouts, &[])?;
        let source = resources.load_spv("raytrace.comp.spv")?;
        let pipeline = context.create_compute_pipeline(&layout, &source)?;

        Ok(Self {
            pipeline,
            layout,
            groups: dispatch_size(extent),
        })
    }
}

impl RayTracingBackend for ComputeBackend {
    fn label(&self) -> &'static str {
        "(FL)"
    }

    fn record(&self, cmd: &CommandBuffer, frame: &FrameResources, _extent: vk::Extent2D) {
        cmd.bind_compute_pipeline(&self.pipeline);
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::COMPUTE,
            &self.layout,
            0,
            &frame.sets(),
        );
        cmd.dispatch(self.groups[0], self.groups[1], 1);
    }

    fn on_resize(&mut self, extent: vk::Extent2D) {
        self.groups = dispatch_size(extent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_every_pixel() {
        let groups = dispatch_size(vk::Extent2D {
            width: 1280,
            height: 721,
        });
        assert_eq!(groups, [160, 91]);
    }

    #[test]
    fn stages_follow_the_path() {
        assert_eq!(
            shader_stages(TracingPath::RayQuery),
            vk::ShaderStageFlags::COMPUTE
        );
        assert!(shader_stages(TracingPath::Pipeline).contains(vk::ShaderStageFlags::MISS_KHR));
    }

    #[test]
    fn hit_groups_follow_ray_types() {
        let group_count = 1 + MISS_GROUPS.len();
        assert_eq!(HIT_GROUPS, [group_count, group_count + 1]);
        assert!(!MISS_GROUPS.contains(&RAYGEN_GROUP));
    }
}

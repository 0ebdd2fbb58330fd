use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::{device::Device, Context, PipelineLayout, RayTracingContext, ShaderModule};

#[derive(Debug, Clone, Copy)]
pub struct RayTracingPipelineCreateInfo<'a> {
    pub shaders: &'a [RayTracingShaderCreateInfo<'a>],
    pub groups: &'a [RayTracingShaderGroup],
    pub max_ray_recursion_depth: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RayTracingShaderCreateInfo<'a> {
    pub source: &'a [u8],
    pub stage: vk::ShaderStageFlags,
}

/// A shader group, referencing entries of [`RayTracingPipelineCreateInfo::shaders`].
///
/// The group order is the order of the handles returned by
/// [`Context::shader_group_handles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayTracingShaderGroup {
    /// Ray generation or miss shader.
    General(u32),
    /// Triangle hit group. Both shaders may be absent.
    Triangles {
        closest_hit: Option<u32>,
        any_hit: Option<u32>,
    },
}

impl RayTracingShaderGroup {
    fn to_vk(self) -> vk::RayTracingShaderGroupCreateInfoKHR {
        let group = vk::RayTracingShaderGroupCreateInfoKHR::builder()
            .general_shader(vk::SHADER_UNUSED_KHR)
            .closest_hit_shader(vk::SHADER_UNUSED_KHR)
            .any_hit_shader(vk::SHADER_UNUSED_KHR)
            .intersection_shader(vk::SHADER_UNUSED_KHR);

        match self {
            Self::General(index) => group
                .ty(vk::RayTracingShaderGroupTypeKHR::GENERAL)
                .general_shader(index),
            Self::Triangles {
                closest_hit,
                any_hit,
            } => group
                .ty(vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP)
                .closest_hit_shader(closest_hit.unwrap_or(vk::SHADER_UNUSED_KHR))
                .any_hit_shader(any_hit.unwrap_or(vk::SHADER_UNUSED_KHR)),
        }
        .build()
    }
}

pub struct RayTracingPipeline {
    device: Arc<Device>,
    pub(crate) inner: vk::Pipeline,
    pub(crate) group_count: u32,
}

impl RayTracingPipeline {
    pub(crate) fn new(
        device: Arc<Device>,
        ray_tracing: &RayTracingContext,
        layout: &PipelineLayout,
        create_info: RayTracingPipelineCreateInfo,
    ) -> Result<Self> {
        let modules = create_info
            .shaders
            .iter()
            .map(|shader| ShaderModule::from_bytes(device.clone(), shader.source))
            .collect::<Result<Vec<_>>>()?;
        let stages = create_info
            .shaders
            .iter()
            .zip(modules.iter())
            .map(|(shader, module)| module.stage_info(shader.stage))
            .collect::<Vec<_>>();
        let groups = create_info
            .groups
            .iter()
            .map(|group| group.to_vk())
            .collect::<Vec<_>>();

        let max_depth = create_info
            .max_ray_recursion_depth
            .min(ray_tracing.pipeline_properties.max_ray_recursion_depth);
        let pipe_info = vk::RayTracingPipelineCreateInfoKHR::builder()
            .layout(layout.inner)
            .stages(&stages)
            .groups(&groups)
            .max_pipeline_ray_recursion_depth(max_depth);

        let inner = unsafe {
            ray_tracing
                .pipeline_fn
                .create_ray_tracing_pipelines(
                    vk::DeferredOperationKHR::null(),
                    vk::PipelineCache::null(),
                    std::slice::from_ref(&pipe_info),
                    None,
                )?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("Driver returned no ray tracing pipeline"))?
        };
        log::debug!(
            "Ray tracing pipeline: {} stages, {} groups, recursion depth {max_depth}",
            stages.len(),
            groups.len()
        );

        Ok(Self {
            device,
            inner,
            group_count: groups.len() as _,
        })
    }

    pub fn group_count(&self) -> u32 {
        self.group_count
    }
}

impl Context {
    pub fn create_ray_tracing_pipeline(
        &self,
        layout: &PipelineLayout,
        create_info: RayTracingPipelineCreateInfo,
    ) -> Result<RayTracingPipeline> {
        let ray_tracing = self.ray_tracing()?;
        if !ray_tracing.has_pipeline {
            anyhow::bail!("Device was created without VK_KHR_ray_tracing_pipeline");
        }

        RayTracingPipeline::new(self.device.clone(), ray_tracing, layout, create_info)
    }
}

impl Drop for RayTracingPipeline {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_pipeline(self.inner, None) };
    }
}

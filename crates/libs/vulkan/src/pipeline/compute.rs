use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::{device::Device, Context, PipelineLayout, ShaderModule};

pub struct ComputePipeline {
    device: Arc<Device>,
    pub(crate) inner: vk::Pipeline,
}

impl Context {
    pub fn create_compute_pipeline(
        &self,
        layout: &PipelineLayout,
        shader_source: &[u8],
    ) -> Result<ComputePipeline> {
        let shader_module = ShaderModule::from_bytes(self.device.clone(), shader_source)?;

        let pipeline_info = vk::ComputePipelineCreateInfo::builder()
            .stage(shader_module.stage_info(vk::ShaderStageFlags::COMPUTE))
            .layout(layout.inner);

        let inner = unsafe {
            self.device.inner.create_compute_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        }
        .map_err(|(_, err)| err)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Driver returned no compute pipeline"))?;

        Ok(ComputePipeline {
            device: self.device.clone(),
            inner,
        })
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_pipeline(self.inner, None) };
    }
}

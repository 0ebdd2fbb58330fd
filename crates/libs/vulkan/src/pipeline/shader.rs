use std::{ffi::CStr, sync::Arc};

use anyhow::Result;
use ash::vk;

use crate::{device::Device, utils::read_shader_from_bytes, Context};

/// Entry point name shared by every shader compiled from GLSL.
pub(crate) fn entry_point() -> &'static CStr {
    // SAFETY: literal is nul terminated with no interior nul
    unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") }
}

pub struct ShaderModule {
    device: Arc<Device>,
    pub(crate) inner: vk::ShaderModule,
}

impl ShaderModule {
    pub(crate) fn from_bytes(device: Arc<Device>, source: &[u8]) -> Result<Self> {
        let source = read_shader_from_bytes(source)?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&source);
        let inner = unsafe { device.inner.create_shader_module(&create_info, None)? };

        Ok(Self { device, inner })
    }

    pub(crate) fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.inner)
            .name(entry_point())
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.inner.destroy_shader_module(self.inner, None);
        }
    }
}

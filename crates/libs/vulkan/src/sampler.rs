use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::{device::Device, Context};

pub struct Sampler {
    device: Arc<Device>,
    pub(crate) inner: vk::Sampler,
}

impl Context {
    pub fn create_sampler(&self, create_info: &vk::SamplerCreateInfo) -> Result<Sampler> {
        let inner = unsafe { self.device.inner.create_sampler(create_info, None)? };

        Ok(Sampler {
            device: self.device.clone(),
            inner,
        })
    }

    /// Bilinear sampler with the same addressing on every axis.
    pub fn create_linear_sampler(&self, address_mode: vk::SamplerAddressMode) -> Result<Sampler> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(vk::LOD_CLAMP_NONE);

        self.create_sampler(&create_info)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.inner.destroy_sampler(self.inner, None);
        }
    }
}

use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::{device::Device, Context};

/// True when `err` was caused by `VK_ERROR_DEVICE_LOST`, anywhere in its chain.
pub fn is_device_lost(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<vk::Result>() == Some(&vk::Result::ERROR_DEVICE_LOST))
}

pub struct Semaphore {
    device: Arc<Device>,
    pub(crate) inner: vk::Semaphore,
}

impl Context {
    pub fn create_semaphore(&self) -> Result<Semaphore> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let inner = unsafe { self.device.inner.create_semaphore(&semaphore_info, None)? };

        Ok(Semaphore {
            device: self.device.clone(),
            inner,
        })
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.inner.destroy_semaphore(self.inner, None);
        }
    }
}

pub struct Fence {
    device: Arc<Device>,
    pub(crate) inner: vk::Fence,
}

impl Fence {
    /// Blocks until signaled. `None` waits without a deadline.
    pub fn wait(&self, timeout: Option<u64>) -> Result<()> {
        let timeout = timeout.unwrap_or(u64::MAX);

        unsafe {
            self.device
                .inner
                .wait_for_fences(&[self.inner], true, timeout)?
        };

        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        unsafe { self.device.inner.reset_fences(&[self.inner])? };

        Ok(())
    }
}

impl Context {
    pub fn create_fence(&self, flags: Option<vk::FenceCreateFlags>) -> Result<Fence> {
        let fence_info = vk::FenceCreateInfo::builder().flags(flags.unwrap_or_default());
        let inner = unsafe { self.device.inner.create_fence(&fence_info, None)? };

        Ok(Fence {
            device: self.device.clone(),
            inner,
        })
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.inner.destroy_fence(self.inner, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context as _;

    use super::*;

    fn fail(code: vk::Result) -> Result<()> {
        Err(anyhow::Error::from(code))
    }

    #[test]
    fn device_lost_is_found_through_context() {
        let err = fail(vk::Result::ERROR_DEVICE_LOST)
            .context("Failed to submit frame")
            .unwrap_err();
        assert!(is_device_lost(&err));

        let err = fail(vk::Result::ERROR_OUT_OF_DATE_KHR).unwrap_err();
        assert!(!is_device_lost(&err));
    }
}

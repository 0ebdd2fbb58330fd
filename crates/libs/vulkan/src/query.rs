use std::{sync::Arc, time::Duration};

use anyhow::Result;
use ash::vk;

use crate::{Context, Device};

/// `C` timestamps written by one frame's command buffer.
pub struct TimestampQueryPool<const C: usize> {
    device: Arc<Device>,
    pub(crate) inner: vk::QueryPool,
    timestamp_period: f64,
}

impl Context {
    pub fn create_timestamp_query_pool<const C: usize>(&self) -> Result<TimestampQueryPool<C>> {
        let create_info = vk::QueryPoolCreateInfo::builder()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(C as _);
        let inner = unsafe { self.device.inner.create_query_pool(&create_info, None)? };

        Ok(TimestampQueryPool {
            device: self.device.clone(),
            inner,
            timestamp_period: self.physical_device.limits.timestamp_period as _,
        })
    }
}

impl<const C: usize> TimestampQueryPool<C> {
    /// Time between the first and the last timestamp.
    ///
    /// `None` while the results are not available yet, e.g. before the pool was first written.
    pub fn elapsed(&self) -> Result<Option<Duration>> {
        let mut data = [0u64; C];

        let result = unsafe {
            self.device.inner.get_query_pool_results(
                self.inner,
                0,
                C as _,
                &mut data,
                vk::QueryResultFlags::TYPE_64,
            )
        };
        match result {
            Ok(()) => {}
            Err(vk::Result::NOT_READY) => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let ticks = data[C - 1].saturating_sub(data[0]);
        Ok(Some(Duration::from_nanos(
            (ticks as f64 * self.timestamp_period) as u64,
        )))
    }
}

impl<const C: usize> Drop for TimestampQueryPool<C> {
    fn drop(&mut self) {
        unsafe {
            self.device.inner.destroy_query_pool(self.inner, None);
        }
    }
}

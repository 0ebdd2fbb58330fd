//! Thin RAII layer over `ash` with the pieces a hardware ray tracer needs.

pub use ash;
pub use gpu_allocator;

mod buffer;
mod command;
mod context;
mod descriptor;
mod device;
mod image;
mod instance;
mod physical_device;
mod pipeline;
mod query;
mod queue;
mod ray_tracing;
mod sampler;
mod surface;
mod swapchain;
mod sync;

pub mod utils;

pub use buffer::*;
pub use command::*;
pub use context::*;
pub use descriptor::*;
pub use device::*;
pub use image::*;
pub use pipeline::*;
pub use query::*;
pub use queue::*;
pub use ray_tracing::*;
pub use sampler::*;
pub use swapchain::*;
pub use sync::*;

pub const VERSION_1_3: Version = Version::new(1, 3);

/// Vulkan API version requested at instance creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub(crate) fn make_api_version(&self) -> u32 {
        ash::vk::make_api_version(0, self.major, self.minor, 0)
    }
}

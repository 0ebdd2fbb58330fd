use std::sync::Arc;

use anyhow::Result;
use ash::{extensions::khr::Swapchain as AshSwapchain, vk};

use crate::{device::Device, Context, Image, ImageView, Queue, Semaphore};

pub struct AcquiredImage {
    pub index: u32,
    pub is_suboptimal: bool,
}

pub struct Swapchain {
    device: Arc<Device>,
    inner: AshSwapchain,
    swapchain_khr: vk::SwapchainKHR,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub images: Vec<Image>,
    pub views: Vec<ImageView>,
}

impl Swapchain {
    pub fn new(context: &Context, width: u32, height: u32) -> Result<Self> {
        log::debug!("Creating vulkan swapchain");

        let formats = unsafe {
            context.surface.inner.get_physical_device_surface_formats(
                context.physical_device.inner,
                context.surface.surface_khr,
            )?
        };
        let format = choose_surface_format(&formats);
        log::debug!("Swapchain format: {format:?}");

        let present_modes = unsafe {
            context
                .surface
                .inner
                .get_physical_device_surface_present_modes(
                    context.physical_device.inner,
                    context.surface.surface_khr,
                )?
        };
        let present_mode = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
            .into_iter()
            .find(|mode| present_modes.contains(mode))
            .unwrap_or(vk::PresentModeKHR::FIFO);
        log::debug!("Swapchain present mode: {present_mode:?}");

        let mut swapchain = Self {
            device: context.device.clone(),
            inner: AshSwapchain::new(&context.instance.inner, &context.device.inner),
            swapchain_khr: vk::SwapchainKHR::null(),
            extent: vk::Extent2D::default(),
            format: format.format,
            color_space: format.color_space,
            present_mode,
            images: vec![],
            views: vec![],
        };
        swapchain.create(context, width, height)?;

        Ok(swapchain)
    }

    pub fn resize(&mut self, context: &Context, width: u32, height: u32) -> Result<()> {
        log::debug!("Resizing vulkan swapchain to {width}x{height}");

        self.destroy();
        self.create(context, width, height)
    }

    fn create(&mut self, context: &Context, width: u32, height: u32) -> Result<()> {
        let capabilities = unsafe {
            context
                .surface
                .inner
                .get_physical_device_surface_capabilities(
                    context.physical_device.inner,
                    context.surface.surface_khr,
                )?
        };

        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            let min = capabilities.min_image_extent;
            let max = capabilities.max_image_extent;
            vk::Extent2D {
                width: width.clamp(min.width, max.width),
                height: height.clamp(min.height, max.height),
            }
        };

        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }
        log::debug!("Swapchain extent: {extent:?}, {image_count} images");

        let families_indices = [
            context.graphics_queue_family.index,
            context.present_queue_family.index,
        ];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface.surface_khr)
            .min_image_count(image_count)
            .image_format(self.format)
            .image_color_space(self.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true);
        create_info = if families_indices[0] != families_indices[1] {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain_khr = unsafe { self.inner.create_swapchain(&create_info, None)? };

        let images = unsafe { self.inner.get_swapchain_images(swapchain_khr)? }
            .into_iter()
            .map(|i| {
                Image::from_swapchain_image(
                    self.device.clone(),
                    context.allocator.clone(),
                    i,
                    self.format,
                    extent,
                )
            })
            .collect::<Vec<_>>();
        let views = images
            .iter()
            .map(Image::create_image_view)
            .collect::<Result<Vec<_>>>()?;

        self.swapchain_khr = swapchain_khr;
        self.extent = extent;
        self.images = images;
        self.views = views;

        Ok(())
    }

    pub fn acquire_next_image(&self, timeout: u64, semaphore: &Semaphore) -> Result<AcquiredImage> {
        let (index, is_suboptimal) = unsafe {
            self.inner.acquire_next_image(
                self.swapchain_khr,
                timeout,
                semaphore.inner,
                vk::Fence::null(),
            )?
        };

        Ok(AcquiredImage {
            index,
            is_suboptimal,
        })
    }

    /// Returns true when the swapchain is suboptimal.
    pub fn queue_present(
        &self,
        image_index: u32,
        wait_semaphores: &[&Semaphore],
        queue: &Queue,
    ) -> Result<bool> {
        let swapchains = [self.swapchain_khr];
        let images_indices = [image_index];
        let wait_semaphores = wait_semaphores.iter().map(|s| s.inner).collect::<Vec<_>>();

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&images_indices);

        Ok(unsafe { self.inner.queue_present(queue.inner, &present_info)? })
    }

    fn destroy(&mut self) {
        self.views.clear();
        self.images.clear();
        unsafe { self.inner.destroy_swapchain(self.swapchain_khr, None) };
        self.swapchain_khr = vk::SwapchainKHR::null();
    }
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    match formats {
        [only] if only.format == vk::Format::UNDEFINED => preferred,
        _ => formats
            .iter()
            .copied()
            .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
            .or_else(|| formats.first().copied())
            .unwrap_or(preferred),
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy();
    }
}

use std::mem::size_of;
use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::{
    check_slot_type, device::Device, Buffer, Context, DescriptorPool, DescriptorSet,
    DescriptorSetLayout, HandleSpace, ImageView, Sampler, SlotAllocator, SlotError, SlotHandle,
    WriteDescriptorSet, WriteDescriptorSetKind,
};

/// Binding used by every slot table.
pub const SLOT_TABLE_BINDING: u32 = 0;

/// A fixed-capacity array of descriptors of one type, addressed by slot index.
///
/// Host handles are byte offsets into [`SlotTable::views`], device handles are array
/// elements of binding [`SLOT_TABLE_BINDING`].
pub struct SlotTable {
    device: Arc<Device>,
    ty: vk::DescriptorType,
    stages: vk::ShaderStageFlags,
    slots: SlotAllocator,
    views: Vec<Option<SlotView>>,
    // declaration order matters: the set is freed with its pool
    set: DescriptorSet,
    _pool: DescriptorPool,
    layout: DescriptorSetLayout,
}

/// What was last written into a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotView {
    Image(vk::ImageView),
    Buffer(vk::Buffer),
}

impl SlotTable {
    pub(crate) fn new(
        device: Arc<Device>,
        ty: vk::DescriptorType,
        capacity: u32,
        stages: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let (layout, pool, set) = Self::create_set(&device, ty, capacity, stages)?;
        let slots = SlotAllocator::new(
            capacity,
            HandleSpace::new(0, size_of::<Option<SlotView>>() as _),
            HandleSpace::new(0, 1),
        );

        log::debug!("Created {ty:?} slot table with {capacity} slots");

        Ok(Self {
            device,
            ty,
            stages,
            slots,
            views: vec![None; capacity as usize],
            set,
            _pool: pool,
            layout,
        })
    }

    fn create_set(
        device: &Arc<Device>,
        ty: vk::DescriptorType,
        capacity: u32,
        stages: vk::ShaderStageFlags,
    ) -> Result<(DescriptorSetLayout, DescriptorPool, DescriptorSet)> {
        let bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(SLOT_TABLE_BINDING)
            .descriptor_type(ty)
            .descriptor_count(capacity)
            .stage_flags(stages)
            .build()];
        let flags = [vk::DescriptorBindingFlags::PARTIALLY_BOUND];
        let layout = DescriptorSetLayout::new(device.clone(), &bindings, Some(&flags))?;

        let pool_sizes = [vk::DescriptorPoolSize::builder()
            .ty(ty)
            .descriptor_count(capacity)
            .build()];
        let pool = DescriptorPool::new(device.clone(), 1, &pool_sizes)?;
        let set = pool.allocate_set(&layout)?;

        Ok((layout, pool, set))
    }

    pub fn allocate(&mut self, requested: Option<u32>) -> Result<u32> {
        Ok(self.slots.allocate(requested)?)
    }

    pub fn handle_for(&self, index: u32) -> SlotHandle {
        self.slots.handle_for(index)
    }

    /// Allocates a slot and writes a sampled image into it.
    pub fn create_texture_view(
        &mut self,
        view: &ImageView,
        sampler: &Sampler,
        requested: Option<u32>,
    ) -> Result<u32> {
        let index = self.allocate(requested)?;
        self.write_image(index, view, sampler, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)?;
        Ok(index)
    }

    /// Allocates a slot and writes a storage buffer into it.
    pub fn create_buffer_view(&mut self, buffer: &Buffer, requested: Option<u32>) -> Result<u32> {
        let index = self.allocate(requested)?;
        self.write_buffer(index, buffer)?;
        Ok(index)
    }

    /// Allocates a slot and writes a storage image in `GENERAL` layout into it.
    pub fn create_storage_image_view(
        &mut self,
        view: &ImageView,
        requested: Option<u32>,
    ) -> Result<u32> {
        let index = self.allocate(requested)?;
        self.write_storage_image(index, view)?;
        Ok(index)
    }

    /// Fails on an index past the table or a table that does not hold sampled images.
    pub fn write_image(
        &mut self,
        index: u32,
        view: &ImageView,
        sampler: &Sampler,
        layout: vk::ImageLayout,
    ) -> Result<(), SlotError> {
        self.write(
            index,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            WriteDescriptorSetKind::CombinedImageSampler {
                view,
                sampler,
                layout,
            },
            SlotView::Image(view.inner),
        )
    }

    pub fn write_storage_image(&mut self, index: u32, view: &ImageView) -> Result<(), SlotError> {
        self.write(
            index,
            vk::DescriptorType::STORAGE_IMAGE,
            WriteDescriptorSetKind::StorageImage {
                view,
                layout: vk::ImageLayout::GENERAL,
            },
            SlotView::Image(view.inner),
        )
    }

    pub fn write_buffer(&mut self, index: u32, buffer: &Buffer) -> Result<(), SlotError> {
        self.write(
            index,
            vk::DescriptorType::STORAGE_BUFFER,
            WriteDescriptorSetKind::StorageBuffer { buffer },
            SlotView::Buffer(buffer.inner),
        )
    }

    fn write(
        &mut self,
        index: u32,
        ty: vk::DescriptorType,
        kind: WriteDescriptorSetKind,
        view: SlotView,
    ) -> Result<(), SlotError> {
        check_slot_type(self.ty, ty)?;
        self.slots.check(index)?;
        let slot = self
            .views
            .get_mut(index as usize)
            .ok_or(SlotError::OutOfRange {
                index,
                capacity: self.slots.capacity(),
            })?;
        *slot = Some(view);

        let handle = self.slots.handle_for(index);
        self.set.update(&[WriteDescriptorSet {
            binding: SLOT_TABLE_BINDING,
            array_element: handle.device as _,
            kind,
        }]);
        Ok(())
    }

    /// View written at `handle.host`, if any.
    pub fn view_at(&self, handle: SlotHandle) -> Option<SlotView> {
        let stride = size_of::<Option<SlotView>>() as u64;
        self.views
            .get((handle.host / stride) as usize)
            .copied()
            .flatten()
    }

    /// Drops the descriptor set and starts over with an empty table of the same shape.
    pub fn reset(&mut self) -> Result<()> {
        let (layout, pool, set) =
            Self::create_set(&self.device, self.ty, self.slots.capacity(), self.stages)?;
        self.set = set;
        self._pool = pool;
        self.layout = layout;
        self.views.iter_mut().for_each(|v| *v = None);
        self.slots.reset();

        Ok(())
    }

    pub fn layout(&self) -> &DescriptorSetLayout {
        &self.layout
    }

    pub fn set(&self) -> &DescriptorSet {
        &self.set
    }

    pub fn capacity(&self) -> u32 {
        self.slots.capacity()
    }

    pub fn allocated(&self) -> u32 {
        self.slots.allocated()
    }
}

impl Context {
    pub fn create_slot_table(
        &self,
        ty: vk::DescriptorType,
        capacity: u32,
        stages: vk::ShaderStageFlags,
    ) -> Result<SlotTable> {
        SlotTable::new(self.device.clone(), ty, capacity, stages)
    }
}

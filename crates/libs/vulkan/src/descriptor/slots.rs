use ash::vk;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("descriptor table is full ({capacity} slots)")]
    OutOfSlots { capacity: u32 },
    #[error("slot {index} is outside the table ({capacity} slots)")]
    OutOfRange { index: u32, capacity: u32 },
    #[error("table holds {table:?} descriptors, got a {written:?} write")]
    WrongType {
        table: vk::DescriptorType,
        written: vk::DescriptorType,
    },
}

/// Linear address space a slot index is projected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleSpace {
    pub base: u64,
    pub stride: u64,
}

impl HandleSpace {
    pub const fn new(base: u64, stride: u64) -> Self {
        Self { base, stride }
    }

    pub const fn at(&self, index: u32) -> u64 {
        self.base + index as u64 * self.stride
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle {
    pub host: u64,
    pub device: u64,
}

/// Bump allocator over a fixed number of descriptor slots.
///
/// Slots are never freed one by one. [`SlotAllocator::reset`] empties the whole table.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    capacity: u32,
    allocated: u32,
    host: HandleSpace,
    device: HandleSpace,
}

impl SlotAllocator {
    pub fn new(capacity: u32, host: HandleSpace, device: HandleSpace) -> Self {
        Self {
            capacity,
            allocated: 0,
            host,
            device,
        }
    }

    /// Returns `requested` when it names an existing slot, otherwise the next free one.
    pub fn allocate(&mut self, requested: Option<u32>) -> Result<u32, SlotError> {
        if let Some(index) = requested.filter(|&i| i < self.capacity) {
            return Ok(index);
        }

        if self.allocated >= self.capacity {
            return Err(SlotError::OutOfSlots {
                capacity: self.capacity,
            });
        }

        let index = self.allocated;
        self.allocated += 1;
        Ok(index)
    }

    /// Fails when `index` does not name a slot of this table.
    pub fn check(&self, index: u32) -> Result<(), SlotError> {
        if index < self.capacity {
            Ok(())
        } else {
            Err(SlotError::OutOfRange {
                index,
                capacity: self.capacity,
            })
        }
    }

    pub fn handle_for(&self, index: u32) -> SlotHandle {
        SlotHandle {
            host: self.host.at(index),
            device: self.device.at(index),
        }
    }

    pub fn reset(&mut self) {
        self.allocated = 0;
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn allocated(&self) -> u32 {
        self.allocated
    }
}

/// Fails when a `written` descriptor does not fit a table of `table` descriptors.
pub fn check_slot_type(
    table: vk::DescriptorType,
    written: vk::DescriptorType,
) -> Result<(), SlotError> {
    if table == written {
        Ok(())
    } else {
        Err(SlotError::WrongType { table, written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(capacity: u32) -> SlotAllocator {
        SlotAllocator::new(
            capacity,
            HandleSpace::new(0x1000, 32),
            HandleSpace::new(0, 1),
        )
    }

    #[test]
    fn indices_are_unique_and_in_range() {
        let mut slots = allocator(16);
        let indices = (0..16)
            .map(|_| slots.allocate(None).unwrap())
            .collect::<Vec<_>>();

        let mut sorted = indices.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 16);
        assert!(indices.iter().all(|&i| i < 16));
    }

    #[test]
    fn third_allocation_of_two_slots_fails() {
        let mut slots = allocator(2);
        assert_eq!(slots.allocate(None), Ok(0));
        assert_eq!(slots.allocate(None), Ok(1));
        assert_eq!(
            slots.allocate(None),
            Err(SlotError::OutOfSlots { capacity: 2 })
        );
    }

    #[test]
    fn requested_index_is_reused_without_moving_counter() {
        let mut slots = allocator(4);
        assert_eq!(slots.allocate(Some(3)), Ok(3));
        assert_eq!(slots.allocate(Some(3)), Ok(3));
        assert_eq!(slots.allocated(), 0);
        assert_eq!(slots.allocate(None), Ok(0));

        // out of range request falls back to the counter
        assert_eq!(slots.allocate(Some(9)), Ok(1));
    }

    #[test]
    fn handles_are_stable() {
        let mut slots = allocator(8);
        let index = slots.allocate(None).unwrap();
        let index = slots.allocate(Some(index + 5)).unwrap();

        let first = slots.handle_for(index);
        assert_eq!(first, slots.handle_for(index));
        assert_eq!(first.host, 0x1000 + 5 * 32);
        assert_eq!(first.device, 5);
    }

    #[test]
    fn reset_empties_the_table() {
        let mut slots = allocator(1);
        slots.allocate(None).unwrap();
        assert!(slots.allocate(None).is_err());

        slots.reset();
        assert_eq!(slots.allocate(None), Ok(0));
    }

    #[test]
    fn writes_past_the_end_are_rejected() {
        let slots = allocator(4);
        assert_eq!(slots.check(0), Ok(()));
        assert_eq!(slots.check(3), Ok(()));
        assert_eq!(
            slots.check(4),
            Err(SlotError::OutOfRange {
                index: 4,
                capacity: 4
            })
        );
        assert!(allocator(0).check(0).is_err());
    }

    #[test]
    fn descriptor_type_must_match_the_table() {
        assert_eq!(
            check_slot_type(
                vk::DescriptorType::STORAGE_BUFFER,
                vk::DescriptorType::STORAGE_BUFFER
            ),
            Ok(())
        );
        assert_eq!(
            check_slot_type(
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::DescriptorType::STORAGE_IMAGE
            ),
            Err(SlotError::WrongType {
                table: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                written: vk::DescriptorType::STORAGE_IMAGE,
            })
        );
    }
}

use anyhow::Result;
use ash::vk;
use gpu_allocator::MemoryLocation;
use thiserror::Error;

use crate::{utils::align_up, Buffer, Context, RayTracingPipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("shader record of {size} bytes does not fit the {stride} byte stride")]
    TooLarge { size: u64, stride: u64 },
    #[error("shader identifier is {actual} bytes, the table expects {expected}")]
    IdentifierSize { expected: u64, actual: u64 },
}

/// Size bookkeeping shared by every record of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderRecordLayout {
    identifier_size: u64,
    stride: u64,
}

impl ShaderRecordLayout {
    /// `stride = align_up(identifier_size + max_payload_size, alignment)`
    pub fn new(identifier_size: u64, max_payload_size: u64, alignment: u64) -> Self {
        Self {
            identifier_size,
            stride: align_up(identifier_size + max_payload_size, alignment.max(1)),
        }
    }

    pub fn identifier_size(&self) -> u64 {
        self.identifier_size
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }
}

/// Lays out fixed-stride records back to back, in append order.
#[derive(Debug, Clone)]
pub struct ShaderRecordBuilder {
    layout: ShaderRecordLayout,
    bytes: Vec<u8>,
    len: usize,
}

impl ShaderRecordBuilder {
    pub fn new(layout: ShaderRecordLayout) -> Self {
        Self {
            layout,
            bytes: vec![],
            len: 0,
        }
    }

    pub fn append(&mut self, identifier: &[u8], payload: &[u8]) -> Result<(), RecordError> {
        let stride = self.layout.stride;
        let id_size = identifier.len() as u64;
        if id_size != self.layout.identifier_size {
            return Err(RecordError::IdentifierSize {
                expected: self.layout.identifier_size,
                actual: id_size,
            });
        }

        let size = id_size + payload.len() as u64;
        if size > stride {
            return Err(RecordError::TooLarge { size, stride });
        }

        let start = self.bytes.len();
        self.bytes.resize(start + stride as usize, 0);
        self.bytes[start..start + identifier.len()].copy_from_slice(identifier);
        let payload_start = start + identifier.len();
        self.bytes[payload_start..payload_start + payload.len()].copy_from_slice(payload);
        self.len += 1;

        Ok(())
    }

    pub fn offset_of(&self, index: usize) -> u64 {
        index as u64 * self.layout.stride
    }

    pub fn record(&self, index: usize) -> Option<&[u8]> {
        let stride = self.layout.stride as usize;
        self.bytes.get(index * stride..(index + 1) * stride)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stride(&self) -> u64 {
        self.layout.stride
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An uploaded, immutable record table.
pub struct ShaderRecordTable {
    _buffer: Buffer,
    region: vk::StridedDeviceAddressRegionKHR,
    count: usize,
}

impl ShaderRecordTable {
    pub(crate) fn upload(context: &Context, builder: &ShaderRecordBuilder) -> Result<Self> {
        let base_alignment = context
            .ray_tracing()?
            .pipeline_properties
            .shader_group_base_alignment as u64;

        // Over-allocate so the start address can be moved up to the base alignment.
        let size = builder.bytes().len() as u64;
        let buffer = context.create_buffer(
            vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            MemoryLocation::CpuToGpu,
            size + base_alignment,
        )?;

        let raw_address = buffer.get_device_address();
        let address = align_up(raw_address, base_alignment);
        buffer.copy_data_to_buffer_at((address - raw_address) as usize, builder.bytes())?;

        let region = vk::StridedDeviceAddressRegionKHR::builder()
            .device_address(address)
            .stride(builder.stride())
            .size(size)
            .build();

        Ok(Self {
            _buffer: buffer,
            region,
            count: builder.len(),
        })
    }

    pub fn region(&self) -> vk::StridedDeviceAddressRegionKHR {
        self.region
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// The three tables a `vkCmdTraceRaysKHR` call reads from.
pub struct ShaderRecordTables {
    pub raygen: ShaderRecordTable,
    pub miss: ShaderRecordTable,
    pub hit: ShaderRecordTable,
}

impl Context {
    /// Record layout for a table whose records carry up to `max_payload_size` bytes.
    pub fn shader_record_layout(&self, max_payload_size: u64) -> Result<ShaderRecordLayout> {
        let properties = self.ray_tracing()?.pipeline_properties;
        Ok(ShaderRecordLayout::new(
            properties.shader_group_handle_size as _,
            max_payload_size,
            properties.shader_group_handle_alignment as _,
        ))
    }

    pub fn upload_shader_record_table(
        &self,
        builder: &ShaderRecordBuilder,
    ) -> Result<ShaderRecordTable> {
        ShaderRecordTable::upload(self, builder)
    }

    /// Shader group handles of `pipeline`, one entry per group.
    pub fn shader_group_handles(&self, pipeline: &RayTracingPipeline) -> Result<Vec<Vec<u8>>> {
        let ray_tracing = self.ray_tracing()?;
        let handle_size = ray_tracing.pipeline_properties.shader_group_handle_size as usize;
        let group_count = pipeline.group_count;

        let data = unsafe {
            ray_tracing
                .pipeline_fn
                .get_ray_tracing_shader_group_handles(
                    pipeline.inner,
                    0,
                    group_count,
                    group_count as usize * handle_size,
                )?
        };

        Ok(data.chunks_exact(handle_size).map(<[u8]>::to_vec).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: [u8; 32] = [0xAB; 32];

    #[test]
    fn stride_covers_identifier_and_largest_payload() {
        let layout = ShaderRecordLayout::new(32, 28, 32);
        assert_eq!(layout.stride(), 64);

        let layout = ShaderRecordLayout::new(32, 0, 32);
        assert_eq!(layout.stride(), 32);
    }

    #[test]
    fn records_are_fifo_at_stride_offsets() {
        let mut builder = ShaderRecordBuilder::new(ShaderRecordLayout::new(32, 8, 16));
        for i in 0..5u32 {
            builder.append(&ID, &i.to_le_bytes()).unwrap();
        }

        assert_eq!(builder.len(), 5);
        assert_eq!(builder.bytes().len() as u64, 5 * builder.stride());
        for i in 0..5usize {
            assert_eq!(builder.offset_of(i), i as u64 * builder.stride());
            let record = builder.record(i).unwrap();
            assert_eq!(&record[..32], &ID);
            assert_eq!(&record[32..36], &(i as u32).to_le_bytes());
            assert!(record[36..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn oversized_record_is_rejected() {
        let mut builder = ShaderRecordBuilder::new(ShaderRecordLayout::new(32, 16, 16));
        assert!(builder.append(&ID, &[1; 16]).is_ok());

        let err = builder.append(&ID, &[1; 17]).unwrap_err();
        assert_eq!(err, RecordError::TooLarge { size: 49, stride: 48 });
        // nothing was written for the failed record
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.bytes().len(), 48);
    }

    #[test]
    fn identifier_must_match_layout() {
        let mut builder = ShaderRecordBuilder::new(ShaderRecordLayout::new(32, 0, 32));
        assert_eq!(
            builder.append(&ID[..16], &[]),
            Err(RecordError::IdentifierSize {
                expected: 32,
                actual: 16
            })
        );
        assert!(builder.is_empty());
    }
}

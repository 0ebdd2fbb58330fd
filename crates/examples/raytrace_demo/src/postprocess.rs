//! Full screen pass copying the traced image to the swapchain, with an optional TV effect.

use app::anyhow::Result;
use app::vulkan::ash::vk;
use app::vulkan::utils::create_gpu_only_buffer_from_data;
use app::vulkan::{
    Buffer, CommandBuffer, Context, GraphicsPipeline, GraphicsPipelineCreateInfo,
    GraphicsShaderCreateInfo, ImageView, PipelineLayout, Sampler, SlotTable, Vertex,
};
use memoffset::offset_of;
use resource_manager::Resources;
use scene::gpu::GpuTexture;

const OUTPUT_SLOT: u32 = 0;
const NOISE_SLOT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct QuadVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

impl Vertex for QuadVertex {
    fn bindings() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<QuadVertex>() as _,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    fn attributes() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(QuadVertex, position) as _,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(QuadVertex, uv) as _,
            },
        ]
    }
}

/// Two triangles covering the viewport. Texture v grows with clip space y.
const QUAD: [QuadVertex; 6] = [
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0, 0.0],
        uv: [1.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0, 0.0],
        uv: [0.0, 1.0],
    },
];

const CLEAR_COLOR: [f32; 4] = [0.0, 0.2, 0.4, 1.0];

#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct PostprocessConstants {
    enable_postprocess: u32,
    time: f32,
}

pub struct Postprocess {
    pipeline: GraphicsPipeline,
    layout: PipelineLayout,
    vertex_buffer: Buffer,
    slots: SlotTable,
    output_sampler: Sampler,
}

impl Postprocess {
    pub fn new(
        context: &Context,
        resources: &Resources,
        format: vk::Format,
        output: &ImageView,
        noise: &GpuTexture,
        noise_sampler: &Sampler,
    ) -> Result<Self> {
        let mut slots = context.create_slot_table(
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            2,
            vk::ShaderStageFlags::FRAGMENT,
        )?;
        let output_sampler = context.create_linear_sampler(vk::SamplerAddressMode::CLAMP_TO_EDGE)?;
        slots.allocate(Some(OUTPUT_SLOT))?;
        slots.write_image(OUTPUT_SLOT, output, &output_sampler, vk::ImageLayout::GENERAL)?;
        slots.create_texture_view(&noise.view, noise_sampler, Some(NOISE_SLOT))?;

        let push_constant_range = vk::PushConstantRange::builder()
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .size(std::mem::size_of::<PostprocessConstants>() as _)
            .build();
        let layout = context.create_pipeline_layout(&[slots.layout()], &[push_constant_range])?;

        let vertex_source = resources.load_spv("postprocess.vert.spv")?;
        let fragment_source = resources.load_spv("postprocess.frag.spv")?;
        let pipeline = context.create_graphics_pipeline::<QuadVertex>(
            &layout,
            GraphicsPipelineCreateInfo {
                shaders: &[
                    GraphicsShaderCreateInfo {
                        source: &vertex_source,
                        stage: vk::ShaderStageFlags::VERTEX,
                    },
                    GraphicsShaderCreateInfo {
                        source: &fragment_source,
                        stage: vk::ShaderStageFlags::FRAGMENT,
                    },
                ],
                primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,
                cull_mode: vk::CullModeFlags::NONE,
                color_attachment_format: format,
                color_attachment_blend: None,
            },
        )?;

        let vertex_buffer =
            create_gpu_only_buffer_from_data(context, vk::BufferUsageFlags::VERTEX_BUFFER, &QUAD)?;

        Ok(Self {
            pipeline,
            layout,
            vertex_buffer,
            slots,
            output_sampler,
        })
    }

    /// Rebinds the traced image after the swapchain was recreated.
    pub fn on_resize(&mut self, output: &ImageView) -> Result<()> {
        self.slots.write_image(
            OUTPUT_SLOT,
            output,
            &self.output_sampler,
            vk::ImageLayout::GENERAL,
        )?;
        Ok(())
    }

    pub fn record(
        &self,
        cmd: &CommandBuffer,
        target: &ImageView,
        extent: vk::Extent2D,
        enabled: bool,
        time: f32,
    ) {
        cmd.begin_rendering(target, extent, vk::AttachmentLoadOp::CLEAR, Some(CLEAR_COLOR));
        cmd.bind_graphics_pipeline(&self.pipeline);
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            &self.layout,
            0,
            &[self.slots.set()],
        );
        cmd.push_constants(
            &self.layout,
            vk::ShaderStageFlags::FRAGMENT,
            &PostprocessConstants {
                enable_postprocess: enabled.into(),
                time,
            },
        );
        cmd.bind_vertex_buffer(&self.vertex_buffer);
        cmd.set_viewport(extent);
        cmd.set_scissor(extent);
        cmd.draw(QUAD.len() as _);
        cmd.end_rendering();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_packed() {
        let attributes = QuadVertex::attributes();
        assert_eq!(QuadVertex::bindings()[0].stride, 20);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
    }

    #[test]
    fn quad_covers_clip_space() {
        for corner in [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]] {
            assert!(QUAD
                .iter()
                .any(|v| v.position[0] == corner[0] && v.position[1] == corner[1]));
        }
        for v in QUAD {
            assert_eq!(v.uv, [(v.position[0] + 1.0) / 2.0, (v.position[1] + 1.0) / 2.0]);
        }
    }
}

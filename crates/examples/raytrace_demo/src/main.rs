use std::time::Instant;

use app::anyhow::Result;
use app::vulkan::ash::vk;
use app::vulkan::gpu_allocator::MemoryLocation;
use app::vulkan::{Buffer, CommandBuffer, SlotTable};
use app::{App, AppConfig, BaseApp, VirtualKeyCode};
use clap::Parser;
use resource_manager::Resources;
use scene::gpu::{SceneAccelerationStructures, SceneBuffers, SceneTextures};
use scene::{
    load_textures, DemoScene, GeometryTable, TextureId, TEXTURE_SLOTS, TEXT_TEXTURE_HEIGHT,
    TEXT_TEXTURE_WIDTH,
};

mod args;
mod backend;
mod constants;
mod desc_sets;
mod gui_state;
mod postprocess;
mod text_texture;

use args::Args;
use backend::{create_backend, shader_stages, FrameResources, RayTracingBackend};
use constants::{FloorScroll, SceneConstants};
use desc_sets::FrameDescriptors;
use gui_state::Gui;
use postprocess::Postprocess;
use text_texture::TextPainter;

const APP_NAME: &str = "Ray traced floating statue";

/// Indices, vertices and hit payloads.
const BUFFER_SLOTS: u32 = 3;

fn main() -> Result<()> {
    let args = Args::parse();

    let mut resources = Resources::new();
    if let Some(dir) = args.assets_dir() {
        resources = resources.with_root(dir);
    }

    app::run::<RaytraceDemo>(AppConfig {
        name: APP_NAME.to_string(),
        width: args.width,
        height: args.height,
        tracing: args.tracing_request(),
        resources,
    })
}

struct RaytraceDemo {
    backend: Box<dyn RayTracingBackend>,
    postprocess: Postprocess,
    frame_descriptors: FrameDescriptors,
    buffer_slots: SlotTable,
    texture_slots: SlotTable,
    accel: SceneAccelerationStructures,
    textures: SceneTextures,
    buffers: SceneBuffers,
    table: GeometryTable,
    scene: DemoScene,

    painter: TextPainter,
    text_staging: Vec<Buffer>,
    throttle: app::orchestrator::RefitThrottle,
    floor_scroll: FloorScroll,
    postprocess_enabled: bool,
    clock: Instant,
}

impl App for RaytraceDemo {
    type Gui = Gui;

    fn new(base: &mut BaseApp<Self>) -> Result<Self> {
        let context = &base.context;
        let resources = &base.resources;
        let stages = shader_stages(base.tracing_path);

        let scene = DemoScene::load(resources)?;
        let table = scene.geometry_table()?;
        let buffers = SceneBuffers::new(context, &scene, &table)?;
        let accel = SceneAccelerationStructures::new(context, &buffers, &table)?;
        let textures = SceneTextures::new(context, &load_textures(resources)?)?;

        let mut buffer_slots =
            context.create_slot_table(vk::DescriptorType::STORAGE_BUFFER, BUFFER_SLOTS, stages)?;
        buffers.bind(&mut buffer_slots)?;
        let mut texture_slots = context.create_slot_table(
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            TEXTURE_SLOTS,
            stages,
        )?;
        textures.bind(&mut texture_slots)?;

        let frame_count = base.in_flight_frame_count() as u32;
        let frame_descriptors = FrameDescriptors::new(
            context,
            stages,
            frame_count,
            &accel.tlas,
            &base.output_image.view,
        )?;

        let backend = create_backend(
            context,
            base.tracing_path,
            resources,
            &[
                &frame_descriptors.layout,
                buffer_slots.layout(),
                texture_slots.layout(),
            ],
            &table,
            base.swapchain.extent,
        )?;

        let postprocess = Postprocess::new(
            context,
            resources,
            base.swapchain.format,
            &base.output_image.view,
            textures.get(TextureId::TvNoise)?,
            &textures.sampler,
        )?;

        let painter = TextPainter::new(resources, TEXT_TEXTURE_WIDTH, TEXT_TEXTURE_HEIGHT);
        let text_staging = (0..frame_count)
            .map(|_| {
                context.create_buffer(
                    vk::BufferUsageFlags::TRANSFER_SRC,
                    MemoryLocation::CpuToGpu,
                    (TEXT_TEXTURE_WIDTH * TEXT_TEXTURE_HEIGHT * 4) as _,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            backend,
            postprocess,
            frame_descriptors,
            buffer_slots,
            texture_slots,
            accel,
            textures,
            buffers,
            table,
            scene,
            painter,
            text_staging,
            throttle: Default::default(),
            floor_scroll: Default::default(),
            postprocess_enabled: false,
            clock: Instant::now(),
        })
    }

    fn api_label(&self) -> &'static str {
        self.backend.label()
    }

    fn update_animation(&mut self, _: &BaseApp<Self>) -> Result<bool> {
        if !self.throttle.should_refit(Instant::now()) {
            return Ok(false);
        }

        self.scene.advance_animations();
        for (id, transform) in self.scene.net_transforms().iter().enumerate().take(self.table.len()) {
            self.table.update_transform(id, transform)?;
        }

        Ok(true)
    }

    fn refit_spatial_structure(&mut self, base: &BaseApp<Self>) -> Result<()> {
        // the other in flight frame may still trace against the old structures
        base.wait_for_gpu()?;
        self.accel.refit(&base.context, &self.buffers, &self.table)
    }

    fn update(
        &mut self,
        base: &BaseApp<Self>,
        gui: &mut <Self as App>::Gui,
        frame_index: usize,
        frame_stats: &app::stats::FrameStats,
    ) -> Result<()> {
        self.floor_scroll.step();
        let constants =
            SceneConstants::new(&base.camera, &self.scene.net_transforms(), &self.floor_scroll);
        self.frame_descriptors.write_constants(frame_index, &constants)?;

        let stats = format!(
            "{}\n GPU: {}",
            frame_stats.rate.summary(self.api_label()),
            base.context.gpu_name()
        );
        let pixels = self.painter.paint(&stats);
        self.text_staging[frame_index].copy_data_to_buffer(pixels)?;

        gui.text_framed = self.painter.framed;
        gui.postprocess = self.postprocess_enabled;
        gui.spinning = self
            .scene
            .renderable(scene::SceneObject::Statue)
            .is_spinning();

        Ok(())
    }

    fn record_raytracing_commands(
        &self,
        base: &BaseApp<Self>,
        buffer: &CommandBuffer,
        frame_index: usize,
    ) -> Result<()> {
        self.textures
            .get(TextureId::Text)?
            .cmd_update(buffer, &self.text_staging[frame_index]);

        let frame = FrameResources {
            frame_set: self.frame_descriptors.set(frame_index),
            buffers: &self.buffer_slots,
            textures: &self.texture_slots,
        };
        self.backend.record(buffer, &frame, base.swapchain.extent);

        Ok(())
    }

    fn record_raster_commands(
        &self,
        base: &BaseApp<Self>,
        buffer: &CommandBuffer,
        image_index: usize,
    ) -> Result<()> {
        self.postprocess.record(
            buffer,
            &base.swapchain.views[image_index],
            base.swapchain.extent,
            self.postprocess_enabled,
            self.clock.elapsed().as_secs_f32(),
        );

        Ok(())
    }

    fn on_recreate_swapchain(&mut self, base: &BaseApp<Self>) -> Result<()> {
        let output = &base.output_image.view;
        self.frame_descriptors.write_output(output);
        self.postprocess.on_resize(output)?;
        self.backend.on_resize(base.swapchain.extent);

        Ok(())
    }

    fn on_key(&mut self, base: &BaseApp<Self>, key: VirtualKeyCode) -> Result<()> {
        match key {
            VirtualKeyCode::A => {
                let spinning = self.scene.toggle_spin();
                log::info!("Spin {}", if spinning { "on" } else { "off" });
            }
            VirtualKeyCode::W => {
                self.painter.toggle_frame();
            }
            VirtualKeyCode::P => {
                self.postprocess_enabled = !self.postprocess_enabled;
                log::info!("Post-process {}", self.postprocess_enabled);
            }
            VirtualKeyCode::M => {
                log::info!("M {}", gui_state::NO_AUDIO)
            }
            VirtualKeyCode::Key1 | VirtualKeyCode::Key2 | VirtualKeyCode::Key3 => {
                let flag = match key {
                    VirtualKeyCode::Key1 => "--pipeline",
                    _ => "--force-compute",
                };
                log::info!(
                    "Tracing with {:?}. Restart with {flag} to switch backends",
                    base.tracing_path
                );
            }
            _ => {}
        }

        Ok(())
    }
}

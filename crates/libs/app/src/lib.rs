pub use anyhow;
pub use nalgebra::{self as na};
pub use resource_manager;
pub use vulkan;
pub use winit::event::VirtualKeyCode;

pub mod camera;
pub mod orchestrator;
pub mod stats;
pub mod types;

use anyhow::{Context as _, Result};
use vulkan::ash::vk;
use camera::Camera;
use gpu_allocator::MemoryLocation;
use gui::{
    imgui::{Condition, DrawData, Ui},
    imgui_rs_vulkan_renderer::Renderer,
    GuiContext,
};
use orchestrator::{FramePhase, FrameState, Orchestrator};
use resource_manager::Resources;
use stats::FrameStats;

use std::sync::Arc;
use std::{
    marker::PhantomData,
    time::{Duration, Instant},
};
use vulkan::*;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

const IN_FLIGHT_FRAMES: u32 = 2;

/// Format of the image the tracer writes and the composite pass samples.
pub const OUTPUT_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// How rays are traced on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingPath {
    /// `VK_KHR_ray_tracing_pipeline` with shader record tables.
    Pipeline,
    /// A compute shader using `VK_KHR_ray_query`.
    RayQuery,
}

impl TracingPath {
    fn required_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Pipeline => &[
                "VK_KHR_swapchain",
                "VK_KHR_ray_tracing_pipeline",
                "VK_KHR_acceleration_structure",
                "VK_KHR_deferred_host_operations",
            ],
            Self::RayQuery => &[
                "VK_KHR_swapchain",
                "VK_KHR_ray_query",
                "VK_KHR_acceleration_structure",
                "VK_KHR_deferred_host_operations",
            ],
        }
    }

    fn required_features(self) -> DeviceFeatures {
        DeviceFeatures {
            ray_tracing_pipeline: self == Self::Pipeline,
            ray_query: self == Self::RayQuery,
            acceleration_structure: true,
            runtime_descriptor_array: true,
            descriptor_binding_partially_bound: true,
            non_uniform_indexing: true,
            buffer_device_address: true,
            dynamic_rendering: true,
            synchronization2: true,
        }
    }

    /// Stage writing the output image.
    pub fn shader_stage(self) -> vk::PipelineStageFlags2 {
        match self {
            Self::Pipeline => vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
            Self::RayQuery => vk::PipelineStageFlags2::COMPUTE_SHADER,
        }
    }
}

/// Which [`TracingPath`] to create the device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingRequest {
    /// The pipeline when the device has it, ray queries otherwise.
    #[default]
    Auto,
    Require(TracingPath),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub tracing: TracingRequest,
    pub resources: Resources,
}

pub struct BaseApp<B: App> {
    phantom: PhantomData<B>,
    name: String,
    pub tracing_path: TracingPath,
    pub swapchain: Swapchain,
    pub command_pool: CommandPool,
    pub output_image: ImageAndView,
    command_buffers: Vec<CommandBuffer>,
    in_flight_frames: InFlightFrames,
    pub camera: Camera,
    pub resources: Resources,
    stats_display_mode: StatsDisplayMode,
    pub context: Arc<Context>,
}

pub trait App: Sized {
    type Gui: Gui;

    fn new(base: &mut BaseApp<Self>) -> Result<Self>;

    /// Short name of the tracing backend, shown with the frame statistics.
    fn api_label(&self) -> &'static str;

    /// Steps animations. Returns true when the acceleration structures must be refit.
    fn update_animation(&mut self, base: &BaseApp<Self>) -> Result<bool>;

    fn refit_spatial_structure(&mut self, base: &BaseApp<Self>) -> Result<()>;

    /// Fills the per frame constants for in flight frame `frame_index`.
    fn update(
        &mut self,
        base: &BaseApp<Self>,
        gui: &mut Self::Gui,
        frame_index: usize,
        frame_stats: &FrameStats,
    ) -> Result<()>;

    /// Writes [`BaseApp::output_image`], which is in `GENERAL` layout.
    fn record_raytracing_commands(
        &self,
        base: &BaseApp<Self>,
        buffer: &CommandBuffer,
        frame_index: usize,
    ) -> Result<()>;

    /// Draws into the swapchain image, which is in color attachment layout.
    fn record_raster_commands(
        &self,
        base: &BaseApp<Self>,
        buffer: &CommandBuffer,
        image_index: usize,
    ) -> Result<()>;

    fn on_recreate_swapchain(&mut self, base: &BaseApp<Self>) -> Result<()>;

    fn on_key(&mut self, base: &BaseApp<Self>, key: VirtualKeyCode) -> Result<()> {
        // prevents reports of unused parameters without needing to use #[allow]
        let _ = base;
        let _ = key;

        Ok(())
    }
}

pub trait Gui: Sized {
    fn new() -> Result<Self>;

    fn build(&mut self, ui: &Ui);
}

impl Gui for () {
    fn new() -> Result<Self> {
        Ok(())
    }

    fn build(&mut self, _ui: &Ui) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatsDisplayMode {
    None,
    Basic,
    Full,
}

impl StatsDisplayMode {
    fn next(self) -> Self {
        match self {
            Self::None => Self::Basic,
            Self::Basic => Self::Full,
            Self::Full => Self::None,
        }
    }
}

/// Everything owned by one device. Dropping it releases the device, app first.
struct Session<A: App> {
    app: A,
    gui_context: GuiContext,
    base: BaseApp<A>,
}

impl<A: App> Session<A> {
    fn start(window: &Window, config: &AppConfig, orchestrator: &mut Orchestrator) -> Result<Self> {
        let mut base = BaseApp::new(window, config)?;
        if orchestrator.state() == FrameState::DeviceLost {
            orchestrator.device_restored()?;
        } else {
            orchestrator.device_created()?;
        }

        let app = A::new(&mut base).context("Failed to prepare the scene")?;
        orchestrator.scene_prepared()?;

        let gui_context = GuiContext::new(
            &base.context,
            &base.context.command_pool,
            base.swapchain.format,
            window,
            IN_FLIGHT_FRAMES as _,
        )?;
        orchestrator.begin_rendering()?;

        Ok(Self {
            app,
            gui_context,
            base,
        })
    }

    fn draw(
        &mut self,
        window: &Window,
        orchestrator: &mut Orchestrator,
        gui: &mut A::Gui,
        frame_stats: &mut FrameStats,
    ) -> Result<bool> {
        let Self {
            app,
            gui_context,
            base,
        } = self;

        base.in_flight_frames.next();
        base.in_flight_frames.fence().wait(None)?;

        if let Some(gpu_time) = base.in_flight_frames.gpu_frame_time()? {
            frame_stats.set_gpu_time(gpu_time);
        }
        let extent = base.swapchain.extent;
        if frame_stats.tick(extent.width, extent.height) {
            let title =
                frame_stats
                    .rate
                    .window_title(&base.name, app.api_label(), base.context.gpu_name());
            log::debug!("{title}");
            window.set_title(&title);
        }

        let next_image_result = base
            .swapchain
            .acquire_next_image(u64::MAX, base.in_flight_frames.image_available_semaphore());
        let image_index = match next_image_result {
            Ok(AcquiredImage { index, .. }) => index as usize,
            Err(err) if is_out_of_date(&err) => return Ok(true),
            Err(err) => return Err(err.context("Failed to acquire the next swapchain image")),
        };
        base.in_flight_frames.fence().reset()?;
        let frame_index = base.in_flight_frames.current_frame;

        orchestrator.enter_phase(FramePhase::UpdateAnimation)?;
        let needs_refit = app.update_animation(base)?;

        orchestrator.enter_phase(FramePhase::RefitSpatialStructure)?;
        if needs_refit {
            app.refit_spatial_structure(base)?;
        }

        orchestrator.enter_phase(FramePhase::PopulateConstants)?;
        gui_context
            .platform
            .prepare_frame(gui_context.imgui.io_mut(), window)?;
        let ui = gui_context.imgui.frame();

        gui.build(ui);
        base.build_perf_ui(ui, frame_stats, app.api_label(), window.scale_factor() as _);

        gui_context.platform.prepare_render(ui, window);
        let draw_data = gui_context.imgui.render();

        app.update(base, gui, frame_index, frame_stats)?;

        let command_buffer = &base.command_buffers[image_index];
        base.record_command_buffer(
            command_buffer,
            image_index,
            frame_index,
            app,
            orchestrator,
            &mut gui_context.renderer,
            draw_data,
        )?;

        base.context.graphics_queue.submit(
            command_buffer,
            &[SemaphoreSubmitInfo {
                semaphore: base.in_flight_frames.image_available_semaphore(),
                stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            }],
            &[SemaphoreSubmitInfo {
                semaphore: base.in_flight_frames.render_finished_semaphore(),
                stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
            }],
            base.in_flight_frames.fence(),
        )?;
        base.in_flight_frames.submitted();

        orchestrator.enter_phase(FramePhase::Present)?;
        let signal_semaphores = [base.in_flight_frames.render_finished_semaphore()];
        let present_result = base.swapchain.queue_present(
            image_index as _,
            &signal_semaphores,
            &base.context.present_queue,
        );
        match present_result {
            Ok(is_suboptimal) => Ok(is_suboptimal),
            Err(err) if is_out_of_date(&err) => Ok(true),
            Err(err) => Err(err.context("Failed to present the swapchain image")),
        }
    }
}

fn is_out_of_date(err: &anyhow::Error) -> bool {
    err.downcast_ref::<vk::Result>() == Some(&vk::Result::ERROR_OUT_OF_DATE_KHR)
}

/// Drops every device owned resource, then brings up a fresh device and scene.
fn recover_lost_device<A: App>(
    session: &mut Option<Session<A>>,
    window: &Window,
    config: &AppConfig,
    orchestrator: &mut Orchestrator,
) -> Result<()> {
    orchestrator.device_lost()?;
    if let Some(lost) = session.take() {
        // The adapter may not answer anymore, waiting is best effort
        if let Err(err) = lost.base.wait_for_gpu() {
            log::debug!("Lost device did not go idle: {err:#}");
        }
    }

    *session = Some(Session::start(window, config, orchestrator)?);
    log::info!("Device restored");

    Ok(())
}

pub fn run<A: App + 'static>(mut config: AppConfig) -> Result<()> {
    pretty_env_logger::init();
    let (window, event_loop) = create_window(&config.name, config.width, config.height)?;

    let mut orchestrator = Orchestrator::new();
    let first = Session::<A>::start(&window, &config, &mut orchestrator)?;
    // A restored device keeps the tracing path the app started with
    config.tracing = TracingRequest::Require(first.base.tracing_path);
    let mut session = Some(first);

    let mut ui = A::Gui::new()?;
    let mut is_swapchain_dirty = false;
    let mut last_frame = Instant::now();
    let mut frame_stats = FrameStats::default();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        let Some(current) = session.as_mut() else {
            *control_flow = ControlFlow::Exit;
            return;
        };
        current.gui_context.handle_event(&window, &event);

        match event {
            Event::NewEvents(_) => {
                let now = Instant::now();
                let frame_time = now - last_frame;
                current.gui_context.update_delta_time(frame_time);
                last_frame = now;

                frame_stats.set_frame_time(frame_time);
            }
            // On resize
            Event::WindowEvent {
                event: WindowEvent::Resized(..),
                ..
            } => {
                log::debug!("Window has been resized");
                is_swapchain_dirty = true;
            }
            // Draw
            Event::MainEventsCleared => {
                if is_swapchain_dirty {
                    let dim = window.inner_size();
                    if dim.width == 0 || dim.height == 0 {
                        return;
                    }
                    let resized = current
                        .base
                        .recreate_swapchain(dim.width, dim.height)
                        .and_then(|_| current.app.on_recreate_swapchain(&current.base));
                    if let Err(err) = resized {
                        log::error!("Failed to recreate the swapchain: {err:#}");
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                }

                match current.draw(&window, &mut orchestrator, &mut ui, &mut frame_stats) {
                    Ok(dirty) => is_swapchain_dirty = dirty,
                    Err(err) if is_device_lost(&err) => {
                        log::error!("Device lost: {err:#}");
                        match recover_lost_device(&mut session, &window, &config, &mut orchestrator) {
                            Ok(()) => is_swapchain_dirty = false,
                            Err(err) => {
                                log::error!("Failed to restore the device: {err:#}");
                                *control_flow = ControlFlow::Exit;
                            }
                        }
                    }
                    Err(err) => {
                        log::error!("Failed to draw frame: {err:#}");
                        *control_flow = ControlFlow::Exit;
                    }
                }
            }
            // Keyboard
            Event::WindowEvent {
                event:
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(key_code),
                                ..
                            },
                        ..
                    },
                ..
            } => {
                if key_code == VirtualKeyCode::R {
                    current.base.toggle_stats();
                } else if let Err(err) = current.app.on_key(&current.base, key_code) {
                    log::error!("Failed to handle {key_code:?}: {err:#}");
                }
            }
            // Exit app on request to close window
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => *control_flow = ControlFlow::Exit,
            // Wait for gpu to finish pending work before closing app
            Event::LoopDestroyed => {
                if let Err(err) = current.base.wait_for_gpu() {
                    log::error!("Failed to wait for gpu to finish work: {err:#}");
                }
                if let Err(err) = orchestrator.destroy() {
                    log::warn!("{err}");
                }
                session = None;
            }
            _ => (),
        }
    });
}

fn create_window(app_name: &str, width: u32, height: u32) -> Result<(Window, EventLoop<()>)> {
    log::debug!("Creating window and event loop");
    let events_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title(app_name)
        .with_inner_size(PhysicalSize::new(width, height))
        .with_resizable(true)
        .build(&events_loop)?;

    Ok((window, events_loop))
}

fn create_context(
    window: &Window,
    app_name: &str,
    path: TracingPath,
) -> Result<Context> {
    ContextBuilder::new(window)
        .vulkan_version(VERSION_1_3)
        .app_name(app_name)
        .required_extensions(path.required_extensions())
        .required_device_features(path.required_features())
        .with_raytracing_context(true)
        .build()
}

impl<B: App> BaseApp<B> {
    fn new(window: &Window, config: &AppConfig) -> Result<Self> {
        log::info!("Create application: {}", config.name);

        let (context, tracing_path) = match config.tracing {
            TracingRequest::Require(path) => (create_context(window, &config.name, path)?, path),
            TracingRequest::Auto => match create_context(window, &config.name, TracingPath::Pipeline) {
                Ok(context) => (context, TracingPath::Pipeline),
                Err(err) => {
                    log::warn!("No ray tracing pipeline support ({err:#}), using ray queries");
                    (
                        create_context(window, &config.name, TracingPath::RayQuery)?,
                        TracingPath::RayQuery,
                    )
                }
            },
        };
        log::info!("Tracing with {tracing_path:?} on {}", context.gpu_name());
        let context = Arc::new(context);

        let command_pool = context.create_command_pool(
            context.graphics_queue_family,
            Some(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
        )?;

        let size = window.inner_size();
        let swapchain = Swapchain::new(&context, size.width, size.height)?;
        let output_image = create_output_image(&context, swapchain.extent)?;
        let command_buffers = create_command_buffers(&command_pool, &swapchain)?;
        let in_flight_frames = InFlightFrames::new(&context, IN_FLIGHT_FRAMES)?;

        let mut camera = Camera::fixed(1.0);
        camera.set_extent(swapchain.extent.width, swapchain.extent.height);

        Ok(Self {
            phantom: PhantomData,
            name: config.name.clone(),
            tracing_path,
            swapchain,
            command_pool,
            output_image,
            command_buffers,
            in_flight_frames,
            camera,
            resources: config.resources.clone(),
            stats_display_mode: StatsDisplayMode::Basic,
            context,
        })
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        log::debug!("Recreating the swapchain");

        self.wait_for_gpu()?;

        self.swapchain.resize(&self.context, width, height)?;
        self.output_image = create_output_image(&self.context, self.swapchain.extent)?;
        if self.command_buffers.len() != self.swapchain.images.len() {
            self.command_buffers = create_command_buffers(&self.command_pool, &self.swapchain)?;
        }

        self.camera
            .set_extent(self.swapchain.extent.width, self.swapchain.extent.height);

        Ok(())
    }

    pub fn wait_for_gpu(&self) -> Result<()> {
        self.context.device_wait_idle()
    }

    pub fn in_flight_frame_count(&self) -> usize {
        IN_FLIGHT_FRAMES as _
    }

    fn build_perf_ui(&self, ui: &Ui, frame_stats: &FrameStats, api_label: &str, scale: f32) {
        let width = self.swapchain.extent.width as f32 / scale;
        let height = self.swapchain.extent.height as f32 / scale;

        if matches!(
            self.stats_display_mode,
            StatsDisplayMode::Basic | StatsDisplayMode::Full
        ) {
            gui::text_panel(
                ui,
                "Frame stats",
                [5.0, 5.0],
                &[
                    frame_stats.rate.summary(api_label),
                    format!("GPU: {}", self.context.gpu_name()),
                    format!(
                        "frame {:.2?}  cpu {:.2?}  gpu {:.2?}",
                        frame_stats.frame_time, frame_stats.cpu_time, frame_stats.gpu_time
                    ),
                ],
            );
        }

        if matches!(self.stats_display_mode, StatsDisplayMode::Full) {
            let graph_size = [width - 80.0, 40.0];
            const SCALE_MIN: f32 = 0.0;
            const SCALE_MAX: f32 = 17.0;

            ui.window("Frametime graphs")
                .focus_on_appearing(false)
                .no_decoration()
                .bg_alpha(0.5)
                .position([5.0, height * 0.7], Condition::Always)
                .size([width - 10.0, 140.0], Condition::Always)
                .build(|| {
                    ui.plot_lines("Frame", frame_stats.frame_time_ms_log.values())
                        .scale_min(SCALE_MIN)
                        .scale_max(SCALE_MAX)
                        .graph_size(graph_size)
                        .build();
                    ui.plot_lines("CPU", frame_stats.cpu_time_ms_log.values())
                        .scale_min(SCALE_MIN)
                        .scale_max(SCALE_MAX)
                        .graph_size(graph_size)
                        .build();
                    ui.plot_lines("GPU", frame_stats.gpu_time_ms_log.values())
                        .scale_min(SCALE_MIN)
                        .scale_max(SCALE_MAX)
                        .graph_size(graph_size)
                        .build();
                });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_command_buffer(
        &self,
        buffer: &CommandBuffer,
        image_index: usize,
        frame_index: usize,
        app: &B,
        orchestrator: &mut Orchestrator,
        gui_renderer: &mut Renderer,
        draw_data: &DrawData,
    ) -> Result<()> {
        let swapchain_image = &self.swapchain.images[image_index];
        let swapchain_image_view = &self.swapchain.views[image_index];
        let output_image = &self.output_image.image;
        let trace_stage = self.tracing_path.shader_stage();

        buffer.reset()?;

        buffer.begin(None)?;

        buffer.reset_all_timestamp_queries_from_pool(self.in_flight_frames.timing_query_pool());

        buffer.write_timestamp(
            vk::PipelineStageFlags2::NONE,
            self.in_flight_frames.timing_query_pool(),
            0,
        );

        orchestrator.enter_phase(FramePhase::Dispatch)?;
        // Previous frame may still be sampling the output
        buffer.pipeline_image_barriers(&[ImageBarrier {
            image: output_image,
            old_layout: vk::ImageLayout::GENERAL,
            new_layout: vk::ImageLayout::GENERAL,
            src_access_mask: vk::AccessFlags2::SHADER_SAMPLED_READ,
            dst_access_mask: vk::AccessFlags2::SHADER_STORAGE_WRITE,
            src_stage_mask: vk::PipelineStageFlags2::FRAGMENT_SHADER,
            dst_stage_mask: trace_stage,
        }]);

        app.record_raytracing_commands(self, buffer, frame_index)?;

        orchestrator.enter_phase(FramePhase::Composite)?;
        buffer.pipeline_image_barriers(&[
            ImageBarrier {
                image: output_image,
                old_layout: vk::ImageLayout::GENERAL,
                new_layout: vk::ImageLayout::GENERAL,
                src_access_mask: vk::AccessFlags2::SHADER_STORAGE_WRITE,
                dst_access_mask: vk::AccessFlags2::SHADER_SAMPLED_READ,
                src_stage_mask: trace_stage,
                dst_stage_mask: vk::PipelineStageFlags2::FRAGMENT_SHADER,
            },
            ImageBarrier {
                image: swapchain_image,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                src_access_mask: vk::AccessFlags2::NONE,
                dst_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                src_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                dst_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            },
        ]);

        app.record_raster_commands(self, buffer, image_index)?;

        // UI
        buffer.begin_rendering(
            swapchain_image_view,
            self.swapchain.extent,
            vk::AttachmentLoadOp::LOAD,
            None,
        );
        gui::cmd_draw(gui_renderer, buffer, draw_data)?;
        buffer.end_rendering();

        buffer.pipeline_image_barriers(&[ImageBarrier {
            image: swapchain_image,
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            src_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            dst_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_READ,
            src_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        }]);

        buffer.write_timestamp(
            vk::PipelineStageFlags2::ALL_COMMANDS,
            self.in_flight_frames.timing_query_pool(),
            1,
        );

        buffer.end()?;

        Ok(())
    }

    fn toggle_stats(&mut self) {
        self.stats_display_mode = self.stats_display_mode.next();
    }
}

/// Storage image written by the tracer, sampled by the composite pass. Lives in `GENERAL`.
fn create_output_image(context: &Arc<Context>, extent: vk::Extent2D) -> Result<ImageAndView> {
    let image = context.create_image(
        vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
        MemoryLocation::GpuOnly,
        OUTPUT_FORMAT,
        extent.width,
        extent.height,
    )?;

    let view = image.create_image_view()?;

    context.execute_one_time_commands(|cmd_buffer| {
        cmd_buffer.pipeline_image_barriers(&[ImageBarrier {
            image: &image,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::GENERAL,
            src_access_mask: vk::AccessFlags2::NONE,
            dst_access_mask: vk::AccessFlags2::NONE,
            src_stage_mask: vk::PipelineStageFlags2::NONE,
            dst_stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
        }]);
    })?;

    Ok(ImageAndView { image, view })
}

fn create_command_buffers(pool: &CommandPool, swapchain: &Swapchain) -> Result<Vec<CommandBuffer>> {
    pool.allocate_command_buffers(vk::CommandBufferLevel::PRIMARY, swapchain.images.len() as _)
}

pub struct ImageAndView {
    pub view: ImageView,
    pub image: Image,
}

struct InFlightFrames {
    per_frames: Vec<PerFrame>,
    current_frame: usize,
    submitted: u64,
}

struct PerFrame {
    image_available_semaphore: Semaphore,
    render_finished_semaphore: Semaphore,
    fence: Fence,
    timing_query_pool: TimestampQueryPool<2>,
}

impl InFlightFrames {
    fn new(context: &Context, frame_count: u32) -> Result<Self> {
        let sync_objects = (0..frame_count)
            .map(|_i| {
                let image_available_semaphore = context.create_semaphore()?;
                let render_finished_semaphore = context.create_semaphore()?;
                let fence = context.create_fence(Some(vk::FenceCreateFlags::SIGNALED))?;

                let timing_query_pool = context.create_timestamp_query_pool()?;

                Ok(PerFrame {
                    image_available_semaphore,
                    render_finished_semaphore,
                    fence,
                    timing_query_pool,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            per_frames: sync_objects,
            current_frame: 0,
            submitted: 0,
        })
    }

    fn next(&mut self) {
        self.current_frame = (self.current_frame + 1) % self.per_frames.len();
    }

    fn submitted(&mut self) {
        self.submitted += 1;
    }

    fn image_available_semaphore(&self) -> &Semaphore {
        &self.per_frames[self.current_frame].image_available_semaphore
    }

    fn render_finished_semaphore(&self) -> &Semaphore {
        &self.per_frames[self.current_frame].render_finished_semaphore
    }

    fn fence(&self) -> &Fence {
        &self.per_frames[self.current_frame].fence
    }

    fn timing_query_pool(&self) -> &TimestampQueryPool<2> {
        &self.per_frames[self.current_frame].timing_query_pool
    }

    /// `None` until every frame slot was submitted once and its queries written.
    fn gpu_frame_time(&self) -> Result<Option<Duration>> {
        if self.submitted < self.per_frames.len() as u64 {
            return Ok(None);
        }
        self.timing_query_pool().elapsed()
    }
}

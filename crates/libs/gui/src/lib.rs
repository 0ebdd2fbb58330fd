pub extern crate imgui;
pub extern crate imgui_rs_vulkan_renderer;
pub extern crate imgui_winit_support;

use std::time::Duration;

use anyhow::Result;
use imgui::{Condition, Context, DrawData, FontConfig, FontSource, Ui};
use imgui_rs_vulkan_renderer::{DynamicRendering, Options, Renderer};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use vulkan::{ash::vk, CommandBuffer, CommandPool, Context as VkContext};
use winit::{event::Event, window::Window};

pub struct GuiContext {
    pub imgui: Context,
    pub platform: WinitPlatform,
    pub renderer: Renderer,
}

impl GuiContext {
    pub fn new(
        context: &VkContext,
        command_pool: &CommandPool,
        format: vk::Format,
        window: &Window,
        in_flight_frames: usize,
    ) -> Result<Self> {
        let mut imgui = Context::create();
        imgui.set_ini_filename(None);

        let mut platform = WinitPlatform::init(&mut imgui);

        let hidpi_factor = platform.hidpi_factor();
        let font_size = (13.0 * hidpi_factor) as f32;
        imgui.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                size_pixels: font_size,
                ..FontConfig::default()
            }),
        }]);
        imgui.io_mut().font_global_scale = (1.0 / hidpi_factor) as f32;
        platform.attach_window(imgui.io_mut(), window, HiDpiMode::Rounded);

        let renderer = Renderer::with_gpu_allocator(
            context.allocator.clone(),
            context.device.inner.clone(),
            context.graphics_queue.inner,
            command_pool.inner,
            DynamicRendering {
                color_attachment_format: format,
                depth_attachment_format: None,
            },
            &mut imgui,
            Some(Options {
                in_flight_frames,
                ..Default::default()
            }),
        )?;
        log::debug!("imgui renderer ready for {format:?}");

        Ok(Self {
            imgui,
            platform,
            renderer,
        })
    }

    pub fn handle_event<T>(&mut self, window: &Window, event: &Event<T>) {
        self.platform
            .handle_event(self.imgui.io_mut(), window, event);
    }

    pub fn update_delta_time(&mut self, delta: Duration) {
        self.imgui.io_mut().update_delta_time(delta);
    }
}

/// Records the overlay. Takes the renderer alone so the frame's draw data can stay
/// borrowed from the imgui context.
pub fn cmd_draw(renderer: &mut Renderer, buffer: &CommandBuffer, draw_data: &DrawData) -> Result<()> {
    let [w, h] = draw_data.display_size;
    if w > f32::EPSILON && h > f32::EPSILON {
        renderer.cmd_draw(buffer.inner, draw_data)?;
    }

    Ok(())
}

/// Undecorated translucent overlay with one line of text per entry.
pub fn text_panel(ui: &Ui, name: &str, position: [f32; 2], lines: &[String]) {
    ui.window(name)
        .focus_on_appearing(false)
        .no_decoration()
        .always_auto_resize(true)
        .bg_alpha(0.5)
        .position(position, Condition::Always)
        .build(|| {
            for line in lines {
                ui.text(line);
            }
        });
}

/// Two column key binding reference.
pub fn key_help_panel(ui: &Ui, position: [f32; 2], bindings: &[(&str, &str)]) {
    ui.window("Keys")
        .focus_on_appearing(false)
        .no_decoration()
        .always_auto_resize(true)
        .bg_alpha(0.4)
        .position(position, Condition::Always)
        .build(|| {
            for (key, action) in bindings {
                ui.text(key);
                ui.same_line_with_pos(24.0);
                ui.text(action);
            }
        });
}

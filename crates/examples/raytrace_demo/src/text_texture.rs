//! The text panel texture, painted on the CPU every frame.

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use resource_manager::{ResourceKind, Resources};

pub const FONT_FILE: &str = "NotoSansJP-Regular.otf";

const TOP_TEXT: &str = "D X R プ ラ ス";
const BOTTOM_TEXT: &str = "レ イ ト レ ー シ ン グ の 基 本";

// (1.0, 0.51, 0.61) and (0.44, 0.99, 0.73)
const BACKGROUND: Rgba = Rgba([255, 130, 156, 255]);
const BRUSH: Rgba = Rgba([112, 252, 186, 255]);

const TOP_TEXT_SIZE: f32 = 24.0;
const BOTTOM_TEXT_SIZE: f32 = 16.0;
const STATS_TEXT_SIZE: f32 = 10.0;

const FRAME_MARGIN: i32 = 4;
const FRAME_STROKE: i32 = 2;
const RULE_WIDTH: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub fn from_f32(c: [f32; 4]) -> Self {
        Self(c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
    }
}

/// RGBA8 pixels, row major, top row first.
#[derive(Debug, Clone)]
pub struct TextCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[i..i + 4]);
        Some(Rgba(rgba))
    }

    pub fn clear(&mut self, color: Rgba) {
        self.pixels
            .chunks_exact_mut(4)
            .for_each(|p| p.copy_from_slice(&color.0));
    }

    /// Fills `[x0, x1) x [y0, y1)`, clipped to the canvas.
    pub fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba) {
        let clamp_x = |x: i32| x.clamp(0, self.width as i32) as u32;
        let clamp_y = |y: i32| y.clamp(0, self.height as i32) as u32;
        let (x0, x1, y0, y1) = (clamp_x(x0), clamp_x(x1), clamp_y(y0), clamp_y(y1));

        for y in y0..y1 {
            let row = (y * self.width) as usize;
            for x in x0..x1 {
                let i = (row + x as usize) * 4;
                self.pixels[i..i + 4].copy_from_slice(&color.0);
            }
        }
    }

    /// Horizontal line of `width` pixels centered on `y`.
    pub fn horizontal_line(&mut self, x0: i32, x1: i32, y: i32, width: i32, color: Rgba) {
        let top = y - width / 2;
        self.fill_rect(x0, top, x1, top + width, color);
    }

    /// Outline of `[x0, x1) x [y0, y1)` drawn inside the rectangle.
    pub fn stroke_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, stroke: i32, color: Rgba) {
        self.fill_rect(x0, y0, x1, y0 + stroke, color);
        self.fill_rect(x0, y1 - stroke, x1, y1, color);
        self.fill_rect(x0, y0, x0 + stroke, y1, color);
        self.fill_rect(x1 - stroke, y0, x1, y1, color);
    }

    /// Blends `color` over a pixel with `coverage` as alpha.
    fn blend(&mut self, x: i32, y: i32, color: Rgba, coverage: u8) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 || coverage == 0 {
            return;
        }
        let i = ((y as u32 * self.width + x as u32) * 4) as usize;
        let alpha = coverage as u32;
        for (dst, src) in self.pixels[i..i + 3].iter_mut().zip(color.0) {
            *dst = ((src as u32 * alpha + *dst as u32 * (255 - alpha) + 127) / 255) as u8;
        }
    }

    /// Lays `text` out from its top left corner at (`x`, `y`), wrapping at the right edge.
    pub fn draw_text(&mut self, font: &Font, text: &str, x: f32, y: f32, size: f32, color: Rgba) {
        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x,
            y,
            max_width: Some(self.width as f32 - x),
            ..LayoutSettings::default()
        });
        layout.append(&[font], &TextStyle::new(text, size, 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (metrics, coverage) = font.rasterize_config(glyph.key);
            let (left, top) = (glyph.x as i32, glyph.y as i32);

            for (row, line) in coverage.chunks_exact(metrics.width).enumerate() {
                for (column, &alpha) in line.iter().enumerate() {
                    self.blend(left + column as i32, top + row as i32, color, alpha);
                }
            }
        }
    }
}

/// Owns the canvas and the font used to fill it.
pub struct TextPainter {
    canvas: TextCanvas,
    font: Option<Font>,
    pub framed: bool,
}

impl TextPainter {
    pub fn new(resources: &Resources, width: u32, height: u32) -> Self {
        Self {
            canvas: TextCanvas::new(width, height),
            font: load_font(resources),
            framed: false,
        }
    }

    pub fn with_font(font: Option<Font>, width: u32, height: u32) -> Self {
        Self {
            canvas: TextCanvas::new(width, height),
            font,
            framed: false,
        }
    }

    pub fn toggle_frame(&mut self) -> bool {
        self.framed = !self.framed;
        self.framed
    }

    pub fn canvas(&self) -> &TextCanvas {
        &self.canvas
    }

    pub fn paint(&mut self, stats: &str) -> &[u8] {
        let canvas = &mut self.canvas;
        canvas.clear(BACKGROUND);

        if let Some(font) = &self.font {
            canvas.draw_text(font, TOP_TEXT, 13.0, 37.0, TOP_TEXT_SIZE, BRUSH);
        }
        canvas.horizontal_line(0, 237, 74, RULE_WIDTH, BRUSH);
        if let Some(font) = &self.font {
            canvas.draw_text(font, BOTTOM_TEXT, 13.0, 80.0, BOTTOM_TEXT_SIZE, BRUSH);
            canvas.draw_text(font, stats, 5.0, 100.0, STATS_TEXT_SIZE, BRUSH);
        }

        if self.framed {
            let (w, h) = (canvas.width as i32, canvas.height as i32);
            canvas.stroke_rect(
                FRAME_MARGIN - FRAME_STROKE / 2,
                FRAME_MARGIN - FRAME_STROKE / 2,
                w - FRAME_MARGIN + FRAME_STROKE / 2,
                h - FRAME_MARGIN + FRAME_STROKE / 2,
                FRAME_STROKE,
                BRUSH,
            );
        }

        canvas.pixels()
    }
}

fn load_font(resources: &Resources) -> Option<Font> {
    let bytes = match resources.read(ResourceKind::Font, FONT_FILE) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("{err}. The text panel will have no text");
            return None;
        }
    };

    match Font::from_bytes(bytes, FontSettings::default()) {
        Ok(font) => {
            log::info!("Loaded {FONT_FILE}");
            Some(font)
        }
        Err(err) => {
            log::warn!("Failed to parse {FONT_FILE}: {err}. The text panel will have no text");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: u32 = 256;
    const H: u32 = 128;

    #[test]
    fn colors_round_to_bytes() {
        assert_eq!(BACKGROUND, Rgba::from_f32([1.0, 0.51, 0.61, 1.0]));
        assert_eq!(BRUSH, Rgba::from_f32([0.44, 0.99, 0.73, 1.0]));
    }

    #[test]
    fn paints_background_and_rule_without_a_font() {
        let mut painter = TextPainter::with_font(None, W, H);
        let pixels = painter.paint("(DXR) FPS: 60.00").len();
        assert_eq!(pixels, (W * H * 4) as usize);

        let canvas = painter.canvas();
        assert_eq!(canvas.pixel(0, 0), Some(BACKGROUND));
        // 10 px rule centered on row 74, up to x = 237
        assert_eq!(canvas.pixel(0, 69), Some(BRUSH));
        assert_eq!(canvas.pixel(236, 78), Some(BRUSH));
        assert_eq!(canvas.pixel(237, 74), Some(BACKGROUND));
        assert_eq!(canvas.pixel(100, 68), Some(BACKGROUND));
        assert_eq!(canvas.pixel(100, 79), Some(BACKGROUND));
    }

    #[test]
    fn frame_toggles() {
        let mut painter = TextPainter::with_font(None, W, H);
        painter.paint("");
        assert_eq!(painter.canvas().pixel(4, 20), Some(BACKGROUND));

        assert!(painter.toggle_frame());
        painter.paint("");
        let canvas = painter.canvas();
        assert_eq!(canvas.pixel(4, 20), Some(BRUSH));
        assert_eq!(canvas.pixel(W - 4, 20), Some(BRUSH));
        assert_eq!(canvas.pixel(20, H - 5), Some(BRUSH));
        assert_eq!(canvas.pixel(1, 20), Some(BACKGROUND));
        assert_eq!(canvas.pixel(20, 20), Some(BACKGROUND));

        assert!(!painter.toggle_frame());
    }

    #[test]
    fn fill_is_clipped_to_the_canvas() {
        let mut canvas = TextCanvas::new(4, 4);
        canvas.fill_rect(-10, -10, 2, 100, BRUSH);

        assert_eq!(canvas.pixel(1, 3), Some(BRUSH));
        assert_eq!(canvas.pixel(2, 0), Some(Rgba([0; 4])));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn blending_mixes_by_coverage() {
        let mut canvas = TextCanvas::new(1, 1);
        canvas.clear(Rgba([0, 0, 0, 255]));
        canvas.blend(0, 0, Rgba([255, 255, 255, 255]), 128);

        assert_eq!(canvas.pixel(0, 0), Some(Rgba([128, 128, 128, 255])));
    }

    #[test]
    fn missing_font_is_not_an_error() {
        let resources = Resources::new().with_root("/nonexistent/raytrace-demo");
        let mut painter = TextPainter::new(&resources, W, H);
        assert_eq!(painter.paint("(FL)").len(), (W * H * 4) as usize);
    }
}

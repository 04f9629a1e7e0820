//! Canvas-like API wrapper over a pdf-writer content stream
//!
//! Coordinates are PDF points with the origin at the bottom-left of the page.
//! Text arrives already encoded for its font (see `FontRegistry::encode`).

use pdf_writer::{Content, Name, Str};

use crate::font_registry::FontId;
use crate::types::{Color, Rect};

/// Graphics state as last emitted; setters skip operators that would not
/// change it
#[derive(Clone)]
pub struct CanvasState {
    pub fill_color: Color,
    pub stroke_color: Color,
    pub line_width: f64,
    pub font: FontId,
    pub font_size: f64,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            fill_color: Color::black(),
            stroke_color: Color::black(),
            line_width: 1.0,
            font: FontId::Regular,
            font_size: 12.0,
        }
    }
}

/// One page's drawing surface
pub struct PdfCanvas {
    content: Content,
    state: CanvasState,
    state_stack: Vec<CanvasState>,
}

impl PdfCanvas {
    pub fn new() -> Self {
        Self {
            content: Content::new(),
            state: CanvasState::default(),
            state_stack: Vec::new(),
        }
    }

    /// Raw content stream bytes
    pub fn finish(self) -> Vec<u8> {
        self.content.finish()
    }

    // ===== State Management =====

    pub fn save_state(&mut self) {
        self.state_stack.push(self.state.clone());
        self.content.save_state();
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.state = state;
            self.content.restore_state();
        }
    }

    // ===== Colors =====

    pub fn set_fill_color(&mut self, color: Color) {
        if self.state.fill_color == color {
            return;
        }
        self.state.fill_color = color;
        self.content
            .set_fill_rgb(color.r as f32, color.g as f32, color.b as f32);
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.state.stroke_color == color {
            return;
        }
        self.state.stroke_color = color;
        self.content
            .set_stroke_rgb(color.r as f32, color.g as f32, color.b as f32);
    }

    // ===== Drawing =====

    pub fn set_line_width(&mut self, width: f64) {
        if self.state.line_width == width {
            return;
        }
        self.state.line_width = width;
        self.content.set_line_width(width as f32);
    }

    pub fn rect(&mut self, rect: Rect, fill: bool, stroke: bool) {
        self.content.rect(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        );
        self.paint(fill, stroke);
    }

    pub fn round_rect(&mut self, rect: Rect, radius: f64, fill: bool, stroke: bool) {
        let r = radius.min(rect.width.min(rect.height) / 2.0).max(0.0);
        if r <= 0.0 {
            self.rect(rect, fill, stroke);
            return;
        }

        let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
        // Bezier control offset for a quarter circle
        let c = r * 0.55228475;

        let content = &mut self.content;
        content.move_to((x + r) as f32, (y + h) as f32);
        content.line_to((x + w - r) as f32, (y + h) as f32);
        content.cubic_to(
            (x + w - r + c) as f32,
            (y + h) as f32,
            (x + w) as f32,
            (y + h - r + c) as f32,
            (x + w) as f32,
            (y + h - r) as f32,
        );
        content.line_to((x + w) as f32, (y + r) as f32);
        content.cubic_to(
            (x + w) as f32,
            (y + r - c) as f32,
            (x + w - r + c) as f32,
            y as f32,
            (x + w - r) as f32,
            y as f32,
        );
        content.line_to((x + r) as f32, y as f32);
        content.cubic_to(
            (x + r - c) as f32,
            y as f32,
            x as f32,
            (y + r - c) as f32,
            x as f32,
            (y + r) as f32,
        );
        content.line_to(x as f32, (y + h - r) as f32);
        content.cubic_to(
            x as f32,
            (y + h - r + c) as f32,
            (x + r - c) as f32,
            (y + h) as f32,
            (x + r) as f32,
            (y + h) as f32,
        );
        content.close_path();
        self.paint(fill, stroke);
    }

    fn paint(&mut self, fill: bool, stroke: bool) {
        match (fill, stroke) {
            (true, true) => {
                self.content.fill_nonzero_and_stroke();
            }
            (true, false) => {
                self.content.fill_nonzero();
            }
            (false, true) => {
                self.content.stroke();
            }
            (false, false) => {
                self.content.end_path();
            }
        }
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.content.move_to(x1 as f32, y1 as f32);
        self.content.line_to(x2 as f32, y2 as f32);
        self.content.stroke();
    }

    // ===== Text =====

    pub fn set_font(&mut self, font: FontId, size: f64) {
        self.state.font = font;
        self.state.font_size = size;
    }

    /// Show pre-encoded text with its baseline starting at (x, y)
    pub fn draw_encoded(&mut self, x: f64, y: f64, encoded: &[u8]) {
        self.content.begin_text();
        self.content
            .set_font(self.state.font.resource_name(), self.state.font_size as f32);
        self.content.next_line(x as f32, y as f32);
        self.content.show(Str(encoded));
        self.content.end_text();
    }

    // ===== Images =====

    /// Paint an image XObject scaled to `width` x `height` with its
    /// bottom-left corner at (x, y)
    pub fn draw_image(&mut self, image_name: Name<'_>, x: f64, y: f64, width: f64, height: f64) {
        self.content.save_state();
        self.content
            .transform([width as f32, 0.0, 0.0, height as f32, x as f32, y as f32]);
        self.content.x_object(image_name);
        self.content.restore_state();
    }
}

impl Default for PdfCanvas {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn draws_text_with_font_resource() {
        let mut canvas = PdfCanvas::new();
        canvas.set_font(FontId::Bold, 14.0);
        canvas.draw_encoded(50.0, 700.0, b"PATIENT DETAILS:");
        let out = text(canvas.finish());
        assert!(out.contains("/F2 14 Tf"));
        assert!(out.contains("(PATIENT DETAILS:) Tj"));
    }

    #[test]
    fn saved_state_is_restored() {
        let mut canvas = PdfCanvas::new();
        canvas.save_state();
        canvas.set_fill_color(Color::brand());
        canvas.set_line_width(2.0);
        canvas.restore_state();
        // Back to the defaults, so these emit nothing
        canvas.set_fill_color(Color::black());
        canvas.set_line_width(1.0);
        let out = text(canvas.finish());
        assert!(out.starts_with("q"));
        assert!(out.trim_end().ends_with("Q"));
        assert_eq!(out.matches(" rg").count(), 1);
        assert_eq!(out.matches(" w").count(), 1);
    }

    #[test]
    fn redundant_colors_are_skipped() {
        let mut canvas = PdfCanvas::new();
        canvas.set_stroke_color(Color::black());
        canvas.set_stroke_color(Color::brand());
        canvas.set_stroke_color(Color::brand());
        canvas.set_fill_color(Color::brand());
        let out = text(canvas.finish());
        assert_eq!(out.matches(" RG").count(), 1);
        assert_eq!(out.matches(" rg").count(), 1);
    }

    #[test]
    fn images_are_placed_with_a_transform() {
        let mut canvas = PdfCanvas::new();
        canvas.draw_image(Name(b"Im1"), 50.0, 600.0, 120.0, 40.0);
        let out = text(canvas.finish());
        assert!(out.contains("120 0 0 40 50 600 cm"));
        assert!(out.contains("/Im1 Do"));
    }

    #[test]
    fn rounded_rect_falls_back_to_plain_rect() {
        let mut canvas = PdfCanvas::new();
        canvas.round_rect(Rect::new(0.0, 0.0, 10.0, 10.0), 0.0, false, true);
        let out = text(canvas.finish());
        assert!(out.contains("re"));
        assert!(out.contains("S"));
    }
}

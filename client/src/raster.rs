//! Software rasteriser for [`Frame`]s
//!
//! Used where no window exists: tests and benchmarks compare the pixels a
//! frame produces. Text is left to the window backend and does not touch the
//! buffer.

use crate::rendering::{DrawCommand, Frame, Rgba};

pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::new(0, 0, 0, 0); width as usize * height as usize],
        }
    }

    pub fn from_frame(frame: &Frame) -> Self {
        let mut buffer = Self::new(frame.width, frame.height);
        buffer.draw(frame);
        buffer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub fn draw(&mut self, frame: &Frame) {
        for command in &frame.commands {
            match command {
                DrawCommand::Clear(color) => self.pixels.fill(*color),
                DrawCommand::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    thickness,
                    color,
                } => self.line(*x1, *y1, *x2, *y2, *thickness, *color),
                DrawCommand::FillRect { x, y, w, h, color } => self.fill_rect(*x, *y, *w, *h, *color),
                DrawCommand::StrokeRect {
                    x,
                    y,
                    w,
                    h,
                    thickness,
                    color,
                } => {
                    let t = thickness.min(*w / 2.0).min(*h / 2.0);
                    self.fill_rect(*x, *y, *w, t, *color);
                    self.fill_rect(*x, *y + *h - t, *w, t, *color);
                    self.fill_rect(*x, *y + t, t, *h - 2.0 * t, *color);
                    self.fill_rect(*x + *w - t, *y + t, t, *h - 2.0 * t, *color);
                }
                DrawCommand::FillCircle {
                    x,
                    y,
                    radius,
                    color,
                } => self.fill_circle(*x, *y, *radius, *color),
                DrawCommand::Text { .. } => {}
            }
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let x0 = self.clamp_x(x.round());
        let x1 = self.clamp_x((x + w).round());
        let y0 = self.clamp_y(y.round());
        let y1 = self.clamp_y((y + h).round());
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color);
            }
        }
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, thickness: f32, color: Rgba) {
        let half = thickness.max(1.0) / 2.0;
        if x1 == x2 || y1 == y2 {
            let (left, right) = (x1.min(x2), x1.max(x2));
            let (top, bottom) = (y1.min(y2), y1.max(y2));
            self.fill_rect(
                left - half,
                top - half,
                right - left + 2.0 * half,
                bottom - top + 2.0 * half,
                color,
            );
            return;
        }

        let steps = (x2 - x1).abs().max((y2 - y1).abs()).ceil() as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = x1 + (x2 - x1) * t;
            let y = y1 + (y2 - y1) * t;
            self.fill_rect(x - half, y - half, 2.0 * half, 2.0 * half, color);
        }
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba) {
        let x0 = self.clamp_x((cx - radius).floor());
        let x1 = self.clamp_x((cx + radius).ceil());
        let y0 = self.clamp_y((cy - radius).floor());
        let y1 = self.clamp_y((cy + radius).ceil());
        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    self.blend(px, py, color);
                }
            }
        }
    }

    fn blend(&mut self, x: u32, y: u32, src: Rgba) {
        let index = (y * self.width + x) as usize;
        let Some(dst) = self.pixels.get_mut(index) else {
            return;
        };
        if src.a == 255 {
            *dst = src;
            return;
        }
        let a = src.a as u32;
        let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a)) / 255) as u8;
        *dst = Rgba::new(
            mix(src.r, dst.r),
            mix(src.g, dst.g),
            mix(src.b, dst.b),
            (a + dst.a as u32 * (255 - a) / 255) as u8,
        );
    }

    fn clamp_x(&self, v: f32) -> u32 {
        v.clamp(0.0, self.width as f32) as u32
    }

    fn clamp_y(&self, v: f32) -> u32 {
        v.clamp(0.0, self.height as f32) as u32
    }
}

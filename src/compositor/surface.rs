//! Drawable RGBA surface
//!
//! The compositing surface is the canvas the live frame and the detection
//! outline are drawn onto before it is captured again as a stream.

use crate::capture::frame::Frame;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Surface shared between the tick loop, detection callbacks and stream capture
pub type SharedSurface = Arc<Mutex<Surface>>;

/// An RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid colour '{0}', expected #rgb, #rrggbb or #rrggbbaa")]
pub struct ColorParseError(pub String);

impl Color {
    pub const RED: Color = Color([255, 0, 0, 255]);
    pub const TRANSPARENT: Color = Color([0, 0, 0, 0]);

    /// Parse a CSS-style hex colour
    pub fn parse_hex(value: &str) -> Result<Self, ColorParseError> {
        let err = || ColorParseError(value.to_string());
        let hex = value.strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map(|n| n * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);

        let rgba = match hex.len() {
            3 => [nibble(0), nibble(1), nibble(2), Ok(255)],
            6 => [byte(0), byte(2), byte(4), Ok(255)],
            8 => [byte(0), byte(2), byte(4), byte(6)],
            _ => return Err(err()),
        };

        let mut out = [0u8; 4];
        for (slot, component) in out.iter_mut().zip(rgba) {
            *slot = component.map_err(|_| err())?;
        }
        Ok(Color(out))
    }
}

#[derive(Debug, Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    /// Create a cleared surface with fixed dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; Frame::byte_len(width, height)],
        }
    }

    pub fn shared(width: u32, height: u32) -> SharedSurface {
        Arc::new(Mutex::new(Self::new(width, height)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Draw `frame` scaled (nearest neighbour) to cover the whole surface
    pub fn draw_frame_scaled(&mut self, frame: &Frame) {
        if frame.width == 0 || frame.height == 0 || self.width == 0 || self.height == 0 {
            return;
        }

        let dst_w = self.width as usize;
        let src_w = frame.width as usize;

        for y in 0..self.height as usize {
            let src_y = y * frame.height as usize / self.height as usize;
            let dst_row = y * dst_w * 4;
            let src_row = src_y * src_w * 4;

            for x in 0..dst_w {
                let src_x = x * src_w / dst_w;
                let dst = dst_row + x * 4;
                let src = src_row + src_x * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&frame.data[src..src + 4]);
            }
        }
    }

    /// Fill an axis-aligned rectangle, clipped to the surface
    pub fn fill_rect(&mut self, x: i64, y: i64, width: i64, height: i64, color: Color) {
        let x0 = x.clamp(0, self.width as i64) as usize;
        let y0 = y.clamp(0, self.height as i64) as usize;
        let x1 = (x + width).clamp(0, self.width as i64) as usize;
        let y1 = (y + height).clamp(0, self.height as i64) as usize;

        for row in y0..y1 {
            let base = row * self.width as usize * 4;
            for col in x0..x1 {
                let offset = base + col * 4;
                self.pixels[offset..offset + 4].copy_from_slice(&color.0);
            }
        }
    }

    /// Stroke a rectangle outline centred on its edges, like a canvas `strokeRect`
    pub fn stroke_rect(&mut self, x: i64, y: i64, width: i64, height: i64, line_width: u32, color: Color) {
        if line_width == 0 {
            return;
        }
        let lw = line_width as i64;
        let half = lw / 2;
        let left = x - half;
        let top = y - half;
        let outer_w = width + lw;
        let outer_h = height + lw;

        self.fill_rect(left, top, outer_w, lw, color);
        self.fill_rect(left, y + height - half, outer_w, lw, color);
        self.fill_rect(left, top, lw, outer_h, color);
        self.fill_rect(x + width - half, top, lw, outer_h, color);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.pixels[offset..offset + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copy the current contents out as a frame
    pub fn snapshot(&self) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            data: self.pixels.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colours() {
        assert_eq!(Color::parse_hex("#f00").unwrap(), Color::RED);
        assert_eq!(Color::parse_hex("#00ff00").unwrap(), Color([0, 255, 0, 255]));
        assert_eq!(Color::parse_hex("#0000ff80").unwrap(), Color([0, 0, 255, 128]));
        assert!(Color::parse_hex("f00").is_err());
        assert!(Color::parse_hex("#ff00").is_err());
        assert!(Color::parse_hex("#zzz").is_err());
    }

    #[test]
    fn test_draw_frame_scales_up() {
        let mut frame = Frame::filled(2, 1, [10, 10, 10, 255]);
        frame.data[4..8].copy_from_slice(&[20, 20, 20, 255]);

        let mut surface = Surface::new(4, 2);
        surface.draw_frame_scaled(&frame);

        assert_eq!(surface.pixel(0, 0), Some([10, 10, 10, 255]));
        assert_eq!(surface.pixel(1, 1), Some([10, 10, 10, 255]));
        assert_eq!(surface.pixel(2, 0), Some([20, 20, 20, 255]));
        assert_eq!(surface.pixel(3, 1), Some([20, 20, 20, 255]));
    }

    #[test]
    fn test_stroke_rect_outline_only() {
        let mut surface = Surface::new(20, 20);
        surface.stroke_rect(5, 5, 10, 10, 2, Color::RED);

        // Edges are covered on both sides of the path
        assert_eq!(surface.pixel(4, 10), Some(Color::RED.0));
        assert_eq!(surface.pixel(5, 10), Some(Color::RED.0));
        assert_eq!(surface.pixel(14, 10), Some(Color::RED.0));
        assert_eq!(surface.pixel(15, 10), Some(Color::RED.0));
        assert_eq!(surface.pixel(10, 4), Some(Color::RED.0));
        assert_eq!(surface.pixel(10, 15), Some(Color::RED.0));

        // Interior untouched
        assert_eq!(surface.pixel(10, 10), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(6, 6), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_stroke_rect_clips_negative_origin() {
        let mut surface = Surface::new(10, 10);
        surface.stroke_rect(-20, -3, 25, 8, 2, Color::RED);
        assert_eq!(surface.pixel(0, 4), Some(Color::RED.0));
        assert_eq!(surface.pixel(4, 2), Some(Color::RED.0));
        assert_eq!(surface.pixel(9, 9), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_clear_and_snapshot() {
        let mut surface = Surface::new(3, 3);
        surface.fill_rect(0, 0, 3, 3, Color::RED);
        let before = surface.snapshot();
        surface.clear();
        let after = surface.snapshot();

        assert_eq!(before.pixel(1, 1), Some(Color::RED.0));
        assert_eq!(after.pixel(1, 1), Some([0, 0, 0, 0]));
    }
}

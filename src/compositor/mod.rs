//! Frame compositing
//!
//! Draws the current camera frame onto the compositing surface and strokes
//! the latest detection rectangle over it.

mod surface;

pub use surface::{Color, ColorParseError, SharedSurface, Surface};

use crate::capture::frame::FrameSource;
use crate::detection::Rect;

/// Default outline width in pixels
pub const DEFAULT_LINE_WIDTH: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compositor {
    highlight: Color,
    line_width: u32,
}

impl Compositor {
    pub fn new(highlight: Color, line_width: u32) -> Self {
        Self {
            highlight,
            line_width,
        }
    }

    pub fn highlight(&self) -> Color {
        self.highlight
    }

    pub fn line_width(&self) -> u32 {
        self.line_width
    }

    /// Clear `surface`, draw the source's current frame scaled to it, then
    /// outline `rect` if there is one.
    ///
    /// A source with no frame yet leaves the surface cleared.
    pub fn composite(&self, surface: &mut Surface, source: &dyn FrameSource, rect: Option<&Rect>) {
        surface.clear();

        match source.current_frame() {
            Some(frame) => surface.draw_frame_scaled(&frame),
            None => tracing::trace!("Frame source not ready, leaving surface cleared"),
        }

        if let Some(rect) = rect {
            surface.stroke_rect(
                rect.x as i64,
                rect.y as i64,
                rect.width as i64,
                rect.height as i64,
                self.line_width,
                self.highlight,
            );
        }
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(Color::RED, DEFAULT_LINE_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::Frame;
    use std::sync::Arc;

    struct StillSource(Option<Arc<Frame>>);

    impl FrameSource for StillSource {
        fn current_frame(&self) -> Option<Arc<Frame>> {
            self.0.clone()
        }
    }

    const GREY: [u8; 4] = [128, 128, 128, 255];

    #[test]
    fn test_composite_frame_only() {
        let source = StillSource(Some(Arc::new(Frame::filled(8, 6, GREY))));
        let mut surface = Surface::new(16, 12);

        Compositor::default().composite(&mut surface, &source, None);

        assert_eq!(surface.pixel(0, 0), Some(GREY));
        assert_eq!(surface.pixel(15, 11), Some(GREY));
    }

    #[test]
    fn test_composite_with_rect() {
        let source = StillSource(Some(Arc::new(Frame::filled(16, 16, GREY))));
        let mut surface = Surface::new(16, 16);
        let rect = Rect {
            x: 4,
            y: 4,
            width: 6,
            height: 6,
        };

        Compositor::default().composite(&mut surface, &source, Some(&rect));

        assert_eq!(surface.pixel(4, 6), Some(Color::RED.0));
        assert_eq!(surface.pixel(7, 7), Some(GREY));
        assert_eq!(surface.pixel(0, 0), Some(GREY));
    }

    #[test]
    fn test_composite_replaces_previous_rect() {
        let source = StillSource(Some(Arc::new(Frame::filled(16, 16, GREY))));
        let mut surface = Surface::new(16, 16);
        let compositor = Compositor::default();
        let first = Rect {
            x: 1,
            y: 1,
            width: 4,
            height: 4,
        };

        compositor.composite(&mut surface, &source, Some(&first));
        assert_eq!(surface.pixel(1, 2), Some(Color::RED.0));

        compositor.composite(&mut surface, &source, None);
        assert_eq!(surface.pixel(1, 2), Some(GREY));
    }

    #[test]
    fn test_composite_without_frame_clears() {
        let mut surface = Surface::new(4, 4);
        surface.fill_rect(0, 0, 4, 4, Color::RED);

        let custom = Compositor::new(Color([0, 255, 0, 255]), 1);
        custom.composite(&mut surface, &StillSource(None), None);

        assert_eq!(surface.pixel(2, 2), Some([0, 0, 0, 0]));
        assert_eq!(custom.line_width(), 1);
    }
}

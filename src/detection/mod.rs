//! Object detection client
//!
//! The "object distinguish" service is simulated: each request picks a random
//! rectangle sized to the surface and resolves after a fixed latency.
//! [`DetectionService`] is the seam for a real backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Smallest width/height a detection rectangle will have
pub const MIN_RECT_SIZE: u32 = 50;

/// Simulated round-trip latency
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(100);

/// Detection result in surface coordinates
///
/// `x`/`y` are signed: surfaces smaller than 100px in a dimension can yield a
/// negative origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Whether the rectangle lies entirely inside a `width` x `height` surface
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= width as i64
            && self.y as i64 + self.height as i64 <= height as i64
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("Invalid surface size {width}x{height}")]
    InvalidSurface { width: u32, height: u32 },

    #[error("Detection service error: {0}")]
    Service(String),
}

/// One request/response round-trip to a detection backend
#[async_trait]
pub trait DetectionService: Send + Sync {
    async fn detect(&self, surface_width: u32, surface_height: u32) -> Result<Rect, DetectionError>;
}

/// Stand-in for the remote service: random rectangle, fixed latency
pub struct SimulatedDetector {
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedDetector {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence of rectangles
    pub fn with_seed(seed: u64, latency: Duration) -> Self {
        Self {
            latency,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Default for SimulatedDetector {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY)
    }
}

#[async_trait]
impl DetectionService for SimulatedDetector {
    async fn detect(&self, surface_width: u32, surface_height: u32) -> Result<Rect, DetectionError> {
        if surface_width == 0 || surface_height == 0 {
            return Err(DetectionError::InvalidSurface {
                width: surface_width,
                height: surface_height,
            });
        }

        // Picked up front; the lock must not be held across the sleep
        let rect = {
            let mut rng = self.rng.lock();
            sample_rect(&mut *rng, surface_width, surface_height)
        };

        tokio::time::sleep(self.latency).await;
        Ok(rect)
    }
}

/// Pick a rectangle for a `width` x `height` surface
///
/// Width and height are at least [`MIN_RECT_SIZE`] and at most half the
/// surface (rounded up). The origin is not clamped, so it goes negative when
/// the surface is smaller than the rectangle.
pub fn sample_rect<R: Rng + ?Sized>(rng: &mut R, width: u32, height: u32) -> Rect {
    let w = width as f64;
    let h = height as f64;

    let rect_width = ((rng.gen::<f64>() * w / 2.0).ceil() as u32).max(MIN_RECT_SIZE);
    let rect_height = ((rng.gen::<f64>() * h / 2.0).ceil() as u32).max(MIN_RECT_SIZE);
    let x = (rng.gen::<f64>() * (w - rect_width as f64)).floor() as i32;
    let y = (rng.gen::<f64>() * (h - rect_height as f64)).floor() as i32;

    Rect {
        x,
        y,
        width: rect_width,
        height: rect_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_inside_large_surfaces() {
        let mut rng = StdRng::seed_from_u64(7);
        for (w, h) in [(100, 100), (101, 333), (640, 480), (1920, 1080), (4096, 100)] {
            for _ in 0..500 {
                let rect = sample_rect(&mut rng, w, h);
                assert!(rect.fits_within(w, h), "{:?} outside {}x{}", rect, w, h);
                assert!(rect.width >= MIN_RECT_SIZE);
                assert!(rect.height >= MIN_RECT_SIZE);
            }
        }
    }

    #[test]
    fn test_small_surface_can_go_negative() {
        let mut rng = StdRng::seed_from_u64(1);
        let rects: Vec<Rect> = (0..200).map(|_| sample_rect(&mut rng, 30, 30)).collect();

        assert!(rects.iter().all(|r| r.width == MIN_RECT_SIZE && r.height == MIN_RECT_SIZE));
        assert!(rects.iter().all(|r| r.x <= 0 && r.y <= 0));
        assert!(rects.iter().any(|r| r.x < 0));
    }

    #[test]
    fn test_seeded_sequences_repeat() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            assert_eq!(sample_rect(&mut a, 640, 480), sample_rect(&mut b, 640, 480));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_resolves_after_latency() {
        let detector = SimulatedDetector::with_seed(3, DEFAULT_LATENCY);
        let started = tokio::time::Instant::now();

        let rect = detector.detect(640, 480).await.unwrap();

        assert!(started.elapsed() >= DEFAULT_LATENCY);
        assert!(rect.fits_within(640, 480));
    }

    #[tokio::test]
    async fn test_detect_rejects_empty_surface() {
        let detector = SimulatedDetector::new(Duration::ZERO);
        let err = detector.detect(0, 480).await.unwrap_err();
        assert_eq!(
            err,
            DetectionError::InvalidSurface {
                width: 0,
                height: 480
            }
        );
    }
}

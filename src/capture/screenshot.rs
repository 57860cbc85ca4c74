use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type DisplayId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corners, in any drag direction
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: a.x.abs_diff(b.x),
            height: a.y.abs_diff(b.y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Map from logical to device pixels
    pub fn scaled(&self, factor: f64) -> Self {
        let x0 = (self.x as f64 * factor).round();
        let y0 = (self.y as f64 * factor).round();
        let x1 = (self.right() as f64 * factor).round();
        let y1 = (self.bottom() as f64 * factor).round();
        Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0).max(0.0) as u32,
            height: (y1 - y0).max(0.0) as u32,
        }
    }

    /// Intersection with a `width` x `height` image anchored at the origin
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        let x0 = (self.x as i64).clamp(0, width as i64);
        let y0 = (self.y as i64).clamp(0, height as i64);
        let x1 = self.right().clamp(0, width as i64);
        let y1 = self.bottom().clamp(0, height as i64);

        let clamped = Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        };
        (!clamped.is_empty()).then_some(clamped)
    }
}

/// One display's screenshot, in device pixels.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub display: DisplayId,
    pub image: Arc<RgbaImage>,
    /// Device pixels per logical pixel
    pub scale_factor: f64,
}

impl CapturedImage {
    pub fn new(display: DisplayId, image: RgbaImage) -> Self {
        Self {
            display,
            image: Arc::new(image),
            scale_factor: 1.0,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        if scale_factor.is_finite() && scale_factor > 0.0 {
            self.scale_factor = scale_factor;
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Size of the display in logical pixels
    pub fn logical_size(&self) -> (u32, u32) {
        (
            (self.width() as f64 / self.scale_factor).round() as u32,
            (self.height() as f64 / self.scale_factor).round() as u32,
        )
    }

    /// Copy of the pixels inside `region` (device pixels), clamped to the image
    pub fn crop(&self, region: &Rect) -> Option<RgbaImage> {
        let region = region.clamp_to(self.width(), self.height())?;
        Some(
            image::imageops::crop_imm(
                self.image.as_ref(),
                region.x as u32,
                region.y as u32,
                region.width,
                region.height,
            )
            .to_image(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_normalises_drag_direction() {
        let rect = Rect::from_corners(Point::new(50, 40), Point::new(10, 20));
        assert_eq!(rect, Rect::new(10, 20, 40, 20));
    }

    #[test]
    fn test_scaled_rect() {
        let rect = Rect::new(10, 20, 30, 40).scaled(2.0);
        assert_eq!(rect, Rect::new(20, 40, 60, 80));

        let rect = Rect::new(1, 1, 3, 3).scaled(1.5);
        assert_eq!(rect, Rect::new(2, 2, 4, 4));
    }

    #[test]
    fn test_clamp_to_image() {
        let rect = Rect::new(-10, 90, 50, 50);
        assert_eq!(rect.clamp_to(100, 100), Some(Rect::new(0, 90, 40, 10)));
        assert_eq!(Rect::new(200, 200, 10, 10).clamp_to(100, 100), None);
    }

    #[test]
    fn test_crop_copies_region() {
        let mut img = RgbaImage::new(20, 10);
        img.put_pixel(5, 5, image::Rgba([255, 0, 0, 255]));
        let captured = CapturedImage::new(0, img);

        let cropped = captured.crop(&Rect::new(5, 5, 4, 3)).unwrap();
        assert_eq!(cropped.dimensions(), (4, 3));
        assert_eq!(cropped.get_pixel(0, 0), &image::Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_logical_size_and_invalid_scale() {
        let captured = CapturedImage::new(1, RgbaImage::new(200, 100)).with_scale_factor(2.0);
        assert_eq!(captured.logical_size(), (100, 50));

        let captured = CapturedImage::new(1, RgbaImage::new(200, 100)).with_scale_factor(0.0);
        assert_eq!(captured.scale_factor, 1.0);
    }
}

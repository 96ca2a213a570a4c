//! Pixel regions of interest inside a video frame.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in frame pixels, stored as `(x, y, width, height)`.
///
/// Serialized as a four element array so configuration files can write
/// `timer_coords: [880, 10, 160, 80]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Roi {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Roi {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clamp to an image of `image_width` x `image_height`.
    ///
    /// Returns `(x, y, width, height)` in unsigned pixels; width or height may be
    /// zero when the region falls outside the image.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let x = self.x.clamp(0, image_width as i32) as u32;
        let y = self.y.clamp(0, image_height as i32) as u32;
        let width = (self.width.max(0) as u32).min(image_width - x);
        let height = (self.height.max(0) as u32).min(image_height - y);
        (x, y, width, height)
    }

    /// Proportionally rescale, truncating toward zero.
    pub fn scale(&self, scale_x: f64, scale_y: f64) -> Self {
        Self {
            x: (self.x as f64 * scale_x) as i32,
            y: (self.y as f64 * scale_y) as i32,
            width: (self.width as f64 * scale_x) as i32,
            height: (self.height as f64 * scale_y) as i32,
        }
    }
}

impl From<[i32; 4]> for Roi {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Roi> for [i32; 4] {
    fn from(roi: Roi) -> Self {
        [roi.x, roi.y, roi.width, roi.height]
    }
}

//! Image buffers and conversions used by the matcher and classifier

use crate::Result;
use anyhow::Context;
use image::{GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};
use imageproc::integral_image::{integral_image, integral_squared_image};
use roundscout_core::Roi;
use std::path::Path;

/// Running sums with a zero first row and column, `(w + 1) x (h + 1)`.
pub type IntegralImage = ImageBuffer<Luma<u64>, Vec<u64>>;

/// Map image split into RGB channels with their integral images, built once per
/// detection pass and shared by every template.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub channels: [GrayImage; 3],
    sums: [IntegralImage; 3],
    squares: [IntegralImage; 3],
}

impl PreparedImage {
    pub fn new(image: &RgbImage) -> Self {
        let channels = ImageUtils::split_rgb(image);
        let sums = [0, 1, 2].map(|c| integral_image::<_, u64>(&channels[c]));
        let squares = [0, 1, 2].map(|c| integral_squared_image::<_, u64>(&channels[c]));
        Self {
            width: image.width(),
            height: image.height(),
            channels,
            sums,
            squares,
        }
    }

    /// `(sum, sum of squares)` of channel `c` over the `width` x `height` window at `(x, y)`.
    pub fn window(&self, c: usize, x: u32, y: u32, width: u32, height: u32) -> (u64, u64) {
        (
            window_sum(&self.sums[c], x, y, width, height),
            window_sum(&self.squares[c], x, y, width, height),
        )
    }
}

fn window_sum(integral: &IntegralImage, x: u32, y: u32, width: u32, height: u32) -> u64 {
    let (x1, y1) = (x + width, y + height);
    let at = |x: u32, y: u32| integral.get_pixel(x, y)[0];
    at(x1, y1) + at(x, y) - at(x, y1) - at(x1, y)
}

/// Image utility functions
pub struct ImageUtils;

impl ImageUtils {
    /// Load image keeping its alpha channel; second value is whether the file had one
    pub fn load_rgba<P: AsRef<Path>>(path: P) -> Result<(RgbaImage, bool)> {
        let img = image::open(&path)
            .with_context(|| format!("Failed to open image: {:?}", path.as_ref()))?;
        let has_alpha = img.color().has_alpha();
        Ok((img.to_rgba8(), has_alpha))
    }

    pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
        Ok(image::open(&path)
            .with_context(|| format!("Failed to open image: {:?}", path.as_ref()))?
            .to_rgb8())
    }

    pub fn split_rgb(image: &RgbImage) -> [GrayImage; 3] {
        let (w, h) = image.dimensions();
        [0, 1, 2].map(|c| GrayImage::from_fn(w, h, |x, y| Luma([image.get_pixel(x, y)[c]])))
    }

    /// RGB channels multiplied by the alpha channel, so transparent pixels read as 0
    pub fn premultiply_rgba(image: &RgbaImage) -> [GrayImage; 3] {
        let (w, h) = image.dimensions();
        [0, 1, 2].map(|c| {
            GrayImage::from_fn(w, h, |x, y| {
                let p = image.get_pixel(x, y);
                Luma([((p[c] as u32 * p[3] as u32 + 127) / 255) as u8])
            })
        })
    }

    /// Crop `roi` after clamping it to the image. `None` when nothing is left.
    pub fn crop_roi(image: &RgbImage, roi: &Roi) -> Option<RgbImage> {
        let (x, y, width, height) = roi.clamp_to(image.width(), image.height());
        if width == 0 || height == 0 {
            return None;
        }
        Some(image::imageops::crop_imm(image, x, y, width, height).to_image())
    }

    /// Box-averaging resample; on downscale every output pixel is the mean of
    /// the source block it covers. Alpha is resampled like the other channels.
    pub fn resize_area(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        if width == 0 || height == 0 {
            return RgbaImage::new(width, height);
        }
        if image.dimensions() == (width, height) {
            return image.clone();
        }
        image::imageops::thumbnail(image, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    #[test]
    fn test_window_matches_direct_sum() {
        let img = RgbImage::from_fn(5, 4, |x, y| Rgb([(x * 3 + y) as u8, 0, 7]));
        let prepared = PreparedImage::new(&img);

        let (sum, sq) = prepared.window(0, 1, 1, 3, 2);
        let mut expect_sum = 0;
        let mut expect_sq = 0;
        for y in 1..3 {
            for x in 1..4 {
                let v = img.get_pixel(x, y)[0] as u64;
                expect_sum += v;
                expect_sq += v * v;
            }
        }
        assert_eq!(sum, expect_sum);
        assert_eq!(sq, expect_sq);
        assert_eq!(prepared.window(2, 0, 0, 5, 4), (140, 980));
    }

    #[test]
    fn test_resize_area_averages_blocks() {
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([200, 0, 0, 255])
            } else {
                Rgba([0, 100, 0, 0])
            }
        });

        let small = ImageUtils::resize_area(&img, 2, 1);
        assert_eq!(*small.get_pixel(0, 0), Rgba([200, 0, 0, 255]));
        assert_eq!(*small.get_pixel(1, 0), Rgba([0, 100, 0, 0]));

        let single = ImageUtils::resize_area(&img, 1, 1);
        assert_eq!(*single.get_pixel(0, 0), Rgba([100, 50, 0, 128]));
    }

    #[test]
    fn test_crop_roi_clamps() {
        let img = RgbImage::new(100, 50);
        let crop = ImageUtils::crop_roi(&img, &Roi::new(80, 40, 40, 40));
        assert_eq!(crop.map(|c| c.dimensions()), Some((20, 10)));
        assert!(ImageUtils::crop_roi(&img, &Roi::new(120, 0, 10, 10)).is_none());
    }

    #[test]
    fn test_premultiply_zeroes_transparent_pixels() {
        let img = RgbaImage::from_fn(2, 1, |x, _| Rgba([200, 100, 30, if x == 0 { 255 } else { 0 }]));
        let channels = ImageUtils::premultiply_rgba(&img);
        assert_eq!(channels[0].as_raw(), &vec![200, 0]);
        assert_eq!(channels[2].as_raw(), &vec![30, 0]);
    }
}

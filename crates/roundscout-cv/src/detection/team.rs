//! Side classification from the colored ring drawn around minimap icons

use super::config::TeamColorConfig;
use image::RgbImage;
use roundscout_core::{ScanError, Team};
use log::trace;

/// Red ring means attack; blue or green means defend.
#[derive(Debug, Clone, Default)]
pub struct TeamClassifier {
    config: TeamColorConfig,
}

impl TeamClassifier {
    pub fn new(config: TeamColorConfig) -> Self {
        Self { config }
    }

    /// Classify the detection centered at `(center_x, center_y)` whose template
    /// is `template_width` x `template_height`.
    pub fn classify(
        &self,
        image: &RgbImage,
        center_x: i32,
        center_y: i32,
        template_width: i32,
        template_height: i32,
    ) -> Team {
        match self.ring_mean(image, center_x, center_y, template_width, template_height) {
            Some(mean) => self.classify_color(mean),
            None => Team::Unknown,
        }
    }

    /// Mean RGB over the annulus between the icon edge and the ring's outer
    /// radius, or `None` when too few pixels fall inside the image.
    pub fn ring_mean(
        &self,
        image: &RgbImage,
        center_x: i32,
        center_y: i32,
        template_width: i32,
        template_height: i32,
    ) -> Option<[f64; 3]> {
        let (w, h) = (image.width() as i32, image.height() as i32);
        let inner = template_width.max(template_height) / 2;
        let outer = inner + self.config.ring_width;

        let y_min = (center_y - outer).max(0);
        let y_max = (center_y + outer).min(h);
        let x_min = (center_x - outer).max(0);
        let x_max = (center_x + outer).min(w);

        let mut sum = [0.0; 3];
        let mut count = 0usize;
        for y in y_min..y_max {
            for x in x_min..x_max {
                let (dx, dy) = ((x - center_x) as f64, (y - center_y) as f64);
                let distance = (dx * dx + dy * dy).sqrt();
                if distance >= inner as f64 && distance <= outer as f64 {
                    let px = image.get_pixel(x as u32, y as u32);
                    for c in 0..3 {
                        sum[c] += px[c] as f64;
                    }
                    count += 1;
                }
            }
        }

        if count < self.config.min_ring_pixels {
            let err = ScanError::DegenerateRegion {
                width: (x_max - x_min).max(0) as u32,
                height: (y_max - y_min).max(0) as u32,
            };
            trace!("ring at ({}, {}) has {} pixels: {}", center_x, center_y, count, err);
            return None;
        }

        Some(sum.map(|s| s / count as f64))
    }

    /// Side for a mean ring color.
    pub fn classify_color(&self, [r, g, b]: [f64; 3]) -> Team {
        let offset = self.config.color_offset;

        if r > g + offset && r > b + offset {
            Team::Attack
        } else if b > r + offset || g > r + offset {
            Team::Defend
        } else if r >= g && r >= b {
            Team::Attack
        } else {
            Team::Defend
        }
    }
}

//! Agent templates: one master icon per agent, pre-scaled to fixed sizes

pub mod loader;
pub mod matcher;

pub use loader::TemplateLoader;
pub use matcher::TemplateMatcher;

use crate::traits::AgentTemplateProvider;
use crate::utils::ImageUtils;
use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

/// Long-edge sizes every master icon is scaled to.
pub const TEMPLATE_SIZES: [u32; 3] = [64, 48, 32];

/// Dimensions of an icon scaled so its long edge is `size`, keeping aspect ratio.
pub fn scaled_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    if height > width {
        ((width as u64 * size as u64 / height as u64) as u32, size)
    } else {
        (size, (height as u64 * size as u64 / width.max(1) as u64) as u32)
    }
}

/// Mean and centered energy of one template channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: f64,
    /// Sum of squared deviations from `mean`.
    pub norm: f64,
}

impl ChannelStats {
    fn of(channel: &GrayImage) -> Self {
        let n = channel.as_raw().len().max(1) as f64;
        let mean = channel.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n;
        let norm = channel
            .as_raw()
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum();
        Self { mean, norm }
    }
}

/// One scale of an agent icon, ready for correlation.
///
/// When the icon has an opacity mask, `channels` are already multiplied by it,
/// so transparent background contributes nothing.
#[derive(Debug, Clone)]
pub struct ScaledTemplate {
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub channels: [GrayImage; 3],
    pub stats: [ChannelStats; 3],
}

impl ScaledTemplate {
    pub fn from_rgba(size: u32, image: &RgbaImage, has_alpha: bool) -> Self {
        let (width, height) = image.dimensions();
        let channels = if has_alpha {
            ImageUtils::premultiply_rgba(image)
        } else {
            [0, 1, 2].map(|c| GrayImage::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y)[c]])))
        };
        let stats = [0, 1, 2].map(|c| ChannelStats::of(&channels[c]));

        Self {
            size,
            width,
            height,
            channels,
            stats,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Every scale of one agent's icon.
#[derive(Debug, Clone)]
pub struct AgentTemplate {
    pub name: String,
    pub scales: Vec<ScaledTemplate>,
}

impl AgentTemplate {
    /// Area-downscale `master` to each of `sizes`.
    pub fn from_master(name: impl Into<String>, master: &RgbaImage, has_alpha: bool, sizes: &[u32]) -> Self {
        let (w, h) = master.dimensions();
        let scales = sizes
            .iter()
            .map(|&size| {
                let (sw, sh) = scaled_dimensions(w, h, size);
                let scaled = ImageUtils::resize_area(master, sw, sh);
                ScaledTemplate::from_rgba(size, &scaled, has_alpha)
            })
            .collect();

        Self {
            name: name.into(),
            scales,
        }
    }
}

/// Immutable set of agent templates, sorted by agent name.
#[derive(Debug, Clone, Default)]
pub struct AgentTemplateSet {
    templates: Vec<AgentTemplate>,
}

impl AgentTemplateSet {
    pub fn new(mut templates: Vec<AgentTemplate>) -> Self {
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AgentTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AgentTemplate> {
        self.templates.iter()
    }
}

impl AgentTemplateProvider for AgentTemplateSet {
    fn agent_templates(&self) -> &[AgentTemplate] {
        &self.templates
    }
}

/// Template matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Minimum channel-averaged correlation for a raw hit.
    pub threshold: f64,
    /// IoU at which the weaker of two hits is suppressed.
    pub nms_threshold: f64,
    pub sizes: Vec<u32>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            nms_threshold: 0.3,
            sizes: TEMPLATE_SIZES.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(128, 128, 64), (64, 64));
        assert_eq!(scaled_dimensions(100, 50, 64), (64, 32));
        assert_eq!(scaled_dimensions(50, 100, 48), (24, 48));
        assert_eq!(scaled_dimensions(90, 100, 32), (28, 32));
    }

    #[test]
    fn test_mask_weights_channels() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([200, 100, 50, 255])
            } else {
                Rgba([200, 100, 50, 0])
            }
        });

        let masked = ScaledTemplate::from_rgba(2, &img, true);
        assert_eq!(masked.channels[0].as_raw(), &vec![200, 0]);
        assert_eq!(masked.stats[0], ChannelStats { mean: 100.0, norm: 20_000.0 });

        let plain = ScaledTemplate::from_rgba(2, &img, false);
        assert_eq!(plain.channels[0].as_raw(), &vec![200, 200]);
        assert_eq!(plain.stats[0], ChannelStats { mean: 200.0, norm: 0.0 });
    }

    #[test]
    fn test_from_master_builds_every_size() {
        let master = RgbaImage::from_pixel(128, 96, Rgba([10, 20, 30, 255]));
        let template = AgentTemplate::from_master("viper", &master, true, &TEMPLATE_SIZES);

        let dims: Vec<(u32, u32)> = template.scales.iter().map(|s| (s.width, s.height)).collect();
        assert_eq!(dims, vec![(64, 48), (48, 36), (32, 24)]);
    }
}

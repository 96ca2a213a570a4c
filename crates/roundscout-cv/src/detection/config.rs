//! Detection configuration

use crate::template::TemplateConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub template_config: TemplateConfig,
    pub icons_dir: PathBuf,
    pub team_color: TeamColorConfig,
    /// Most agents one side can field.
    pub max_squad_size: usize,
}

/// Ring sampling around a detection, used to tell the sides apart
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamColorConfig {
    /// Ring thickness outside the icon, in pixels.
    pub ring_width: i32,
    /// Fewer sampled ring pixels than this classifies as unknown.
    pub min_ring_pixels: usize,
    /// Margin one channel must lead by to count as dominant.
    pub color_offset: f64,
}

impl Default for TeamColorConfig {
    fn default() -> Self {
        Self {
            ring_width: 5,
            min_ring_pixels: 10,
            color_offset: 40.0,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            template_config: TemplateConfig::default(),
            icons_dir: "agent_icons".into(),
            team_color: TeamColorConfig::default(),
            max_squad_size: 5,
        }
    }
}

//! Agent detector: template matches -> team -> roster constraints

use super::config::DetectionConfig;
use super::roster::UniquenessFilter;
use super::team::TeamClassifier;
use crate::Result;
use crate::template::{TemplateLoader, TemplateMatcher};
use crate::traits::AgentTemplateProvider;
use crate::utils::ImageUtils;
use anyhow::Context;
use image::RgbImage;
use log::{info, warn};
use roundscout_core::{AgentDetection, Team};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Finds agents on a minimap crop.
///
/// Templates are loaded once and shared read-only, so one detector can serve
/// every round of a video.
pub struct AgentDetector {
    config: DetectionConfig,
    templates: Arc<dyn AgentTemplateProvider>,
    matcher: TemplateMatcher,
    classifier: TeamClassifier,
    roster: UniquenessFilter,
}

impl AgentDetector {
    /// Create a detector with templates loaded from `config.icons_dir`
    pub fn new(config: DetectionConfig) -> Result<Self> {
        let templates = TemplateLoader::new()
            .add_template_dir(&config.icons_dir)
            .with_sizes(&config.template_config.sizes)
            .load_all_templates()
            .with_context(|| format!("Failed to load agent icons from {:?}", config.icons_dir))?;

        Ok(Self::with_templates(config, Arc::new(templates)))
    }

    pub fn with_templates(config: DetectionConfig, templates: Arc<dyn AgentTemplateProvider>) -> Self {
        Self {
            matcher: TemplateMatcher::new(config.template_config.clone()),
            classifier: TeamClassifier::new(config.team_color.clone()),
            roster: UniquenessFilter::new(config.max_squad_size),
            templates,
            config,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.templates.agent_names()
    }

    /// Detect agents on a minimap image file
    pub fn detect_from_file<P: AsRef<Path>>(&self, image_path: P) -> Result<Vec<AgentDetection>> {
        let image = ImageUtils::load_rgb(&image_path)
            .with_context(|| format!("Failed to load minimap: {:?}", image_path.as_ref()))?;
        Ok(self.detect_agents(&image))
    }

    /// Final detections for one minimap image, coordinates normalized to `[0, 1]`.
    pub fn detect_agents(&self, minimap: &RgbImage) -> Vec<AgentDetection> {
        let (w, h) = minimap.dimensions();
        if w == 0 || h == 0 {
            warn!("Empty minimap image");
            return Vec::new();
        }

        let hits = self.matcher.match_all(minimap, self.templates.agent_templates());

        let classified: Vec<AgentDetection> = hits
            .into_iter()
            .map(|bbox| {
                let (cx, cy) = bbox.center();
                let team = self
                    .classifier
                    .classify(minimap, cx, cy, bbox.width, bbox.height);
                AgentDetection {
                    agent_name: bbox.agent_name,
                    team,
                    normalized_x: cx as f64 / w as f64,
                    normalized_y: cy as f64 / h as f64,
                    confidence: bbox.confidence,
                    pixel_x: cx,
                    pixel_y: cy,
                }
            })
            .collect();

        let detections = self.roster.apply(classified);
        info!(
            "Detected {} agents: {:?}",
            detections.len(),
            count_by_team(&detections)
        );
        detections
    }

    /// Write detections as pretty JSON
    pub fn export_json(&self, detections: &[AgentDetection], output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(detections)
            .context("Failed to serialize detections")?;

        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write JSON to: {:?}", output_path))?;

        Ok(())
    }
}

fn count_by_team(detections: &[AgentDetection]) -> BTreeMap<Team, usize> {
    let mut count = BTreeMap::new();
    for det in detections {
        *count.entry(det.team).or_insert(0) += 1;
    }
    count
}

//! Tool configuration: YAML file, overridden by command line flags

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use log::info;
use roundscout_core::{LocatorConfig, Roi, Team};
use roundscout_cv::{DetectionConfig, TeamColorConfig, TemplateConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolution the default regions are authored for.
pub const REFERENCE_RESOLUTION: (u32, u32) = (1920, 1080);

/// Which side's formations are clustered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMethod {
    Attack,
    Defend,
    /// Each side clustered separately.
    Both,
}

impl ClusterMethod {
    pub fn teams(&self) -> Vec<Team> {
        match self {
            ClusterMethod::Attack => vec![Team::Attack],
            ClusterMethod::Defend => vec![Team::Defend],
            ClusterMethod::Both => vec![Team::Attack, Team::Defend],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Markdown,
    Html,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Seconds into the video where scanning starts.
    pub start_time: Option<f64>,
    /// Seconds into the video where scanning stops; capped at the duration.
    pub end_time: Option<f64>,
    pub minimap_coords: Roi,
    pub timer_coords: Roi,
    /// Tesseract language code.
    pub ocr_lang: String,
    pub full_screenshot: bool,
    pub agent_icons_dir: PathBuf,
    pub detection_threshold: f64,
    pub nms_iou_threshold: f64,
    pub team_color_offset: f64,
    pub similarity_threshold: f64,
    pub cluster_method: ClusterMethod,
    pub report_format: ReportFormat,
    pub log_file: Option<PathBuf>,
    pub locator: LocatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video: None,
            output_dir: "output".into(),
            start_time: None,
            end_time: None,
            minimap_coords: Roi::new(40, 40, 400, 400),
            timer_coords: Roi::new(880, 10, 160, 80),
            ocr_lang: "eng".to_string(),
            full_screenshot: true,
            agent_icons_dir: "agent_icons".into(),
            detection_threshold: 0.7,
            nms_iou_threshold: 0.3,
            team_color_offset: 40.0,
            similarity_threshold: 0.8,
            cluster_method: ClusterMethod::Attack,
            report_format: ReportFormat::Markdown,
            log_file: None,
            locator: LocatorConfig::default(),
        }
    }
}

impl Config {
    /// Load from YAML. A missing or empty file gives the defaults.
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid config: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject scan settings that would stall the coarse loop.
    pub fn validate(&self) -> Result<()> {
        let locator = &self.locator;
        for (name, value) in [
            ("coarse_step", locator.coarse_step),
            ("skip_amount", locator.skip_amount),
            ("refine_epsilon", locator.refine_epsilon),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                bail!("locator.{} must be a positive number, got {}", name, value);
            }
        }
        Ok(())
    }

    /// Rescale both regions from the 1920x1080 layout to `width` x `height`.
    pub fn scale_coords(&mut self, width: u32, height: u32) {
        if (width, height) == REFERENCE_RESOLUTION {
            return;
        }

        let scale_x = width as f64 / REFERENCE_RESOLUTION.0 as f64;
        let scale_y = height as f64 / REFERENCE_RESOLUTION.1 as f64;
        self.minimap_coords = self.minimap_coords.scale(scale_x, scale_y);
        self.timer_coords = self.timer_coords.scale(scale_x, scale_y);
        info!(
            "Scaled regions to {}x{}: minimap {:?}, timer {:?}",
            width, height, self.minimap_coords, self.timer_coords
        );
    }

    pub fn locator_config(&self) -> LocatorConfig {
        LocatorConfig {
            timer_roi: self.timer_coords,
            ..self.locator.clone()
        }
    }

    pub fn detection_config(&self) -> DetectionConfig {
        DetectionConfig {
            template_config: TemplateConfig {
                threshold: self.detection_threshold,
                nms_threshold: self.nms_iou_threshold,
                ..TemplateConfig::default()
            },
            icons_dir: self.agent_icons_dir.clone(),
            team_color: TeamColorConfig {
                color_offset: self.team_color_offset,
                ..TeamColorConfig::default()
            },
            ..DetectionConfig::default()
        }
    }
}

/// Region from `x,y,w,h`.
pub fn parse_roi(text: &str) -> Result<Roi> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<i32>())
        .collect::<std::result::Result<Vec<i32>, _>>()
        .with_context(|| format!("invalid region '{}'", text))?;
    match values[..] {
        [x, y, w, h] if w > 0 && h > 0 => Ok(Roi::new(x, y, w, h)),
        _ => bail!("invalid region '{}', expected x,y,w,h", text),
    }
}

/// Seconds from `hh:mm:ss`, `mm:ss` or plain seconds.
pub fn parse_timestamp(text: &str) -> Result<f64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() > 3 {
        bail!("invalid timestamp '{}'", text);
    }

    let mut seconds = 0.0;
    for part in parts {
        let value: f64 = part
            .trim()
            .parse()
            .with_context(|| format!("invalid timestamp '{}'", text))?;
        if value < 0.0 || !value.is_finite() {
            bail!("invalid timestamp '{}'", text);
        }
        seconds = seconds * 60.0 + value;
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "output_dir: scouting\ntimer_coords: [900, 12, 120, 60]\ncluster_method: both\nlocator:\n  skip_amount: 45.0\n",
        )?;

        let config = Config::load_from_yaml(&path)?;
        assert_eq!(config.output_dir, PathBuf::from("scouting"));
        assert_eq!(config.timer_coords, Roi::new(900, 12, 120, 60));
        assert_eq!(config.cluster_method, ClusterMethod::Both);
        assert_eq!(config.minimap_coords, Roi::new(40, 40, 400, 400));
        assert_eq!(config.locator.skip_amount, 45.0);
        assert_eq!(config.locator.coarse_step, 5.0);
        assert_eq!(config.locator_config().timer_roi, Roi::new(900, 12, 120, 60));
        Ok(())
    }

    #[test]
    fn test_missing_or_empty_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::load_from_yaml(dir.path().join("absent.yaml"))?;
        assert_eq!(config.similarity_threshold, 0.8);

        let empty = dir.path().join("empty.yaml");
        fs::write(&empty, "\n")?;
        assert_eq!(Config::load_from_yaml(&empty)?.report_format, ReportFormat::Markdown);
        Ok(())
    }

    #[test]
    fn test_non_positive_steps_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");

        fs::write(&path, "locator:\n  coarse_step: 0\n")?;
        let err = Config::load_from_yaml(&path).err().map(|e| e.to_string());
        assert!(err.is_some_and(|e| e.contains("coarse_step")));

        fs::write(&path, "locator:\n  skip_amount: -60\n")?;
        assert!(Config::load_from_yaml(&path).is_err());

        fs::write(&path, "locator:\n  coarse_step: 2.5\n")?;
        assert_eq!(Config::load_from_yaml(&path)?.locator.coarse_step, 2.5);
        Ok(())
    }

    #[test]
    fn test_parse_roi() -> Result<()> {
        assert_eq!(parse_roi("40,40,400,400")?, Roi::new(40, 40, 400, 400));
        assert_eq!(parse_roi(" 10, 5, 20, 30")?, Roi::new(10, 5, 20, 30));
        assert!(parse_roi("1,2,3").is_err());
        assert!(parse_roi("1,2,0,3").is_err());
        assert!(parse_roi("a,b,c,d").is_err());
        Ok(())
    }

    #[test]
    fn test_scale_coords() {
        let mut config = Config::default();
        config.scale_coords(1920, 1080);
        assert_eq!(config.timer_coords, Roi::new(880, 10, 160, 80));

        config.scale_coords(1280, 720);
        assert_eq!(config.minimap_coords, Roi::new(26, 26, 266, 266));
        assert_eq!(config.timer_coords, Roi::new(586, 6, 106, 53));
    }

    #[test]
    fn test_detection_config_carries_thresholds() {
        let config = Config {
            detection_threshold: 0.8,
            team_color_offset: 25.0,
            ..Config::default()
        };
        let detection = config.detection_config();
        assert_eq!(detection.template_config.threshold, 0.8);
        assert_eq!(detection.template_config.nms_threshold, 0.3);
        assert_eq!(detection.team_color.color_offset, 25.0);
        assert_eq!(detection.max_squad_size, 5);
    }

    #[test]
    fn test_parse_timestamp() -> Result<()> {
        assert_eq!(parse_timestamp("90")?, 90.0);
        assert_eq!(parse_timestamp("2:30")?, 150.0);
        assert_eq!(parse_timestamp("1:02:03")?, 3723.0);
        assert_eq!(parse_timestamp("12.5")?, 12.5);
        assert!(parse_timestamp("abc").is_err());
        assert!(parse_timestamp("1:2:3:4").is_err());
        assert!(parse_timestamp("-5").is_err());
        Ok(())
    }
}

//! Output directory layout
//!
//! ```text
//! round_NN.png             minimap crop at the round start
//! round_NN_full.png        full frame (optional)
//! round_NN_metadata.json   round, timestamp, minimap file and region
//! round_NN_positions.json  PositionRecord
//! all_positions.json       every PositionRecord keyed "round_NN"
//! formation_analysis.json  {"clusters": [{id, name, rounds}]}
//! ```

use anyhow::{Context, Result};
use image::RgbImage;
use log::{info, warn};
use roundscout_core::{Cluster, PositionRecord, Roi};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ALL_POSITIONS_FILE: &str = "all_positions.json";
pub const FORMATION_FILE: &str = "formation_analysis.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMetadata {
    pub round: u32,
    pub timestamp: f64,
    pub minimap_file: String,
    pub minimap_roi: Roi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationAnalysis {
    pub clusters: Vec<Cluster>,
}

pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub fn minimap_file_name(round: u32) -> String {
        format!("round_{:02}.png", round)
    }

    /// Save the minimap crop, optionally the full frame, and the round metadata.
    pub fn save_round(
        &self,
        frame: &RgbImage,
        round: u32,
        timestamp: f64,
        minimap_roi: &Roi,
        full_screenshot: bool,
    ) -> Result<RoundMetadata> {
        let minimap_file = Self::minimap_file_name(round);
        let minimap_path = self.path(&minimap_file);
        crop_minimap(frame, minimap_roi)
            .save(&minimap_path)
            .with_context(|| format!("Failed to save minimap: {:?}", minimap_path))?;
        info!("Saved minimap: {:?}", minimap_path);

        if full_screenshot {
            let full_path = self.path(&format!("round_{:02}_full.png", round));
            frame
                .save(&full_path)
                .with_context(|| format!("Failed to save screenshot: {:?}", full_path))?;
        }

        let metadata = RoundMetadata {
            round,
            timestamp,
            minimap_file,
            minimap_roi: *minimap_roi,
        };
        self.write_json(&format!("round_{:02}_metadata.json", round), &metadata)?;
        Ok(metadata)
    }

    pub fn load_metadata(&self, round: u32) -> Result<Option<RoundMetadata>> {
        self.read_json(&format!("round_{:02}_metadata.json", round))
    }

    /// Saved minimaps as `(round, path)`, ordered by round.
    pub fn minimap_rounds(&self) -> Result<Vec<(u32, PathBuf)>> {
        let mut rounds = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read directory: {:?}", self.dir))?;

        for entry in entries {
            let path = entry?.path();
            let round = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("round_"))
                .and_then(|n| n.strip_suffix(".png"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(round) = round {
                rounds.push((round, path));
            }
        }

        rounds.sort_by_key(|(round, _)| *round);
        Ok(rounds)
    }

    pub fn save_positions(&self, record: &PositionRecord) -> Result<PathBuf> {
        self.write_json(&format!("round_{:02}_positions.json", record.round_num), record)
    }

    pub fn save_all_positions(&self, records: &[PositionRecord]) -> Result<PathBuf> {
        let keyed: BTreeMap<String, &PositionRecord> = records
            .iter()
            .map(|r| (format!("round_{:02}", r.round_num), r))
            .collect();
        self.write_json(ALL_POSITIONS_FILE, &keyed)
    }

    /// Records from `all_positions.json` ordered by round; empty if it does not exist.
    pub fn load_all_positions(&self) -> Result<Vec<PositionRecord>> {
        let keyed: Option<BTreeMap<String, PositionRecord>> = self.read_json(ALL_POSITIONS_FILE)?;
        let mut records: Vec<PositionRecord> = keyed.unwrap_or_default().into_values().collect();
        records.sort_by_key(|r| r.round_num);
        Ok(records)
    }

    pub fn save_clusters(&self, file_name: &str, clusters: &[Cluster]) -> Result<PathBuf> {
        let analysis = FormationAnalysis {
            clusters: clusters.to_vec(),
        };
        let path = self.write_json(file_name, &analysis)?;
        info!("Saved formation analysis to: {:?}", path);
        Ok(path)
    }

    pub fn load_clusters(&self, file_name: &str) -> Result<Option<Vec<Cluster>>> {
        Ok(self
            .read_json::<FormationAnalysis>(file_name)?
            .map(|a| a.clusters))
    }

    pub fn write_text(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(file_name);
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(path)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(file_name);
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", file_name))?;
        fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(path)
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, file_name: &str) -> Result<Option<T>> {
        let path = self.path(file_name);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring unreadable {:?}: {}", path, e);
                Ok(None)
            }
        }
    }
}

/// Minimap crop with the region clamped into the frame, at least 1x1.
pub fn crop_minimap(frame: &RgbImage, roi: &Roi) -> RgbImage {
    let (w, h) = (frame.width().max(1) as i32, frame.height().max(1) as i32);
    let x = roi.x.clamp(0, w - 1);
    let y = roi.y.clamp(0, h - 1);
    let width = roi.width.min(w - x).max(1);
    let height = roi.height.min(h - y).max(1);
    image::imageops::crop_imm(frame, x as u32, y as u32, width as u32, height as u32).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_crop_minimap_clamps_to_frame() {
        let frame = RgbImage::from_pixel(100, 60, Rgb([1, 2, 3]));
        assert_eq!(crop_minimap(&frame, &Roi::new(10, 10, 40, 40)).dimensions(), (40, 40));
        assert_eq!(crop_minimap(&frame, &Roi::new(80, 50, 40, 40)).dimensions(), (20, 10));
        assert_eq!(crop_minimap(&frame, &Roi::new(150, 90, 40, 40)).dimensions(), (1, 1));
        assert_eq!(crop_minimap(&frame, &Roi::new(-20, 0, 0, 0)).dimensions(), (1, 1));
    }

    #[test]
    fn test_save_round_writes_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = OutputStore::new(dir.path().join("out"))?;
        let frame = RgbImage::from_pixel(200, 100, Rgb([9, 9, 9]));

        let meta = store.save_round(&frame, 3, 95.5, &Roi::new(10, 10, 50, 50), true)?;
        assert_eq!(meta.minimap_file, "round_03.png");
        assert!(store.path("round_03.png").exists());
        assert!(store.path("round_03_full.png").exists());
        assert_eq!(store.load_metadata(3)?, Some(meta));
        assert_eq!(store.load_metadata(4)?, None);

        store.save_round(&frame, 12, 300.0, &Roi::new(10, 10, 50, 50), false)?;
        assert!(!store.path("round_12_full.png").exists());

        let rounds: Vec<u32> = store.minimap_rounds()?.into_iter().map(|(r, _)| r).collect();
        assert_eq!(rounds, vec![3, 12]);
        Ok(())
    }
}

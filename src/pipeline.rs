//! Scouting engine: scan -> detect -> cluster -> report over one output directory

use crate::config::{ClusterMethod, Config, ReportFormat};
use crate::media::{FfmpegFrameSource, TesseractOracle};
use crate::output::store::FORMATION_FILE;
use crate::output::{OutputStore, ReportGenerator};
use anyhow::Result;
use log::{info, warn};
use roundscout_core::{
    CancelFlag, Cluster, FormationClusterer, FrameSource, PositionRecord, RoundEvent,
    RoundLocator, ScanState, Team, TextRecognitionOracle,
};
use roundscout_cv::AgentDetector;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "scouting_report.md";
pub const HTML_REPORT_FILE: &str = "scouting_report.html";

pub struct ScoutingEngine {
    config: Config,
    cancel: CancelFlag,
    store: OutputStore,
}

impl ScoutingEngine {
    pub fn new(config: Config) -> Result<Self> {
        let store = OutputStore::new(&config.output_dir)?;
        Ok(Self {
            config,
            cancel: CancelFlag::new(),
            store,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Ask a running scan or detection pass to stop at its next check.
    pub fn stop(&self) {
        info!("Stop requested");
        self.cancel.cancel();
    }

    /// Scan a video file with ffmpeg and tesseract, saving every located round.
    ///
    /// Regions are rescaled to the video's resolution first.
    pub fn process_video(
        &mut self,
        video: &Path,
        progress: &dyn Fn(f64, &str),
    ) -> Result<Vec<RoundEvent>> {
        let source = FfmpegFrameSource::open(video)?;
        let info = source.info();
        info!(
            "Video: {:?} ({}x{}, {:.2} fps, {:.1}s)",
            video, info.width, info.height, info.fps, info.duration
        );
        self.config.scale_coords(info.width, info.height);

        let oracle = TesseractOracle::new(self.config.ocr_lang.clone());
        self.scan_source(&source, &oracle, progress)
    }

    /// Scan any frame source between the configured start and end times.
    pub fn scan_source(
        &self,
        source: &dyn FrameSource,
        oracle: &dyn TextRecognitionOracle,
        progress: &dyn Fn(f64, &str),
    ) -> Result<Vec<RoundEvent>> {
        let start = self.config.start_time.unwrap_or(0.0);
        let end = self
            .config
            .end_time
            .unwrap_or(f64::INFINITY)
            .min(source.duration());
        info!("Scanning {:.1}s - {:.1}s", start, end);

        let locator = RoundLocator::new(source, oracle, self.config.locator_config())?
            .with_cancel_flag(self.cancel.clone())
            .with_progress(progress);

        let mut state = ScanState::new(start);
        let mut events = Vec::new();
        while let Some(located) = locator.locate_next_round(&mut state, end) {
            self.store.save_round(
                &located.image,
                located.event.round_number,
                located.event.timestamp,
                &self.config.minimap_coords,
                self.config.full_screenshot,
            )?;
            events.push(located.event);
        }

        info!("Scan complete. Detected {} rounds.", events.len());
        Ok(events)
    }

    /// Detect agents on every saved minimap with icons from `agent_icons_dir`.
    pub fn run_agent_detection(&self) -> Result<Vec<PositionRecord>> {
        let detector = AgentDetector::new(self.config.detection_config())?;
        self.run_agent_detection_with(&detector)
    }

    /// Write `round_NN_positions.json` per minimap and `all_positions.json`.
    ///
    /// A minimap that fails to load is skipped; a missing metadata file gives
    /// timestamp 0.
    pub fn run_agent_detection_with(&self, detector: &AgentDetector) -> Result<Vec<PositionRecord>> {
        let minimaps = self.store.minimap_rounds()?;
        info!("Running agent detection on {} minimaps", minimaps.len());

        let mut records = Vec::new();
        for (round, path) in minimaps {
            if self.cancel.is_cancelled() {
                info!("Detection stopped by request before round {}", round);
                break;
            }

            let timestamp = self
                .store
                .load_metadata(round)?
                .map(|m| m.timestamp)
                .unwrap_or(0.0);

            let detections = match detector.detect_from_file(&path) {
                Ok(detections) => detections,
                Err(e) => {
                    warn!("Skipping round {}: {:#}", round, e);
                    continue;
                }
            };

            let record = PositionRecord::from_detections(
                round,
                timestamp,
                OutputStore::minimap_file_name(round),
                &detections,
            );
            self.store.save_positions(&record)?;
            records.push(record);
        }

        self.store.save_all_positions(&records)?;
        Ok(records)
    }

    pub fn load_positions(&self) -> Result<Vec<PositionRecord>> {
        self.store.load_all_positions()
    }

    /// Cluster the selected side(s) and write the analysis file(s).
    pub fn run_clustering(
        &self,
        records: &[PositionRecord],
        method: ClusterMethod,
        threshold: f64,
    ) -> Result<Vec<(Team, Vec<Cluster>)>> {
        let clusterer = FormationClusterer::with_threshold(threshold);
        let mut formations = Vec::new();

        for team in method.teams() {
            let clusters = clusterer.cluster_formations(records, team);
            for cluster in &clusters {
                info!("  {}: rounds {:?}", cluster.name, cluster.rounds);
            }
            self.store
                .save_clusters(&formation_file_name(method, team), &clusters)?;
            formations.push((team, clusters));
        }

        Ok(formations)
    }

    /// Previously written cluster files; a missing file counts as no clusters.
    pub fn load_formations(&self, method: ClusterMethod) -> Result<Vec<(Team, Vec<Cluster>)>> {
        method
            .teams()
            .into_iter()
            .map(|team| -> Result<(Team, Vec<Cluster>)> {
                let clusters = self
                    .store
                    .load_clusters(&formation_file_name(method, team))?
                    .unwrap_or_default();
                Ok((team, clusters))
            })
            .collect()
    }

    /// Write the markdown report, plus the HTML page when requested.
    pub fn generate_report(
        &self,
        records: &[PositionRecord],
        formations: &[(Team, Vec<Cluster>)],
        format: ReportFormat,
        video: Option<&Path>,
    ) -> Result<PathBuf> {
        let generator = ReportGenerator::new();
        let markdown = generator.generate_markdown(records, formations, video);
        let mut path = self.store.write_text(REPORT_FILE, &markdown)?;

        if format == ReportFormat::Html {
            path = self
                .store
                .write_text(HTML_REPORT_FILE, &generator.to_html(&markdown))?;
        }

        info!("Report saved to: {:?}", path);
        Ok(path)
    }
}

pub fn formation_file_name(method: ClusterMethod, team: Team) -> String {
    match method {
        ClusterMethod::Both => format!("formation_analysis_{}.json", team.as_str()),
        _ => FORMATION_FILE.to_string(),
    }
}

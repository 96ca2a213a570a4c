use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use roundscout::config::{parse_roi, parse_timestamp};
use roundscout::logging::{level_for_verbosity, setup_logger};
use roundscout::{ClusterMethod, Config, ReportFormat, ScoutingEngine};
use roundscout_core::Roi;
use roundscout_cv::AgentDetector;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roundscout")]
#[command(about = "Find round starts in match videos and group team formations", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override the output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Tesseract language code
    #[arg(long, global = true)]
    ocr_lang: Option<String>,

    /// Minimap region as x,y,w,h
    #[arg(long, global = true, value_parser = parse_roi)]
    minimap_coords: Option<Roi>,

    /// Minimum correlation for an agent match
    #[arg(long, global = true)]
    detection_threshold: Option<f64>,

    /// Also save the full frame of every round
    #[arg(long, global = true)]
    full_screenshot: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate round starts and save minimaps
    Scan {
        #[arg(long)]
        video: Option<PathBuf>,

        /// Start time (hh:mm:ss, mm:ss or seconds)
        #[arg(long, value_parser = parse_timestamp)]
        start: Option<f64>,

        /// End time (hh:mm:ss, mm:ss or seconds)
        #[arg(long, value_parser = parse_timestamp)]
        end: Option<f64>,
    },

    /// Detect agents on the saved minimaps
    Detect {
        /// Only this minimap image; detections are written next to it as JSON
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Cluster formations from all_positions.json
    Cluster {
        #[arg(long, value_enum)]
        team: Option<ClusterMethod>,

        /// Similarity threshold in [0, 1]
        #[arg(long)]
        similarity: Option<f64>,
    },

    /// Write the scouting report
    Report {
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,

        /// Video name shown in the report header
        #[arg(long)]
        video: Option<PathBuf>,
    },

    /// Scan, detect, cluster and report in one go
    Run {
        #[arg(long)]
        video: Option<PathBuf>,

        #[arg(long, value_parser = parse_timestamp)]
        start: Option<f64>,

        #[arg(long, value_parser = parse_timestamp)]
        end: Option<f64>,

        #[arg(long, value_enum)]
        format: Option<ReportFormat>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from_yaml(&cli.config)?;
    apply_overrides(&cli, &mut config);
    setup_logger(level_for_verbosity(cli.verbose), config.log_file.as_deref())?;
    if cli.config.exists() {
        info!("Loaded config from {:?}", cli.config);
    } else {
        info!("No config at {:?}, using defaults", cli.config);
    }

    match cli.command {
        Commands::Scan { video, start, end } => {
            apply_scan_args(&mut config, video, start, end);
            let video = config.video.clone().context("No video given (--video or config)")?;
            let mut engine = ScoutingEngine::new(config)?;
            let events = engine.process_video(&video, &print_progress)?;
            println!("Detected {} rounds", events.len());
        }
        Commands::Detect { image: Some(image) } => {
            let detector = AgentDetector::new(config.detection_config())?;
            let detections = detector.detect_from_file(&image)?;
            let output = image.with_extension("json");
            detector.export_json(&detections, &output)?;
            println!("{} agents -> {}", detections.len(), output.display());
        }
        Commands::Detect { image: None } => {
            let engine = ScoutingEngine::new(config)?;
            let records = engine.run_agent_detection()?;
            println!("Analyzed {} rounds", records.len());
        }
        Commands::Cluster { team, similarity } => {
            let method = team.unwrap_or(config.cluster_method);
            let threshold = similarity.unwrap_or(config.similarity_threshold);
            let engine = ScoutingEngine::new(config)?;
            let records = engine.load_positions()?;
            let formations = engine.run_clustering(&records, method, threshold)?;
            for (team, clusters) in &formations {
                println!("{}: {} clusters", team.as_str(), clusters.len());
            }
        }
        Commands::Report { format, video } => {
            let format = format.unwrap_or(config.report_format);
            let video = video.or_else(|| config.video.clone());
            let method = config.cluster_method;
            let engine = ScoutingEngine::new(config)?;
            let records = engine.load_positions()?;
            let formations = engine.load_formations(method)?;
            let path = engine.generate_report(&records, &formations, format, video.as_deref())?;
            println!("Report: {}", path.display());
        }
        Commands::Run {
            video,
            start,
            end,
            format,
        } => {
            apply_scan_args(&mut config, video, start, end);
            let video = config.video.clone().context("No video given (--video or config)")?;
            let format = format.unwrap_or(config.report_format);
            let method = config.cluster_method;
            let threshold = config.similarity_threshold;

            let mut engine = ScoutingEngine::new(config)?;
            info!("Step 1/4: locating rounds");
            engine.process_video(&video, &print_progress)?;
            info!("Step 2/4: detecting agents");
            let records = engine.run_agent_detection()?;
            info!("Step 3/4: clustering formations");
            let formations = engine.run_clustering(&records, method, threshold)?;
            info!("Step 4/4: writing report");
            let path = engine.generate_report(&records, &formations, format, Some(video.as_path()))?;
            println!("Report: {}", path.display());
        }
    }

    Ok(())
}

fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(lang) = &cli.ocr_lang {
        config.ocr_lang = lang.clone();
    }
    if let Some(roi) = cli.minimap_coords {
        config.minimap_coords = roi;
    }
    if let Some(threshold) = cli.detection_threshold {
        config.detection_threshold = threshold;
    }
    if cli.full_screenshot {
        config.full_screenshot = true;
    }
}

fn apply_scan_args(config: &mut Config, video: Option<PathBuf>, start: Option<f64>, end: Option<f64>) {
    if video.is_some() {
        config.video = video;
    }
    if start.is_some() {
        config.start_time = start;
    }
    if end.is_some() {
        config.end_time = end;
    }
}

fn print_progress(fraction: f64, message: &str) {
    info!("[{:5.1}%] {}", fraction * 100.0, message);
}

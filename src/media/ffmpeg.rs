//! Random-access frames via `ffprobe` / `ffmpeg`

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use roundscout_core::{Frame, FrameSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub fps: f64,
    pub total_frames: u64,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    /// Frame index shown at `time`, or `None` outside the video.
    pub fn frame_index(&self, time: f64) -> Option<u64> {
        if time.is_nan() || time < 0.0 || self.fps <= 0.0 {
            return None;
        }
        let index = (time * self.fps).floor() as u64;
        (index < self.total_frames).then_some(index)
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -of json` output for the first video stream.
pub fn parse_probe_output(json: &str) -> Result<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_str(json).context("Invalid ffprobe output")?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| anyhow!("no video stream found"))?;

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .ok_or_else(|| anyhow!("missing frame rate"))?;
    let format_duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    let total_frames = match stream.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(n) => n,
        None => match format_duration {
            Some(d) => (d * fps).floor() as u64,
            None => bail!("cannot determine frame count"),
        },
    };

    Ok(VideoInfo {
        fps,
        total_frames,
        duration: total_frames as f64 / fps,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
    })
}

/// `"30000/1001"` or `"25"` to frames per second.
fn parse_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => rate.parse().ok()?,
    };
    (fps > 0.0).then_some(fps)
}

/// Decodes single frames on demand by spawning `ffmpeg`.
pub struct FfmpegFrameSource {
    path: PathBuf,
    info: VideoInfo,
}

impl FfmpegFrameSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            bail!("Video not found: {:?}", path);
        }

        let output = Command::new("ffprobe")
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height,r_frame_rate,nb_frames:format=duration"])
            .args(["-of", "json"])
            .arg(&path)
            .output()
            .context("Failed to run ffprobe")?;

        if !output.status.success() {
            bail!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr));
        }

        let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        info!(
            "Video opened: {}x{}, {:.2} fps, {:.2}s",
            info.width, info.height, info.fps, info.duration
        );
        Ok(Self { path, info })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn decode(&self, index: u64) -> Result<Frame> {
        let timestamp = index as f64 / self.info.fps;
        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss"])
            .arg(format!("{:.3}", timestamp))
            .arg("-i")
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .output()
            .context("Failed to run ffmpeg")?;

        if !output.status.success() || output.stdout.is_empty() {
            bail!("ffmpeg failed: {}", String::from_utf8_lossy(&output.stderr));
        }

        let image = image::load_from_memory(&output.stdout)
            .context("Failed to decode frame")?
            .to_rgb8();

        Ok(Frame {
            index,
            timestamp,
            image,
        })
    }
}

impl FrameSource for FfmpegFrameSource {
    fn frame_at(&self, time: f64) -> Option<Frame> {
        let index = self.info.frame_index(time)?;
        match self.decode(index) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("Frame {} at {:.2}s unavailable: {:#}", index, time, e);
                None
            }
        }
    }

    fn duration(&self) -> f64 {
        self.info.duration
    }
}

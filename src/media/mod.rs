//! Concrete frame source and text recognizer backed by external tools

pub mod ffmpeg;
pub mod tesseract;

pub use ffmpeg::{FfmpegFrameSource, VideoInfo};
pub use tesseract::TesseractOracle;

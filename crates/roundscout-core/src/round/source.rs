//! Capabilities the locator consumes but does not implement.

use super::interpreter::TextToken;
use crate::Result;
use image::RgbImage;

/// One decoded video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    /// Presentation time of `index`, which may differ slightly from the requested time.
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Random access into a finite, already available video.
pub trait FrameSource {
    /// Frame nearest to `time` seconds, or `None` when out of range or undecodable.
    fn frame_at(&self, time: f64) -> Option<Frame>;

    /// Length of the video in seconds.
    fn duration(&self) -> f64;
}

/// Synchronous, stateless text recognizer.
pub trait TextRecognitionOracle {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextToken>>;

    /// Recognize several images in one call. An error covers the whole batch.
    fn recognize_many(&self, images: &[RgbImage]) -> Result<Vec<Vec<TextToken>>> {
        images.iter().map(|image| self.recognize(image)).collect()
    }
}

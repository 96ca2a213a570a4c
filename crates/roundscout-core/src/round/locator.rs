//! Coarse-to-fine search for the instant each round starts.
//!
//! The coarse scan steps through the video until the clock shows 1:30..1:39,
//! which means a round start (1:40) lies at most one step behind the cursor.
//! A binary search over that step then converges on the sample closest to 1:40.

use super::interpreter::{TimerInterpretation, TimerTextInterpreter};
use super::source::{Frame, FrameSource, TextRecognitionOracle};
use super::timer::{TARGET_SCORE, TimerReading, refinement_score};
use crate::error::ScanError;
use crate::region::Roi;
use crate::Result;
use image::RgbImage;
use image::imageops::{self, FilterType};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Locator tuning. The defaults are the contract values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Seconds between coarse samples.
    pub coarse_step: f64,
    /// Seconds the cursor jumps after a refinement, accepted or not.
    pub skip_amount: f64,
    /// Refinement stops once the window is this narrow.
    pub refine_epsilon: f64,
    /// Minimum score for the best refinement sample to count as a round start.
    pub accept_score: i32,
    /// Timer region in frame pixels.
    pub timer_roi: Roi,
    /// Crops narrower or shorter than this are not sent to the recognizer.
    pub min_roi_side: u32,
    /// Timer crops are rescaled to this height before recognition.
    pub ocr_height: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            coarse_step: 5.0,
            skip_amount: 60.0,
            refine_epsilon: 0.1,
            accept_score: 35,
            timer_roi: Roi::new(880, 10, 160, 80),
            min_roi_side: 10,
            ocr_height: 80,
        }
    }
}

/// A located round start. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEvent {
    pub round_number: u32,
    pub timestamp: f64,
    pub frame: u64,
    pub score: i32,
}

/// A round event together with the frame it was read from.
#[derive(Debug, Clone)]
pub struct LocatedRound {
    pub event: RoundEvent,
    pub reading: Option<TimerReading>,
    pub image: RgbImage,
}

/// Scan progress threaded through successive `locate_next_round` calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanState {
    /// Next coarse sample time.
    pub cursor: f64,
    /// Rounds accepted so far; doubles as the fallback round ordinal.
    pub rounds_found: u32,
}

impl ScanState {
    pub fn new(start: f64) -> Self {
        Self {
            cursor: start.max(0.0),
            rounds_found: 0,
        }
    }
}

/// Cooperative cancellation shared between a scan and whoever wants to stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Best sample seen by one refinement.
#[derive(Debug, Clone)]
struct Candidate {
    frame: Frame,
    score: i32,
    reading: Option<TimerReading>,
    round_number: Option<u32>,
}

/// Binary search window plus the best sample seen so far.
#[derive(Debug)]
struct RefineWindow {
    low: f64,
    high: f64,
    best: Option<Candidate>,
}

impl RefineWindow {
    fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            best: None,
        }
    }

    fn width(&self) -> f64 {
        self.high - self.low
    }

    fn best_score(&self) -> i32 {
        self.best.as_ref().map_or(-1, |c| c.score)
    }

    /// Narrow the window around `mid` according to the sample's score.
    ///
    /// At or above 1:40 the start is later, so search right. Between 1:00 and
    /// 1:39 the start is earlier, so search left. Anything unreadable counts as
    /// "before the clock is visible" and also searches right.
    fn observe(&mut self, mid: f64, frame: Frame, interpretation: &TimerInterpretation) {
        let score = refinement_score(interpretation.reading.as_ref());

        let replace = if score >= TARGET_SCORE {
            self.low = mid;
            match &self.best {
                Some(best) => {
                    score > best.score
                        || (score == best.score && frame.timestamp > best.frame.timestamp)
                }
                None => true,
            }
        } else if score > 0 {
            self.high = mid;
            score > self.best_score()
        } else {
            self.low = mid;
            false
        };

        if replace {
            let round_number = interpretation
                .round_number
                .or_else(|| self.best.as_ref().and_then(|b| b.round_number));
            self.best = Some(Candidate {
                frame,
                score,
                reading: interpretation.reading,
                round_number,
            });
        }
    }
}

type ProgressFn<'a> = Box<dyn Fn(f64, &str) + 'a>;

/// Finds round-start instants in one video.
///
/// Holds no per-scan state of its own; every scan threads a [`ScanState`], so a
/// single locator can serve several scans.
pub struct RoundLocator<'a> {
    source: &'a dyn FrameSource,
    oracle: &'a dyn TextRecognitionOracle,
    interpreter: TimerTextInterpreter,
    config: LocatorConfig,
    cancel: CancelFlag,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> RoundLocator<'a> {
    pub fn new(
        source: &'a dyn FrameSource,
        oracle: &'a dyn TextRecognitionOracle,
        config: LocatorConfig,
    ) -> Result<Self> {
        Ok(Self {
            source,
            oracle,
            interpreter: TimerTextInterpreter::new()?,
            config,
            cancel: CancelFlag::new(),
            progress: None,
        })
    }

    /// Share an external cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Receive `(fraction, message)` once per coarse step.
    pub fn with_progress(mut self, progress: impl Fn(f64, &str) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Scan from `start` to `end` and report every accepted round to `on_round`.
    ///
    /// `end` is capped at the video duration.
    pub fn scan<F>(&self, start: f64, end: f64, mut on_round: F) -> Vec<RoundEvent>
    where
        F: FnMut(&LocatedRound),
    {
        let end = end.min(self.source.duration());
        let mut state = ScanState::new(start);
        let mut events = Vec::new();

        while let Some(located) = self.locate_next_round(&mut state, end) {
            on_round(&located);
            events.push(located.event);
        }

        info!("Scan complete. Detected {} rounds.", events.len());
        events
    }

    /// Advance `state` to the next accepted round start before `end_bound`.
    ///
    /// Returns `None` once the cursor passes `end_bound` or the scan is cancelled.
    /// On return `state.cursor` is where the next coarse probe will sample.
    pub fn locate_next_round(&self, state: &mut ScanState, end_bound: f64) -> Option<LocatedRound> {
        let step = self.config.coarse_step;

        while state.cursor < end_bound {
            if self.cancel.is_cancelled() {
                info!("Scan stopped by request at {:.2}s", state.cursor);
                return None;
            }

            if let Some(progress) = &self.progress {
                let fraction = if end_bound > 0.0 { state.cursor / end_bound } else { 1.0 };
                progress(fraction, &format!("Scanning at {:.0}s", state.cursor));
            }

            let Some(frame) = self.source.frame_at(state.cursor) else {
                debug!("{}", ScanError::FrameUnavailable { time: state.cursor });
                state.cursor += step;
                continue;
            };

            let interpretation = self.read_timer(&frame);
            let trigger = interpretation.reading.filter(TimerReading::is_pre_round_window);

            let Some(reading) = trigger else {
                state.cursor += step;
                continue;
            };

            info!(
                "Coarse: {} detected at {:.2}s. Rewinding...",
                reading, frame.timestamp
            );

            let low = (frame.timestamp - step).max(0.0);
            let high = frame.timestamp;
            let refined = self.refine(low, high);
            state.cursor = frame.timestamp + self.config.skip_amount;

            match refined {
                Ok(best) => {
                    state.rounds_found += 1;
                    let round_number = best.round_number.unwrap_or(state.rounds_found);
                    let event = RoundEvent {
                        round_number,
                        timestamp: best.frame.timestamp,
                        frame: best.frame.index,
                        score: best.score,
                    };
                    info!(
                        "Round {} located at {:.2}s ({}, score={})",
                        round_number,
                        event.timestamp,
                        best.reading.map(|r| r.to_string()).unwrap_or_default(),
                        best.score
                    );
                    return Some(LocatedRound {
                        event,
                        reading: best.reading,
                        image: best.frame.image,
                    });
                }
                Err(err) => warn!("Refinement failed near {:.2}s: {}", high, err),
            }
        }

        None
    }

    /// Binary search over `[low, high]` for the sample closest to 1:40.
    ///
    /// Always runs to completion; cancellation is only observed between coarse steps.
    fn refine(&self, low: f64, high: f64) -> std::result::Result<Candidate, ScanError> {
        let mut window = RefineWindow::new(low, high);

        while window.width() > self.config.refine_epsilon {
            let mid = (window.low + window.high) / 2.0;

            let Some(frame) = self.source.frame_at(mid) else {
                debug!("{}", ScanError::FrameUnavailable { time: mid });
                window.low = mid;
                continue;
            };

            let interpretation = self.read_timer(&frame);
            debug!(
                "Refine {:.3}s: {:?} (score={})",
                frame.timestamp,
                interpretation.reading,
                refinement_score(interpretation.reading.as_ref())
            );
            window.observe(mid, frame, &interpretation);
        }

        let best_score = window.best_score();
        match window.best {
            Some(best) if best.score >= self.config.accept_score => Ok(best),
            _ => Err(ScanError::RefinementExhausted {
                low,
                high,
                best_score,
            }),
        }
    }

    /// Interpret the timer region of one frame.
    pub fn read_timer(&self, frame: &Frame) -> TimerInterpretation {
        self.read_timers(std::slice::from_ref(frame))
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Interpret the timer regions of several frames with one recognizer call.
    ///
    /// Degenerate crops and a failed batch both yield empty interpretations; the
    /// output always has one entry per input frame.
    pub fn read_timers(&self, frames: &[Frame]) -> Vec<TimerInterpretation> {
        let mut slots = Vec::with_capacity(frames.len());
        let mut crops = Vec::new();

        for frame in frames {
            match self.crop_timer(&frame.image) {
                Ok(crop) => {
                    slots.push(Some(crops.len()));
                    crops.push(crop);
                }
                Err(err) => {
                    debug!("Skipping timer crop at {:.2}s: {}", frame.timestamp, err);
                    slots.push(None);
                }
            }
        }

        let recognized = if crops.is_empty() {
            Vec::new()
        } else {
            match self.oracle.recognize_many(&crops) {
                Ok(tokens) => tokens,
                Err(e) => {
                    let err = ScanError::OracleFailure {
                        batch: crops.len(),
                        reason: e.to_string(),
                    };
                    warn!("{}", err);
                    Vec::new()
                }
            }
        };

        slots
            .into_iter()
            .map(|slot| {
                slot.and_then(|i| recognized.get(i))
                    .map(|tokens| self.interpreter.interpret(tokens))
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Clamp the timer region to the frame and rescale it for recognition.
    fn crop_timer(&self, image: &RgbImage) -> std::result::Result<RgbImage, ScanError> {
        let (x, y, width, height) = self.config.timer_roi.clamp_to(image.width(), image.height());
        if width <= self.config.min_roi_side || height <= self.config.min_roi_side {
            return Err(ScanError::DegenerateRegion { width, height });
        }

        let crop = imageops::crop_imm(image, x, y, width, height).to_image();
        if height == self.config.ocr_height {
            return Ok(crop);
        }

        let scale = self.config.ocr_height as f64 / height as f64;
        let new_width = ((width as f64 * scale).round() as u32).max(1);
        Ok(imageops::resize(&crop, new_width, self.config.ocr_height, FilterType::Triangle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::interpreter::TextToken;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};

    /// Video whose clock text is a function of time. The source records the last
    /// sampled time so the paired oracle knows what the screen shows.
    struct ScriptedVideo {
        duration: f64,
        last_time: Cell<f64>,
        samples: RefCell<Vec<f64>>,
        script: fn(f64) -> Option<String>,
        fail_oracle: bool,
        /// Extra token shown next to the clock, e.g. a round banner.
        banner: Option<&'static str>,
        crops: RefCell<Vec<(u32, u32)>>,
    }

    impl ScriptedVideo {
        fn new(duration: f64, script: fn(f64) -> Option<String>) -> Self {
            Self {
                duration,
                last_time: Cell::new(0.0),
                samples: RefCell::new(Vec::new()),
                script,
                fail_oracle: false,
                banner: None,
                crops: RefCell::new(Vec::new()),
            }
        }
    }

    impl FrameSource for ScriptedVideo {
        fn frame_at(&self, time: f64) -> Option<Frame> {
            if time < 0.0 || time >= self.duration {
                return None;
            }
            self.last_time.set(time);
            self.samples.borrow_mut().push(time);
            Some(Frame {
                index: (time * 30.0) as u64,
                timestamp: time,
                image: RgbImage::new(32, 32),
            })
        }

        fn duration(&self) -> f64 {
            self.duration
        }
    }

    impl TextRecognitionOracle for ScriptedVideo {
        fn recognize(&self, image: &RgbImage) -> Result<Vec<TextToken>> {
            if self.fail_oracle {
                return Err(anyhow!("recognizer crashed"));
            }
            self.crops.borrow_mut().push(image.dimensions());
            let mut tokens: Vec<TextToken> = (self.script)(self.last_time.get())
                .map(|text| vec![TextToken::new(text, 0.9)])
                .unwrap_or_default();
            tokens.extend(self.banner.map(|b| TextToken::new(b, 0.8)));
            Ok(tokens)
        }
    }

    fn test_config() -> LocatorConfig {
        LocatorConfig {
            timer_roi: Roi::new(0, 0, 20, 20),
            ocr_height: 20,
            ..LocatorConfig::default()
        }
    }

    /// Nothing before 45s; afterwards the clock counts down from 1:39.
    fn countdown_after_45(t: f64) -> Option<String> {
        if t <= 45.0 {
            return None;
        }
        let seconds = 40 - (t - 45.0).ceil() as i64;
        (seconds >= 0).then(|| format!("1:{:02}", seconds))
    }

    /// 1:40 is on screen for [44, 47), then the clock ticks down.
    fn hold_then_countdown(t: f64) -> Option<String> {
        if t < 44.0 {
            None
        } else if t < 47.0 {
            Some("1:40".to_string())
        } else {
            let seconds = 40 - (t - 47.0).ceil() as i64;
            Some(format!("1:{:02}", seconds.max(0)))
        }
    }

    #[test]
    fn test_refinement_accepts_and_skips_ahead() -> Result<()> {
        let video = ScriptedVideo::new(600.0, countdown_after_45);
        let locator = RoundLocator::new(&video, &video, test_config())?;
        let mut state = ScanState::new(0.0);

        let located = locator.locate_next_round(&mut state, 600.0).expect("round located");

        assert!(located.event.score >= 35);
        assert!(located.event.timestamp >= 45.0 && located.event.timestamp <= 50.0);
        assert_eq!(located.event.round_number, 1);
        assert_eq!(state.cursor, 110.0);
        assert_eq!(state.rounds_found, 1);

        // Coarse samples at 0..=50 in 5s steps, then refinement inside [45, 50].
        let samples = video.samples.borrow();
        let coarse: Vec<f64> = samples.iter().copied().take(11).collect();
        assert_eq!(coarse, (0..=10).map(|i| i as f64 * 5.0).collect::<Vec<_>>());
        assert!(samples[11..].iter().all(|t| (45.0..=50.0).contains(t)));
        Ok(())
    }

    #[test]
    fn test_refinement_prefers_latest_full_score() -> Result<()> {
        let video = ScriptedVideo::new(600.0, hold_then_countdown);
        let locator = RoundLocator::new(&video, &video, test_config())?;
        let mut state = ScanState::new(0.0);

        let located = locator.locate_next_round(&mut state, 600.0).expect("round located");

        assert_eq!(located.event.score, 100);
        assert_eq!(located.reading, Some(TimerReading::new(1, 40)));
        assert!(located.event.timestamp > 46.9 && located.event.timestamp < 47.0);
        Ok(())
    }

    #[test]
    fn test_refinement_below_acceptance_is_skipped() -> Result<()> {
        // Only 1:30 and below are ever visible, so every refinement falls short.
        fn late_clock(t: f64) -> Option<String> {
            (t > 45.0).then(|| "1:30".to_string())
        }
        let video = ScriptedVideo::new(120.0, late_clock);
        let locator = RoundLocator::new(&video, &video, test_config())?;
        let mut state = ScanState::new(0.0);

        assert!(locator.locate_next_round(&mut state, 120.0).is_none());
        assert_eq!(state.rounds_found, 0);
        // Each failed refinement still skips ahead by 60s.
        assert!(state.cursor >= 120.0);
        Ok(())
    }

    #[test]
    fn test_missing_frames_advance_cursor() -> Result<()> {
        let video = ScriptedVideo::new(30.0, countdown_after_45);
        let locator = RoundLocator::new(&video, &video, test_config())?;
        let mut state = ScanState::new(0.0);

        // Frames past 30s are absent; the scan must walk off the end, not stop early.
        assert!(locator.locate_next_round(&mut state, 60.0).is_none());
        assert_eq!(state.cursor, 60.0);
        Ok(())
    }

    #[test]
    fn test_oracle_failure_degrades_to_no_reading() -> Result<()> {
        let mut video = ScriptedVideo::new(100.0, countdown_after_45);
        video.fail_oracle = true;
        let locator = RoundLocator::new(&video, &video, test_config())?;

        let events = locator.scan(0.0, 100.0, |_| {});
        assert!(events.is_empty());
        assert_eq!(video.samples.borrow().len(), 20);
        Ok(())
    }

    #[test]
    fn test_cancelled_scan_samples_nothing() -> Result<()> {
        let video = ScriptedVideo::new(600.0, countdown_after_45);
        let cancel = CancelFlag::new();
        let locator =
            RoundLocator::new(&video, &video, test_config())?.with_cancel_flag(cancel.clone());
        cancel.cancel();

        assert!(locator.scan(0.0, 600.0, |_| {}).is_empty());
        assert!(video.samples.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_scan_finds_successive_rounds_in_order() -> Result<()> {
        // Rounds start every 150s; each shows 1:40 for one second then counts down.
        fn periodic(t: f64) -> Option<String> {
            let phase = (t - 20.0).rem_euclid(150.0);
            if t < 20.0 || phase >= 40.0 {
                return None;
            }
            let seconds = if phase < 1.0 { 40 } else { 40 - phase.floor() as i64 };
            Some(format!("1:{:02}", seconds))
        }
        let video = ScriptedVideo::new(500.0, periodic);
        let locator = RoundLocator::new(&video, &video, test_config())?;

        let mut seen = Vec::new();
        let events = locator.scan(0.0, 1000.0, |round| seen.push(round.event.round_number));

        assert_eq!(events.len(), 4);
        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert!(events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        for (i, event) in events.iter().enumerate() {
            let start = 20.0 + 150.0 * i as f64;
            assert!(event.timestamp >= start && event.timestamp < start + 1.0);
            assert_eq!(event.score, 100);
        }
        Ok(())
    }

    #[test]
    fn test_degenerate_timer_region_reads_nothing() -> Result<()> {
        let video = ScriptedVideo::new(100.0, hold_then_countdown);
        let config = LocatorConfig {
            timer_roi: Roi::new(30, 30, 20, 20),
            ..test_config()
        };
        let locator = RoundLocator::new(&video, &video, config)?;
        let frame = video.frame_at(45.0).expect("frame");

        assert_eq!(locator.read_timer(&frame), TimerInterpretation::default());
        Ok(())
    }

    #[test]
    fn test_round_banner_sets_round_number() -> Result<()> {
        let mut video = ScriptedVideo::new(600.0, countdown_after_45);
        video.banner = Some("ROUND 7");
        let locator = RoundLocator::new(&video, &video, test_config())?;
        let mut state = ScanState::new(0.0);

        let located = locator.locate_next_round(&mut state, 600.0).expect("round located");

        assert_eq!(located.event.round_number, 7);
        assert!(located.event.score >= 35);
        assert_eq!(state.rounds_found, 1);
        Ok(())
    }

    #[test]
    fn test_read_timers_mixes_degenerate_and_valid_crops() -> Result<()> {
        let video = ScriptedVideo::new(100.0, countdown_after_45);
        let locator = RoundLocator::new(&video, &video, test_config())?;
        let valid = video.frame_at(50.0).expect("frame");
        let tiny = Frame {
            image: RgbImage::new(8, 8),
            ..valid.clone()
        };

        let readings = locator.read_timers(&[valid.clone(), tiny, valid]);

        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].reading, Some(TimerReading::new(1, 35)));
        assert_eq!(readings[1], TimerInterpretation::default());
        assert_eq!(readings[2].reading, Some(TimerReading::new(1, 35)));
        assert_eq!(*video.crops.borrow(), vec![(20, 20), (20, 20)]);
        Ok(())
    }
}

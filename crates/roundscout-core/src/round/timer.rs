//! Round clock readings and their distance to the round-start instant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Score of a reading that is not a usable buy-phase clock value.
pub const INVALID_SCORE: i32 = -1;

/// Score of a reading exactly at the round-start instant (1:40).
pub const TARGET_SCORE: i32 = 100;

const TARGET_MINUTE: u32 = 1;
const TARGET_SECOND: u32 = 40;

/// A `minutes:seconds` round clock value as read from the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerReading {
    pub minutes: u32,
    pub seconds: u32,
}

impl TimerReading {
    pub const fn new(minutes: u32, seconds: u32) -> Self {
        Self { minutes, seconds }
    }

    /// Only one-minute readings belong to the buy / round-start countdown.
    pub fn is_canonical(&self) -> bool {
        self.minutes == TARGET_MINUTE && self.seconds <= 59
    }

    /// Proximity to 1:40. `1:40 => 100`, `1:41 => 99`, `1:39 => 39`, else `-1`.
    ///
    /// Values at or above 100 mean the clock has not yet ticked below 1:40.
    pub fn score(&self) -> i32 {
        if !self.is_canonical() {
            return INVALID_SCORE;
        }
        let s = self.seconds as i32;
        if self.seconds >= TARGET_SECOND {
            TARGET_SCORE + (TARGET_SECOND as i32 - s)
        } else {
            s
        }
    }

    /// The 1:30..=1:39 band that tells the coarse scan a round start is just behind it.
    pub fn is_pre_round_window(&self) -> bool {
        self.minutes == TARGET_MINUTE && (30..=39).contains(&self.seconds)
    }
}

impl fmt::Display for TimerReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

/// Score of an optional reading; nothing read scores like an invalid token.
pub fn refinement_score(reading: Option<&TimerReading>) -> i32 {
    reading.map_or(INVALID_SCORE, TimerReading::score)
}

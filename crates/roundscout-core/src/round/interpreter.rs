//! Turns recognized text tokens from the timer region into a clock reading.

use super::timer::TimerReading;
use crate::Result;
use crate::error::ScanError;
use log::trace;
use regex::Regex;

/// `m:ss` after normalization. The seconds group takes the first two glyphs and
/// tolerates trailing noise, or a lone glyph at the end of the token.
const TIMER_PATTERN: &str = r"^([0-9OI]+):([0-9OI]{2}[^:]*|[0-9OI])$";

const ROUND_KEYWORD: &str = "ROUND";

/// One recognized text fragment with the recognizer's confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextToken {
    pub text: String,
    pub confidence: f32,
}

impl TextToken {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Result of interpreting the tokens of one timer crop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerInterpretation {
    /// Best canonical reading, `None` when no token parsed as `1:ss`.
    pub reading: Option<TimerReading>,
    /// Confidence of the token behind `reading`, 0 when there is none.
    pub confidence: f32,
    /// Round number from a "ROUND n" banner or a bare integer token.
    pub round_number: Option<u32>,
}

/// Parses OCR tokens into canonical round-clock readings.
#[derive(Debug, Clone)]
pub struct TimerTextInterpreter {
    timer_pattern: Regex,
}

impl TimerTextInterpreter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            timer_pattern: Regex::new(TIMER_PATTERN)?,
        })
    }

    /// Interpret all tokens of one crop.
    ///
    /// Among several valid readings the highest-confidence token wins.
    pub fn interpret(&self, tokens: &[TextToken]) -> TimerInterpretation {
        let mut result = TimerInterpretation::default();

        for token in tokens {
            match self.parse_timer(&token.text) {
                Some(reading) => {
                    if result.reading.is_none() || token.confidence > result.confidence {
                        result.reading = Some(reading);
                        result.confidence = token.confidence;
                    }
                }
                None if token.text.contains(':') || token.text.contains('.') => {
                    trace!("{}", ScanError::InvalidTimerToken(token.text.clone()));
                }
                None => {}
            }
        }

        result.round_number = Self::parse_round_number(tokens);
        result
    }

    /// Parse a single token as a buy-phase clock reading.
    ///
    /// Accepts only `1:ss` with `ss` in `0..=59` once `O`/`I` have been read as
    /// `0`/`1` and `.` as `:`.
    pub fn parse_timer(&self, text: &str) -> Option<TimerReading> {
        let normalized: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '.' { ':' } else { c.to_ascii_uppercase() })
            .collect();

        let caps = self.timer_pattern.captures(&normalized)?;
        let minutes = parse_glyph_digits(&caps[1])?;
        let seconds_text: String = caps[2].chars().take(2).collect();
        let seconds = parse_glyph_digits(&seconds_text)?;

        let reading = TimerReading::new(minutes, seconds);
        reading.is_canonical().then_some(reading)
    }

    /// Round number from "ROUND n" or a bare integer token.
    ///
    /// A keyword match always overrides an earlier bare integer; a bare integer
    /// only fills an empty slot.
    fn parse_round_number(tokens: &[TextToken]) -> Option<u32> {
        let mut round = None;

        for token in tokens {
            let cleaned: String = token
                .text
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_uppercase();

            if cleaned.contains(ROUND_KEYWORD) {
                let digits = cleaned.replace(ROUND_KEYWORD, "");
                if is_all_digits(&digits) {
                    round = digits.parse().ok().or(round);
                }
            } else if round.is_none() && is_all_digits(&cleaned) {
                round = cleaned.parse().ok();
            }
        }

        round
    }
}

fn is_all_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn parse_glyph_digits(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .map(|c| match c {
            'O' => '0',
            'I' => '1',
            other => other,
        })
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> TimerTextInterpreter {
        TimerTextInterpreter::new().unwrap()
    }

    #[test]
    fn test_parse_plain_reading() {
        let it = interpreter();
        assert_eq!(it.parse_timer("1:40"), Some(TimerReading::new(1, 40)));
        assert_eq!(it.parse_timer(" 1 : 05 "), Some(TimerReading::new(1, 5)));
        assert_eq!(it.parse_timer("1:3"), Some(TimerReading::new(1, 3)));
    }

    #[test]
    fn test_parse_rewrites_ambiguous_glyphs() {
        let it = interpreter();
        assert_eq!(it.parse_timer("I:4O"), Some(TimerReading::new(1, 40)));
        assert_eq!(it.parse_timer("i.39"), Some(TimerReading::new(1, 39)));
        assert_eq!(it.parse_timer("1:355"), Some(TimerReading::new(1, 35)));
    }

    #[test]
    fn test_parse_rejects_out_of_domain() {
        let it = interpreter();
        assert_eq!(it.parse_timer("2:10"), None);
        assert_eq!(it.parse_timer("0:45"), None);
        assert_eq!(it.parse_timer("1:75"), None);
        assert_eq!(it.parse_timer("1:3X"), None);
        assert_eq!(it.parse_timer("1:"), None);
        assert_eq!(it.parse_timer("1:30:00"), None);
        assert_eq!(it.parse_timer("ROUND 3"), None);
        assert_eq!(it.parse_timer(""), None);
    }

    #[test]
    fn test_highest_confidence_reading_wins() {
        let tokens = vec![
            TextToken::new("1:38", 0.61),
            TextToken::new("1:36", 0.93),
            TextToken::new("1:39", 0.70),
            TextToken::new("2:00", 0.99),
        ];
        let result = interpreter().interpret(&tokens);
        assert_eq!(result.reading, Some(TimerReading::new(1, 36)));
        assert!((result.confidence - 0.93).abs() < 1e-6);
    }

    #[test]
    fn test_round_number_from_keyword() {
        let tokens = vec![TextToken::new("7", 0.8), TextToken::new("ROUND 12", 0.9)];
        let result = interpreter().interpret(&tokens);
        assert_eq!(result.round_number, Some(12));
        assert_eq!(result.reading, None);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_round_number_from_bare_integer() {
        let tokens = vec![
            TextToken::new("Round", 0.9),
            TextToken::new("4", 0.9),
            TextToken::new("9", 0.9),
            TextToken::new("1:40", 0.9),
        ];
        let result = interpreter().interpret(&tokens);
        assert_eq!(result.round_number, Some(4));
        assert_eq!(result.reading, Some(TimerReading::new(1, 40)));
    }

    #[test]
    fn test_no_tokens() {
        assert_eq!(interpreter().interpret(&[]), TimerInterpretation::default());
    }
}

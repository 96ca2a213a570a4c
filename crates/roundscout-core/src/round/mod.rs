//! Locating round starts in a video from the on-screen round clock.

pub mod interpreter;
pub mod locator;
pub mod source;
pub mod timer;

pub use interpreter::{TextToken, TimerInterpretation, TimerTextInterpreter};
pub use locator::{CancelFlag, LocatedRound, LocatorConfig, RoundEvent, RoundLocator, ScanState};
pub use source::{Frame, FrameSource, TextRecognitionOracle};
pub use timer::{TimerReading, refinement_score};

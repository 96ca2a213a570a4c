//! Round timing, roster records and formation analysis for match video scouting.
//!
//! The crate drives two oracles it does not implement: a random-access
//! [`FrameSource`] and a [`TextRecognitionOracle`]. Everything between them
//! (timer parsing, the coarse-to-fine round search, formation similarity and
//! clustering) lives here.

pub mod error;
pub mod formation;
pub mod positions;
pub mod region;
pub mod round;

pub use error::ScanError;
pub use formation::{Cluster, ClusterConfig, FormationClusterer};
pub use positions::{AgentDetection, AgentPosition, PositionRecord, Team};
pub use region::Roi;
pub use round::{
    CancelFlag, Frame, FrameSource, LocatedRound, LocatorConfig, RoundEvent, RoundLocator,
    ScanState, TextRecognitionOracle, TextToken, TimerInterpretation, TimerReading,
    TimerTextInterpreter,
};

pub type Result<T> = anyhow::Result<T>;

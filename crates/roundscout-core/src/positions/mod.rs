//! Agent detections and the per-round position records built from them.

pub mod record;

pub use record::{AgentDetection, AgentPosition, PositionRecord, Team};

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side an agent icon was classified to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Attack,
    Defend,
    Unknown,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Attack => "attack",
            Team::Defend => "defend",
            Team::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "attack" => Ok(Team::Attack),
            "defend" => Ok(Team::Defend),
            "unknown" => Ok(Team::Unknown),
            other => Err(anyhow::anyhow!("unknown team '{}'", other)),
        }
    }
}

/// One agent found on a map image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDetection {
    pub agent_name: String,
    pub team: Team,
    /// Center x divided by the map width.
    pub normalized_x: f64,
    /// Center y divided by the map height.
    pub normalized_y: f64,
    pub confidence: f64,
    pub pixel_x: i32,
    pub pixel_y: i32,
}

/// Persisted form of one agent position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPosition {
    pub agent: String,
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

/// Positions of both sides at the start of one round.
///
/// Field names are shared with the files written by the output layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub round_num: u32,
    pub timestamp: f64,
    pub attack: Vec<AgentPosition>,
    pub defend: Vec<AgentPosition>,
    pub minimap_file: String,
}

impl PositionRecord {
    /// Split final detections by side, rounding to 4 decimals and sorting by
    /// confidence. Detections of unknown side are left out.
    pub fn from_detections(
        round_num: u32,
        timestamp: f64,
        minimap_file: impl Into<String>,
        detections: &[AgentDetection],
    ) -> Self {
        let mut attack = Vec::new();
        let mut defend = Vec::new();

        for det in detections {
            let position = AgentPosition {
                agent: det.agent_name.clone(),
                x: round4(det.normalized_x),
                y: round4(det.normalized_y),
                confidence: round4(det.confidence),
            };
            match det.team {
                Team::Attack => attack.push(position),
                Team::Defend => defend.push(position),
                Team::Unknown => {}
            }
        }

        attack.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        defend.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        info!(
            "Round {}: Attack={}, Defend={}",
            round_num,
            attack.len(),
            defend.len()
        );

        Self {
            round_num,
            timestamp,
            attack,
            defend,
            minimap_file: minimap_file.into(),
        }
    }

    pub fn team(&self, team: Team) -> &[AgentPosition] {
        match team {
            Team::Attack => &self.attack,
            Team::Defend => &self.defend,
            Team::Unknown => &[],
        }
    }

    /// `(x, y)` pairs of one side in stored order.
    pub fn positions(&self, team: Team) -> Vec<(f64, f64)> {
        self.team(team).iter().map(|p| (p.x, p.y)).collect()
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

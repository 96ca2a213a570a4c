//! Squad constraints: one of each agent per side, at most a full squad per side

use log::debug;
use roundscout_core::{AgentDetection, Team};

#[derive(Debug, Clone)]
pub struct UniquenessFilter {
    max_squad_size: usize,
}

impl Default for UniquenessFilter {
    fn default() -> Self {
        Self::new(5)
    }
}

impl UniquenessFilter {
    pub fn new(max_squad_size: usize) -> Self {
        Self { max_squad_size }
    }

    /// Keep the most confident detection of each `(team, agent)` pair, then the
    /// most confident `max_squad_size` detections of each team.
    ///
    /// Detections whose side could not be classified are dropped. Output is
    /// grouped attack then defend, each sorted by confidence.
    pub fn apply(&self, detections: Vec<AgentDetection>) -> Vec<AgentDetection> {
        let mut unique: Vec<AgentDetection> = Vec::with_capacity(detections.len());

        for det in detections {
            let existing = unique
                .iter_mut()
                .find(|d| d.team == det.team && d.agent_name == det.agent_name);
            match existing {
                Some(kept) => {
                    if det.confidence > kept.confidence {
                        *kept = det;
                    }
                    debug!(
                        "Removed duplicate {} agent {} (kept confidence: {:.3})",
                        kept.team, kept.agent_name, kept.confidence
                    );
                }
                None => unique.push(det),
            }
        }

        let mut result = Vec::new();
        for team in [Team::Attack, Team::Defend] {
            let mut side: Vec<AgentDetection> =
                unique.iter().filter(|d| d.team == team).cloned().collect();
            side.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            side.truncate(self.max_squad_size);
            result.extend(side);
        }
        result
    }
}

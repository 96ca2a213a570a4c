//! Complete-linkage clustering of rounds by formation similarity.

use super::similarity::{Point, centroid, formation_similarity};
use crate::positions::{PositionRecord, Team};
use log::info;
use serde::{Deserialize, Serialize};

/// Clustering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Rounds whose complete-linkage similarity stays at or above this share a cluster.
    pub similarity_threshold: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
        }
    }
}

/// Rounds sharing one formation. Ids run `0..k` by descending size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub rounds: Vec<u32>,
    pub name: String,
}

/// Symmetric round-by-round similarity, diagonal fixed at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    rounds: Vec<u32>,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    /// Similarities of `team` formations across `records`, ordered by round number.
    pub fn build(records: &[PositionRecord], team: Team) -> Self {
        let mut ordered: Vec<&PositionRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.round_num);

        let positions: Vec<Vec<Point>> = ordered.iter().map(|r| r.positions(team)).collect();
        let n = ordered.len();
        let mut values = vec![0.0; n * n];

        for i in 0..n {
            values[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let s = formation_similarity(&positions[i], &positions[j]);
                values[i * n + j] = s;
                values[j * n + i] = s;
            }
        }

        Self {
            rounds: ordered.iter().map(|r| r.round_num).collect(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn rounds(&self) -> &[u32] {
        &self.rounds
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.len() + j]
    }
}

/// Groups rounds of one team into formations and names them.
#[derive(Debug, Clone, Default)]
pub struct FormationClusterer {
    config: ClusterConfig,
}

impl FormationClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn with_threshold(similarity_threshold: f64) -> Self {
        Self::new(ClusterConfig {
            similarity_threshold,
        })
    }

    /// Cluster `records` by `team` formation and name every cluster.
    pub fn cluster_formations(&self, records: &[PositionRecord], team: Team) -> Vec<Cluster> {
        let matrix = SimilarityMatrix::build(records, team);

        let groups = if matrix.len() < 2 {
            vec![matrix.rounds().to_vec()]
        } else {
            let cut = 1.0 - self.config.similarity_threshold;
            let labels = complete_linkage_labels(&matrix, cut);
            group_by_label(matrix.rounds(), &labels)
        };

        let clusters: Vec<Cluster> = groups
            .into_iter()
            .enumerate()
            .map(|(id, rounds)| {
                let name = name_cluster(id, &rounds, records, team);
                Cluster { id, rounds, name }
            })
            .collect();

        info!(
            "Clustered into {} groups using {} team",
            clusters.len(),
            team
        );
        for cluster in &clusters {
            info!("  Cluster {}: {:?}", cluster.id, cluster.rounds);
        }

        clusters
    }
}

/// Flat labels from agglomerative complete-linkage clustering on `1 - similarity`,
/// cut so no merge happens above `cut`.
fn complete_linkage_labels(matrix: &SimilarityMatrix, cut: f64) -> Vec<usize> {
    let n = matrix.len();
    let mut distance: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| 1.0 - matrix.get(i, j)).collect())
        .collect();
    let mut active: Vec<bool> = vec![true; n];
    let mut labels: Vec<usize> = (0..n).collect();

    loop {
        let mut closest: Option<(usize, usize, f64)> = None;
        for i in (0..n).filter(|&i| active[i]) {
            for j in ((i + 1)..n).filter(|&j| active[j]) {
                if closest.is_none_or(|(_, _, d)| distance[i][j] < d) {
                    closest = Some((i, j, distance[i][j]));
                }
            }
        }

        let Some((a, b, d)) = closest else { break };
        if d > cut {
            break;
        }

        // Complete linkage: the merged cluster is as far as its farthest part.
        for k in 0..n {
            let merged = distance[a][k].max(distance[b][k]);
            distance[a][k] = merged;
            distance[k][a] = merged;
        }
        active[b] = false;
        for label in labels.iter_mut() {
            if *label == b {
                *label = a;
            }
        }
    }

    labels
}

/// Rounds grouped by label, largest group first. Equal sizes keep the order in
/// which their first round appears.
fn group_by_label(rounds: &[u32], labels: &[usize]) -> Vec<Vec<u32>> {
    let mut order: Vec<usize> = Vec::new();
    let mut groups: Vec<Vec<u32>> = Vec::new();

    for (&round, &label) in rounds.iter().zip(labels) {
        match order.iter().position(|&l| l == label) {
            Some(idx) => groups[idx].push(round),
            None => {
                order.push(label);
                groups.push(vec![round]);
            }
        }
    }

    groups.sort_by_key(|g| std::cmp::Reverse(g.len()));
    groups
}

/// Descriptive name from where the cluster's formations sit on the map.
///
/// Every member round contributes its centroid; a round where the team has no
/// positions contributes the origin. Without any member rounds the name is
/// `Formation {id}`.
///
/// Averages the centroid of every member round that has positions for `team`.
pub fn name_cluster(id: usize, rounds: &[u32], records: &[PositionRecord], team: Team) -> String {
    let centroids: Vec<Point> = rounds
        .iter()
        .filter_map(|round| records.iter().find(|r| r.round_num == *round))
        .map(|r| centroid(&r.positions(team)))
        .collect();

    if centroids.is_empty() {
        return format!("Formation {}", id);
    }

    let (x, y) = centroid(&centroids);
    let horizontal = if x < 0.4 {
        "Left side"
    } else if x > 0.6 {
        "Right side"
    } else {
        "Mid/Center"
    };
    let vertical = if y < 0.4 {
        " - Top"
    } else if y > 0.6 {
        " - Bottom"
    } else {
        ""
    };

    format!("{}{} setup", horizontal, vertical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::AgentPosition;

    fn record(round_num: u32, attack: &[(f64, f64)]) -> PositionRecord {
        PositionRecord {
            round_num,
            timestamp: round_num as f64 * 100.0,
            attack: attack
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| AgentPosition {
                    agent: format!("agent{}", i),
                    x,
                    y,
                    confidence: 0.9,
                })
                .collect(),
            defend: Vec::new(),
            minimap_file: format!("round_{:02}.png", round_num),
        }
    }

    fn triangle(dx: f64, dy: f64, k: f64) -> Vec<(f64, f64)> {
        [(0.0, 0.0), (0.1, 0.0), (0.05, 0.2)]
            .iter()
            .map(|&(x, y)| (x * k + dx, y * k + dy))
            .collect()
    }

    fn line(dx: f64, dy: f64) -> Vec<(f64, f64)> {
        vec![(dx, dy), (dx + 0.1, dy), (dx + 0.2, dy)]
    }

    #[test]
    fn test_identical_formations_form_one_cluster() {
        let records: Vec<PositionRecord> = (1..=4)
            .map(|i| record(i, &triangle(0.1 * i as f64, 0.05, 1.0 + i as f64 * 0.1)))
            .collect();

        let clusters = FormationClusterer::default().cluster_formations(&records, Team::Attack);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id, 0);
        assert_eq!(clusters[0].rounds, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_clusters_sorted_by_size() {
        let records = vec![
            record(1, &line(0.1, 0.1)),
            record(2, &triangle(0.1, 0.1, 1.0)),
            record(3, &triangle(0.3, 0.2, 2.0)),
            record(4, &line(0.5, 0.5)),
            record(5, &triangle(0.6, 0.6, 0.5)),
        ];

        let clusters = FormationClusterer::with_threshold(0.99).cluster_formations(&records, Team::Attack);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].rounds, vec![2, 3, 5]);
        assert_eq!(clusters[1].rounds, vec![1, 4]);
        assert_eq!(clusters[1].id, 1);
    }

    #[test]
    fn test_size_mismatch_separates_rounds() {
        let records = vec![
            record(1, &triangle(0.1, 0.1, 1.0)),
            record(2, &[(0.2, 0.2), (0.4, 0.4)]),
        ];
        let clusters = FormationClusterer::default().cluster_formations(&records, Team::Attack);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_fewer_than_two_rounds() {
        let single = vec![record(7, &triangle(0.1, 0.1, 1.0))];
        let clusters = FormationClusterer::default().cluster_formations(&single, Team::Attack);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].rounds, vec![7]);

        let none = FormationClusterer::default().cluster_formations(&[], Team::Attack);
        assert_eq!(none.len(), 1);
        assert!(none[0].rounds.is_empty());
        assert_eq!(none[0].name, "Formation 0");
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let records = vec![
            record(3, &line(0.1, 0.1)),
            record(1, &triangle(0.1, 0.1, 1.0)),
            record(2, &triangle(0.4, 0.1, 1.5)),
        ];
        let m = SimilarityMatrix::build(&records, Team::Attack);
        assert_eq!(m.rounds(), &[1, 2, 3]);
        for i in 0..3 {
            assert_eq!(m.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(m.get(i, j), m.get(j, i));
                assert!((0.0..=1.0).contains(&m.get(i, j)));
            }
        }
    }

    #[test]
    fn test_complete_linkage_respects_farthest_member() {
        // A-B and B-C are close, A-C is not: complete linkage keeps A and C apart.
        let m = SimilarityMatrix {
            rounds: vec![1, 2, 3],
            values: vec![1.0, 0.9, 0.5, 0.9, 1.0, 0.85, 0.5, 0.85, 1.0],
        };
        let labels = complete_linkage_labels(&m, 0.2);
        assert_eq!(labels[0], labels[1]);
        assert_ne!(labels[1], labels[2]);
    }

    #[test]
    fn test_cluster_naming() {
        let records = vec![
            record(1, &[(0.1, 0.7), (0.3, 0.9)]),
            record(2, &[(0.15, 0.75), (0.25, 0.85)]),
        ];
        assert_eq!(
            name_cluster(0, &[1, 2], &records, Team::Attack),
            "Left side - Bottom setup"
        );

        let centered = vec![record(1, &[(0.5, 0.5)])];
        assert_eq!(name_cluster(0, &[1], &centered, Team::Attack), "Mid/Center setup");

        let top_right = vec![record(1, &[(0.9, 0.1)])];
        assert_eq!(name_cluster(2, &[1], &top_right, Team::Attack), "Right side - Top setup");

        assert_eq!(name_cluster(4, &[9], &centered, Team::Attack), "Formation 4");
    }

    #[test]
    fn test_empty_rounds_pull_name_toward_origin() {
        let records = vec![record(1, &[(0.9, 0.9)]), record(2, &[])];
        assert_eq!(name_cluster(0, &[1], &records, Team::Attack), "Right side - Bottom setup");
        assert_eq!(name_cluster(0, &[1, 2], &records, Team::Attack), "Mid/Center setup");
        assert_eq!(name_cluster(3, &[1], &records, Team::Defend), "Left side - Top setup");
    }
}

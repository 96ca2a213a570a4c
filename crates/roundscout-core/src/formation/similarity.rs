//! Formation similarity from normalized pairwise distances.

use crate::error::ScanError;
use log::trace;

pub type Point = (f64, f64);

/// Arithmetic mean of `points`; the origin for an empty set.
pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    (sx / n, sy / n)
}

/// Strictly upper triangle of the pairwise distance matrix, row-major, divided
/// by its largest entry. A zero maximum leaves the distances as they are.
fn normalized_distance_vector(points: &[Point]) -> Vec<f64> {
    let (cx, cy) = centroid(points);
    let relative: Vec<Point> = points.iter().map(|&(x, y)| (x - cx, y - cy)).collect();

    let mut distances = Vec::with_capacity(relative.len() * relative.len().saturating_sub(1) / 2);
    for i in 0..relative.len() {
        for j in (i + 1)..relative.len() {
            let dx = relative[i].0 - relative[j].0;
            let dy = relative[i].1 - relative[j].1;
            distances.push((dx * dx + dy * dy).sqrt());
        }
    }

    let max = distances.iter().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for d in &mut distances {
            *d /= max;
        }
    }
    distances
}

/// Similarity in `[0, 1]` between two position sets of one team.
///
/// Invariant to translation and uniform scale. Sets of different sizes, or an
/// empty set, score 0; two single-member sets score 1. When either set has all
/// members stacked on one point the cosine is undefined and the score is 1.
pub fn formation_similarity(a: &[Point], b: &[Point]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let va = normalized_distance_vector(a);
    let vb = normalized_distance_vector(b);

    if va.len() != vb.len() {
        trace!(
            "{}",
            ScanError::IncomparableFormations {
                left: a.len(),
                right: b.len()
            }
        );
        return 0.0;
    }
    if va.is_empty() {
        return 1.0;
    }

    let dot: f64 = va.iter().zip(&vb).map(|(x, y)| x * y).sum();
    let norm_a = va.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = vb.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn diamond() -> Vec<Point> {
        vec![(0.2, 0.3), (0.35, 0.1), (0.5, 0.32), (0.33, 0.55), (0.41, 0.44)]
    }

    #[test]
    fn test_centroid() {
        assert_eq!(centroid(&[]), (0.0, 0.0));
        let (x, y) = centroid(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert!((x - 0.5).abs() < EPS && (y - 0.5).abs() < EPS);
    }

    #[test]
    fn test_self_similarity() {
        let p = diamond();
        assert!((formation_similarity(&p, &p) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_translation_invariance() {
        let p = diamond();
        for (dx, dy) in [(0.3, -0.1), (-0.2, 0.25), (5.0, 5.0)] {
            let moved: Vec<Point> = p.iter().map(|&(x, y)| (x + dx, y + dy)).collect();
            assert!((formation_similarity(&p, &moved) - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn test_scale_invariance() {
        let p = diamond();
        for k in [0.25, 0.5, 2.0, 10.0] {
            let scaled: Vec<Point> = p.iter().map(|&(x, y)| (x * k, y * k)).collect();
            assert!((formation_similarity(&p, &scaled) - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn test_size_mismatch_and_empty() {
        let p = diamond();
        assert_eq!(formation_similarity(&p, &p[..4]), 0.0);
        assert_eq!(formation_similarity(&p, &[]), 0.0);
        assert_eq!(formation_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_single_members_are_identical() {
        assert_eq!(formation_similarity(&[(0.1, 0.9)], &[(0.7, 0.2)]), 1.0);
    }

    #[test]
    fn test_stacked_members() {
        let stacked = vec![(0.5, 0.5), (0.5, 0.5), (0.5, 0.5)];
        let spread = vec![(0.1, 0.1), (0.5, 0.5), (0.9, 0.2)];
        assert_eq!(formation_similarity(&stacked, &stacked), 1.0);
        assert_eq!(formation_similarity(&stacked, &spread), 1.0);
        assert_eq!(formation_similarity(&spread, &stacked), 1.0);
    }

    #[test]
    fn test_different_shapes_score_lower() {
        let line = vec![(0.1, 0.5), (0.3, 0.5), (0.5, 0.5), (0.7, 0.5), (0.9, 0.5)];
        let p = diamond();
        let s = formation_similarity(&line, &p);
        assert!((0.0..1.0).contains(&s));
    }
}

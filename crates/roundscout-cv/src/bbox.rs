//! Bounding boxes and greedy non-maximum suppression
//!
//! Every raw template hit becomes a [`BBox`] carrying the template footprint so
//! overlapping hits of any agent can be suppressed together.

use serde::{Deserialize, Serialize};

/// Template footprint of one raw detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
    pub agent_name: String,
}

impl BBox {
    /// Create a new bounding box from its top-left corner
    pub fn new(x: i32, y: i32, width: i32, height: i32, confidence: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            agent_name: String::new(),
        }
    }

    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = agent_name.into();
        self
    }

    pub fn area(&self) -> f64 {
        (self.width * self.height) as f64
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Calculate intersection over union (IoU) with another box
    pub fn iou(&self, other: &BBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = ((x2 - x1).max(0) * (y2 - y1).max(0)) as f64;
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// True when `other` should be suppressed by this box.
    pub fn overlaps(&self, other: &BBox, threshold: f64) -> bool {
        self.iou(other) >= threshold
    }
}

/// Collection of bounding boxes with batch operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BBoxCollection {
    boxes: Vec<BBox>,
}

impl BBoxCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(boxes: Vec<BBox>) -> Self {
        Self { boxes }
    }

    pub fn push(&mut self, bbox: BBox) {
        self.boxes.push(bbox);
    }

    pub fn extend(&mut self, other: BBoxCollection) {
        self.boxes.extend(other.boxes);
    }

    pub fn as_slice(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Sort by confidence (descending). Equal confidences keep their order.
    pub fn sort_by_confidence(&mut self) {
        self.boxes
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    }

    /// Greedy non-maximum suppression across every agent.
    ///
    /// Keeps the most confident remaining box and drops every other box whose
    /// IoU with it reaches `threshold`, whatever agent either box belongs to.
    pub fn apply_nms(mut self, threshold: f64) -> Self {
        if self.boxes.is_empty() {
            return self;
        }

        self.sort_by_confidence();

        let mut keep = Vec::new();
        let mut suppressed = vec![false; self.boxes.len()];

        for i in 0..self.boxes.len() {
            if suppressed[i] {
                continue;
            }

            keep.push(self.boxes[i].clone());

            for j in (i + 1)..self.boxes.len() {
                if !suppressed[j] && self.boxes[i].overlaps(&self.boxes[j], threshold) {
                    suppressed[j] = true;
                }
            }
        }

        Self::from_vec(keep)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BBox> {
        self.boxes.iter()
    }
}

impl IntoIterator for BBoxCollection {
    type Item = BBox;
    type IntoIter = std::vec::IntoIter<BBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.into_iter()
    }
}

impl FromIterator<BBox> for BBoxCollection {
    fn from_iter<T: IntoIterator<Item = BBox>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

use crate::geometry::Point2D;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative slack below `spacing` before two labels count as overlapping.
pub const OVERLAP_TOLERANCE: f64 = 1e-3;

/// Caller-supplied handle for a label. Never interpreted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub String);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LabelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LabelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<usize> for LabelId {
    fn from(value: usize) -> Self {
        Self(value.to_string())
    }
}

/// A movable annotation point tied to a fixed anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub position: Point2D,
    pub anchor: Point2D,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub category: Option<String>,
}

impl Label {
    pub fn new(id: impl Into<LabelId>, anchor: Point2D, position: Point2D) -> Self {
        Self {
            id: id.into(),
            position,
            anchor,
            z: 0.0,
            category: None,
        }
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = z;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Leader length from anchor to current position.
    pub fn leash(&self) -> f64 {
        self.position.distance(self.anchor)
    }

    pub fn offset(&self) -> Point2D {
        self.position - self.anchor
    }
}

/// Final position of one label, as handed back to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: LabelId,
    pub position: Point2D,
    pub z: f64,
}

impl From<&Label> for Placement {
    fn from(label: &Label) -> Self {
        Self {
            id: label.id.clone(),
            position: label.position,
            z: label.z,
        }
    }
}

pub fn positions(labels: &[Label]) -> Vec<Point2D> {
    labels.iter().map(|l| l.position).collect()
}

/// True when two labels sit closer than `spacing`, allowing for float slack.
pub fn overlaps(a: Point2D, b: Point2D, spacing: f64) -> bool {
    a.distance(b) < spacing * (1.0 - OVERLAP_TOLERANCE)
}

/// Number of label pairs closer than `spacing`.
pub fn clash_count(labels: &[Label], spacing: f64) -> usize {
    let mut count = 0;
    for (i, a) in labels.iter().enumerate() {
        for b in &labels[i + 1..] {
            if overlaps(a.position, b.position, spacing) {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leash_and_offset() {
        let label = Label::new("a", Point2D::new(1.0, 1.0), Point2D::new(4.0, 5.0));
        assert_eq!(label.leash(), 5.0);
        assert_eq!(label.offset(), Point2D::new(3.0, 4.0));
    }

    #[test]
    fn clashes_count_each_pair_once() {
        let labels = vec![
            Label::new("a", Point2D::ZERO, Point2D::new(0.0, 0.0)),
            Label::new("b", Point2D::ZERO, Point2D::new(0.5, 0.0)),
            Label::new("c", Point2D::ZERO, Point2D::new(1.0, 0.0)),
            Label::new("d", Point2D::ZERO, Point2D::new(5.0, 0.0)),
        ];
        assert_eq!(clash_count(&labels, 1.0), 2);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = LabelId::from(42usize);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
    }
}

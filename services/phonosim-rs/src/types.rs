//! Shared data structures for the phonological similarity pipeline.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Value of one feature for one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FeatureValue {
    Zero,
    One,
    /// The feature does not apply; satisfies no constraint, not even a pin to 0
    #[default]
    NotApplicable,
}

impl FeatureValue {
    /// Parse a feature-matrix cell: `0`, `1`, or empty
    pub fn parse(cell: &str) -> Option<Self> {
        match cell.trim() {
            "0" => Some(FeatureValue::Zero),
            "1" => Some(FeatureValue::One),
            "" => Some(FeatureValue::NotApplicable),
            _ => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            FeatureValue::Zero => Some(false),
            FeatureValue::One => Some(true),
            FeatureValue::NotApplicable => None,
        }
    }
}

/// Partial assignment of features to 0/1. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// (feature index, pinned value), ascending by feature index
    pins: Vec<(usize, bool)>,
}

impl FeatureSpec {
    /// Returns `None` for an empty pin list.
    pub fn new(mut pins: Vec<(usize, bool)>) -> Option<Self> {
        if pins.is_empty() {
            return None;
        }
        pins.sort_unstable_by_key(|&(feature, _)| feature);
        pins.dedup_by_key(|&mut (feature, _)| feature);
        Some(Self { pins })
    }

    pub fn pins(&self) -> &[(usize, bool)] {
        &self.pins
    }

    pub fn constraint_count(&self) -> usize {
        self.pins.len()
    }

    /// Render as `[+voice,-son]` using the inventory's feature names
    pub fn render(&self, feature_names: &[String]) -> String {
        let parts: Vec<String> = self
            .pins
            .iter()
            .map(|&(feature, value)| {
                let sign = if value { '+' } else { '-' };
                let name = feature_names
                    .get(feature)
                    .map(String::as_str)
                    .unwrap_or("?");
                format!("{sign}{name}")
            })
            .collect();
        format!("[{}]", parts.join(","))
    }
}

/// Edit operation in sequence alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditOp {
    Match,
    Substitute,
    /// Segment of the first word aligned against the gap
    Delete,
    /// Segment of the second word aligned against the gap
    Insert,
}

/// One column of an alignment. `None` is the gap symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub left: Option<char>,
    pub right: Option<char>,
    pub op: EditOp,
    pub cost: f64,
}

/// Result of a global alignment between two words
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub pairs: Vec<AlignedPair>,
    pub cost: f64,
}

impl Alignment {
    pub fn new(pairs: Vec<AlignedPair>, cost: f64) -> Self {
        Self { pairs, cost }
    }

    /// Sum of per-step costs; equals `cost` up to rounding
    pub fn step_total(&self) -> f64 {
        self.pairs.iter().map(|p| p.cost).sum()
    }

    /// First word as aligned, gaps rendered as `-`
    pub fn left_row(&self) -> String {
        self.pairs.iter().map(|p| p.left.unwrap_or('-')).collect()
    }

    /// Second word as aligned, gaps rendered as `-`
    pub fn right_row(&self) -> String {
        self.pairs.iter().map(|p| p.right.unwrap_or('-')).collect()
    }
}

/// Row of the segment similarity table. An empty segment is the gap symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub segment1: String,
    pub segment2: String,
    pub similarity: OrderedFloat<f64>,
}

impl SimilarityRecord {
    pub fn new(segment1: String, segment2: String, similarity: f64) -> Self {
        Self {
            segment1,
            segment2,
            similarity: OrderedFloat(similarity),
        }
    }
}

/// Row of the word distance table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceRecord {
    pub word1: String,
    pub word2: String,
    pub phon_dist: OrderedFloat<f64>,
}

impl DistanceRecord {
    pub fn new(word1: String, word2: String, phon_dist: f64) -> Self {
        Self {
            word1,
            word2,
            phon_dist: OrderedFloat(phon_dist),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_value() {
        assert_eq!(FeatureValue::parse("0"), Some(FeatureValue::Zero));
        assert_eq!(FeatureValue::parse("1"), Some(FeatureValue::One));
        assert_eq!(FeatureValue::parse(""), Some(FeatureValue::NotApplicable));
        assert_eq!(FeatureValue::parse("+"), None);
        assert_eq!(FeatureValue::NotApplicable.as_bool(), None);
    }

    #[test]
    fn test_spec_render_and_order() {
        let names = vec!["cons".to_string(), "voice".to_string()];
        let spec = FeatureSpec::new(vec![(1, true), (0, false)]).unwrap();
        assert_eq!(spec.render(&names), "[-cons,+voice]");
        assert_eq!(spec.constraint_count(), 2);
        assert!(FeatureSpec::new(vec![]).is_none());
    }

    #[test]
    fn test_alignment_rows_and_json() {
        let alignment = Alignment::new(
            vec![
                AlignedPair { left: Some('a'), right: None, op: EditOp::Delete, cost: 1.0 },
                AlignedPair { left: Some('b'), right: Some('b'), op: EditOp::Match, cost: 0.0 },
            ],
            1.0,
        );
        assert_eq!(alignment.left_row(), "ab");
        assert_eq!(alignment.right_row(), "-b");

        let json = serde_json::to_string(&alignment).unwrap();
        let back: Alignment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alignment);
    }
}

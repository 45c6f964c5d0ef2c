//! Validated segment × feature inventory and its TSV loader.

use std::io::Read;
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result};
use crate::output::open_table;
use crate::pairwise::Alphabet;
use crate::types::FeatureValue;

pub(crate) const SEGMENT_COLUMN: &str = "segment";

/// Segments × features table of ternary values.
///
/// Only constructible through validating constructors, immutable afterwards.
#[derive(Debug, Clone)]
pub struct FeatureInventory {
    segments: Vec<char>,
    features: Vec<String>,
    values: Array2<FeatureValue>,
    index: AHashMap<char, usize>,
}

impl FeatureInventory {
    /// Build from already-parsed parts, checking the table invariants.
    ///
    /// `rows[i]` holds the values of `segments[i]`, one per feature.
    pub fn new(
        segments: Vec<char>,
        features: Vec<String>,
        rows: Vec<Vec<FeatureValue>>,
    ) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::NoFeatures);
        }
        check_unique_features(&features)?;

        let mut index = AHashMap::with_capacity(segments.len());
        for (i, &segment) in segments.iter().enumerate() {
            if index.insert(segment, i).is_some() {
                return Err(Error::DuplicateSegment {
                    segment: segment.to_string(),
                    line: i + 2,
                });
            }
        }

        if rows.len() != segments.len() || rows.iter().any(|r| r.len() != features.len()) {
            return Err(Error::ShapeMismatch {
                segments: segments.len(),
                features: features.len(),
            });
        }

        let shape = (segments.len(), features.len());
        let flat: Vec<FeatureValue> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec(shape, flat).map_err(|_| Error::ShapeMismatch {
            segments: shape.0,
            features: shape.1,
        })?;

        Ok(Self {
            segments,
            features,
            values,
            index,
        })
    }

    /// Load a tab-separated feature matrix from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_reader(open_table(path)?, path)
    }

    /// Parse a tab-separated feature matrix. `source` is used in error messages.
    ///
    /// The header must start with `segment`; every other column is a feature.
    pub fn from_reader<R: Read>(reader: R, source: &Path) -> Result<Self> {
        let mut rdr = tsv_reader(reader);
        let headers = rdr.headers().map_err(|e| Error::csv(source, e))?.clone();

        match headers.get(0) {
            Some(SEGMENT_COLUMN) => {}
            Some(found) => {
                return Err(Error::UnexpectedHeader {
                    path: source.to_path_buf(),
                    expected: SEGMENT_COLUMN.to_string(),
                    found: found.to_string(),
                })
            }
            None => {
                return Err(Error::MissingColumn {
                    path: source.to_path_buf(),
                    column: SEGMENT_COLUMN.to_string(),
                })
            }
        }

        let features: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
        if features.is_empty() {
            return Err(Error::NoFeatures);
        }
        check_unique_features(&features)?;

        let mut segments = Vec::new();
        let mut rows = Vec::new();
        let mut seen = AHashSet::new();

        for result in rdr.records() {
            let record = result.map_err(|e| Error::csv(source, e))?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

            let label = record.get(0).unwrap_or_default();
            let segment = single_char(label).ok_or_else(|| Error::InvalidSegmentLabel {
                label: label.to_string(),
                line,
            })?;
            if !seen.insert(segment) {
                return Err(Error::DuplicateSegment {
                    segment: label.to_string(),
                    line,
                });
            }

            let mut row = Vec::with_capacity(features.len());
            for (feature, cell) in features.iter().zip(record.iter().skip(1)) {
                let value = FeatureValue::parse(cell).ok_or_else(|| Error::InvalidFeatureValue {
                    segment,
                    feature: feature.clone(),
                    value: cell.to_string(),
                    line,
                })?;
                row.push(value);
            }

            segments.push(segment);
            rows.push(row);
        }

        debug!(
            segments = segments.len(),
            features = features.len(),
            source = %source.display(),
            "loaded feature inventory"
        );

        Self::new(segments, features, rows)
    }

    pub fn segments(&self) -> &[char] {
        &self.segments
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn segment_index(&self, segment: char) -> Option<usize> {
        self.index.get(&segment).copied()
    }

    /// Segment labels as a set, for validating words
    pub fn alphabet(&self) -> Alphabet {
        self.segments.iter().copied().collect()
    }

    pub fn contains(&self, segment: char) -> bool {
        self.index.contains_key(&segment)
    }

    pub fn value(&self, segment: usize, feature: usize) -> FeatureValue {
        self.values[[segment, feature]]
    }

    /// True when no cell is `NotApplicable`
    pub fn is_fully_specified(&self) -> bool {
        self.values.iter().all(|v| *v != FeatureValue::NotApplicable)
    }
}

fn check_unique_features(features: &[String]) -> Result<()> {
    let mut seen = AHashSet::with_capacity(features.len());
    for feature in features {
        if !seen.insert(feature.as_str()) {
            return Err(Error::DuplicateFeature {
                feature: feature.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn single_char(label: &str) -> Option<char> {
    let mut chars = label.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Strict tab-separated reader shared by every table loader
pub(crate) fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

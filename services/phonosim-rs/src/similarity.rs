//! Natural-class based segment similarity.
//!
//! similarity(a, b) = shared / (shared + non_shared), where `shared` counts
//! classes containing both segments and `non_shared` counts classes containing
//! exactly one of them. A zero denominator yields 0.0.

use std::io::Read;
use std::path::Path;

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::bitset::BitSet;
use crate::classes::NaturalClassSet;
use crate::error::{Error, Result};
use crate::inventory::{single_char, tsv_reader, FeatureInventory};
use crate::output::{open_table, StagedTable, TableWriter};
use crate::types::SimilarityRecord;

/// Gap symbol as written in similarity tables
pub const GAP: &str = "";

pub const SIMILARITY_HEADER: [&str; 3] = ["segment1", "segment2", "similarity"];

/// Shared / non-shared class counts of a segment pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassCounts {
    pub shared: usize,
    pub non_shared: usize,
}

impl ClassCounts {
    pub fn from_memberships(a: &BitSet, b: &BitSet) -> Self {
        Self {
            shared: a.intersection_count(b),
            non_shared: a.symmetric_difference_count(b),
        }
    }

    pub fn similarity(self) -> f64 {
        let total = self.shared + self.non_shared;
        if total == 0 {
            0.0
        } else {
            self.shared as f64 / total as f64
        }
    }
}

/// Symmetric segment × segment similarity scores
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    segments: Vec<char>,
    values: Array2<f64>,
}

impl SimilarityMatrix {
    pub fn segments(&self) -> &[char] {
        &self.segments
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// `None` when either segment is outside the inventory
    pub fn get(&self, a: char, b: char) -> Option<f64> {
        let i = self.segments.iter().position(|&s| s == a)?;
        let j = self.segments.iter().position(|&s| s == b)?;
        Some(self.values[[i, j]])
    }

    /// Every ordered segment pair, then each segment against the gap, then
    /// gap against gap
    pub fn records(&self) -> Vec<SimilarityRecord> {
        let n = self.segments.len();
        let mut records = Vec::with_capacity(n * n + n + 1);
        for (i, a) in self.segments.iter().enumerate() {
            for (j, b) in self.segments.iter().enumerate() {
                records.push(SimilarityRecord::new(
                    a.to_string(),
                    b.to_string(),
                    self.values[[i, j]],
                ));
            }
        }
        for a in &self.segments {
            records.push(SimilarityRecord::new(a.to_string(), GAP.to_string(), 1.0));
        }
        records.push(SimilarityRecord::new(GAP.to_string(), GAP.to_string(), 1.0));
        records
    }

    /// Write the similarity table as TSV (gzip when the path ends in `.gz`)
    pub fn write_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.stage_tsv(path)?.persist()?;
        info!(path = %path.display(), segments = self.segments.len(), "wrote similarity table");
        Ok(())
    }

    /// Write the table into a temporary file beside `path` without moving it
    /// into place
    pub fn stage_tsv(&self, path: impl AsRef<Path>) -> Result<StagedTable> {
        let mut writer = TableWriter::create(path.as_ref(), &SIMILARITY_HEADER)?;
        for record in self.records() {
            writer.write_row(&[
                record.segment1.as_str(),
                record.segment2.as_str(),
                &record.similarity.0.to_string(),
            ])?;
        }
        writer.stage()
    }
}

/// Similarity of every segment pair of the inventory (upper triangle in
/// parallel, then mirrored). Diagonal entries are 1.0.
pub fn segment_similarity(inventory: &FeatureInventory, classes: &NaturalClassSet) -> SimilarityMatrix {
    let n = inventory.num_segments();
    let memberships = classes.memberships();
    let mut values = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        values[[i, i]] = 1.0;
    }

    let pairs: Vec<_> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect();

    let similarities: Vec<f64> = pairs
        .par_iter()
        .map(|&(i, j)| ClassCounts::from_memberships(&memberships[i], &memberships[j]).similarity())
        .collect();

    for (&(i, j), &sim) in pairs.iter().zip(&similarities) {
        values[[i, j]] = sim;
        values[[j, i]] = sim;
    }

    debug!(segments = n, pairs = pairs.len(), "computed segment similarities");

    SimilarityMatrix {
        segments: inventory.segments().to_vec(),
        values,
    }
}

/// One row of a similarity table read back from disk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityEntry {
    pub segment1: char,
    pub segment2: char,
    pub similarity: f64,
    pub line: usize,
}

/// Read a similarity table. Rows involving the gap symbol are skipped; the
/// gap penalty of the aligner stands in for them.
pub fn read_similarity_table(path: impl AsRef<Path>) -> Result<Vec<SimilarityEntry>> {
    let path = path.as_ref();
    read_similarity_entries(open_table(path)?, path)
}

pub fn read_similarity_entries<R: Read>(reader: R, source: &Path) -> Result<Vec<SimilarityEntry>> {
    let mut rdr = tsv_reader(reader);
    let headers = rdr.headers().map_err(|e| Error::csv(source, e))?.clone();
    let found: Vec<&str> = headers.iter().collect();
    if found != SIMILARITY_HEADER {
        return Err(Error::UnexpectedHeader {
            path: source.to_path_buf(),
            expected: SIMILARITY_HEADER.join("\t"),
            found: found.join("\t"),
        });
    }

    let mut entries = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| Error::csv(source, e))?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let (s1, s2, raw) = (&record[0], &record[1], &record[2]);

        if s1 == GAP || s2 == GAP {
            continue;
        }

        let invalid = || Error::InvalidSimilarity {
            segment1: s1.to_string(),
            segment2: s2.to_string(),
            value: raw.to_string(),
            line,
        };
        let similarity: f64 = raw.parse().map_err(|_| invalid())?;
        if !(0.0..=1.0).contains(&similarity) {
            return Err(invalid());
        }

        let label = |s: &str| {
            single_char(s).ok_or_else(|| Error::InvalidSegmentLabel {
                label: s.to_string(),
                line,
            })
        };
        let segment1 = label(s1)?;
        let segment2 = label(s2)?;
        entries.push(SimilarityEntry {
            segment1,
            segment2,
            similarity,
            line,
        });
    }

    debug!(rows = entries.len(), source = %source.display(), "read similarity table");
    Ok(entries)
}

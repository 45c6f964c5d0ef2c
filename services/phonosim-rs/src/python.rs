//! Python bindings via PyO3, for feeding distance tables straight into the
//! regression step.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::align::{DistanceLookup, NeedlemanWunsch, SegmentDistances};
use crate::config::PipelineConfig;
use crate::error::{Error, WordSource};
use crate::inventory::FeatureInventory;
use crate::pairwise::{check_word, check_word_pair, Alphabet, WordList};
use crate::similarity::read_similarity_table;
use crate::types::Alignment;

impl From<Error> for PyErr {
    fn from(err: Error) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

// ============================================================================
// INVENTORY FUNCTIONS
// ============================================================================

/// Natural classes of a feature matrix as (spec, segments) pairs
#[pyfunction]
fn natural_classes(features_path: &str) -> PyResult<Vec<(String, String)>> {
    let inventory = FeatureInventory::from_path(features_path)?;
    let classes = crate::classes::natural_classes(&inventory)?;
    Ok(classes
        .classes()
        .iter()
        .map(|class| {
            let summary = class.summary(&inventory);
            (summary.spec, summary.segments)
        })
        .collect())
}

/// All ordered segment pairs with their similarity
#[pyfunction]
fn segment_similarity(features_path: &str) -> PyResult<Vec<(String, String, f64)>> {
    let inventory = FeatureInventory::from_path(features_path)?;
    let (_, matrix) = crate::analyze_inventory(&inventory, &PipelineConfig::default())?;
    Ok(matrix
        .records()
        .into_iter()
        .map(|r| (r.segment1, r.segment2, r.similarity.0))
        .collect())
}

// ============================================================================
// PYTHON WRAPPER TYPES
// ============================================================================

#[pyclass]
struct PyAlignment {
    #[pyo3(get)]
    left: String,
    #[pyo3(get)]
    right: String,
    #[pyo3(get)]
    step_costs: Vec<f64>,
    #[pyo3(get)]
    cost: f64,
}

impl From<Alignment> for PyAlignment {
    fn from(alignment: Alignment) -> Self {
        Self {
            left: alignment.left_row(),
            right: alignment.right_row(),
            step_costs: alignment.pairs.iter().map(|p| p.cost).collect(),
            cost: alignment.cost,
        }
    }
}

/// Word distances backed by a segment similarity table
#[pyclass]
struct PhonologicalDistance {
    distances: SegmentDistances,
    alphabet: Alphabet,
    config: PipelineConfig,
}

impl PhonologicalDistance {
    fn word_pair(&self, word1: &str, word2: &str) -> PyResult<(Vec<char>, Vec<char>)> {
        Ok(check_word_pair(word1, word2, &self.alphabet)?)
    }
}

#[pymethods]
impl PhonologicalDistance {
    #[new]
    #[pyo3(signature = (similarity_path, gap_penalty = 1.0, missing_distance = 1.0))]
    fn new(similarity_path: &str, gap_penalty: f64, missing_distance: f64) -> PyResult<Self> {
        let config = PipelineConfig {
            gap_penalty,
            missing_distance,
            threads: None,
        };
        config.validate()?;
        let entries = read_similarity_table(similarity_path)?;
        let distances = SegmentDistances::from_similarity_entries(&entries, missing_distance)?;
        let alphabet = distances.segments();
        Ok(Self {
            distances,
            alphabet,
            config,
        })
    }

    fn segment_distance(&self, a: char, b: char) -> PyResult<f64> {
        for (i, segment) in [a, b].into_iter().enumerate() {
            check_word(&segment.to_string(), &self.alphabet, WordSource::Index(i))?;
        }
        Ok(self.distances.distance(a, b))
    }

    /// Raises `ValueError` for an empty word or an unknown segment
    fn distance(&self, word1: &str, word2: &str) -> PyResult<f64> {
        let (a, b) = self.word_pair(word1, word2)?;
        Ok(NeedlemanWunsch::new(&self.distances, self.config.gap_penalty).distance(&a, &b))
    }

    fn align(&self, word1: &str, word2: &str) -> PyResult<PyAlignment> {
        let (a, b) = self.word_pair(word1, word2)?;
        Ok(NeedlemanWunsch::new(&self.distances, self.config.gap_penalty)
            .align(&a, &b)
            .into())
    }

    /// Symmetric (word1, word2, phon_dist) rows, self-pairs included
    fn distance_table(&self, py: Python<'_>, words: Vec<String>) -> PyResult<Vec<(String, String, f64)>> {
        let list = WordList::new(words, &self.alphabet)?;
        let table = py.allow_threads(|| crate::word_distances(&self.distances, &list, &self.config))?;
        Ok(table
            .records()
            .map(|r| (r.word1, r.word2, r.phon_dist.0))
            .collect())
    }
}

// ============================================================================
// MODULE DEFINITION
// ============================================================================

#[pymodule]
fn phonosim_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(natural_classes, m)?)?;
    m.add_function(wrap_pyfunction!(segment_similarity, m)?)?;

    m.add_class::<PyAlignment>()?;
    m.add_class::<PhonologicalDistance>()?;

    Ok(())
}

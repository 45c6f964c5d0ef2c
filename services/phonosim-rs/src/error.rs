//! Error types for inventory loading, table parsing and pipeline setup.
//!
//! Every variant is an input-validation failure. Once inputs are validated the
//! computation itself cannot fail; a missing segment-pair distance or a
//! zero-denominator similarity are policies, not errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The header lacks a required column.
    #[error("{path}: missing required column `{column}`")]
    MissingColumn { path: PathBuf, column: String },

    /// The header is present but not the one this table kind expects.
    #[error("{path}: expected header `{expected}`, found `{found}`")]
    UnexpectedHeader {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("duplicate segment `{segment}` at line {line}")]
    DuplicateSegment { segment: String, line: usize },

    #[error("duplicate feature `{feature}` in header")]
    DuplicateFeature { feature: String },

    /// Segment labels must be exactly one Unicode scalar value.
    #[error("segment label `{label}` at line {line} is not a single character")]
    InvalidSegmentLabel { label: String, line: usize },

    #[error("invalid value `{value}` for feature `{feature}` of segment `{segment}` at line {line}; expected 0, 1 or empty")]
    InvalidFeatureValue {
        segment: char,
        feature: String,
        value: String,
        line: usize,
    },

    /// Value rows do not match the declared segments and features.
    #[error("feature values must form a {segments} x {features} table")]
    ShapeMismatch { segments: usize, features: usize },

    #[error("feature inventory declares no features")]
    NoFeatures,

    /// 3^F specs must be countable in a u64.
    #[error("{count} features exceed the enumeration ceiling of {max}")]
    TooManyFeatures { count: usize, max: usize },

    #[error("invalid similarity `{value}` for `{segment1}`~`{segment2}` at line {line}; expected a number in [0, 1]")]
    InvalidSimilarity {
        segment1: String,
        segment2: String,
        value: String,
        line: usize,
    },

    /// The same ordered pair appears on two rows with different values.
    #[error("similarity of `{segment1}`~`{segment2}` at line {line} conflicts with line {first_line}")]
    DuplicateSimilarity {
        segment1: char,
        segment2: char,
        first_line: usize,
        line: usize,
    },

    /// Both orderings of a segment pair were given with different values.
    #[error("similarity of `{segment1}`~`{segment2}` is {forward} but the reverse pair is {reverse}")]
    AsymmetricSimilarity {
        segment1: char,
        segment2: char,
        forward: f64,
        reverse: f64,
    },

    #[error("empty lemma at {at}")]
    EmptyWord { at: WordSource },

    #[error("word `{word}` at {at} contains unknown segment `{segment}`")]
    UnknownSegment {
        word: String,
        segment: char,
        at: WordSource,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Where a rejected word came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSource {
    /// Table line, 1-based with the header on line 1
    Line(usize),
    /// 0-based index into an in-memory word sequence
    Index(usize),
}

impl fmt::Display for WordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordSource::Line(line) => write!(f, "line {}", line),
            WordSource::Index(index) => write!(f, "position {}", index),
        }
    }
}

/// A specialized `Result` type for phonosim operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }
}

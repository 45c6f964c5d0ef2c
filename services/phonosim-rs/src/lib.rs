//! Phonosim Core: natural-class segment similarity and phonological word distances.
//!
//! Pipeline:
//! - feature inventory → natural classes (exhaustive feature-spec enumeration)
//! - natural classes → segment similarity (shared / (shared + non-shared))
//! - 1 − similarity → Needleman–Wunsch substitution costs
//! - every word pair aligned once → symmetric word distance table
//!
//! Python bindings are available behind the `python` feature.

pub mod align;
pub mod bitset;
pub mod classes;
pub mod config;
pub mod error;
pub mod inventory;
pub mod output;
pub mod pairwise;
pub mod similarity;
pub mod types;

#[cfg(feature = "python")]
mod python;

pub use align::{DistanceLookup, NeedlemanWunsch, SegmentDistances};
pub use classes::{natural_classes, NaturalClass, NaturalClassGenerator, NaturalClassSet};
pub use config::PipelineConfig;
pub use error::{Error, Result, WordSource};
pub use inventory::FeatureInventory;
pub use pairwise::{PairwiseDistanceBuilder, WordDistanceTable, WordList};
pub use output::{persist_all, StagedTable};
pub use similarity::{segment_similarity, SimilarityMatrix};
pub use types::{AlignedPair, Alignment, EditOp, FeatureSpec, FeatureValue};

use std::path::Path;

use tracing::info;

/// Sizes of the tables written by [`run_pipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub segments: usize,
    pub classes: usize,
    pub words: usize,
}

/// Natural classes and segment similarities of an inventory
pub fn analyze_inventory(
    inventory: &FeatureInventory,
    config: &PipelineConfig,
) -> Result<(NaturalClassSet, SimilarityMatrix)> {
    config.install(|| {
        let classes = natural_classes(inventory)?;
        let matrix = segment_similarity(inventory, &classes);
        Ok((classes, matrix))
    })?
}

/// Word distance table over `words` using the configured gap penalty
pub fn word_distances<L: DistanceLookup + ?Sized>(
    lookup: &L,
    words: &WordList,
    config: &PipelineConfig,
) -> Result<WordDistanceTable> {
    config.validate()?;
    config.install(|| PairwiseDistanceBuilder::new(lookup, config.gap_penalty).build(words))
}

/// Feature matrix and word list to the similarity and word distance tables.
///
/// Both inputs are validated before any computation. Both tables are staged
/// in temporary files and moved into place together, so on any error neither
/// output path is created.
pub fn run_pipeline(
    features: &Path,
    words: &Path,
    similarity_output: &Path,
    distances_output: &Path,
    config: &PipelineConfig,
) -> Result<PipelineSummary> {
    config.validate()?;
    let inventory = FeatureInventory::from_path(features)?;
    let words = WordList::from_path(words, &inventory.alphabet())?;

    let (classes, matrix) = analyze_inventory(&inventory, config)?;
    info!(classes = classes.len(), "segment similarity ready");

    let distances = SegmentDistances::from_similarity_matrix(&matrix, config.missing_distance);
    let table = word_distances(&distances, &words, config)?;

    let staged = vec![
        matrix.stage_tsv(similarity_output)?,
        table.stage_tsv(distances_output)?,
    ];
    persist_all(staged)?;
    info!(
        similarity = %similarity_output.display(),
        distances = %distances_output.display(),
        "wrote similarity and distance tables"
    );

    Ok(PipelineSummary {
        segments: inventory.num_segments(),
        classes: classes.len(),
        words: words.len(),
    })
}

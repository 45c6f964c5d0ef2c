//! Natural class generation.
//!
//! Every non-empty feature specification (each feature omitted, pinned to 0,
//! or pinned to 1) is enumerated and evaluated against the inventory. Specs
//! with an empty extension are dropped, then only the minimal-constraint
//! specs of each distinct extension are retained.
//!
//! Enumeration is exponential: 3^F − 1 specs for F features. Generation fails
//! above [`MAX_FEATURES`] rather than overflowing the spec index.

use ahash::AHashMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::bitset::BitSet;
use crate::error::{Error, Result};
use crate::inventory::FeatureInventory;
use crate::types::{FeatureSpec, FeatureValue};

/// Largest F for which 3^F fits in a u64
pub const MAX_FEATURES: usize = 40;

/// A feature specification together with the segments it picks out
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalClass {
    pub spec: FeatureSpec,
    pub extension: BitSet,
}

impl NaturalClass {
    pub fn constraint_count(&self) -> usize {
        self.spec.constraint_count()
    }

    pub fn contains(&self, segment: usize) -> bool {
        self.extension.contains(segment)
    }

    /// Extension as segment labels, in inventory order
    pub fn segments(&self, inventory: &FeatureInventory) -> Vec<char> {
        self.extension
            .ones()
            .map(|i| inventory.segments()[i])
            .collect()
    }

    pub fn summary(&self, inventory: &FeatureInventory) -> ClassSummary {
        ClassSummary {
            spec: self.spec.render(inventory.features()),
            constraints: self.constraint_count(),
            segments: self.segments(inventory).into_iter().collect(),
        }
    }
}

/// Serializable view of a class for dumps
#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub spec: String,
    pub constraints: usize,
    pub segments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationStats {
    /// 3^F − 1
    pub raw_specs: u64,
    /// Specs with a non-empty extension
    pub non_empty: usize,
    /// Classes left after redundancy elimination
    pub retained: usize,
}

/// Retained natural classes of one inventory
#[derive(Debug, Clone)]
pub struct NaturalClassSet {
    classes: Vec<NaturalClass>,
    num_segments: usize,
    stats: GenerationStats,
}

impl NaturalClassSet {
    pub fn classes(&self) -> &[NaturalClass] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    pub fn stats(&self) -> GenerationStats {
        self.stats
    }

    /// For each segment, the set of class indices whose extension contains it
    pub fn memberships(&self) -> Vec<BitSet> {
        let mut memberships = vec![BitSet::new(self.classes.len()); self.num_segments];
        for (class_idx, class) in self.classes.iter().enumerate() {
            for segment in class.extension.ones() {
                memberships[segment].insert(class_idx);
            }
        }
        memberships
    }
}

/// Enumerates feature specs over an inventory
pub struct NaturalClassGenerator<'a> {
    inventory: &'a FeatureInventory,
    /// Segments whose value is 0 for each feature
    zeros: Vec<BitSet>,
    /// Segments whose value is 1 for each feature
    ones: Vec<BitSet>,
}

impl<'a> NaturalClassGenerator<'a> {
    pub fn new(inventory: &'a FeatureInventory) -> Result<Self> {
        let f = inventory.num_features();
        if f > MAX_FEATURES {
            return Err(Error::TooManyFeatures {
                count: f,
                max: MAX_FEATURES,
            });
        }

        let n = inventory.num_segments();
        let mut zeros = vec![BitSet::new(n); f];
        let mut ones = vec![BitSet::new(n); f];
        for segment in 0..n {
            for feature in 0..f {
                match inventory.value(segment, feature) {
                    FeatureValue::Zero => zeros[feature].insert(segment),
                    FeatureValue::One => ones[feature].insert(segment),
                    FeatureValue::NotApplicable => {}
                }
            }
        }

        Ok(Self {
            inventory,
            zeros,
            ones,
        })
    }

    /// 3^F − 1
    pub fn raw_spec_count(&self) -> u64 {
        3u64.pow(self.inventory.num_features() as u32) - 1
    }

    /// Decode spec number `code` (1 ≤ code < 3^F). Base-3 digit per feature:
    /// 0 omits it, 1 pins it to 0, 2 pins it to 1.
    pub fn spec_for(&self, mut code: u64) -> Option<FeatureSpec> {
        let mut pins = Vec::new();
        for feature in 0..self.inventory.num_features() {
            match code % 3 {
                1 => pins.push((feature, false)),
                2 => pins.push((feature, true)),
                _ => {}
            }
            code /= 3;
        }
        FeatureSpec::new(pins)
    }

    /// Segments satisfying every pin of `spec`
    pub fn extension(&self, spec: &FeatureSpec) -> BitSet {
        let mut extension = BitSet::full(self.inventory.num_segments());
        for &(feature, value) in spec.pins() {
            let matching = if value {
                &self.ones[feature]
            } else {
                &self.zeros[feature]
            };
            extension.intersect_with(matching);
            if extension.is_empty() {
                break;
            }
        }
        extension
    }

    /// Every spec with a non-empty extension, in enumeration order
    pub fn enumerate(&self) -> Vec<NaturalClass> {
        (1..=self.raw_spec_count())
            .into_par_iter()
            .filter_map(|code| {
                let spec = self.spec_for(code)?;
                let extension = self.extension(&spec);
                (!extension.is_empty()).then_some(NaturalClass { spec, extension })
            })
            .collect()
    }

    /// Enumerate, then drop redundant classes
    pub fn generate(&self) -> NaturalClassSet {
        let raw_specs = self.raw_spec_count();
        let candidates = self.enumerate();
        let non_empty = candidates.len();
        debug!(raw_specs, non_empty, "evaluated feature specs");

        let classes = eliminate_redundant(candidates);
        let stats = GenerationStats {
            raw_specs,
            non_empty,
            retained: classes.len(),
        };
        info!(
            segments = self.inventory.num_segments(),
            features = self.inventory.num_features(),
            retained = stats.retained,
            "generated natural classes"
        );

        NaturalClassSet {
            classes,
            num_segments: self.inventory.num_segments(),
            stats,
        }
    }
}

/// Keep, for every distinct extension, only the classes with the fewest
/// constraints. Relative order of the survivors is preserved, so applying it
/// to its own output is a no-op.
pub fn eliminate_redundant(classes: Vec<NaturalClass>) -> Vec<NaturalClass> {
    let mut minimal: AHashMap<&BitSet, usize> = AHashMap::new();
    for class in &classes {
        minimal
            .entry(&class.extension)
            .and_modify(|m| *m = (*m).min(class.constraint_count()))
            .or_insert(class.constraint_count());
    }

    let keep: Vec<bool> = classes
        .iter()
        .map(|c| minimal.get(&c.extension).copied() == Some(c.constraint_count()))
        .collect();

    classes
        .into_iter()
        .zip(keep)
        .filter_map(|(class, keep)| keep.then_some(class))
        .collect()
}

/// Generate the natural classes of an inventory
pub fn natural_classes(inventory: &FeatureInventory) -> Result<NaturalClassSet> {
    Ok(NaturalClassGenerator::new(inventory)?.generate())
}

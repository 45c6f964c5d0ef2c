//! Needleman–Wunsch global alignment over segment sequences.
//!
//! Substitution costs come from a [`DistanceLookup`]; insertions and
//! deletions cost a fixed gap penalty. The total cost of the optimal
//! alignment is the phonological distance between two words.

use ahash::AHashMap;
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::pairwise::Alphabet;
use crate::similarity::{SimilarityEntry, SimilarityMatrix};
use crate::types::{AlignedPair, Alignment, EditOp};

pub const DEFAULT_GAP_PENALTY: f64 = 1.0;

/// Distance used for segment pairs absent from the lookup: fully dissimilar
pub const MISSING_DISTANCE: f64 = 1.0;

/// Substitution cost between two segments
pub trait DistanceLookup: Sync {
    fn distance(&self, a: char, b: char) -> f64;
}

/// Segment-pair distances (1 − similarity), symmetric by construction
#[derive(Debug, Clone)]
pub struct SegmentDistances {
    distances: AHashMap<(char, char), f64>,
    missing: f64,
}

impl SegmentDistances {
    pub fn new(missing: f64) -> Self {
        Self {
            distances: AHashMap::new(),
            missing,
        }
    }

    /// Record `distance` for both orderings of the pair
    pub fn insert_symmetric(&mut self, a: char, b: char, distance: f64) {
        self.distances.insert((a, b), distance);
        self.distances.insert((b, a), distance);
    }

    pub fn from_similarity_matrix(matrix: &SimilarityMatrix, missing: f64) -> Self {
        let mut lookup = Self::new(missing);
        let segments = matrix.segments();
        for (i, &a) in segments.iter().enumerate() {
            for (j, &b) in segments.iter().enumerate().skip(i) {
                lookup.insert_symmetric(a, b, 1.0 - matrix.values()[[i, j]]);
            }
        }
        lookup
    }

    /// Build from similarity table rows. A pair given in one ordering only is
    /// mirrored; a pair given in both orderings must agree, and a repeated
    /// row must repeat its value.
    pub fn from_similarity_entries(entries: &[SimilarityEntry], missing: f64) -> Result<Self> {
        let mut rows: AHashMap<(char, char), (f64, usize)> = AHashMap::new();
        for entry in entries {
            let (a, b) = (entry.segment1, entry.segment2);
            if let Some(&(previous, first_line)) = rows.get(&(a, b)) {
                if !approx_eq(previous, entry.similarity) {
                    return Err(Error::DuplicateSimilarity {
                        segment1: a,
                        segment2: b,
                        first_line,
                        line: entry.line,
                    });
                }
                continue;
            }
            if let Some(&(reverse, _)) = rows.get(&(b, a)) {
                if !approx_eq(reverse, entry.similarity) {
                    return Err(Error::AsymmetricSimilarity {
                        segment1: a,
                        segment2: b,
                        forward: entry.similarity,
                        reverse,
                    });
                }
            }
            rows.insert((a, b), (entry.similarity, entry.line));
        }

        let mut lookup = Self::new(missing);
        for ((a, b), (similarity, _)) in rows {
            lookup.insert_symmetric(a, b, 1.0 - similarity);
        }
        Ok(lookup)
    }

    /// Explicitly stored distance, if any
    pub fn get(&self, a: char, b: char) -> Option<f64> {
        self.distances.get(&(a, b)).copied()
    }

    pub fn missing_distance(&self) -> f64 {
        self.missing
    }

    /// Every segment that appears in at least one stored pair
    pub fn segments(&self) -> Alphabet {
        self.distances.keys().flat_map(|&(a, b)| [a, b]).collect()
    }

    /// Number of stored ordered pairs
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

impl DistanceLookup for SegmentDistances {
    fn distance(&self, a: char, b: char) -> f64 {
        self.get(a, b).unwrap_or(self.missing)
    }
}

/// Float comparison for traceback: relative tolerance 1e-9, absolute near zero
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

/// Global aligner parameterised by a distance lookup and a gap penalty
pub struct NeedlemanWunsch<'a, L: DistanceLookup + ?Sized> {
    lookup: &'a L,
    gap_penalty: f64,
}

impl<'a, L: DistanceLookup + ?Sized> NeedlemanWunsch<'a, L> {
    pub fn new(lookup: &'a L, gap_penalty: f64) -> Self {
        Self {
            lookup,
            gap_penalty,
        }
    }

    pub fn gap_penalty(&self) -> f64 {
        self.gap_penalty
    }

    /// Full (n+1)×(m+1) cost table
    pub fn cost_table(&self, a: &[char], b: &[char]) -> Array2<f64> {
        let len_a = a.len();
        let len_b = b.len();
        let mut cost = Array2::<f64>::zeros((len_a + 1, len_b + 1));

        for i in 0..=len_a {
            cost[[i, 0]] = i as f64 * self.gap_penalty;
        }
        for j in 0..=len_b {
            cost[[0, j]] = j as f64 * self.gap_penalty;
        }

        for i in 1..=len_a {
            for j in 1..=len_b {
                let subst = cost[[i - 1, j - 1]] + self.lookup.distance(a[i - 1], b[j - 1]);
                let delete = cost[[i - 1, j]] + self.gap_penalty;
                let insert = cost[[i, j - 1]] + self.gap_penalty;
                cost[[i, j]] = subst.min(delete).min(insert);
            }
        }

        cost
    }

    /// Total alignment cost only, keeping two rows of the table
    pub fn distance(&self, a: &[char], b: &[char]) -> f64 {
        let len_b = b.len();
        let mut prev_row: Vec<f64> = (0..=len_b).map(|j| j as f64 * self.gap_penalty).collect();
        let mut curr_row = vec![0.0; len_b + 1];

        for (i, &seg_a) in a.iter().enumerate() {
            curr_row[0] = (i + 1) as f64 * self.gap_penalty;

            for (j, &seg_b) in b.iter().enumerate() {
                let subst = prev_row[j] + self.lookup.distance(seg_a, seg_b);
                let delete = prev_row[j + 1] + self.gap_penalty;
                let insert = curr_row[j] + self.gap_penalty;
                curr_row[j + 1] = subst.min(delete).min(insert);
            }

            std::mem::swap(&mut prev_row, &mut curr_row);
        }

        prev_row[len_b]
    }

    /// Optimal alignment with traceback.
    ///
    /// When several predecessors reach the minimum, the diagonal move wins,
    /// then the vertical (delete) move, then the horizontal (insert) move.
    pub fn align(&self, a: &[char], b: &[char]) -> Alignment {
        let cost = self.cost_table(a, b);
        let mut i = a.len();
        let mut j = b.len();
        let mut pairs = Vec::with_capacity(a.len() + b.len());

        while i > 0 || j > 0 {
            if i == 0 {
                pairs.push(self.insertion(b[j - 1]));
                j -= 1;
            } else if j == 0 {
                pairs.push(self.deletion(a[i - 1]));
                i -= 1;
            } else {
                let current = cost[[i, j]];
                let subst_cost = self.lookup.distance(a[i - 1], b[j - 1]);

                if approx_eq(current, cost[[i - 1, j - 1]] + subst_cost) {
                    let op = if a[i - 1] == b[j - 1] {
                        EditOp::Match
                    } else {
                        EditOp::Substitute
                    };
                    pairs.push(AlignedPair {
                        left: Some(a[i - 1]),
                        right: Some(b[j - 1]),
                        op,
                        cost: subst_cost,
                    });
                    i -= 1;
                    j -= 1;
                } else if approx_eq(current, cost[[i - 1, j]] + self.gap_penalty) {
                    pairs.push(self.deletion(a[i - 1]));
                    i -= 1;
                } else {
                    pairs.push(self.insertion(b[j - 1]));
                    j -= 1;
                }
            }
        }

        // Backtracked from the end
        pairs.reverse();

        Alignment::new(pairs, cost[[a.len(), b.len()]])
    }

    fn deletion(&self, segment: char) -> AlignedPair {
        AlignedPair {
            left: Some(segment),
            right: None,
            op: EditOp::Delete,
            cost: self.gap_penalty,
        }
    }

    fn insertion(&self, segment: char) -> AlignedPair {
        AlignedPair {
            left: None,
            right: Some(segment),
            op: EditOp::Insert,
            cost: self.gap_penalty,
        }
    }
}

/// Split a word into its segments
pub fn segments_of(word: &str) -> Vec<char> {
    word.chars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> SegmentDistances {
        let mut d = SegmentDistances::new(MISSING_DISTANCE);
        for s in ['p', 'b', 't', 'd', 'a'] {
            d.insert_symmetric(s, s, 0.0);
        }
        d.insert_symmetric('p', 'b', 1.0 - 0.714);
        d.insert_symmetric('t', 'd', 1.0 - 0.714);
        d
    }

    fn w(s: &str) -> Vec<char> {
        segments_of(s)
    }

    #[test]
    fn test_golden_pata_bada() {
        let d = lookup();
        let nw = NeedlemanWunsch::new(&d, DEFAULT_GAP_PENALTY);
        let dist = nw.distance(&w("pata"), &w("bada"));
        assert!((dist - 0.572).abs() < 1e-9);
        assert_eq!(nw.distance(&w("pata"), &w("pata")), 0.0);
    }

    #[test]
    fn test_align_matches_distance() {
        let d = lookup();
        let nw = NeedlemanWunsch::new(&d, DEFAULT_GAP_PENALTY);
        let alignment = nw.align(&w("pata"), &w("bada"));
        assert!(approx_eq(alignment.cost, nw.distance(&w("pata"), &w("bada"))));
        assert!(approx_eq(alignment.step_total(), alignment.cost));
        assert_eq!(alignment.left_row(), "pata");
        assert_eq!(alignment.right_row(), "bada");
        assert_eq!(alignment.pairs[0].op, EditOp::Substitute);
        assert_eq!(alignment.pairs[1].op, EditOp::Match);
    }

    #[test]
    fn test_empty_word() {
        let d = lookup();
        let nw = NeedlemanWunsch::new(&d, 0.5);
        assert_eq!(nw.distance(&w("pata"), &[]), 2.0);
        assert_eq!(nw.distance(&[], &w("pat")), 1.5);
        assert_eq!(nw.distance(&[], &[]), 0.0);

        let alignment = nw.align(&w("pa"), &[]);
        assert_eq!(alignment.cost, 1.0);
        assert!(alignment.pairs.iter().all(|p| p.op == EditOp::Delete && p.right.is_none()));

        let alignment = nw.align(&[], &w("pa"));
        assert!(alignment.pairs.iter().all(|p| p.op == EditOp::Insert && p.left.is_none()));
        assert_eq!(alignment.right_row(), "pa");
    }

    #[test]
    fn test_missing_pair_is_fully_dissimilar() {
        let d = SegmentDistances::new(MISSING_DISTANCE);
        assert_eq!(d.distance('x', 'y'), 1.0);
        // Unlisted self-pairs fall back to the same default
        assert_eq!(d.distance('x', 'x'), 1.0);

        let nw = NeedlemanWunsch::new(&d, DEFAULT_GAP_PENALTY);
        assert_eq!(nw.distance(&w("x"), &w("y")), 1.0);
    }

    #[test]
    fn test_tie_prefers_substitution() {
        // Substitution costs exactly one deletion plus one insertion
        let d = SegmentDistances::new(2.0);
        let nw = NeedlemanWunsch::new(&d, DEFAULT_GAP_PENALTY);
        let alignment = nw.align(&w("p"), &w("b"));
        assert_eq!(alignment.cost, 2.0);
        assert_eq!(alignment.pairs.len(), 1);
        assert_eq!(alignment.pairs[0].op, EditOp::Substitute);
    }

    #[test]
    fn test_tie_prefers_deletion_over_insertion() {
        // "ab" vs "ba" with prohibitive substitutions: every optimal path is
        // made of gaps, and traceback takes the vertical move first.
        let mut d = SegmentDistances::new(5.0);
        d.insert_symmetric('a', 'a', 0.0);
        d.insert_symmetric('b', 'b', 0.0);
        let nw = NeedlemanWunsch::new(&d, DEFAULT_GAP_PENALTY);
        let alignment = nw.align(&w("ab"), &w("ba"));
        assert_eq!(alignment.cost, 2.0);
        assert_eq!(alignment.left_row(), "-ab");
        assert_eq!(alignment.right_row(), "ba-");
        assert_eq!(
            alignment.pairs.iter().map(|p| p.op).collect::<Vec<_>>(),
            vec![EditOp::Insert, EditOp::Match, EditOp::Delete]
        );
    }

    #[test]
    fn test_from_entries_symmetrizes() {
        let entries = vec![SimilarityEntry {
            segment1: 'p',
            segment2: 'b',
            similarity: 0.75,
            line: 2,
        }];
        let d = SegmentDistances::from_similarity_entries(&entries, MISSING_DISTANCE).unwrap();
        assert_eq!(d.get('p', 'b'), Some(0.25));
        assert_eq!(d.get('b', 'p'), Some(0.25));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn test_from_entries_rejects_conflict() {
        let entries = vec![
            SimilarityEntry {
                segment1: 'p',
                segment2: 'b',
                similarity: 0.75,
                line: 2,
            },
            SimilarityEntry {
                segment1: 'b',
                segment2: 'p',
                similarity: 0.5,
                line: 3,
            },
        ];
        let err = SegmentDistances::from_similarity_entries(&entries, MISSING_DISTANCE).unwrap_err();
        assert!(matches!(err, Error::AsymmetricSimilarity { segment1: 'b', segment2: 'p', .. }));
    }

    #[test]
    fn test_from_entries_repeated_row() {
        let entry = |similarity, line| SimilarityEntry {
            segment1: 'p',
            segment2: 'b',
            similarity,
            line,
        };

        let d = SegmentDistances::from_similarity_entries(&[entry(0.75, 2), entry(0.75, 5)], MISSING_DISTANCE)
            .unwrap();
        assert_eq!(d.get('b', 'p'), Some(0.25));

        let err = SegmentDistances::from_similarity_entries(&[entry(0.75, 2), entry(0.5, 5)], MISSING_DISTANCE)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateSimilarity { segment1: 'p', segment2: 'b', first_line: 2, line: 5 }
        ));
    }
}

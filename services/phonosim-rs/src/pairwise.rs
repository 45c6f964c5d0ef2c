//! Word lists and the pairwise word distance table.

use std::io::Read;
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::align::{segments_of, DistanceLookup, NeedlemanWunsch};
use crate::error::{Error, Result, WordSource};
use crate::inventory::tsv_reader;
use crate::output::{open_table, StagedTable, TableWriter};
use crate::types::DistanceRecord;

pub const LEMMA_COLUMN: &str = "lemma";

pub const DISTANCE_HEADER: [&str; 3] = ["word1", "word2", "phon_dist"];

/// Segments a word may be built from
pub type Alphabet = AHashSet<char>;

/// Deduplicated words, each validated against a segment alphabet
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: Vec<String>,
    segments: Vec<Vec<char>>,
}

impl WordList {
    /// Build from in-memory words. Duplicates are dropped, keeping the first
    /// occurrence. Errors report the 0-based position of the offending word.
    pub fn new<I, S>(words: I, alphabet: &Alphabet) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        let mut seen = AHashSet::new();
        for (idx, word) in words.into_iter().enumerate() {
            list.push(word.into(), WordSource::Index(idx), alphabet, &mut seen)?;
        }
        Ok(list)
    }

    pub fn from_path(path: impl AsRef<Path>, alphabet: &Alphabet) -> Result<Self> {
        let path = path.as_ref();
        Self::from_reader(open_table(path)?, path, alphabet)
    }

    /// Parse a single-column `lemma` table
    pub fn from_reader<R: Read>(reader: R, source: &Path, alphabet: &Alphabet) -> Result<Self> {
        let mut rdr = tsv_reader(reader);
        let headers = rdr.headers().map_err(|e| Error::csv(source, e))?.clone();
        let found: Vec<&str> = headers.iter().collect();
        if found != [LEMMA_COLUMN] {
            return Err(Error::UnexpectedHeader {
                path: source.to_path_buf(),
                expected: LEMMA_COLUMN.to_string(),
                found: found.join("\t"),
            });
        }

        let mut list = Self::default();
        let mut seen = AHashSet::new();
        let mut rows = 0usize;
        for result in rdr.records() {
            let record = result.map_err(|e| Error::csv(source, e))?;
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
            list.push(record[0].to_string(), WordSource::Line(line), alphabet, &mut seen)?;
            rows += 1;
        }

        debug!(
            rows,
            unique = list.len(),
            source = %source.display(),
            "loaded word list"
        );
        Ok(list)
    }

    fn push(
        &mut self,
        word: String,
        at: WordSource,
        alphabet: &Alphabet,
        seen: &mut AHashSet<String>,
    ) -> Result<()> {
        let segments = check_word(&word, alphabet, at)?;
        if seen.insert(word.clone()) {
            self.segments.push(segments);
            self.words.push(word);
        }
        Ok(())
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn segments(&self, index: usize) -> &[char] {
        &self.segments[index]
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Split `word` into segments, rejecting it if it is empty or uses a segment
/// outside `alphabet`
pub fn check_word(word: &str, alphabet: &Alphabet, at: WordSource) -> Result<Vec<char>> {
    if word.is_empty() {
        return Err(Error::EmptyWord { at });
    }
    if let Some(segment) = word.chars().find(|c| !alphabet.contains(c)) {
        return Err(Error::UnknownSegment {
            word: word.to_string(),
            segment,
            at,
        });
    }
    Ok(segments_of(word))
}

/// Check a pair of words given directly rather than through a [`WordList`]
pub fn check_word_pair(
    word1: &str,
    word2: &str,
    alphabet: &Alphabet,
) -> Result<(Vec<char>, Vec<char>)> {
    Ok((
        check_word(word1, alphabet, WordSource::Index(0))?,
        check_word(word2, alphabet, WordSource::Index(1))?,
    ))
}

/// Symmetric word × word phonological distances with a zero diagonal
#[derive(Debug, Clone)]
pub struct WordDistanceTable {
    words: Vec<String>,
    distances: Array2<f64>,
    index: AHashMap<String, usize>,
}

impl WordDistanceTable {
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn distances(&self) -> &Array2<f64> {
        &self.distances
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, word1: &str, word2: &str) -> Option<f64> {
        let i = *self.index.get(word1)?;
        let j = *self.index.get(word2)?;
        Some(self.distances[[i, j]])
    }

    /// Both orderings of every pair plus self-pairs, row-major in word order
    pub fn records(&self) -> impl Iterator<Item = DistanceRecord> + '_ {
        let n = self.words.len();
        (0..n).flat_map(move |i| {
            (0..n).map(move |j| {
                DistanceRecord::new(
                    self.words[i].clone(),
                    self.words[j].clone(),
                    self.distances[[i, j]],
                )
            })
        })
    }

    /// Write the table as TSV (gzip when the path ends in `.gz`)
    pub fn write_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.stage_tsv(path)?.persist()?;
        info!(path = %path.display(), words = self.words.len(), "wrote word distance table");
        Ok(())
    }

    /// Write the table into a temporary file beside `path` without moving it
    /// into place
    pub fn stage_tsv(&self, path: impl AsRef<Path>) -> Result<StagedTable> {
        let mut writer = TableWriter::create(path.as_ref(), &DISTANCE_HEADER)?;
        for record in self.records() {
            writer.write_row(&[
                record.word1.as_str(),
                record.word2.as_str(),
                &record.phon_dist.0.to_string(),
            ])?;
        }
        writer.stage()
    }
}

/// Aligns every unordered word pair once and mirrors the result.
///
/// Mirroring is only sound because the lookup is symmetric; [`SegmentDistances`]
/// guarantees that at construction.
///
/// [`SegmentDistances`]: crate::align::SegmentDistances
pub struct PairwiseDistanceBuilder<'a, L: DistanceLookup + ?Sized> {
    aligner: NeedlemanWunsch<'a, L>,
}

impl<'a, L: DistanceLookup + ?Sized> PairwiseDistanceBuilder<'a, L> {
    pub fn new(lookup: &'a L, gap_penalty: f64) -> Self {
        Self {
            aligner: NeedlemanWunsch::new(lookup, gap_penalty),
        }
    }

    pub fn build(&self, words: &WordList) -> WordDistanceTable {
        let n = words.len();
        let mut distances = Array2::<f64>::zeros((n, n));

        let pairs: Vec<_> = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect();

        let costs: Vec<f64> = pairs
            .par_iter()
            .map(|&(i, j)| self.aligner.distance(words.segments(i), words.segments(j)))
            .collect();

        for (&(i, j), &cost) in pairs.iter().zip(&costs) {
            distances[[i, j]] = cost;
            distances[[j, i]] = cost;
        }

        info!(words = n, pairs = pairs.len(), "computed word distances");

        let index = words
            .words()
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();

        WordDistanceTable {
            words: words.words().to_vec(),
            distances,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{SegmentDistances, DEFAULT_GAP_PENALTY, MISSING_DISTANCE};

    fn alphabet() -> Alphabet {
        "pbtda".chars().collect()
    }

    fn lookup() -> SegmentDistances {
        let mut d = SegmentDistances::new(MISSING_DISTANCE);
        for s in "pbtda".chars() {
            d.insert_symmetric(s, s, 0.0);
        }
        d.insert_symmetric('p', 'b', 0.286);
        d.insert_symmetric('t', 'd', 0.286);
        d
    }

    #[test]
    fn test_dedup_keeps_first() {
        let list = WordList::new(["pata", "bada", "pata"], &alphabet()).unwrap();
        assert_eq!(list.words(), &["pata".to_string(), "bada".to_string()]);
        assert_eq!(list.segments(1), &['b', 'a', 'd', 'a']);
    }

    #[test]
    fn test_unknown_segment() {
        let err = WordList::new(["pata", "paxa"], &alphabet()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownSegment { segment: 'x', at: WordSource::Index(1), ref word } if word == "paxa"
        ));
        assert!(err.to_string().contains("position 1"));

        let text = "lemma\npata\npaxa\n";
        let err = WordList::from_reader(text.as_bytes(), Path::new("words.tsv"), &alphabet());
        assert!(matches!(
            err,
            Err(Error::UnknownSegment { at: WordSource::Line(3), .. })
        ));
    }

    #[test]
    fn test_check_word_pair_against_table_segments() {
        let segments = lookup().segments();
        let (a, b) = check_word_pair("pa", "ba", &segments).unwrap();
        assert_eq!((a.len(), b.len()), (2, 2));

        let err = check_word_pair("pa", "xa", &segments).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownSegment { segment: 'x', at: WordSource::Index(1), .. }
        ));
        assert!(check_word_pair("qq", "pa", &segments).is_err());
    }

    #[test]
    fn test_check_word() {
        assert_eq!(check_word("ta", &alphabet(), WordSource::Index(0)).unwrap(), vec!['t', 'a']);
        assert!(matches!(
            check_word("", &alphabet(), WordSource::Index(2)),
            Err(Error::EmptyWord { at: WordSource::Index(2) })
        ));
    }

    #[test]
    fn test_reader() {
        let text = "lemma\npata\nbada\npata\n";
        let list = WordList::from_reader(text.as_bytes(), Path::new("words.tsv"), &alphabet()).unwrap();
        assert_eq!(list.len(), 2);

        let err = WordList::from_reader("word\npata\n".as_bytes(), Path::new("words.tsv"), &alphabet())
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedHeader { .. }));
    }

    #[test]
    fn test_table_symmetric_with_zero_diagonal() {
        let d = lookup();
        let list = WordList::new(["pata", "bada", "ta", "dab"], &alphabet()).unwrap();
        let table = PairwiseDistanceBuilder::new(&d, DEFAULT_GAP_PENALTY).build(&list);

        for w1 in list.words() {
            assert_eq!(table.get(w1, w1), Some(0.0));
            for w2 in list.words() {
                assert_eq!(table.get(w1, w2), table.get(w2, w1));
            }
        }
        assert!((table.get("pata", "bada").unwrap() - 0.572).abs() < 1e-9);
        assert_eq!(table.get("pata", "ta"), Some(2.0));
        assert_eq!(table.records().count(), 16);
    }

    #[test]
    fn test_empty_list() {
        let d = lookup();
        let list = WordList::new(Vec::<String>::new(), &alphabet()).unwrap();
        let table = PairwiseDistanceBuilder::new(&d, DEFAULT_GAP_PENALTY).build(&list);
        assert!(table.is_empty());
        assert_eq!(table.records().count(), 0);
    }
}

//! Fixed-width bit set used for class extensions and class memberships.

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitSet {
    blocks: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// Empty set over `len` positions
    pub fn new(len: usize) -> Self {
        Self {
            blocks: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Set containing every position in `0..len`
    pub fn full(len: usize) -> Self {
        let mut set = Self::new(len);
        for block in set.blocks.iter_mut() {
            *block = u64::MAX;
        }
        set.clear_tail();
        set
    }

    fn clear_tail(&mut self) {
        let rem = self.len % 64;
        if rem != 0 {
            if let Some(last) = self.blocks.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    /// Number of addressable positions
    pub fn capacity(&self) -> usize {
        self.len
    }

    pub fn insert(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.blocks[index / 64] |= 1u64 << (index % 64);
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.len && self.blocks[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// In-place intersection
    pub fn intersect_with(&mut self, other: &BitSet) {
        for (a, b) in self.blocks.iter_mut().zip(&other.blocks) {
            *a &= *b;
        }
    }

    pub fn count(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|&b| b == 0)
    }

    /// |self ∩ other| without allocating
    pub fn intersection_count(&self, other: &BitSet) -> usize {
        self.blocks
            .iter()
            .zip(&other.blocks)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// |self △ other| without allocating
    pub fn symmetric_difference_count(&self, other: &BitSet) -> usize {
        self.blocks
            .iter()
            .zip(&other.blocks)
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum()
    }

    /// Iterate set positions in ascending order
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.iter().enumerate().flat_map(|(block_idx, &block)| {
            let mut bits = block;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let offset = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(block_idx * 64 + offset)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_respects_capacity() {
        let set = BitSet::full(70);
        assert_eq!(set.count(), 70);
        assert!(set.contains(69));
        assert!(!set.contains(70));
    }

    #[test]
    fn test_counts() {
        let mut a = BitSet::new(130);
        let mut b = BitSet::new(130);
        for i in [1, 64, 129] {
            a.insert(i);
        }
        for i in [1, 2, 129] {
            b.insert(i);
        }
        assert_eq!(a.intersection_count(&b), 2);
        assert_eq!(a.symmetric_difference_count(&b), 2);

        a.intersect_with(&b);
        assert_eq!(a.ones().collect::<Vec<_>>(), vec![1, 129]);
    }

    #[test]
    fn test_empty() {
        let set = BitSet::new(0);
        assert!(set.is_empty());
        assert_eq!(set.ones().count(), 0);
        assert!(BitSet::full(0).is_empty());
    }
}

use disagg_core::config::MAX_CLUSTER_POINTS;

const WORDS: usize = MAX_CLUSTER_POINTS / 64;

/// Fixed-width membership set over the point indices of one cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointSet([u64; WORDS]);

impl PointSet {
    pub const CAPACITY: usize = MAX_CLUSTER_POINTS;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize) {
        debug_assert!(index < Self::CAPACITY, "point index {index} out of range");
        self.0[index / 64] |= 1u64 << (index % 64);
    }

    pub fn contains(&self, index: usize) -> bool {
        index < Self::CAPACITY && self.0[index / 64] & (1u64 << (index % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    pub fn intersects(&self, other: &PointSet) -> bool {
        self.0.iter().zip(other.0.iter()).any(|(a, b)| a & b != 0)
    }

    pub fn union(&self, other: &PointSet) -> PointSet {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0.iter()) {
            *a |= b;
        }
        out
    }

    /// Member indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..Self::CAPACITY).filter(move |&i| self.contains(i))
    }
}

impl FromIterator<usize> for PointSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = PointSet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

/// Resource demand or capacity over a GPU's resource dimensions.
/// Index d is the same dimension everywhere: capacities, mappings, usage.
pub type Weights = Vec<u32>;

/// Where each pod ended up, indexed by the pod's position in the original
/// request list. `None` means unplaced.
pub type Assignment = Vec<Option<usize>>;

/// A single pod awaiting placement.
///
/// `index` is the pod's position in the original request list and is the
/// identity every result refers to. Sorted views keep it, so an assignment
/// can always be read back in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub index: usize,
    pub weights: Weights,
    /// Sum of `weights`, precomputed once. The sort key for packing order.
    /// Widened so many large dimensions cannot overflow it.
    pub total: u64,
}

impl Item {
    pub fn new(index: usize, weights: Weights) -> Self {
        let total = weights.iter().map(|&w| u64::from(w)).sum();
        Self {
            index,
            weights,
            total,
        }
    }

    /// Build items from raw weight vectors, heaviest first.
    /// Ties break on ascending index so equal inputs always produce the
    /// same ordering, which the placement cache depends on.
    pub fn rank_by_weight(weights: &[Weights]) -> Vec<Item> {
        let mut items: Vec<Item> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| Item::new(i, w.clone()))
            .collect();
        items.sort_by(|a, b| b.total.cmp(&a.total).then(a.index.cmp(&b.index)));
        items
    }
}

/// Live usage of every GPU in the pool against the shared capacity vector.
///
/// All GPUs are identical, so the capacity is stored once. The invariant
/// `used[k][d] <= capacity[d]` holds at every observable moment; `occupy`
/// is only called after a `fits` check and `release` only undoes an earlier
/// `occupy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageGrid {
    capacity: Weights,
    used: Vec<Weights>,
}

impl UsageGrid {
    /// An empty pool of `gpus` identical GPUs.
    pub fn new(capacity: Weights, gpus: usize) -> Self {
        let dims = capacity.len();
        Self {
            capacity,
            used: vec![vec![0; dims]; gpus],
        }
    }

    /// A pool that already carries usage, e.g. pods placed before this run.
    pub fn with_initial(capacity: Weights, used: Vec<Weights>) -> Self {
        debug_assert!(used.iter().all(|u| u.len() == capacity.len()));
        Self { capacity, used }
    }

    pub fn gpus(&self) -> usize {
        self.used.len()
    }

    pub fn dimensions(&self) -> usize {
        self.capacity.len()
    }

    pub fn capacity(&self) -> &[u32] {
        &self.capacity
    }

    pub fn used(&self) -> &[Weights] {
        &self.used
    }

    /// Componentwise check that `weights` still fits on `gpu`.
    /// The sum is widened so an oversized demand cannot overflow it.
    pub fn fits(&self, gpu: usize, weights: &[u32]) -> bool {
        self.used[gpu]
            .iter()
            .zip(weights)
            .zip(&self.capacity)
            .all(|((&u, &w), &c)| u64::from(u) + u64::from(w) <= u64::from(c))
    }

    pub fn occupy(&mut self, gpu: usize, weights: &[u32]) {
        for (u, w) in self.used[gpu].iter_mut().zip(weights) {
            *u += w;
        }
    }

    /// Subtract `weights` from `gpu`. Underflow means something is being
    /// released that was never placed; that is a bug in the caller, not an
    /// input error, so it aborts.
    pub fn release(&mut self, gpu: usize, weights: &[u32]) {
        for (u, w) in self.used[gpu].iter_mut().zip(weights) {
            *u = u.checked_sub(*w).expect("usage underflow on release");
        }
    }

    /// Sum of usage across dimensions. The bin-ordering key for the
    /// backtracking search.
    pub fn scalar_load(&self, gpu: usize) -> u64 {
        self.used[gpu].iter().map(|&u| u64::from(u)).sum()
    }

    /// True when nothing is placed on `gpu`.
    pub fn is_idle(&self, gpu: usize) -> bool {
        self.used[gpu].iter().all(|&u| u == 0)
    }

    /// True when `gpu` has spare room in every dimension.
    pub fn has_headroom(&self, gpu: usize) -> bool {
        self.used[gpu].iter().zip(&self.capacity).all(|(u, c)| u < c)
    }

    /// Spare capacity per dimension, summed over the whole pool.
    /// Widened to u64 so large pools cannot overflow the aggregate.
    pub fn remaining_total(&self) -> Vec<u64> {
        let mut spare = vec![0u64; self.dimensions()];
        for gpu in &self.used {
            for (d, u) in gpu.iter().enumerate() {
                spare[d] += u64::from(self.capacity[d] - u);
            }
        }
        spare
    }
}

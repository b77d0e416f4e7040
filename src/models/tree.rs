//! CART decision trees over dense matrices.
//!
//! Trees are grown depth-first from per-feature presorted index lists, which
//! are partitioned (order-preserving) at every split. The split criterion and
//! the leaf payload are supplied by a [`Criterion`], so the same grower serves
//! both the Gini classification trees of the random forest and the residual
//! regression trees of gradient boosting.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Minimum impurity decrease for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Leaf payload reached by row `i` of `x` (`x[(i, f)] <= threshold` goes left).
    pub fn predict_row(&self, x: &DMatrix<f64>, i: usize) -> &[f64] {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if x[(i, *feature)] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return &[],
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Growth limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per split (`None` = all).
    pub max_features: Option<usize>,
}

/// Split statistics and leaf payloads for one kind of tree.
pub trait Criterion {
    type Stats: Clone;

    fn empty(&self) -> Self::Stats;
    fn add(&self, stats: &mut Self::Stats, i: usize);
    fn remove(&self, stats: &mut Self::Stats, i: usize);
    /// Impurity summed over the node's samples; lower is better.
    fn impurity(&self, stats: &Self::Stats) -> f64;
    fn leaf_value(&self, samples: &[usize]) -> Vec<f64>;
}

/// Weighted Gini impurity; leaves carry the class distribution.
pub struct Gini<'a> {
    pub y: &'a [usize],
    pub weights: &'a [f64],
    pub n_classes: usize,
}

#[derive(Debug, Clone)]
pub struct ClassWeights {
    per_class: Vec<f64>,
    total: f64,
}

impl Criterion for Gini<'_> {
    type Stats = ClassWeights;

    fn empty(&self) -> ClassWeights {
        ClassWeights {
            per_class: vec![0.0; self.n_classes],
            total: 0.0,
        }
    }

    fn add(&self, stats: &mut ClassWeights, i: usize) {
        stats.per_class[self.y[i]] += self.weights[i];
        stats.total += self.weights[i];
    }

    fn remove(&self, stats: &mut ClassWeights, i: usize) {
        stats.per_class[self.y[i]] -= self.weights[i];
        stats.total -= self.weights[i];
    }

    fn impurity(&self, stats: &ClassWeights) -> f64 {
        if stats.total <= 0.0 {
            return 0.0;
        }
        let sum_sq: f64 = stats.per_class.iter().map(|w| w * w).sum();
        (stats.total - sum_sq / stats.total).max(0.0)
    }

    fn leaf_value(&self, samples: &[usize]) -> Vec<f64> {
        let mut stats = self.empty();
        for &i in samples {
            self.add(&mut stats, i);
        }
        if stats.total > 0.0 {
            stats.per_class.iter().map(|w| w / stats.total).collect()
        } else {
            vec![1.0 / self.n_classes.max(1) as f64; self.n_classes]
        }
    }
}

/// Running sums for squared-error criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct Moments {
    pub n: f64,
    pub sum: f64,
    pub sum_sq: f64,
}

impl Moments {
    pub fn add(&mut self, v: f64) {
        self.n += 1.0;
        self.sum += v;
        self.sum_sq += v * v;
    }

    pub fn remove(&mut self, v: f64) {
        self.n -= 1.0;
        self.sum -= v;
        self.sum_sq -= v * v;
    }

    /// Sum of squared deviations from the mean.
    pub fn sse(&self) -> f64 {
        if self.n <= 0.0 {
            return 0.0;
        }
        (self.sum_sq - self.sum * self.sum / self.n).max(0.0)
    }
}

/// Grow a tree over the rows in `samples`.
pub fn build_tree<C: Criterion>(
    x: &DMatrix<f64>,
    samples: &[usize],
    criterion: &C,
    params: &TreeParams,
    rng: &mut StdRng,
) -> Tree {
    let sorted: Vec<Vec<usize>> = (0..x.ncols())
        .map(|f| {
            let mut idx = samples.to_vec();
            idx.sort_by(|&a, &b| x[(a, f)].total_cmp(&x[(b, f)]).then(a.cmp(&b)));
            idx
        })
        .collect();

    let mut grower = Grower {
        x,
        criterion,
        params,
        rng,
        nodes: Vec::new(),
        goes_left: vec![false; x.nrows()],
    };
    grower.grow(sorted, samples.to_vec(), 0);
    Tree {
        nodes: grower.nodes,
    }
}

struct Grower<'a, C: Criterion> {
    x: &'a DMatrix<f64>,
    criterion: &'a C,
    params: &'a TreeParams,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
    goes_left: Vec<bool>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl<C: Criterion> Grower<'_, C> {
    fn grow(&mut self, sorted: Vec<Vec<usize>>, samples: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: Vec::new() });

        let mut total = self.criterion.empty();
        for &i in &samples {
            self.criterion.add(&mut total, i);
        }
        let parent = self.criterion.impurity(&total);

        let min_leaf = self.params.min_samples_leaf.max(1);
        let splittable = depth < self.params.max_depth
            && samples.len() >= 2 * min_leaf
            && parent > MIN_GAIN
            && !sorted.is_empty();

        let best = if splittable {
            self.find_split(&sorted, &total, min_leaf)
        } else {
            None
        };

        let Some(best) = best.filter(|b| b.score < parent - MIN_GAIN) else {
            self.nodes[id] = Node::Leaf {
                value: self.criterion.leaf_value(&samples),
            };
            return id;
        };

        for &i in &samples {
            self.goes_left[i] = self.x[(i, best.feature)] <= best.threshold;
        }
        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
            samples.iter().copied().partition(|&i| self.goes_left[i]);
        let mut left_sorted = Vec::with_capacity(sorted.len());
        let mut right_sorted = Vec::with_capacity(sorted.len());
        for list in sorted {
            let (l, r): (Vec<usize>, Vec<usize>) =
                list.into_iter().partition(|&i| self.goes_left[i]);
            left_sorted.push(l);
            right_sorted.push(r);
        }

        let left = self.grow(left_sorted, left_samples, depth + 1);
        let right = self.grow(right_sorted, right_samples, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    fn candidate_features(&mut self, p: usize) -> Vec<usize> {
        match self.params.max_features {
            Some(m) if m >= 1 && m < p => rand::seq::index::sample(&mut *self.rng, p, m).into_vec(),
            _ => (0..p).collect(),
        }
    }

    fn find_split(
        &mut self,
        sorted: &[Vec<usize>],
        total: &C::Stats,
        min_leaf: usize,
    ) -> Option<BestSplit> {
        let mut best: Option<BestSplit> = None;
        for feature in self.candidate_features(sorted.len()) {
            let order = &sorted[feature];
            let n = order.len();
            let mut left = self.criterion.empty();
            let mut right = total.clone();
            for pos in 0..n.saturating_sub(1) {
                let i = order[pos];
                self.criterion.add(&mut left, i);
                self.criterion.remove(&mut right, i);

                let n_left = pos + 1;
                if n_left < min_leaf {
                    continue;
                }
                if n - n_left < min_leaf {
                    break;
                }
                let v = self.x[(i, feature)];
                let next = self.x[(order[pos + 1], feature)];
                if next <= v {
                    continue;
                }

                let score = self.criterion.impurity(&left) + self.criterion.impurity(&right);
                if best.as_ref().is_none_or(|b| score < b.score - MIN_GAIN) {
                    best = Some(BestSplit {
                        feature,
                        threshold: v + (next - v) / 2.0,
                        score,
                    });
                }
            }
        }
        best
    }
}

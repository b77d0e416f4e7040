//! Stratified holdout split and stratified k-fold.
//!
//! Both shuffle the members of each class with a seeded RNG and then allocate
//! them per class, so every class keeps its share on both sides.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::domain::{N_CLASSES, PriorityLabel};

/// Row indices of each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffled member rows of each class.
fn shuffled_members(y: &[PriorityLabel], rng: &mut StdRng) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); N_CLASSES];
    for (i, label) in y.iter().enumerate() {
        members[label.index()].push(i);
    }
    for m in &mut members {
        m.shuffle(rng);
    }
    members
}

/// Hold out `test_fraction` of every class.
///
/// A class with at least two members always lands on both sides.
pub fn stratified_split(y: &[PriorityLabel], test_fraction: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split {
        train: Vec::with_capacity(y.len()),
        test: Vec::new(),
    };
    for members in shuffled_members(y, &mut rng) {
        let n = members.len();
        if n == 0 {
            continue;
        }
        let mut n_test = (n as f64 * test_fraction).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        } else {
            n_test = 0;
        }
        split.test.extend_from_slice(&members[..n_test]);
        split.train.extend_from_slice(&members[n_test..]);
    }
    split.train.sort_unstable();
    split.test.sort_unstable();
    split
}

/// `k` folds; each class's members are dealt round-robin across folds.
///
/// Returned indices are positions into `y`. Every test fold is non-empty only
/// when `y.len() >= k`; callers must check that first.
pub fn stratified_kfold(y: &[PriorityLabel], k: usize, seed: u64) -> Vec<Split> {
    let k = k.max(2);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; y.len()];
    let mut offset = 0;
    for members in shuffled_members(y, &mut rng) {
        for (pos, &i) in members.iter().enumerate() {
            fold_of[i] = (offset + pos) % k;
        }
        // Continue dealing where the previous class stopped so fold sizes stay even.
        offset = (offset + members.len()) % k;
    }

    (0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| fold_of[i] == fold);
            Split { train, test }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::class_counts;

    fn labels(counts: [usize; N_CLASSES]) -> Vec<PriorityLabel> {
        let mut y = Vec::new();
        for (k, &c) in counts.iter().enumerate() {
            for _ in 0..c {
                y.push(PriorityLabel::from_index(k).unwrap());
            }
        }
        y
    }

    fn pick(y: &[PriorityLabel], idx: &[usize]) -> Vec<PriorityLabel> {
        idx.iter().map(|&i| y[i]).collect()
    }

    #[test]
    fn every_class_on_both_sides() {
        let y = labels([50, 2, 9, 3, 0]);
        let split = stratified_split(&y, 0.2, 42);
        assert_eq!(split.train.len() + split.test.len(), y.len());

        let train = class_counts(&pick(&y, &split.train));
        let test = class_counts(&pick(&y, &split.test));
        for k in 0..4 {
            assert!(train[k] >= 1 && test[k] >= 1, "class {k}");
        }
        assert_eq!(test[0], 10);
        assert_eq!(test[4] + train[4], 0);
    }

    #[test]
    fn split_is_seeded() {
        let y = labels([20, 20, 20, 0, 0]);
        assert_eq!(stratified_split(&y, 0.2, 1), stratified_split(&y, 0.2, 1));
        assert_ne!(stratified_split(&y, 0.2, 1), stratified_split(&y, 0.2, 2));
    }

    #[test]
    fn folds_partition_rows() {
        let y = labels([12, 7, 5, 3, 3]);
        let folds = stratified_kfold(&y, 3, 42);
        assert_eq!(folds.len(), 3);

        let mut seen = vec![0; y.len()];
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), y.len());
            for &i in &fold.test {
                seen[i] += 1;
            }
            // Every class with >= 3 members appears in each test fold.
            let test = class_counts(&pick(&y, &fold.test));
            assert!(test.iter().all(|&c| c >= 1));
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn folds_have_test_rows_once_rows_reach_k() {
        let y = labels([1, 1, 1, 0, 0]);
        for fold in stratified_kfold(&y, 3, 42) {
            assert_eq!(fold.test.len(), 1);
            assert_eq!(fold.train.len(), 2);
        }

        let short = labels([0, 1, 0, 1, 0]);
        let folds = stratified_kfold(&short, 3, 42);
        assert_eq!(folds.iter().filter(|f| f.test.is_empty()).count(), 1);
    }
}

//! CART regression tree shared by the boosting and forest learners

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled per split (all when `None`)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// Fitted regression tree
#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// Grow a tree on `rows` of `x` (duplicates allowed, as produced by bootstrapping)
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[f64],
        rows: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut rows = rows.to_vec();
        let root = grow(x, y, &mut rows, 0, params, rng);
        Self { root }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 1,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }
}

fn grow(
    x: ArrayView2<'_, f64>,
    y: &[f64],
    rows: &mut [usize],
    depth: usize,
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Node {
    let n = rows.len();
    let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, q), &r| (s + y[r], q + y[r] * y[r]));
    let mean = if n > 0 { sum / n as f64 } else { 0.0 };
    let sse = sum_sq - sum * mean;

    if depth >= params.max_depth || n < params.min_samples_split.max(2) || sse <= 1e-12 {
        return Node::Leaf(mean);
    }

    let Some(best) = best_split(x, y, rows, sum, params, rng) else {
        return Node::Leaf(mean);
    };

    // Partition in place: rows going left first
    let mut boundary = 0;
    for i in 0..n {
        if x[[rows[i], best.feature]] <= best.threshold {
            rows.swap(i, boundary);
            boundary += 1;
        }
    }
    if boundary == 0 || boundary == n {
        return Node::Leaf(mean);
    }

    let (left_rows, right_rows) = rows.split_at_mut(boundary);
    let left = grow(x, y, left_rows, depth + 1, params, rng);
    let right = grow(x, y, right_rows, depth + 1, params, rng);

    Node::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Pick the split maximising `sum_l^2 / n_l + sum_r^2 / n_r`, i.e. minimising child SSE
fn best_split(
    x: ArrayView2<'_, f64>,
    y: &[f64],
    rows: &[usize],
    total: f64,
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Option<BestSplit> {
    let n = rows.len();
    let n_features = x.ncols();
    let min_leaf = params.min_samples_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }

    let candidates: Vec<usize> = match params.max_features {
        Some(k) if k < n_features => index::sample(rng, n_features, k.max(1)).into_vec(),
        _ => (0..n_features).collect(),
    };

    let parent_score = total * total / n as f64;
    let mut best: Option<BestSplit> = None;
    let mut order: Vec<usize> = rows.to_vec();

    for feature in candidates {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            left_sum += y[order[i]];
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let here = x[[order[i], feature]];
            let next = x[[order[i + 1], feature]];
            if here == next {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            if score - parent_score > 1e-12 && best.map_or(true, |b| score > b.score) {
                best = Some(BestSplit {
                    feature,
                    threshold: (here + next) / 2.0,
                    score,
                });
            }
        }
    }

    best
}

//! Bagged regression trees.
//!
//! Each tree is grown on a bootstrap sample with variance-reduction splits over
//! every feature; the forest predicts the mean of its trees. A fixed seed makes
//! fitting reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::ForestConfig;
use crate::error::{PipelineError, Result};

/// A supervised learner over dense feature rows.
pub trait Regressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>>;
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

#[derive(Debug, Clone)]
struct TreeParams {
    max_depth: Option<usize>,
    min_samples_split: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
    sse: f64,
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    fn grow(x: &[Vec<f64>], y: &[f64], indices: Vec<usize>, params: &TreeParams) -> Self {
        Self {
            root: build_node(x, y, indices, 0, params),
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
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
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }
}

fn leaf_value(y: &[f64], indices: &[usize]) -> f64 {
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

fn sum_squared_error(y: &[f64], indices: &[usize]) -> f64 {
    let n = indices.len() as f64;
    let (sum, sum_sq) = indices
        .iter()
        .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
    sum_sq - sum * sum / n
}

fn build_node(
    x: &[Vec<f64>],
    y: &[f64],
    indices: Vec<usize>,
    depth: usize,
    params: &TreeParams,
) -> Node {
    let value = leaf_value(y, &indices);

    let depth_reached = params.max_depth.is_some_and(|max| depth >= max);
    if depth_reached || indices.len() < params.min_samples_split.max(2) {
        return Node::Leaf(value);
    }

    let parent_sse = sum_squared_error(y, &indices);
    if parent_sse <= f64::EPSILON {
        return Node::Leaf(value);
    }

    let Some(split) = best_split(x, y, &indices) else {
        return Node::Leaf(value);
    };
    if split.sse >= parent_sse {
        return Node::Leaf(value);
    }

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| x[i][split.feature] <= split.threshold);
    if left.is_empty() || right.is_empty() {
        return Node::Leaf(value);
    }

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(build_node(x, y, left, depth + 1, params)),
        right: Box::new(build_node(x, y, right, depth + 1, params)),
    }
}

/// Finds the threshold minimizing the summed squared error of both children.
fn best_split(x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> Option<Split> {
    let n = indices.len();
    let n_features = x[indices[0]].len();

    let (total, total_sq) = indices
        .iter()
        .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));

    let mut best: Option<Split> = None;
    let mut order = indices.to_vec();

    for feature in 0..n_features {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let (mut left_sum, mut left_sq) = (0.0, 0.0);
        for k in 0..n - 1 {
            let yi = y[order[k]];
            left_sum += yi;
            left_sq += yi * yi;

            let here = x[order[k]][feature];
            let next = x[order[k + 1]][feature];
            if here == next {
                continue;
            }

            let n_left = (k + 1) as f64;
            let n_right = (n - k - 1) as f64;
            let right_sum = total - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left)
                + (right_sq - right_sum * right_sum / n_right);

            if best.as_ref().is_none_or(|b| sse < b.sse) {
                best = Some(Split {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    sse,
                });
            }
        }
    }

    best
}

/// Averaging ensemble of bootstrap-trained [`RegressionTree`]s.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    seed: u64,
    params: TreeParams,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn new(config: &ForestConfig) -> Self {
        Self {
            n_estimators: config.n_estimators.max(1),
            seed: config.seed,
            params: TreeParams {
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
            },
            trees: Vec::new(),
        }
    }
}

fn check_rows(x: &[Vec<f64>]) -> Result<usize> {
    let width = x.first().map(Vec::len).unwrap_or(0);
    if x.iter().any(|row| row.len() != width) {
        return Err(PipelineError::Model(
            "feature rows have different lengths".to_string(),
        ));
    }
    Ok(width)
}

impl Regressor for RandomForestRegressor {
    #[tracing::instrument(skip_all, fields(rows = x.len(), n_estimators = self.n_estimators))]
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.is_empty() {
            return Err(PipelineError::EmptyDataset("training set".to_string()));
        }
        if x.len() != y.len() {
            return Err(PipelineError::Model(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        check_rows(x)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = x.len();

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::grow(x, y, sample, &self.params)
            })
            .collect();

        debug!(
            trees = self.trees.len(),
            max_depth = self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0),
            "Forest fitted"
        );
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::Model("predict called before fit".to_string()));
        }
        check_rows(x)?;

        Ok(x.iter()
            .map(|row| {
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / self.trees.len() as f64
            })
            .collect())
    }
}

//! Exact t-distributed stochastic neighbour embedding

use super::{check_components, seeded_rng, Pca, ReductionError};
use ndarray::{Array2, Axis, Zip};
use rand::Rng;

const EARLY_EXAGGERATION: f64 = 12.0;
const EXAGGERATION_ITERATIONS: usize = 250;
const INITIAL_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const MIN_GAIN: f64 = 0.01;
const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const BINARY_SEARCH_STEPS: usize = 100;
const INITIAL_SCALE: f64 = 1e-4;
const MIN_PROBABILITY: f64 = 1e-12;

/// Exact t-SNE
///
/// Quadratic in the number of samples for both the affinities and every
/// gradient step.
#[derive(Debug, Clone)]
pub struct Tsne {
    pub n_components: usize,
    pub perplexity: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub seed: Option<u64>,
}

impl Tsne {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            perplexity: 30.0,
            learning_rate: 200.0,
            max_iter: 1000,
            seed: None,
        }
    }

    pub fn reduce(&self, data: &Array2<f32>) -> Result<Array2<f32>, ReductionError> {
        self.validate()?;
        let n = data.nrows();
        if n as f64 <= self.perplexity {
            return Err(ReductionError::InsufficientSamples {
                algorithm: "tsne",
                required: self.perplexity.floor() as usize + 1,
                actual: n,
            });
        }

        let x = data.mapv(f64::from);
        let p = joint_probabilities(&squared_distances(&x), self.perplexity);

        let k = self.n_components;
        let mut y = self.initial_layout(data);
        let mut update = Array2::<f64>::zeros((n, k));
        let mut gains = Array2::<f64>::ones((n, k));
        let mut kernel = Array2::<f64>::zeros((n, n));

        for iteration in 0..self.max_iter {
            let (exaggeration, momentum) = if iteration < EXAGGERATION_ITERATIONS {
                (EARLY_EXAGGERATION, INITIAL_MOMENTUM)
            } else {
                (1.0, FINAL_MOMENTUM)
            };

            // Student-t kernel (1 + |yi - yj|^2)^-1 with a zero diagonal
            let y_distances = squared_distances(&y);
            Zip::from(&mut kernel)
                .and(&y_distances)
                .for_each(|q, d| *q = 1.0 / (1.0 + d));
            kernel.diag_mut().fill(0.0);
            let normalizer = kernel.sum().max(MIN_PROBABILITY);

            let mut gradient = Array2::<f64>::zeros((n, k));
            for i in 0..n {
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let q = kernel[[i, j]];
                    let attraction = (exaggeration * p[[i, j]] - q / normalizer) * q;
                    for c in 0..k {
                        gradient[[i, c]] += 4.0 * attraction * (y[[i, c]] - y[[j, c]]);
                    }
                }
            }

            Zip::from(&mut gains)
                .and(&gradient)
                .and(&update)
                .for_each(|gain, &grad, &step| {
                    *gain = if grad * step < 0.0 {
                        *gain + 0.2
                    } else {
                        (*gain * 0.8).max(MIN_GAIN)
                    };
                });

            Zip::from(&mut update)
                .and(&gains)
                .and(&gradient)
                .for_each(|step, &gain, &grad| {
                    *step = momentum * *step - self.learning_rate * gain * grad;
                });

            y += &update;
            let center = y.sum_axis(Axis(0)) / n as f64;
            y -= &center;

            if (iteration + 1) % 250 == 0 {
                tracing::debug!(
                    "t-SNE iteration {}: KL divergence {:.4}",
                    iteration + 1,
                    kl_divergence(&p, &kernel, normalizer)
                );
            }
        }

        Ok(y.mapv(|v| v as f32))
    }

    /// PCA layout scaled so its first axis has standard deviation 1e-4
    ///
    /// Falls back to a uniform random layout when PCA cannot produce `k`
    /// informative axes (fewer features than components, constant data).
    fn initial_layout(&self, data: &Array2<f32>) -> Array2<f64> {
        let (n, k) = (data.nrows(), self.n_components);
        if let Ok(projected) = Pca::new(k).reduce(data) {
            let projected = projected.mapv(f64::from);
            let spread = projected.column(0).std(0.0);
            if spread.is_finite() && spread > 0.0 {
                return projected * (INITIAL_SCALE / spread);
            }
        }

        tracing::debug!("PCA initialization unavailable; using a random t-SNE layout");
        let mut rng = seeded_rng(self.seed);
        Array2::from_shape_fn((n, k), |_| rng.gen_range(-INITIAL_SCALE..INITIAL_SCALE))
    }

    fn validate(&self) -> Result<(), ReductionError> {
        check_components(self.n_components)?;
        if self.perplexity.is_nan() || self.perplexity <= 0.0 {
            return Err(ReductionError::InvalidParameter(format!(
                "perplexity must be positive, got {}",
                self.perplexity
            )));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(ReductionError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_iter == 0 {
            return Err(ReductionError::InvalidParameter(
                "max_iter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pairwise squared euclidean distances between rows
fn squared_distances(x: &Array2<f64>) -> Array2<f64> {
    let norms = x.map_axis(Axis(1), |row| row.dot(&row));
    let gram = x.dot(&x.t());
    let n = x.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else {
            (norms[i] + norms[j] - 2.0 * gram[[i, j]]).max(0.0)
        }
    })
}

/// Symmetrized affinities `(P + P^T) / 2n`
///
/// Each conditional row uses the Gaussian precision whose entropy matches
/// `ln(perplexity)`, found by bisection.
fn joint_probabilities(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let target = perplexity.ln();
    let mut conditional = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        let row = distances.row(i);
        let nearest = row
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, d)| *d)
            .fold(f64::INFINITY, f64::min);

        let mut beta = 1.0;
        let mut beta_min = f64::NEG_INFINITY;
        let mut beta_max = f64::INFINITY;

        for _ in 0..BINARY_SEARCH_STEPS {
            // shifting by the nearest distance leaves the entropy unchanged
            let mut sum = 0.0;
            let mut weighted = 0.0;
            for (j, d) in row.iter().enumerate() {
                if j == i {
                    conditional[[i, j]] = 0.0;
                    continue;
                }
                let shifted = d - nearest;
                let p = (-shifted * beta).exp();
                conditional[[i, j]] = p;
                sum += p;
                weighted += shifted * p;
            }
            let sum = sum.max(MIN_PROBABILITY);
            let entropy = sum.ln() + beta * weighted / sum;

            let difference = entropy - target;
            if difference.abs() < PERPLEXITY_TOLERANCE {
                break;
            }
            if difference > 0.0 {
                beta_min = beta;
                beta = if beta_max.is_infinite() { beta * 2.0 } else { (beta + beta_max) / 2.0 };
            } else {
                beta_max = beta;
                beta = if beta_min.is_infinite() { beta / 2.0 } else { (beta + beta_min) / 2.0 };
            }
        }

        let sum = conditional.row(i).sum().max(MIN_PROBABILITY);
        conditional.row_mut(i).mapv_inplace(|p| p / sum);
    }

    let joint = (&conditional + &conditional.t()) / (2.0 * n as f64);
    joint.mapv(|p| p.max(MIN_PROBABILITY))
}

fn kl_divergence(p: &Array2<f64>, kernel: &Array2<f64>, normalizer: f64) -> f64 {
    let mut total = 0.0;
    for ((i, j), &pij) in p.indexed_iter() {
        if i != j {
            let q = (kernel[[i, j]] / normalizer).max(MIN_PROBABILITY);
            total += pij * (pij / q).ln();
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::test_data;

    fn small() -> Tsne {
        Tsne {
            perplexity: 5.0,
            max_iter: 500,
            seed: Some(7),
            ..Tsne::new(2)
        }
    }

    #[test]
    fn test_defaults() {
        let tsne = Tsne::new(2);
        assert_eq!(tsne.perplexity, 30.0);
        assert_eq!(tsne.learning_rate, 200.0);
        assert_eq!(tsne.max_iter, 1000);
        assert!(tsne.seed.is_none());
    }

    #[test]
    fn test_conditional_rows_match_perplexity() {
        let data = test_data::two_clusters(10, 4).mapv(f64::from);
        let distances = squared_distances(&data);
        let joint = joint_probabilities(&distances, 5.0);

        assert!((joint.sum() - 1.0).abs() < 1e-6);
        for i in 0..joint.nrows() {
            for j in 0..joint.ncols() {
                assert!((joint[[i, j]] - joint[[j, i]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_shape_and_reproducibility() {
        let data = test_data::two_clusters(10, 5);
        let first = small().reduce(&data).unwrap();
        let second = small().reduce(&data).unwrap();

        assert_eq!(first.dim(), (20, 2));
        assert_eq!(first, second);
    }

    #[test]
    fn test_starts_from_scaled_pca_layout() {
        let data = test_data::two_clusters(10, 5);
        let layout = small().initial_layout(&data);
        let pca = Pca::new(2).reduce(&data).unwrap().mapv(f64::from);

        assert_eq!(layout.dim(), (20, 2));
        assert!((layout.column(0).std(0.0) - INITIAL_SCALE).abs() < 1e-10);
        // same axes as PCA up to a positive scale
        let ratio = layout[[0, 0]] / pca[[0, 0]];
        assert!(ratio > 0.0);
        for (l, p) in layout.iter().zip(pca.iter()) {
            assert!((l - p * ratio).abs() < 1e-9);
        }

        // PCA start leaves the seed irrelevant
        let other_seed = Tsne {
            seed: Some(99),
            ..small()
        };
        assert_eq!(small().reduce(&data).unwrap(), other_seed.reduce(&data).unwrap());
    }

    #[test]
    fn test_random_layout_when_pca_unavailable() {
        // a single feature cannot give two principal axes
        let data = test_data::two_clusters(10, 1);
        let layout = small().initial_layout(&data);
        assert_eq!(layout.dim(), (20, 2));
        assert!(layout.iter().all(|v| v.abs() <= INITIAL_SCALE));

        let reduced = small().reduce(&data).unwrap();
        assert_eq!(reduced.dim(), (20, 2));
        assert!(reduced.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_separates_clusters() {
        let data = test_data::two_clusters(10, 5);
        let reduced = small().reduce(&data).unwrap();
        let (intra, inter) = test_data::cluster_distances(&reduced, 10);
        assert!(intra < inter, "intra {} inter {}", intra, inter);
    }

    #[test]
    fn test_requires_more_samples_than_perplexity() {
        let data = test_data::two_clusters(5, 3);
        assert!(matches!(
            Tsne::new(2).reduce(&data),
            Err(ReductionError::InsufficientSamples { algorithm: "tsne", required: 31, actual: 10 })
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let data = test_data::two_clusters(20, 3);
        let tsne = Tsne {
            perplexity: 0.0,
            ..Tsne::new(2)
        };
        assert!(matches!(tsne.reduce(&data), Err(ReductionError::InvalidParameter(_))));

        let tsne = Tsne {
            learning_rate: -1.0,
            ..small()
        };
        assert!(matches!(tsne.reduce(&data), Err(ReductionError::InvalidParameter(_))));
    }
}

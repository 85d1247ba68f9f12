//! UMAP over an exact nearest-neighbour graph

use super::{check_components, seeded_rng, ReductionError, UmapMetric};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use std::collections::BTreeMap;

const SPREAD: f64 = 1.0;
const LEARNING_RATE: f64 = 1.0;
const NEGATIVE_SAMPLE_RATE: usize = 5;
const LOCAL_CONNECTIVITY: f64 = 1.0;
const SMOOTH_KNN_STEPS: usize = 64;
const SMOOTH_KNN_TOLERANCE: f64 = 1e-5;
const MIN_SCALE: f64 = 1e-3;
const GRADIENT_CLIP: f64 = 4.0;
const INIT_RANGE: f64 = 10.0;
const LARGE_DATASET: usize = 10_000;

/// Uniform manifold approximation and projection
///
/// Builds the exact k-nearest-neighbour graph (each point counts as its own
/// first neighbour), turns it into a fuzzy simplicial set and lays it out
/// with negative-sampling SGD.
#[derive(Debug, Clone)]
pub struct Umap {
    pub n_components: usize,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub metric: UmapMetric,
    /// 500 for up to 10k samples, 200 beyond, when unset
    pub n_epochs: Option<usize>,
    pub seed: Option<u64>,
}

impl Umap {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            n_neighbors: 15,
            min_dist: 0.1,
            metric: UmapMetric::Cosine,
            n_epochs: None,
            seed: None,
        }
    }

    pub fn reduce(&self, data: &Array2<f32>) -> Result<Array2<f32>, ReductionError> {
        self.validate()?;
        let n = data.nrows();
        if n == 0 {
            return Err(ReductionError::InsufficientSamples {
                algorithm: "umap",
                required: 1,
                actual: 0,
            });
        }
        if n == 1 {
            return Ok(Array2::zeros((1, self.n_components)));
        }

        let n_neighbors = if n > self.n_neighbors {
            self.n_neighbors
        } else {
            let truncated = (n - 1).max(2);
            tracing::warn!(
                "n_neighbors ({}) is not below the sample count ({}); truncating to {}",
                self.n_neighbors,
                n,
                truncated
            );
            truncated
        };

        let x = data.mapv(f64::from);
        let (knn_indices, knn_distances) = nearest_neighbors(&x, n_neighbors, self.metric);
        let (sigmas, rhos) = smooth_knn_distances(&knn_distances, n_neighbors);
        let graph = fuzzy_union(&knn_indices, &knn_distances, &sigmas, &rhos);

        let n_epochs = self
            .n_epochs
            .unwrap_or(if n <= LARGE_DATASET { 500 } else { 200 });
        let (a, b) = fit_ab(SPREAD, self.min_dist);
        tracing::debug!(
            "UMAP graph: {} edges, a = {:.4}, b = {:.4}, {} epochs",
            graph.len(),
            a,
            b,
            n_epochs
        );

        let mut rng = seeded_rng(self.seed);
        let mut embedding = random_layout(n, self.n_components, &mut rng);
        optimize_layout(&mut embedding, &graph, n_epochs, a, b, &mut rng);

        Ok(embedding.mapv(|v| v as f32))
    }

    fn validate(&self) -> Result<(), ReductionError> {
        check_components(self.n_components)?;
        if self.n_neighbors < 2 {
            return Err(ReductionError::InvalidParameter(format!(
                "n_neighbors must be at least 2, got {}",
                self.n_neighbors
            )));
        }
        if self.min_dist.is_nan() || self.min_dist < 0.0 || self.min_dist > SPREAD {
            return Err(ReductionError::InvalidParameter(format!(
                "min_dist must lie in [0, {}], got {}",
                SPREAD, self.min_dist
            )));
        }
        if self.n_epochs == Some(0) {
            return Err(ReductionError::InvalidParameter(
                "n_epochs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exact k nearest neighbours of every row, nearest first
fn nearest_neighbors(
    x: &Array2<f64>,
    k: usize,
    metric: UmapMetric,
) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
    let n = x.nrows();
    let distances = match metric {
        UmapMetric::Euclidean => {
            let norms = x.map_axis(Axis(1), |row| row.dot(&row));
            let gram = x.dot(&x.t());
            Array2::from_shape_fn((n, n), |(i, j)| {
                if i == j {
                    0.0
                } else {
                    (norms[i] + norms[j] - 2.0 * gram[[i, j]]).max(0.0).sqrt()
                }
            })
        }
        UmapMetric::Cosine => {
            let norms = x.map_axis(Axis(1), |row| row.dot(&row).sqrt());
            let gram = x.dot(&x.t());
            Array2::from_shape_fn((n, n), |(i, j)| {
                if i == j {
                    0.0
                } else if norms[i] == 0.0 && norms[j] == 0.0 {
                    0.0
                } else if norms[i] == 0.0 || norms[j] == 0.0 {
                    1.0
                } else {
                    (1.0 - gram[[i, j]] / (norms[i] * norms[j])).max(0.0)
                }
            })
        }
    };

    let mut indices = Vec::with_capacity(n);
    let mut dists = Vec::with_capacity(n);
    for i in 0..n {
        let mut order: Vec<usize> = (0..n).collect();
        // self first, then by distance, then by index
        order.sort_by(|&p, &q| {
            (p != i)
                .cmp(&(q != i))
                .then(distances[[i, p]].total_cmp(&distances[[i, q]]))
                .then(p.cmp(&q))
        });
        order.truncate(k);
        dists.push(order.iter().map(|&j| distances[[i, j]]).collect());
        indices.push(order);
    }
    (indices, dists)
}

/// Per-point bandwidth `sigma` and nearest-neighbour distance `rho`
///
/// `sigma` is chosen so the membership strengths of each neighbourhood sum
/// to `log2(k)`.
fn smooth_knn_distances(knn_distances: &[Vec<f64>], k: usize) -> (Vec<f64>, Vec<f64>) {
    let target = (k as f64).log2();
    let all_mean = {
        let total: f64 = knn_distances.iter().flatten().sum();
        let count = knn_distances.iter().map(Vec::len).sum::<usize>().max(1);
        total / count as f64
    };

    let mut sigmas = Vec::with_capacity(knn_distances.len());
    let mut rhos = Vec::with_capacity(knn_distances.len());

    for distances in knn_distances {
        let non_zero: Vec<f64> = distances.iter().copied().filter(|d| *d > 0.0).collect();
        let rho = if non_zero.len() as f64 >= LOCAL_CONNECTIVITY {
            non_zero[LOCAL_CONNECTIVITY as usize - 1]
        } else {
            non_zero.iter().copied().fold(0.0, f64::max)
        };

        let mut low = 0.0;
        let mut high = f64::INFINITY;
        let mut mid = 1.0;
        for _ in 0..SMOOTH_KNN_STEPS {
            let strength: f64 = distances
                .iter()
                .skip(1)
                .map(|d| {
                    let gap = d - rho;
                    if gap > 0.0 {
                        (-gap / mid).exp()
                    } else {
                        1.0
                    }
                })
                .sum();

            if (strength - target).abs() < SMOOTH_KNN_TOLERANCE {
                break;
            }
            if strength > target {
                high = mid;
                mid = (low + high) / 2.0;
            } else {
                low = mid;
                mid = if high.is_infinite() { mid * 2.0 } else { (low + high) / 2.0 };
            }
        }

        let floor = if rho > 0.0 {
            let mean = distances.iter().sum::<f64>() / distances.len().max(1) as f64;
            MIN_SCALE * mean
        } else {
            MIN_SCALE * all_mean
        };

        sigmas.push(mid.max(floor));
        rhos.push(rho);
    }

    (sigmas, rhos)
}

/// Symmetric fuzzy graph `A + A^T - A * A^T` as weighted directed edges
///
/// Edges are ordered by `(head, tail)` so a seeded layout is reproducible.
fn fuzzy_union(
    knn_indices: &[Vec<usize>],
    knn_distances: &[Vec<f64>],
    sigmas: &[f64],
    rhos: &[f64],
) -> Vec<(usize, usize, f64)> {
    let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (i, (neighbors, distances)) in knn_indices.iter().zip(knn_distances).enumerate() {
        for (&j, &d) in neighbors.iter().zip(distances) {
            if i == j {
                continue;
            }
            let strength = if d - rhos[i] <= 0.0 || sigmas[i] == 0.0 {
                1.0
            } else {
                (-(d - rhos[i]) / sigmas[i]).exp()
            };
            directed.insert((i, j), strength);
        }
    }

    let mut union: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (&(i, j), &w) in &directed {
        let reverse = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let combined = w + reverse - w * reverse;
        union.insert((i, j), combined);
        union.insert((j, i), combined);
    }

    union
        .into_iter()
        .filter(|(_, w)| *w > 0.0)
        .map(|((i, j), w)| (i, j, w))
        .collect()
}

/// Fit `1 / (1 + a * x^(2b))` to the offset exponential membership curve
///
/// Least squares over 300 points on `[0, 3 * spread]` by Levenberg-Marquardt.
pub fn fit_ab(spread: f64, min_dist: f64) -> (f64, f64) {
    let samples = 300;
    let xs: Vec<f64> = (0..samples)
        .map(|i| 3.0 * spread * i as f64 / (samples - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() })
        .collect();

    let curve = |a: f64, b: f64, x: f64| -> f64 {
        if x == 0.0 {
            1.0
        } else {
            1.0 / (1.0 + a * x.powf(2.0 * b))
        }
    };
    let squared_error = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| (curve(a, b, x) - y).powi(2))
            .sum()
    };

    let (mut a, mut b) = (1.0, 1.0);
    let mut lambda = 1e-3;
    let mut error = squared_error(a, b);

    for _ in 0..500 {
        // normal equations J^T J and J^T r
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (&x, &y) in xs.iter().zip(&ys) {
            if x == 0.0 {
                continue;
            }
            let u = x.powf(2.0 * b);
            let denominator = (1.0 + a * u).powi(2);
            let da = -u / denominator;
            let db = -2.0 * a * u * x.ln() / denominator;
            let residual = curve(a, b, x) - y;
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * residual;
            gb += db * residual;
        }

        let m11 = jaa * (1.0 + lambda);
        let m22 = jbb * (1.0 + lambda);
        let determinant = m11 * m22 - jab * jab;
        if determinant.abs() < f64::MIN_POSITIVE {
            break;
        }
        let step_a = -(m22 * ga - jab * gb) / determinant;
        let step_b = -(m11 * gb - jab * ga) / determinant;

        let (next_a, next_b) = (a + step_a, b + step_b);
        let next_error = squared_error(next_a, next_b);
        if next_error.is_finite() && next_error < error {
            let improvement = error - next_error;
            a = next_a;
            b = next_b;
            error = next_error;
            lambda = (lambda / 10.0).max(1e-12);
            if improvement < 1e-14 {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }

    (a, b)
}

/// Uniform layout in `[-10, 10]`, rescaled to `[0, 10]` per dimension
fn random_layout<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Array2<f64> {
    let mut layout = Array2::from_shape_fn((n, k), |_| rng.gen_range(-INIT_RANGE..INIT_RANGE));
    for mut column in layout.columns_mut() {
        let min = column.iter().copied().fold(f64::INFINITY, f64::min);
        let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range > 0.0 {
            column.mapv_inplace(|v| 10.0 * (v - min) / range);
        }
    }
    layout
}

fn clip(value: f64) -> f64 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

/// Negative-sampling SGD over the fuzzy graph's edges
///
/// Each edge is sampled in proportion to its weight. Both endpoints move
/// along attractive gradients; only the head moves away from negative
/// samples.
fn optimize_layout<R: Rng + ?Sized>(
    embedding: &mut Array2<f64>,
    graph: &[(usize, usize, f64)],
    n_epochs: usize,
    a: f64,
    b: f64,
    rng: &mut R,
) {
    let (n, k) = embedding.dim();
    let max_weight = graph.iter().map(|(_, _, w)| *w).fold(0.0, f64::max);
    if max_weight <= 0.0 {
        return;
    }

    // edges too weak to be sampled once are dropped
    let threshold = max_weight / n_epochs as f64;
    let edges: Vec<(usize, usize, f64)> = graph
        .iter()
        .copied()
        .filter(|(_, _, w)| *w >= threshold)
        .map(|(i, j, w)| (i, j, max_weight / w))
        .collect();

    let epochs_per_negative: Vec<f64> = edges
        .iter()
        .map(|(_, _, every)| every / NEGATIVE_SAMPLE_RATE as f64)
        .collect();
    let mut next_sample: Vec<f64> = edges.iter().map(|(_, _, every)| *every).collect();
    let mut next_negative = epochs_per_negative.clone();

    let mut current = Array1::<f64>::zeros(k);
    for epoch in 0..n_epochs {
        let epoch_f = epoch as f64;
        let alpha = LEARNING_RATE * (1.0 - epoch_f / n_epochs as f64);

        for (e, &(head, tail, every)) in edges.iter().enumerate() {
            if next_sample[e] > epoch_f {
                continue;
            }

            current.assign(&embedding.row(head));
            let dist_sq = squared_gap(&current, embedding, tail);
            let coefficient = if dist_sq > 0.0 {
                -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..k {
                let gradient = clip(coefficient * (current[d] - embedding[[tail, d]]));
                current[d] += gradient * alpha;
                embedding[[tail, d]] -= gradient * alpha;
            }
            next_sample[e] += every;

            let negatives = ((epoch_f - next_negative[e]) / epochs_per_negative[e])
                .floor()
                .max(0.0) as usize;
            for _ in 0..negatives {
                let other = rng.gen_range(0..n);
                if other == head {
                    continue;
                }
                let dist_sq = squared_gap(&current, embedding, other);
                let coefficient = if dist_sq > 0.0 {
                    2.0 * b / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                } else {
                    0.0
                };
                if coefficient <= 0.0 && other == tail {
                    continue;
                }
                for d in 0..k {
                    let gradient = if coefficient > 0.0 {
                        clip(coefficient * (current[d] - embedding[[other, d]]))
                    } else {
                        GRADIENT_CLIP
                    };
                    current[d] += gradient * alpha;
                }
            }
            next_negative[e] += negatives as f64 * epochs_per_negative[e];

            embedding.row_mut(head).assign(&current);
        }

        if (epoch + 1) % 100 == 0 {
            tracing::debug!("UMAP epoch {} of {}", epoch + 1, n_epochs);
        }
    }
}

fn squared_gap(point: &Array1<f64>, embedding: &Array2<f64>, row: usize) -> f64 {
    point
        .iter()
        .zip(embedding.row(row).iter())
        .map(|(p, q)| (p - q) * (p - q))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::test_data;

    fn small(metric: UmapMetric) -> Umap {
        Umap {
            n_neighbors: 5,
            metric,
            n_epochs: Some(200),
            seed: Some(11),
            ..Umap::new(2)
        }
    }

    #[test]
    fn test_curve_fit_matches_reference_values() {
        let (a, b) = fit_ab(1.0, 0.1);
        assert!((a - 1.577).abs() < 0.02, "a = {}", a);
        assert!((b - 0.895).abs() < 0.01, "b = {}", b);
    }

    #[test]
    fn test_neighbors_include_self_first() {
        let data = test_data::two_clusters(6, 3).mapv(f64::from);
        let (indices, distances) = nearest_neighbors(&data, 4, UmapMetric::Euclidean);
        for (i, neighbors) in indices.iter().enumerate() {
            assert_eq!(neighbors.len(), 4);
            assert_eq!(neighbors[0], i);
            assert_eq!(distances[i][0], 0.0);
            // nearest neighbours stay inside the point's own cluster
            assert!(neighbors.iter().all(|&j| (j < 6) == (i < 6)));
            assert!(distances[i].windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_fuzzy_graph_is_symmetric() {
        let data = test_data::two_clusters(6, 3).mapv(f64::from);
        let (indices, distances) = nearest_neighbors(&data, 4, UmapMetric::Cosine);
        let (sigmas, rhos) = smooth_knn_distances(&distances, 4);
        let graph = fuzzy_union(&indices, &distances, &sigmas, &rhos);

        let weights: BTreeMap<(usize, usize), f64> =
            graph.iter().map(|&(i, j, w)| ((i, j), w)).collect();
        for (&(i, j), &w) in &weights {
            assert_ne!(i, j);
            assert!(w > 0.0 && w <= 1.0);
            assert_eq!(weights.get(&(j, i)), Some(&w));
        }
    }

    #[test]
    fn test_shape_and_reproducibility() {
        let data = test_data::two_clusters(15, 6);
        let first = small(UmapMetric::Cosine).reduce(&data).unwrap();
        let second = small(UmapMetric::Cosine).reduce(&data).unwrap();
        assert_eq!(first.dim(), (30, 2));
        assert_eq!(first, second);
    }

    #[test]
    fn test_separates_clusters() {
        let data = test_data::two_clusters(15, 6);
        for metric in [UmapMetric::Cosine, UmapMetric::Euclidean] {
            let reduced = small(metric).reduce(&data).unwrap();
            let (intra, inter) = test_data::cluster_distances(&reduced, 15);
            assert!(intra < inter, "{}: intra {} inter {}", metric, intra, inter);
        }
    }

    #[test]
    fn test_truncates_neighbors_on_small_corpus() {
        let data = test_data::two_clusters(6, 4);
        let umap = Umap {
            seed: Some(1),
            ..Umap::new(2)
        };
        let reduced = umap.reduce(&data).unwrap();
        assert_eq!(reduced.dim(), (12, 2));
        assert!(reduced.iter().all(|v| v.is_finite()));

        let pair = test_data::two_clusters(1, 4);
        let reduced = umap.reduce(&pair).unwrap();
        assert_eq!(reduced.dim(), (2, 2));
        assert!(reduced.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_single_and_empty_inputs() {
        let single = Array2::<f32>::ones((1, 5));
        assert_eq!(Umap::new(2).reduce(&single).unwrap(), Array2::<f32>::zeros((1, 2)));

        let empty = Array2::<f32>::zeros((0, 5));
        assert!(matches!(
            Umap::new(2).reduce(&empty),
            Err(ReductionError::InsufficientSamples { algorithm: "umap", required: 1, actual: 0 })
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let data = test_data::two_clusters(10, 3);
        let umap = Umap {
            min_dist: 2.0,
            ..small(UmapMetric::Euclidean)
        };
        assert!(matches!(umap.reduce(&data), Err(ReductionError::InvalidParameter(_))));

        let umap = Umap {
            n_epochs: Some(0),
            ..small(UmapMetric::Euclidean)
        };
        assert!(matches!(umap.reduce(&data), Err(ReductionError::InvalidParameter(_))));
    }
}

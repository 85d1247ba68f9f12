//! Linear projection onto the top principal axes

use super::{check_components, ReductionError};
use ndarray::{s, Array1, Array2, Axis};

/// Principal component analysis by power iteration with deflation
///
/// Each axis starts from the same fixed vector, so the projection is fully
/// deterministic. Axis signs are normalized so the largest-magnitude loading
/// is positive.
#[derive(Debug, Clone)]
pub struct Pca {
    pub n_components: usize,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            max_iter: 1000,
            tolerance: 1e-12,
        }
    }

    pub fn reduce(&self, data: &Array2<f32>) -> Result<Array2<f32>, ReductionError> {
        check_components(self.n_components)?;
        let (n, d) = data.dim();
        let k = self.n_components;

        if n < k || n == 0 {
            return Err(ReductionError::InsufficientSamples {
                algorithm: "pca",
                required: k.max(1),
                actual: n,
            });
        }
        if d < k {
            return Err(ReductionError::InvalidParameter(format!(
                "pca needs at least {} features, got {}",
                k, d
            )));
        }

        let x = data.mapv(f64::from);
        let mean = x.sum_axis(Axis(0)) / n as f64;
        let centered = &x - &mean;

        let scale = (n.saturating_sub(1)).max(1) as f64;
        let mut covariance = centered.t().dot(&centered) / scale;
        let mut components = Array2::<f64>::zeros((k, d));

        for c in 0..k {
            let (axis, eigenvalue) = self.leading_axis(&covariance, components.slice(s![..c, ..]))?;
            tracing::debug!("pca component {}: explained variance {:.6}", c, eigenvalue);

            // remove the found axis from the covariance
            let column = axis.view().insert_axis(Axis(1));
            let row = axis.view().insert_axis(Axis(0));
            covariance = covariance - column.dot(&row) * eigenvalue;

            components.row_mut(c).assign(&axis);
        }

        Ok(centered.dot(&components.t()).mapv(|v| v as f32))
    }

    /// Dominant unit eigenvector of `covariance`, orthogonal to `found`
    fn leading_axis(
        &self,
        covariance: &Array2<f64>,
        found: ndarray::ArrayView2<f64>,
    ) -> Result<(Array1<f64>, f64), ReductionError> {
        let d = covariance.nrows();
        let mut axis = start_vector(d, found).ok_or_else(|| {
            ReductionError::InvalidParameter("no axis left orthogonal to previous components".into())
        })?;
        let mut eigenvalue = 0.0;

        for _ in 0..self.max_iter {
            let mut next = covariance.dot(&axis);
            orthogonalize(&mut next, found);
            let norm = next.dot(&next).sqrt();
            if norm <= f64::EPSILON {
                // no variance left in the remaining subspace
                eigenvalue = 0.0;
                break;
            }
            next /= norm;

            let alignment = next.dot(&axis).abs();
            axis = next;
            eigenvalue = norm;
            if 1.0 - alignment < self.tolerance {
                break;
            }
        }

        let pivot = axis
            .iter()
            .enumerate()
            .fold((0, 0.0f64), |best, (i, v)| if v.abs() > best.1.abs() { (i, *v) } else { best })
            .1;
        if pivot < 0.0 {
            axis.mapv_inplace(|v| -v);
        }

        Ok((axis, eigenvalue))
    }
}

/// Fixed, asymmetric start vector made orthogonal to the axes already found
///
/// Falls back to the standard basis when the default start lies in their span.
fn start_vector(d: usize, found: ndarray::ArrayView2<f64>) -> Option<Array1<f64>> {
    let default = Array1::from_shape_fn(d, |i| 1.0 + i as f64 / d as f64);
    let candidates = std::iter::once(default).chain((0..d).map(|i| {
        let mut basis = Array1::zeros(d);
        basis[i] = 1.0;
        basis
    }));

    for mut candidate in candidates {
        orthogonalize(&mut candidate, found);
        let norm = candidate.dot(&candidate).sqrt();
        if norm > 1e-8 {
            return Some(candidate / norm);
        }
    }
    None
}

fn orthogonalize(vector: &mut Array1<f64>, found: ndarray::ArrayView2<f64>) {
    for axis in found.rows() {
        let projection = vector.dot(&axis);
        vector.scaled_add(-projection, &axis);
    }
}

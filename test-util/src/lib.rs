use ndarray::Array2;
use rand::prelude::*;
use rand_distr::Normal;

/// Elliptical Gaussian sampled at pixel centers, pixel values are fluxes
///
/// Sky coordinates are `u = scale * (col - col0)` and `v = scale * (row - row0)`, `cen` is the
/// `[u, v]` center and `cov` is the `[[uu, uv], [uv, vv]]` covariance matrix.
pub fn gaussian_image(
    shape: (usize, usize),
    (row0, col0): (f64, f64),
    scale: f64,
    cen: [f64; 2],
    cov: [[f64; 2]; 2],
    flux: f64,
) -> Array2<f64> {
    let det = cov[0][0] * cov[1][1] - cov[0][1] * cov[1][0];
    assert!(det > 0.0, "covariance must be positive definite");
    let norm = flux * scale * scale / (std::f64::consts::TAU * det.sqrt());
    Array2::from_shape_fn(shape, |(row, col)| {
        let u = scale * (col as f64 - col0) - cen[0];
        let v = scale * (row as f64 - row0) - cen[1];
        let chi2 = (cov[1][1] * u * u - 2.0 * cov[0][1] * u * v + cov[0][0] * v * v) / det;
        norm * f64::exp(-0.5 * chi2)
    })
}

/// Covariance of a round Gaussian of width `sigma` sheared by `(g1, g2)`
pub fn sheared_covariance(sigma: f64, g1: f64, g2: f64) -> [[f64; 2]; 2] {
    let g_sq = g1 * g1 + g2 * g2;
    assert!(g_sq < 1.0, "|g| must be smaller than unity");
    let factor = sigma * sigma / (1.0 - g_sq);
    [
        [factor * ((1.0 + g1).powi(2) + g2 * g2), factor * 2.0 * g2],
        [factor * 2.0 * g2, factor * ((1.0 - g1).powi(2) + g2 * g2)],
    ]
}

/// Add Gaussian noise of standard deviation `sigma` to every pixel
pub fn add_noise(image: &mut Array2<f64>, sigma: f64, rng: &mut impl Rng) {
    let normal = Normal::new(0.0, sigma).expect("sigma must be finite and non-negative");
    image.mapv_inplace(|x| x + normal.sample(rng));
}

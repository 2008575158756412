use crate::error::FitError;
use crate::observation::Jacobian;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Sky-plane wave vectors of every element of a k-space image
///
/// Elements follow the FFT layout of a pixel image: zero frequency at index `[0, 0]`, negative
/// frequencies in the upper half of each axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KGrid {
    pub ku: Array2<f64>,
    pub kv: Array2<f64>,
}

/// FFT sample frequency of index `i` of an axis of length `n`, cycles per pixel
fn fft_freq(i: usize, n: usize) -> f64 {
    let i = i as isize;
    let n_signed = n as isize;
    let m = if 2 * i < n_signed { i } else { i - n_signed };
    m as f64 / n as f64
}

impl KGrid {
    /// Grid matching the FFT of an image of the given shape with the given pixel-to-sky mapping
    ///
    /// A pixel-frequency vector $f = (f_\mathrm{row}, f_\mathrm{col})$ corresponds to the sky
    /// wave vector $k = 2\pi J^{-T} f$ so that $k \cdot (u, v) = 2\pi f \cdot \Delta p$.
    pub fn from_jacobian(shape: (usize, usize), jacobian: &Jacobian) -> Result<Self, FitError> {
        let det = jacobian.det();
        if det == 0.0 || !det.is_finite() {
            return Err(FitError::SingularJacobian);
        }
        let (nrow, ncol) = shape;
        let mut ku = Array2::zeros(shape);
        let mut kv = Array2::zeros(shape);
        Zip::indexed(&mut ku)
            .and(&mut kv)
            .for_each(|(row, col), ku, kv| {
                let f_row = fft_freq(row, nrow);
                let f_col = fft_freq(col, ncol);
                *ku = TAU * (f_row * jacobian.dvdcol - f_col * jacobian.dvdrow) / det;
                *kv = TAU * (f_col * jacobian.dudrow - f_row * jacobian.dudcol) / det;
            });
        Ok(Self { ku, kv })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.ku.dim()
    }

    pub fn len(&self) -> usize {
        self.ku.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ku.is_empty()
    }
}

use crate::error::FitError;

use fftw::array::AlignedVec;
use fftw::plan::{C2CPlan, C2CPlan64};
use fftw::types::{Flag, Sign};
use ndarray::Array2;
use num_complex::Complex64;

/// Forward two-dimensional DFT of a real image, $X_m = \sum_n x_n e^{-2\pi i\,m n / N}$
pub fn fft2(image: &Array2<f64>) -> Result<Array2<Complex64>, FitError> {
    let shape = image.dim();
    let size = image.len();

    let mut plan = C2CPlan64::aligned(&[shape.0, shape.1], Sign::Forward, Flag::ESTIMATE)
        .map_err(|err| FitError::Fft(err.to_string()))?;
    let mut input = AlignedVec::new(size);
    for (dst, &src) in input.iter_mut().zip(image.iter()) {
        *dst = Complex64::new(src, 0.0);
    }
    let mut output = AlignedVec::new(size);
    plan.c2c(&mut input, &mut output)
        .map_err(|err| FitError::Fft(err.to_string()))?;

    Array2::from_shape_vec(shape, output.to_vec()).map_err(|err| FitError::Fft(err.to_string()))
}

/// Inverse two-dimensional DFT normalized by the number of elements, so `ifft2(fft2(x)) == x`
pub fn ifft2(kimage: &Array2<Complex64>) -> Result<Array2<Complex64>, FitError> {
    let shape = kimage.dim();
    let size = kimage.len();

    let mut plan = C2CPlan64::aligned(&[shape.0, shape.1], Sign::Backward, Flag::ESTIMATE)
        .map_err(|err| FitError::Fft(err.to_string()))?;
    let mut input = AlignedVec::new(size);
    for (dst, &src) in input.iter_mut().zip(kimage.iter()) {
        *dst = src;
    }
    let mut output = AlignedVec::new(size);
    plan.c2c(&mut input, &mut output)
        .map_err(|err| FitError::Fft(err.to_string()))?;

    let norm = (size as f64).recip();
    let values: Vec<Complex64> = output.iter().map(|&value| value * norm).collect();
    Array2::from_shape_vec(shape, values).map_err(|err| FitError::Fft(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use std::f64::consts::TAU;

    #[test]
    fn matches_direct_dft() {
        let image = Array2::from_shape_fn((4, 6), |(i, j)| (i * 7 + j * 3) as f64 % 5.0 - 1.5);
        let fft = fft2(&image).unwrap();
        for ((m_row, m_col), &actual) in fft.indexed_iter() {
            let mut desired = Complex64::new(0.0, 0.0);
            for ((row, col), &value) in image.indexed_iter() {
                let phase =
                    -TAU * ((m_row * row) as f64 / 4.0 + (m_col * col) as f64 / 6.0);
                desired += Complex64::from_polar(value, phase);
            }
            assert_abs_diff_eq!(actual.re, desired.re, epsilon = 1e-10);
            assert_abs_diff_eq!(actual.im, desired.im, epsilon = 1e-10);
        }
    }

    #[test]
    fn inverse_restores_image() {
        let image = Array2::from_shape_fn((5, 8), |(i, j)| f64::sin((i * 8 + j) as f64));
        let restored = ifft2(&fft2(&image).unwrap()).unwrap();
        for (&actual, &desired) in restored.iter().zip(image.iter()) {
            assert_abs_diff_eq!(actual.re, desired, epsilon = 1e-12);
            assert_abs_diff_eq!(actual.im, 0.0, epsilon = 1e-12);
        }
    }
}

use crate::error::FitError;
use crate::observation::fft::{fft2, ifft2};
use crate::observation::{Jacobian, Observation, PsfObservation};
use crate::render::KGrid;

use ndarray::{Array2, Zip};
use num_complex::Complex64;

/// Observation in k-space
///
/// `kimage` follows the FFT layout described by `kgrid`, `weight` is the inverse variance of both
/// the real and the imaginary part of every element.
#[derive(Clone, Debug)]
pub struct KObservation {
    pub kimage: Array2<Complex64>,
    pub weight: Array2<f64>,
    pub kgrid: KGrid,
    pub psf_kimage: Option<Array2<Complex64>>,
}

fn check_shape(
    what: &'static str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<(), FitError> {
    if expected == actual {
        Ok(())
    } else {
        Err(FitError::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}

impl KObservation {
    pub fn new(
        kimage: Array2<Complex64>,
        weight: Array2<f64>,
        kgrid: KGrid,
        psf_kimage: Option<Array2<Complex64>>,
    ) -> Result<Self, FitError> {
        if kimage.is_empty() {
            return Err(FitError::EmptyArray { what: "k-image" });
        }
        let shape = kimage.dim();
        check_shape("weight", shape, weight.dim())?;
        check_shape("k-grid", shape, kgrid.dim())?;
        if let Some(psf_kimage) = &psf_kimage {
            check_shape("PSF k-image", shape, psf_kimage.dim())?;
        }
        Ok(Self {
            kimage,
            weight,
            kgrid,
            psf_kimage,
        })
    }

    /// Transform a pixel-space observation
    ///
    /// Pixel values are fluxes, so the k-image at zero wave vector is the total flux. The
    /// Jacobian reference pixel becomes the origin, so the result is directly comparable to the
    /// analytic profiles. Each element gets the weight $1 / (N \langle\sigma^2\rangle)$, where
    /// $N$ is the number of pixels and $\langle\sigma^2\rangle$ the mean variance of pixels with
    /// positive weight; for uniform noise the k-space $\chi^2$ equals the pixel one.
    pub fn from_observation(obs: &Observation) -> Result<Self, FitError> {
        let shape = obs.image.dim();
        let kgrid = KGrid::from_jacobian(shape, &obs.jacobian)?;

        let (n_positive, variance_sum) = obs
            .weight
            .iter()
            .filter(|&&w| w > 0.0)
            .fold((0usize, 0.0), |(n, sum), &w| (n + 1, sum + w.recip()));
        if n_positive == 0 {
            return Err(FitError::NoPositiveWeight);
        }
        let mean_variance = variance_sum / n_positive as f64;
        let kweight = (obs.image.len() as f64 * mean_variance).recip();
        let weight = Array2::from_elem(shape, kweight);

        let mut kimage = fft2(&obs.image)?;
        let (v00, u00) = obs.jacobian.vu(0.0, 0.0);
        Zip::from(&mut kimage)
            .and(&kgrid.ku)
            .and(&kgrid.kv)
            .for_each(|value, &ku, &kv| {
                *value *= Complex64::from_polar(1.0, -(ku * u00 + kv * v00));
            });

        let psf_kimage = match &obs.psf {
            Some(PsfObservation::Image { image, jacobian }) => {
                Some(psf_image_to_kspace(image, jacobian, &kgrid)?)
            }
            Some(PsfObservation::KImage(psf_kimage)) => Some(psf_kimage.clone()),
            None => None,
        };

        Self::new(kimage, weight, kgrid, psf_kimage)
    }

    pub fn has_psf(&self) -> bool {
        self.psf_kimage.is_some()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.kimage.dim()
    }

    pub fn len(&self) -> usize {
        self.kimage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kimage.is_empty()
    }
}

/// Pixel-space image of a k-image sampled on the grid of [KObservation::from_observation]
///
/// Inverse of the data transform: the Jacobian reference pixel phase is removed before the
/// inverse FFT, and only the real part is kept.
pub fn kimage_to_image(
    kimage: &Array2<Complex64>,
    kgrid: &KGrid,
    jacobian: &Jacobian,
) -> Result<Array2<f64>, FitError> {
    check_shape("k-grid", kimage.dim(), kgrid.dim())?;
    let (v00, u00) = jacobian.vu(0.0, 0.0);
    let mut shifted = kimage.clone();
    Zip::from(&mut shifted)
        .and(&kgrid.ku)
        .and(&kgrid.kv)
        .for_each(|value, &ku, &kv| {
            *value *= Complex64::from_polar(1.0, ku * u00 + kv * v00);
        });
    Ok(ifft2(&shifted)?.mapv(|value| value.re))
}

/// Unit-flux PSF k-image sampled on the wave vectors of `kgrid`
///
/// Uses a direct transform, so the PSF stamp may have any shape and pixel-to-sky mapping. The
/// phase factor is separable over rows and columns for every wave vector.
fn psf_image_to_kspace(
    image: &Array2<f64>,
    jacobian: &Jacobian,
    kgrid: &KGrid,
) -> Result<Array2<Complex64>, FitError> {
    if image.is_empty() {
        return Err(FitError::EmptyArray { what: "PSF image" });
    }
    let flux = image.sum();
    if !(flux > 0.0) || !flux.is_finite() {
        return Err(FitError::NonPositivePsfFlux(flux));
    }
    let (nrow, ncol) = image.dim();
    let mut row_phases = vec![Complex64::new(0.0, 0.0); nrow];
    let mut col_phases = vec![Complex64::new(0.0, 0.0); ncol];

    let mut psf_kimage = Array2::zeros(kgrid.dim());
    Zip::from(&mut psf_kimage)
        .and(&kgrid.ku)
        .and(&kgrid.kv)
        .for_each(|value, &ku, &kv| {
            let row_freq = ku * jacobian.dudrow + kv * jacobian.dvdrow;
            let col_freq = ku * jacobian.dudcol + kv * jacobian.dvdcol;
            for (row, phase) in row_phases.iter_mut().enumerate() {
                *phase = Complex64::from_polar(1.0, -row_freq * (row as f64 - jacobian.row0));
            }
            for (col, phase) in col_phases.iter_mut().enumerate() {
                *phase = Complex64::from_polar(1.0, -col_freq * (col as f64 - jacobian.col0));
            }
            let sum: Complex64 = image
                .outer_iter()
                .zip(row_phases.iter())
                .map(|(row, &row_phase)| {
                    let row_sum: Complex64 = row
                        .iter()
                        .zip(col_phases.iter())
                        .map(|(&pixel, &col_phase)| col_phase * pixel)
                        .sum();
                    row_sum * row_phase
                })
                .sum();
            *value = sum / flux;
        });
    Ok(psf_kimage)
}

#[cfg(test)]
#[allow(clippy::unreadable_literal)]
mod tests {
    use super::*;
    use crate::render::{Profile, RoundProfile, Shear};

    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use light_profile_kfit_test_util::{gaussian_image, sheared_covariance};

    const SCALE: f64 = 0.2;

    fn gaussian_profile(sigma: f64, g: [f64; 2], cen: [f64; 2], flux: f64) -> Profile {
        let hlr = sigma * f64::sqrt(2.0 * std::f64::consts::LN_2);
        Profile::new(RoundProfile::gaussian(hlr, flux).unwrap())
            .shear(Shear::new(g[0], g[1]).unwrap())
            .shift(cen[0], cen[1])
            .unwrap()
    }

    #[test]
    fn sampled_gaussian_matches_analytic_transform() {
        let (sigma, g, cen, flux) = (0.5, [0.1, -0.05], [0.13, -0.21], 40.0);
        let jacobian = Jacobian::diagonal(SCALE, 31.3, 32.6);
        let image = gaussian_image(
            (64, 64),
            (jacobian.row0, jacobian.col0),
            SCALE,
            cen,
            sheared_covariance(sigma, g[0], g[1]),
            flux,
        );
        let obs = Observation::new(image, Array2::ones((64, 64)), jacobian).unwrap();
        let kobs = KObservation::from_observation(&obs).unwrap();

        let profile = gaussian_profile(sigma, g, cen, flux);
        let mut model = Array2::zeros(kobs.dim());
        profile.draw_into(&kobs.kgrid, &mut model, None);
        Zip::from(&kobs.kimage).and(&model).for_each(|&data, &model| {
            assert_abs_diff_eq!(data.re, model.re, epsilon = 1e-8 * flux);
            assert_abs_diff_eq!(data.im, model.im, epsilon = 1e-8 * flux);
        });
    }

    #[test]
    fn psf_is_normalized_and_matches_analytic_transform() {
        let sigma = 0.4;
        let psf_jacobian = Jacobian::diagonal(SCALE, 12.0, 12.0);
        let psf_image = gaussian_image(
            (25, 25),
            (12.0, 12.0),
            SCALE,
            [0.0, 0.0],
            sheared_covariance(sigma, 0.0, 0.0),
            7.0,
        );
        let kgrid = KGrid::from_jacobian((32, 32), &Jacobian::diagonal(SCALE, 16.0, 16.0)).unwrap();
        let psf_kimage = psf_image_to_kspace(&psf_image, &psf_jacobian, &kgrid).unwrap();
        assert_relative_eq!(psf_kimage[[0, 0]].re, 1.0, max_relative = 1e-12);

        let profile = gaussian_profile(sigma, [0.0, 0.0], [0.0, 0.0], 1.0);
        let mut model = Array2::zeros(kgrid.dim());
        profile.draw_into(&kgrid, &mut model, None);
        Zip::from(&psf_kimage).and(&model).for_each(|&psf, &model| {
            assert_abs_diff_eq!(psf.re, model.re, epsilon = 1e-6);
            assert_abs_diff_eq!(psf.im, model.im, epsilon = 1e-6);
        });
    }

    #[test]
    fn kspace_weight_preserves_chi2() {
        let sigma_pixel: f64 = 0.1;
        let shape = (16, 20);
        let jacobian = Jacobian::diagonal(0.3, 7.5, 9.5);
        let weight = Array2::from_elem(shape, sigma_pixel.powi(-2));
        let residual = Array2::from_shape_fn(shape, |(i, j)| ((i * 31 + j * 17) % 11) as f64 - 5.0);
        let pixel_chi2 = (&residual * &residual * &weight).sum();

        let obs = Observation::new(residual, weight, jacobian).unwrap();
        let kobs = KObservation::from_observation(&obs).unwrap();
        let kspace_chi2 = Zip::from(&kobs.kimage)
            .and(&kobs.weight)
            .fold(0.0, |acc, &value, &w| acc + value.norm_sqr() * w);
        assert_relative_eq!(kspace_chi2, pixel_chi2, max_relative = 1e-10);
    }

    #[test]
    fn kimage_to_image_inverts_data_transform() {
        let jacobian = Jacobian::new(6.3, 8.6, 0.21, 0.02, -0.01, 0.19);
        let image = Array2::from_shape_fn((12, 17), |(i, j)| f64::cos(0.7 * i as f64 + 0.3 * j as f64));
        let obs = Observation::new(image.clone(), Array2::ones((12, 17)), jacobian).unwrap();
        let kobs = KObservation::from_observation(&obs).unwrap();
        let restored = kimage_to_image(&kobs.kimage, &kobs.kgrid, &jacobian).unwrap();
        Zip::from(&restored).and(&image).for_each(|&actual, &desired| {
            assert_abs_diff_eq!(actual, desired, epsilon = 1e-12);
        });
    }

    #[test]
    fn invalid_observations() {
        let jacobian = Jacobian::diagonal(1.0, 0.0, 0.0);
        let obs = Observation::new(Array2::zeros((4, 4)), Array2::zeros((4, 4)), jacobian).unwrap();
        assert_eq!(
            KObservation::from_observation(&obs).unwrap_err(),
            FitError::NoPositiveWeight
        );

        let psf = PsfObservation::Image {
            image: Array2::zeros((3, 3)),
            jacobian,
        };
        let obs = Observation::new(Array2::zeros((4, 4)), Array2::ones((4, 4)), jacobian)
            .unwrap()
            .with_psf(psf);
        assert_eq!(
            KObservation::from_observation(&obs).unwrap_err(),
            FitError::NonPositivePsfFlux(0.0)
        );

        let obs = Observation::new(Array2::zeros((4, 4)), Array2::ones((4, 4)), jacobian)
            .unwrap()
            .with_psf(PsfObservation::KImage(Array2::zeros((4, 5))));
        assert!(matches!(
            KObservation::from_observation(&obs),
            Err(FitError::ShapeMismatch { .. })
        ));
    }
}

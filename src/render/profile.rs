use crate::error::ProfileError;
use crate::render::KGrid;
use crate::render::special::{DEV_KTABLE, moffat_kprofile, spergel_hlr_ratio};

use ndarray::{Array2, Zip};
use num_complex::Complex64;

/// Ratio of the half-light radius to $\sigma$ of a Gaussian, $\sqrt{2 \ln 2}$
const GAUSSIAN_HLR_SIGMA: f64 = 1.177_410_022_515_474_7;

/// Ratio of the half-light radius to the scale radius of an exponential profile
const EXPONENTIAL_HLR_R0: f64 = 1.678_346_990_016_660_5;

fn check_finite(value: f64, name: &'static str) -> Result<f64, ProfileError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProfileError::NonFinite(name))
    }
}

fn check_positive_hlr(hlr: f64) -> Result<f64, ProfileError> {
    let hlr = check_finite(hlr, "half-light radius")?;
    if hlr > 0.0 {
        Ok(hlr)
    } else {
        Err(ProfileError::OutOfRange {
            name: "half-light radius",
            value: hlr,
            range: "(0, inf)",
        })
    }
}

/// Unsheared profile centered at the origin
///
/// All profiles are normalized so that the k-space value at $k = 0$ equals the flux.
#[derive(Clone, Debug, PartialEq)]
pub enum RoundProfile {
    Gaussian { sigma: f64, flux: f64 },
    Exponential { r0: f64, flux: f64 },
    DeVaucouleurs { hlr: f64, flux: f64 },
    Spergel { nu: f64, r0: f64, flux: f64 },
    Moffat { beta: f64, rd: f64, flux: f64 },
}

impl RoundProfile {
    pub const SPERGEL_NU_MIN: f64 = -0.85;
    pub const SPERGEL_NU_MAX: f64 = 4.0;
    /// Untruncated Moffat profiles are supported for larger indexes only
    pub const MOFFAT_BETA_MIN: f64 = 1.1;
    pub const MOFFAT_BETA_MAX: f64 = 100.0;

    pub fn gaussian(hlr: f64, flux: f64) -> Result<Self, ProfileError> {
        Ok(Self::Gaussian {
            sigma: check_positive_hlr(hlr)? / GAUSSIAN_HLR_SIGMA,
            flux: check_finite(flux, "flux")?,
        })
    }

    pub fn exponential(hlr: f64, flux: f64) -> Result<Self, ProfileError> {
        Ok(Self::Exponential {
            r0: check_positive_hlr(hlr)? / EXPONENTIAL_HLR_R0,
            flux: check_finite(flux, "flux")?,
        })
    }

    pub fn de_vaucouleurs(hlr: f64, flux: f64) -> Result<Self, ProfileError> {
        Ok(Self::DeVaucouleurs {
            hlr: check_positive_hlr(hlr)?,
            flux: check_finite(flux, "flux")?,
        })
    }

    pub fn spergel(nu: f64, hlr: f64, flux: f64) -> Result<Self, ProfileError> {
        let nu = check_finite(nu, "Spergel index")?;
        if !(Self::SPERGEL_NU_MIN..=Self::SPERGEL_NU_MAX).contains(&nu) {
            return Err(ProfileError::OutOfRange {
                name: "Spergel index",
                value: nu,
                range: "[-0.85, 4.0]",
            });
        }
        Ok(Self::Spergel {
            nu,
            r0: check_positive_hlr(hlr)? / spergel_hlr_ratio(nu),
            flux: check_finite(flux, "flux")?,
        })
    }

    pub fn moffat(beta: f64, hlr: f64, flux: f64) -> Result<Self, ProfileError> {
        let beta = check_finite(beta, "Moffat beta")?;
        if !(beta > Self::MOFFAT_BETA_MIN && beta <= Self::MOFFAT_BETA_MAX) {
            return Err(ProfileError::OutOfRange {
                name: "Moffat beta",
                value: beta,
                range: "(1.1, 100]",
            });
        }
        let hlr_rd = f64::sqrt(f64::powf(2.0, 1.0 / (beta - 1.0)) - 1.0);
        Ok(Self::Moffat {
            beta,
            rd: check_positive_hlr(hlr)? / hlr_rd,
            flux: check_finite(flux, "flux")?,
        })
    }

    pub fn flux(&self) -> f64 {
        match *self {
            Self::Gaussian { flux, .. }
            | Self::Exponential { flux, .. }
            | Self::DeVaucouleurs { flux, .. }
            | Self::Spergel { flux, .. }
            | Self::Moffat { flux, .. } => flux,
        }
    }

    /// Real k-space value at the squared wave number `k2`
    pub fn kvalue(&self, k2: f64) -> f64 {
        match *self {
            Self::Gaussian { sigma, flux } => flux * f64::exp(-0.5 * k2 * sigma * sigma),
            Self::Exponential { r0, flux } => flux * f64::powf(1.0 + k2 * r0 * r0, -1.5),
            Self::DeVaucouleurs { hlr, flux } => flux * DEV_KTABLE.eval(k2.sqrt() * hlr),
            Self::Spergel { nu, r0, flux } => flux * f64::powf(1.0 + k2 * r0 * r0, -1.0 - nu),
            Self::Moffat { beta, rd, flux } => flux * moffat_kprofile(beta - 1.0, k2.sqrt() * rd),
        }
    }
}

/// Reduced shear $g = (g_1, g_2)$ with $|g| < 1$
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shear {
    g1: f64,
    g2: f64,
}

impl Shear {
    pub fn new(g1: f64, g2: f64) -> Result<Self, ProfileError> {
        let g1 = check_finite(g1, "g1")?;
        let g2 = check_finite(g2, "g2")?;
        let g = f64::hypot(g1, g2);
        if g >= 1.0 {
            return Err(ProfileError::ShearExceedsUnity(g));
        }
        Ok(Self { g1, g2 })
    }

    pub fn g1(&self) -> f64 {
        self.g1
    }

    pub fn g2(&self) -> f64 {
        self.g2
    }

    /// Symmetric unit-determinant matrix mapping round coordinates onto sheared ones
    ///
    /// $S = \frac{1}{\sqrt{1 - g^2}} \begin{pmatrix} 1 + g_1 & g_2 \\ g_2 & 1 - g_1 \end{pmatrix}$
    fn matrix(&self) -> [[f64; 2]; 2] {
        let norm = f64::sqrt(1.0 - self.g1 * self.g1 - self.g2 * self.g2).recip();
        [
            [norm * (1.0 + self.g1), norm * self.g2],
            [norm * self.g2, norm * (1.0 - self.g1)],
        ]
    }
}

/// Sheared and shifted profile, ready to be drawn into a k-space buffer
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    round: RoundProfile,
    shear: Option<Shear>,
    offset: [f64; 2],
}

impl Profile {
    pub fn new(round: RoundProfile) -> Self {
        Self {
            round,
            shear: None,
            offset: [0.0, 0.0],
        }
    }

    pub fn shear(self, shear: Shear) -> Self {
        Self {
            shear: Some(shear),
            ..self
        }
    }

    /// Moves the profile center to $(u, v)$
    pub fn shift(self, du: f64, dv: f64) -> Result<Self, ProfileError> {
        Ok(Self {
            offset: [
                self.offset[0] + check_finite(du, "u offset")?,
                self.offset[1] + check_finite(dv, "v offset")?,
            ],
            ..self
        })
    }

    pub fn round(&self) -> &RoundProfile {
        &self.round
    }

    /// Complex k-space value at the wave vector $(k_u, k_v)$
    #[inline]
    pub fn kvalue(&self, ku: f64, kv: f64) -> Complex64 {
        let (ku_round, kv_round) = match self.shear {
            Some(shear) => {
                let s = shear.matrix();
                (s[0][0] * ku + s[0][1] * kv, s[1][0] * ku + s[1][1] * kv)
            }
            None => (ku, kv),
        };
        let amplitude = self
            .round
            .kvalue(ku_round * ku_round + kv_round * kv_round);
        let phase = -(ku * self.offset[0] + kv * self.offset[1]);
        Complex64::from_polar(amplitude, phase)
    }

    /// Render into `kimage` sampled on `grid`, multiplying by `psf_kimage` when given
    pub fn draw_into(
        &self,
        grid: &KGrid,
        kimage: &mut Array2<Complex64>,
        psf_kimage: Option<&Array2<Complex64>>,
    ) {
        Zip::from(&mut *kimage)
            .and(&grid.ku)
            .and(&grid.kv)
            .for_each(|value, &ku, &kv| *value = self.kvalue(ku, kv));
        if let Some(psf_kimage) = psf_kimage {
            Zip::from(kimage)
                .and(psf_kimage)
                .for_each(|value, &psf| *value *= psf);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unreadable_literal)]
mod tests {
    use super::*;

    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn all_round_profiles(hlr: f64, flux: f64) -> Vec<RoundProfile> {
        vec![
            RoundProfile::gaussian(hlr, flux).unwrap(),
            RoundProfile::exponential(hlr, flux).unwrap(),
            RoundProfile::de_vaucouleurs(hlr, flux).unwrap(),
            RoundProfile::spergel(-0.3, hlr, flux).unwrap(),
            RoundProfile::spergel(2.0, hlr, flux).unwrap(),
            RoundProfile::moffat(3.5, hlr, flux).unwrap(),
        ]
    }

    #[test]
    fn zero_wave_number_gives_flux() {
        for profile in all_round_profiles(0.7, 123.0) {
            assert_relative_eq!(profile.kvalue(0.0), 123.0, max_relative = 1e-9);
            assert!(profile.kvalue(4.0) < 123.0, "{profile:?}");
        }
    }

    #[test]
    fn spergel_half_is_exponential() {
        let spergel = RoundProfile::spergel(0.5, 0.8, 10.0).unwrap();
        let exponential = RoundProfile::exponential(0.8, 10.0).unwrap();
        for &k2 in &[0.1, 1.0, 10.0, 100.0] {
            assert_relative_eq!(
                spergel.kvalue(k2),
                exponential.kvalue(k2),
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn moffat_beta_three_halves_is_exponential_in_k() {
        // x^{1/2} K_{1/2}(x) = sqrt(pi / 2) e^{-x}
        let profile = RoundProfile::moffat(1.5, 1.0, 2.0).unwrap();
        let RoundProfile::Moffat { rd, .. } = profile else {
            unreachable!()
        };
        for &k in &[0.1, 1.0, 3.0] {
            let desired = 2.0 * f64::exp(-k * rd);
            assert_relative_eq!(profile.kvalue(k * k), desired, max_relative = 1e-9);
        }
    }

    #[test]
    fn moffat_large_beta_stays_finite() {
        let profile = RoundProfile::moffat(RoundProfile::MOFFAT_BETA_MAX, 0.5, 50.0).unwrap();
        let mut prev = profile.kvalue(0.0);
        assert_relative_eq!(prev, 50.0);
        for &k2 in &[1e-4, 0.01, 1.0, 10.0, 100.0, 1e4] {
            let value = profile.kvalue(k2);
            assert!(value.is_finite() && value <= prev, "k2 = {k2}: {value}");
            prev = value;
        }
    }

    #[test]
    fn invalid_round_profiles() {
        assert!(RoundProfile::gaussian(0.0, 1.0).is_err());
        assert!(RoundProfile::exponential(-1.0, 1.0).is_err());
        assert!(RoundProfile::de_vaucouleurs(f64::NAN, 1.0).is_err());
        assert!(RoundProfile::spergel(4.5, 1.0, 1.0).is_err());
        assert!(RoundProfile::spergel(-0.9, 1.0, 1.0).is_err());
        assert!(RoundProfile::moffat(1.05, 1.0, 1.0).is_err());
        assert!(RoundProfile::moffat(150.0, 1.0, 1.0).is_err());
        assert!(RoundProfile::gaussian(1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn shear_range() {
        assert!(Shear::new(0.3, -0.4).is_ok());
        assert_eq!(
            Shear::new(1.5, 0.0),
            Err(ProfileError::ShearExceedsUnity(1.5))
        );
        assert!(Shear::new(0.6, 0.8).is_err());
        assert!(Shear::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn shear_stretches_along_u() {
        let round = RoundProfile::gaussian(1.0, 1.0).unwrap();
        let profile = Profile::new(round).shear(Shear::new(0.2, 0.0).unwrap());
        // elongated along u, so the k-space image is compressed along k_u
        assert!(profile.kvalue(1.0, 0.0).re < profile.kvalue(0.0, 1.0).re);
        assert_relative_eq!(profile.kvalue(0.0, 0.0).re, 1.0);
    }

    #[test]
    fn shift_changes_phase_only() {
        let round = RoundProfile::exponential(0.5, 3.0).unwrap();
        let centered = Profile::new(round.clone());
        let shifted = Profile::new(round).shift(0.3, -0.2).unwrap();
        let (ku, kv) = (1.3, 0.4);
        let a = centered.kvalue(ku, kv);
        let b = shifted.kvalue(ku, kv);
        assert_relative_eq!(a.norm(), b.norm(), max_relative = 1e-12);
        assert_abs_diff_eq!(b.arg(), -(ku * 0.3 - kv * 0.2), epsilon = 1e-12);
    }

    #[test]
    fn draw_into_applies_psf() {
        let grid = KGrid {
            ku: Array2::from_shape_fn((3, 3), |(_, j)| j as f64),
            kv: Array2::from_shape_fn((3, 3), |(i, _)| i as f64),
        };
        let profile = Profile::new(RoundProfile::gaussian(0.5, 2.0).unwrap());
        let psf = Array2::from_elem((3, 3), Complex64::new(0.5, 0.0));
        let mut plain = Array2::zeros((3, 3));
        let mut convolved = Array2::zeros((3, 3));
        profile.draw_into(&grid, &mut plain, None);
        profile.draw_into(&grid, &mut convolved, Some(&psf));
        assert_relative_eq!(plain[[0, 0]].re, 2.0);
        Zip::from(&plain).and(&convolved).for_each(|&p, &c| {
            assert_relative_eq!(c.re, 0.5 * p.re);
            assert_relative_eq!(c.im, 0.5 * p.im);
        });
    }
}

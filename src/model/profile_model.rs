use crate::error::{InvalidModelParameters, ProfileError};
use crate::render::{Profile, RoundProfile, Shear};

use enum_dispatch::enum_dispatch;
use std::fmt::Debug;

/// Smallest half-light radius accepted for rendering
pub const MIN_HLR: f64 = 1e-4;

/// Index of the half-light radius in both full and per-band parameter vectors
const HLR_INDEX: usize = 4;

/// Parameter packing and round-model construction of a model family
///
/// Full parameter vectors are `[c1, c2, g1, g2, r50, (shape parameters...), flux_1, ...,
/// flux_nband]`, band parameter vectors have a single flux: `[c1, c2, g1, g2, r50, (shape
/// parameters...), flux]`.
#[enum_dispatch]
pub trait ProfileModelTrait: Clone + Debug {
    /// Number of band-independent parameters
    fn n_shape_pars(&self) -> usize;

    /// Build the round renderer profile from band parameters
    fn make_round_model(&self, band_pars: &[f64]) -> Result<RoundProfile, ProfileError>;

    fn npars(&self, nband: usize) -> usize {
        self.n_shape_pars() + nband
    }

    fn n_band_pars(&self) -> usize {
        self.n_shape_pars() + 1
    }

    /// Number of residual terms of a separable prior: c1, c2, (g1, g2), r50, shape parameters
    /// and fluxes
    fn n_prior_pars(&self, nband: usize) -> usize {
        self.n_shape_pars() - 1 + nband
    }

    /// Copy parameters of `band` into `band_pars`
    fn fill_band_pars(&self, pars: &[f64], band: usize, band_pars: &mut [f64]) {
        let n = self.n_shape_pars();
        band_pars[..n].copy_from_slice(&pars[..n]);
        band_pars[n] = pars[n + band];
    }

    /// Unsheared profile centered at the origin
    fn render_round(&self, band_pars: &[f64]) -> Result<Profile, InvalidModelParameters> {
        let hlr = band_pars[HLR_INDEX];
        if !(hlr >= MIN_HLR) {
            return Err(InvalidModelParameters::new(format!("low r50: {hlr}")));
        }
        Ok(Profile::new(self.make_round_model(band_pars)?))
    }

    /// Profile sheared by `(g1, g2)` and shifted by `(c1, c2)`
    fn render_full(&self, band_pars: &[f64]) -> Result<Profile, InvalidModelParameters> {
        let shear = Shear::new(band_pars[2], band_pars[3])?;
        let profile = self
            .render_round(band_pars)?
            .shear(shear)
            .shift(band_pars[0], band_pars[1])?;
        Ok(profile)
    }
}

/// Profiles with no shape parameters besides the size
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimpleFamily {
    Exponential,
    DeVaucouleurs,
    Gaussian,
}

/// Exponential, de Vaucouleurs and Gaussian models, `[c1, c2, g1, g2, r50, flux...]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimpleProfileModel {
    pub family: SimpleFamily,
}

impl ProfileModelTrait for SimpleProfileModel {
    fn n_shape_pars(&self) -> usize {
        5
    }

    fn make_round_model(&self, band_pars: &[f64]) -> Result<RoundProfile, ProfileError> {
        let (hlr, flux) = (band_pars[4], band_pars[5]);
        match self.family {
            SimpleFamily::Exponential => RoundProfile::exponential(hlr, flux),
            SimpleFamily::DeVaucouleurs => RoundProfile::de_vaucouleurs(hlr, flux),
            SimpleFamily::Gaussian => RoundProfile::gaussian(hlr, flux),
        }
    }
}

/// Spergel model, `[c1, c2, g1, g2, r50, nu, flux...]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpergelProfileModel;

impl ProfileModelTrait for SpergelProfileModel {
    fn n_shape_pars(&self) -> usize {
        6
    }

    fn make_round_model(&self, band_pars: &[f64]) -> Result<RoundProfile, ProfileError> {
        RoundProfile::spergel(band_pars[5], band_pars[4], band_pars[6])
    }
}

/// Moffat model, `[c1, c2, g1, g2, r50, beta, flux...]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MoffatProfileModel;

impl ProfileModelTrait for MoffatProfileModel {
    fn n_shape_pars(&self) -> usize {
        6
    }

    fn make_round_model(&self, band_pars: &[f64]) -> Result<RoundProfile, ProfileError> {
        RoundProfile::moffat(band_pars[5], band_pars[4], band_pars[6])
    }
}

/// Rendering behavior of a [ModelVariant](crate::ModelVariant)
#[enum_dispatch(ProfileModelTrait)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileModel {
    Simple(SimpleProfileModel),
    Spergel(SpergelProfileModel),
    Moffat(MoffatProfileModel),
}

//! Pixel-space and k-space observations

mod fft;

mod jacobian;
pub use jacobian::Jacobian;

mod kobs;
pub use kobs::{KObservation, kimage_to_image};

use crate::error::FitError;

use ndarray::Array2;
use num_complex::Complex64;

/// Point-spread function of an [Observation]
#[derive(Clone, Debug)]
pub enum PsfObservation {
    /// PSF image with its own pixel-to-sky mapping, it is normalized to unit flux
    Image {
        image: Array2<f64>,
        jacobian: Jacobian,
    },
    /// Unit-flux PSF already sampled on the k-grid of the observation
    KImage(Array2<Complex64>),
}

/// Pixel-space image with its inverse-variance weight map
#[derive(Clone, Debug)]
pub struct Observation {
    pub image: Array2<f64>,
    pub weight: Array2<f64>,
    pub jacobian: Jacobian,
    pub psf: Option<PsfObservation>,
}

impl Observation {
    pub fn new(
        image: Array2<f64>,
        weight: Array2<f64>,
        jacobian: Jacobian,
    ) -> Result<Self, FitError> {
        if image.is_empty() {
            return Err(FitError::EmptyArray { what: "image" });
        }
        if image.dim() != weight.dim() {
            return Err(FitError::ShapeMismatch {
                what: "weight",
                expected: image.dim(),
                actual: weight.dim(),
            });
        }
        Ok(Self {
            image,
            weight,
            jacobian,
            psf: None,
        })
    }

    pub fn with_psf(self, psf: PsfObservation) -> Self {
        Self {
            psf: Some(psf),
            ..self
        }
    }

    pub fn has_psf(&self) -> bool {
        self.psf.is_some()
    }
}

/// Observations to fit: a single one, a list of epochs of one band, or a list of bands
///
/// Every form is accepted in pixel space and in k-space.
#[derive(Clone, Debug)]
pub enum ObsInput {
    Observation(Observation),
    ObsList(Vec<Observation>),
    MultiBand(Vec<Vec<Observation>>),
    KObservation(KObservation),
    KObsList(Vec<KObservation>),
    KMultiBand(Vec<Vec<KObservation>>),
}

impl ObsInput {
    /// Normalize into per-band lists of k-space observations
    pub fn into_kobs(self) -> Result<Vec<Vec<KObservation>>, FitError> {
        let mb_kobs = match self {
            Self::Observation(obs) => vec![vec![KObservation::from_observation(&obs)?]],
            Self::ObsList(obs_list) => vec![convert_list(&obs_list)?],
            Self::MultiBand(mb_obs) => mb_obs
                .iter()
                .map(|obs_list| convert_list(obs_list))
                .collect::<Result<_, _>>()?,
            Self::KObservation(kobs) => vec![vec![kobs]],
            Self::KObsList(kobs_list) => vec![kobs_list],
            Self::KMultiBand(mb_kobs) => mb_kobs,
        };
        if mb_kobs.is_empty() {
            return Err(FitError::NoObservations);
        }
        if let Some(band) = mb_kobs.iter().position(|kobs_list| kobs_list.is_empty()) {
            return Err(FitError::EmptyBand(band));
        }
        Ok(mb_kobs)
    }
}

fn convert_list(obs_list: &[Observation]) -> Result<Vec<KObservation>, FitError> {
    obs_list.iter().map(KObservation::from_observation).collect()
}

impl From<Observation> for ObsInput {
    fn from(obs: Observation) -> Self {
        Self::Observation(obs)
    }
}

impl From<Vec<Observation>> for ObsInput {
    fn from(obs_list: Vec<Observation>) -> Self {
        Self::ObsList(obs_list)
    }
}

impl From<Vec<Vec<Observation>>> for ObsInput {
    fn from(mb_obs: Vec<Vec<Observation>>) -> Self {
        Self::MultiBand(mb_obs)
    }
}

impl From<KObservation> for ObsInput {
    fn from(kobs: KObservation) -> Self {
        Self::KObservation(kobs)
    }
}

impl From<Vec<KObservation>> for ObsInput {
    fn from(kobs_list: Vec<KObservation>) -> Self {
        Self::KObsList(kobs_list)
    }
}

impl From<Vec<Vec<KObservation>>> for ObsInput {
    fn from(mb_kobs: Vec<Vec<KObservation>>) -> Self {
        Self::KMultiBand(mb_kobs)
    }
}

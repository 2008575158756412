//! Linear flux fit of a fixed template
//!
//! The template of every epoch is the PSF alone, or a fixed profile convolved with the PSF,
//! drawn on the pixel grid of the observation and normalized to unit sum. The only free
//! parameter is the flux, which has a closed-form least-squares solution:
//!
//! ```text
//! flux = sum(T * I * w) / sum(T^2 * w)
//! ```

use crate::error::FitError;
use crate::fit::SINGULAR_MATRIX;
use crate::observation::{KObservation, Observation, kimage_to_image};
use crate::render::Profile;

use log::debug;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Result of a [TemplateFluxFitter]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateFluxResult {
    /// Bit flags, zero on success
    pub flags: u32,
    pub flux: f64,
    /// Flux uncertainty scaled by the reduced $\chi^2$
    pub flux_err: Option<f64>,
    pub chi2per: f64,
    pub dof: usize,
}

impl TemplateFluxResult {
    pub fn is_success(&self) -> bool {
        self.flags == 0
    }
}

/// Template flux fitter over the epochs of a single band
///
/// Every observation must carry a PSF, the template is centered at the Jacobian reference point.
#[derive(Clone, Debug)]
pub struct TemplateFluxFitter {
    obs: Vec<Observation>,
    templates: Vec<Array2<f64>>,
}

impl TemplateFluxFitter {
    pub const NPARS: usize = 1;

    /// Create a fitter, `profile` is convolved with the PSF, `None` gives a PSF flux fit
    ///
    /// The flux and the center of `profile` are irrelevant for the normalized template unless
    /// the profile is shifted on purpose.
    pub fn new(
        obs: impl IntoIterator<Item = Observation>,
        profile: Option<&Profile>,
    ) -> Result<Self, FitError> {
        let obs: Vec<_> = obs.into_iter().collect();
        if obs.is_empty() {
            return Err(FitError::NoObservations);
        }
        let templates = obs
            .iter()
            .enumerate()
            .map(|(i, obs)| draw_template(i, obs, profile))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "template flux fitter: {} epoch(s), {}",
            obs.len(),
            if profile.is_some() { "profile convolved with PSF" } else { "PSF" }
        );
        Ok(Self { obs, templates })
    }

    /// Unit-sum templates of every epoch
    pub fn templates(&self) -> &[Array2<f64>] {
        &self.templates
    }

    pub fn totpix(&self) -> usize {
        self.obs.iter().map(|obs| obs.image.len()).sum()
    }

    pub fn fit(&self) -> TemplateFluxResult {
        let (mut xcorr_sum, mut msq_sum) = (0.0, 0.0);
        for (obs, template) in self.obs.iter().zip(&self.templates) {
            Zip::from(template)
                .and(&obs.image)
                .and(&obs.weight)
                .for_each(|&t, &data, &w| {
                    if w > 0.0 {
                        xcorr_sum += t * data * w;
                        msq_sum += t * t * w;
                    }
                });
        }

        let totpix = self.totpix();
        let dof = totpix.saturating_sub(Self::NPARS);
        if !(msq_sum > 0.0) {
            return TemplateFluxResult {
                flags: SINGULAR_MATRIX,
                flux: f64::NAN,
                flux_err: None,
                chi2per: f64::NAN,
                dof,
            };
        }
        let flux = xcorr_sum / msq_sum;

        let chi2: f64 = self
            .obs
            .iter()
            .zip(&self.templates)
            .map(|(obs, template)| {
                Zip::from(template)
                    .and(&obs.image)
                    .and(&obs.weight)
                    .fold(0.0, |acc, &t, &data, &w| {
                        if w > 0.0 {
                            acc + (flux * t - data).powi(2) * w
                        } else {
                            acc
                        }
                    })
            })
            .sum();
        let chi2per = if dof > 0 { chi2 / dof as f64 } else { f64::NAN };
        let flux_err = (totpix > 1).then(|| f64::sqrt(chi2 / msq_sum / (totpix - 1) as f64));

        TemplateFluxResult {
            flags: 0,
            flux,
            flux_err,
            chi2per,
            dof,
        }
    }
}

fn draw_template(
    index: usize,
    obs: &Observation,
    profile: Option<&Profile>,
) -> Result<Array2<f64>, FitError> {
    let kobs = KObservation::from_observation(obs)?;
    let psf_kimage = kobs
        .psf_kimage
        .as_ref()
        .ok_or(FitError::MissingPsf(index))?;
    let kmodel = match profile {
        Some(profile) => {
            let mut kmodel = Array2::zeros(kobs.dim());
            profile.draw_into(&kobs.kgrid, &mut kmodel, Some(psf_kimage));
            kmodel
        }
        None => psf_kimage.clone(),
    };
    let mut template = kimage_to_image(&kmodel, &kobs.kgrid, &obs.jacobian)?;
    let sum = template.sum();
    if !(sum > 0.0) || !sum.is_finite() {
        return Err(FitError::NonPositiveTemplateFlux(sum));
    }
    template /= sum;
    Ok(template)
}

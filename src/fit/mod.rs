//! Fourier-space fit session
//!
//! [KFitModel] owns the k-space observations together with per-observation scratch buffers and
//! turns a parameter vector into the residual vector minimized by a [LeastSquaresSolver]:
//!
//! ```text
//! fdiff = [prior terms..., Re(r) of band 0 epoch 0..., Im(r) of band 0 epoch 0..., ...]
//! r = (model - data) * sqrt(weight)
//! ```
//!
//! Parameters which cannot be rendered never produce an error here: every element of the
//! residual vector is set to [FDIFF_SENTINEL] instead, so the solver sees a very bad fit.

mod config;
pub use config::KFitConfig;

mod result;
pub use result::{
    BAD_BEST_FIT, FitResult, FitStats, LeastSquaresProblem, LeastSquaresSolver, MAXITER,
    NEG_COV_DIAG, SINGULAR_MATRIX, SolverResult, flags_str,
};

mod template;
pub use template::{TemplateFluxFitter, TemplateFluxResult};

use crate::FDIFF_SENTINEL;
use crate::error::{FitError, InvalidModelParameters};
use crate::model::{ModelVariant, ProfileModel, ProfileModelTrait};
use crate::observation::{KObservation, ObsInput};
use crate::prior::FdiffPrior;
use crate::render::Profile;

use log::{debug, trace, warn};
use ndarray::{Array1, Array2, Zip, s};
use num_complex::Complex64;

/// K-space observation with the buffers the residual function writes into
#[derive(Clone, Debug)]
struct KObsState {
    kobs: KObservation,
    /// Square root of the weight, zero where the weight isn't positive
    ierr: Array2<f64>,
    kmodel: Array2<Complex64>,
    scratch: Array2<Complex64>,
}

impl KObsState {
    fn new(kobs: KObservation) -> Self {
        let ierr = kobs
            .weight
            .mapv(|w| if w > 0.0 { w.sqrt() } else { 0.0 });
        let kmodel = Array2::zeros(kobs.dim());
        let scratch = Array2::zeros(kobs.dim());
        Self {
            kobs,
            ierr,
            kmodel,
            scratch,
        }
    }

    fn draw(&mut self, profile: &Profile) -> Result<(), InvalidModelParameters> {
        profile.draw_into(
            &self.kobs.kgrid,
            &mut self.kmodel,
            self.kobs.psf_kimage.as_ref(),
        );
        if self.kmodel.iter().all(|value| value.is_finite()) {
            Ok(())
        } else {
            Err(InvalidModelParameters::new("model k-image is not finite"))
        }
    }

    /// Write real parts then imaginary parts of the normalized difference, return the number of
    /// written values
    fn fill_fdiff(
        &mut self,
        profile: &Profile,
        fdiff: &mut [f64],
    ) -> Result<usize, InvalidModelParameters> {
        self.draw(profile)?;
        Zip::from(&mut self.scratch)
            .and(&self.kmodel)
            .and(&self.kobs.kimage)
            .and(&self.ierr)
            .for_each(|diff, &model, &data, &ierr| *diff = (model - data) * ierr);
        if !self.scratch.iter().all(|diff| diff.is_finite()) {
            return Err(InvalidModelParameters::new("residuals are not finite"));
        }

        let n = self.scratch.len();
        let (re, im) = fdiff[..2 * n].split_at_mut(n);
        for ((re, im), diff) in re.iter_mut().zip(im.iter_mut()).zip(self.scratch.iter()) {
            *re = diff.re;
            *im = diff.im;
        }
        Ok(2 * n)
    }

    fn weighted_power(&mut self, profile: &Profile) -> Result<f64, InvalidModelParameters> {
        self.draw(profile)?;
        Ok(Zip::from(&self.kmodel)
            .and(&self.kobs.weight)
            .fold(0.0, |acc, &model, &w| {
                acc + (model.re * model.re + model.im * model.im) * w
            }))
    }
}

/// Fit session of a single model to multi-band multi-epoch k-space observations
///
/// Residual evaluation reuses buffers owned by the session, so all evaluating methods take
/// `&mut self`.
#[derive(Debug)]
pub struct KFitModel {
    variant: ModelVariant,
    profile_model: ProfileModel,
    nband: usize,
    npars: usize,
    prior: Option<Box<dyn FdiffPrior>>,
    n_prior_pars: usize,
    mb_kobs: Vec<Vec<KObsState>>,
    totpix: usize,
    fdiff_size: usize,
    band_pars: Vec<f64>,
    guess: Vec<f64>,
}

impl KFitModel {
    /// Create a session for the model named `model`
    ///
    /// `obs` is a single observation, a list of epochs or a list of bands, in pixel space or in
    /// k-space. `guess` must have [crate::get_npars] elements and render in every band.
    pub fn new(
        obs: impl Into<ObsInput>,
        model: &str,
        guess: &[f64],
        prior: Option<Box<dyn FdiffPrior>>,
    ) -> Result<Self, FitError> {
        Self::with_variant(obs.into(), model.parse()?, guess, prior)
    }

    pub fn from_config(
        obs: impl Into<ObsInput>,
        config: &KFitConfig,
        guess: &[f64],
    ) -> Result<Self, FitError> {
        let prior = config
            .prior
            .clone()
            .map(|prior| Box::new(prior) as Box<dyn FdiffPrior>);
        Self::with_variant(obs.into(), config.model, guess, prior)
    }

    fn with_variant(
        obs: ObsInput,
        variant: ModelVariant,
        guess: &[f64],
        prior: Option<Box<dyn FdiffPrior>>,
    ) -> Result<Self, FitError> {
        let mb_kobs: Vec<Vec<_>> = obs
            .into_kobs()?
            .into_iter()
            .map(|kobs_list| kobs_list.into_iter().map(KObsState::new).collect())
            .collect();
        let nband = mb_kobs.len();

        let profile_model = variant.profile_model();
        let npars = profile_model.npars(nband);
        if guess.len() != npars {
            return Err(FitError::WrongGuessSize {
                expected: npars,
                actual: guess.len(),
            });
        }

        let n_prior_pars = match &prior {
            Some(prior) => {
                let expected = profile_model.n_prior_pars(nband);
                if prior.size() != expected {
                    return Err(FitError::WrongPriorSize {
                        expected,
                        actual: prior.size(),
                    });
                }
                expected
            }
            None => 0,
        };

        let mut band_pars = vec![0.0; profile_model.n_band_pars()];
        for band in 0..nband {
            profile_model.fill_band_pars(guess, band, &mut band_pars);
            profile_model.render_full(&band_pars)?;
        }

        let totpix = mb_kobs.iter().flatten().map(|state| state.kobs.len()).sum();
        let fdiff_size = n_prior_pars + 2 * totpix;
        debug!(
            "{variant} fit session: {nband} band(s), {npars} parameters, {totpix} k-space \
             pixels, {n_prior_pars} prior terms, {fdiff_size} residuals"
        );

        Ok(Self {
            variant,
            profile_model,
            nband,
            npars,
            prior,
            n_prior_pars,
            mb_kobs,
            totpix,
            fdiff_size,
            band_pars,
            guess: guess.to_vec(),
        })
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn nband(&self) -> usize {
        self.nband
    }

    pub fn npars(&self) -> usize {
        self.npars
    }

    pub fn n_prior_pars(&self) -> usize {
        self.n_prior_pars
    }

    /// Total number of k-space pixels over all bands and epochs
    pub fn totpix(&self) -> usize {
        self.totpix
    }

    pub fn fdiff_size(&self) -> usize {
        self.fdiff_size
    }

    pub fn guess(&self) -> &[f64] {
        &self.guess
    }

    /// K-space observations of every band
    pub fn kobs(&self) -> impl Iterator<Item = impl Iterator<Item = &KObservation>> {
        self.mb_kobs
            .iter()
            .map(|kobs_list| kobs_list.iter().map(|state| &state.kobs))
    }

    /// Fill the residual vector
    ///
    /// # Panics
    ///
    /// Panics if `pars` or `fdiff` lengths differ from [KFitModel::npars] and
    /// [KFitModel::fdiff_size].
    pub fn fill_fdiff(&mut self, pars: &[f64], fdiff: &mut [f64]) {
        assert_eq!(pars.len(), self.npars, "wrong number of parameters");
        assert_eq!(fdiff.len(), self.fdiff_size, "wrong residual vector size");
        fdiff.fill(0.0);
        if let Err(err) = self.try_fill_fdiff(pars, fdiff) {
            trace!("{err}, filling residuals with the sentinel");
            fdiff.fill(FDIFF_SENTINEL);
        }
    }

    /// Allocate and fill the residual vector, see [KFitModel::fill_fdiff]
    pub fn calc_fdiff(&mut self, pars: &[f64]) -> Array1<f64> {
        let mut fdiff = vec![0.0; self.fdiff_size];
        self.fill_fdiff(pars, &mut fdiff);
        Array1::from(fdiff)
    }

    fn try_fill_fdiff(
        &mut self,
        pars: &[f64],
        fdiff: &mut [f64],
    ) -> Result<(), InvalidModelParameters> {
        let mut start = match &self.prior {
            Some(prior) => prior.fill_fdiff(pars, fdiff)?,
            None => 0,
        };
        if start != self.n_prior_pars {
            return Err(InvalidModelParameters::new(format!(
                "prior wrote {start} terms instead of {}",
                self.n_prior_pars
            )));
        }

        for (band, kobs_list) in self.mb_kobs.iter_mut().enumerate() {
            self.profile_model
                .fill_band_pars(pars, band, &mut self.band_pars);
            let profile = self.profile_model.render_full(&self.band_pars)?;
            for state in kobs_list.iter_mut() {
                start += state.fill_fdiff(&profile, &mut fdiff[start..])?;
            }
        }
        Ok(())
    }

    /// Signal-to-noise ratio of the round (unsheared) model
    ///
    /// $\sqrt{\sum |M(k)|^2 w(k)}$ over every band and epoch, zero if the sum isn't positive.
    pub fn calc_s2n_r(&mut self, pars: &[f64]) -> Result<f64, InvalidModelParameters> {
        self.check_npars(pars)?;
        let mut s2n_sum = 0.0;
        for (band, kobs_list) in self.mb_kobs.iter_mut().enumerate() {
            self.profile_model
                .fill_band_pars(pars, band, &mut self.band_pars);
            self.band_pars[2] = 0.0;
            self.band_pars[3] = 0.0;
            let profile = self.profile_model.render_full(&self.band_pars)?;
            for state in kobs_list.iter_mut() {
                s2n_sum += state.weighted_power(&profile)?;
            }
        }
        if !s2n_sum.is_finite() {
            return Err(InvalidModelParameters::new(format!(
                "weighted model power is {s2n_sum}"
            )));
        }
        Ok(if s2n_sum > 0.0 { s2n_sum.sqrt() } else { 0.0 })
    }

    /// PSF-convolved model k-images of every band and epoch
    pub fn get_model_kimages(
        &mut self,
        pars: &[f64],
    ) -> Result<Vec<Vec<Array2<Complex64>>>, InvalidModelParameters> {
        self.check_npars(pars)?;
        let mut kimages = Vec::with_capacity(self.nband);
        for (band, kobs_list) in self.mb_kobs.iter_mut().enumerate() {
            self.profile_model
                .fill_band_pars(pars, band, &mut self.band_pars);
            let profile = self.profile_model.render_full(&self.band_pars)?;
            let band_kimages = kobs_list
                .iter_mut()
                .map(|state| {
                    state.draw(&profile)?;
                    Ok(state.kmodel.clone())
                })
                .collect::<Result<_, InvalidModelParameters>>()?;
            kimages.push(band_kimages);
        }
        Ok(kimages)
    }

    fn check_npars(&self, pars: &[f64]) -> Result<(), InvalidModelParameters> {
        if pars.len() == self.npars {
            Ok(())
        } else {
            Err(InvalidModelParameters::new(format!(
                "got {} parameters instead of {}",
                pars.len(),
                self.npars
            )))
        }
    }

    /// Run the solver starting from the guess
    pub fn fit(&mut self, solver: &impl LeastSquaresSolver) -> FitResult {
        let guess = self.guess.clone();
        let result = solver.solve(self, &guess);
        self.set_fit_result(result)
    }

    /// Derive fit statistics from the raw solver output
    pub fn set_fit_result(&mut self, result: SolverResult) -> FitResult {
        let SolverResult {
            mut flags,
            pars,
            pars_cov,
            nfev,
        } = result;

        if let Some(cov) = &pars_cov {
            if cov.diag().iter().any(|&var| !(var > 0.0)) {
                flags |= NEG_COV_DIAG;
            }
        }

        let stats = if flags == 0 {
            match self.fit_stats(&pars, pars_cov.as_ref()) {
                Ok(stats) => Some(stats),
                Err(err) => {
                    warn!("{} best fit cannot be rendered: {err}", self.variant);
                    flags |= BAD_BEST_FIT;
                    None
                }
            }
        } else {
            None
        };

        FitResult {
            model: self.variant,
            flags,
            pars,
            pars_cov,
            nfev,
            npars: self.npars,
            fdiff_size: self.fdiff_size,
            stats,
        }
    }

    fn fit_stats(
        &mut self,
        pars: &Array1<f64>,
        pars_cov: Option<&Array2<f64>>,
    ) -> Result<FitStats, InvalidModelParameters> {
        let pars = pars.to_vec();
        self.check_npars(&pars)?;
        if let Some(cov) = pars_cov {
            if cov.dim() != (self.npars, self.npars) {
                return Err(InvalidModelParameters::new(format!(
                    "covariance shape is {:?} for {} parameters",
                    cov.dim(),
                    self.npars
                )));
            }
        }

        let mut fdiff = vec![0.0; self.fdiff_size];
        self.try_fill_fdiff(&pars, &mut fdiff)?;
        let chi2: f64 = fdiff.iter().map(|x| x * x).sum();
        let dof = self.fdiff_size.saturating_sub(self.npars);
        let chi2per = if dof > 0 { chi2 / dof as f64 } else { f64::NAN };

        let s2n_r = self.calc_s2n_r(&pars)?;

        let flux_start = self.profile_model.n_shape_pars();
        let flux = Array1::from(pars[flux_start..].to_vec());
        let g_cov = pars_cov.map(|cov| {
            [
                [cov[[2, 2]], cov[[2, 3]]],
                [cov[[3, 2]], cov[[3, 3]]],
            ]
        });
        let flux_err = pars_cov.map(|cov| {
            cov.diag()
                .slice(s![flux_start..])
                .mapv(f64::sqrt)
        });

        Ok(FitStats {
            s2n_r,
            chi2per,
            dof,
            g: [pars[2], pars[3]],
            g_cov,
            flux,
            flux_err,
        })
    }
}

impl LeastSquaresProblem for KFitModel {
    fn npars(&self) -> usize {
        self.npars
    }

    fn fdiff_size(&self) -> usize {
        self.fdiff_size
    }

    fn fill_fdiff(&mut self, pars: &[f64], fdiff: &mut [f64]) {
        KFitModel::fill_fdiff(self, pars, fdiff)
    }
}

//! Fourier-space fitting of parametric light profiles to astronomical images
//!
//! Galaxy and star images of several bands and epochs are transformed into k-space once, then a
//! [KFitModel] evaluates the residual vector between a sheared, shifted and PSF-convolved model
//! profile and the data for any parameter vector. Any least-squares optimizer implementing
//! [LeastSquaresSolver] can minimize it. [TemplateFluxFitter] measures the flux of a fixed
//! PSF or PSF-convolved template with a linear fit.
//!
//! Supported models are listed by [ModelVariant]: exponential, de Vaucouleurs, Gaussian, Spergel
//! and Moffat. Parameters are `[c1, c2, g1, g2, r50, (nu or beta), flux_1, ..., flux_nband]`.
//!
//! ```
//! use light_profile_kfit::{Jacobian, KFitModel, Observation};
//! use ndarray::Array2;
//!
//! let jacobian = Jacobian::diagonal(0.263, 15.5, 15.5);
//! let obs = Observation::new(Array2::zeros((32, 32)), Array2::ones((32, 32)), jacobian).unwrap();
//! let mut fitter = KFitModel::new(obs, "gauss", &[0.0, 0.0, 0.0, 0.0, 0.3, 100.0], None).unwrap();
//! let fdiff = fitter.calc_fdiff(&[0.0, 0.0, 0.1, 0.0, 0.5, 90.0]);
//! assert_eq!(fdiff.len(), 2 * 32 * 32);
//! ```

#[cfg(test)]
mod tests;

mod error;
pub use error::{FitError, InvalidModelParameters, ProfileError};

mod fit;
pub use fit::{
    BAD_BEST_FIT, FitResult, FitStats, KFitConfig, KFitModel, LeastSquaresProblem,
    LeastSquaresSolver, MAXITER, NEG_COV_DIAG, SINGULAR_MATRIX, SolverResult, TemplateFluxFitter,
    TemplateFluxResult, flags_str,
};

mod model;
pub use model::{
    MIN_HLR, MoffatProfileModel, ModelVariant, ProfileModel, ProfileModelTrait, SimpleFamily,
    SimpleProfileModel, SpergelProfileModel, get_npars,
};

pub mod observation;
pub use observation::{Jacobian, KObservation, ObsInput, Observation, PsfObservation};

pub mod prior;
pub use prior::{FdiffPrior, GPrior, LnPrior1D, SeparablePrior};

pub mod render;

pub use ndarray;

/// Value of every residual element when the parameters cannot be rendered
pub const FDIFF_SENTINEL: f64 = -9999.0e47;

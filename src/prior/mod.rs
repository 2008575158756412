//! Priors expressed as extra residual terms
//!
//! A prior term with the log-probability $\ln p$ contributes $\sqrt{-2 \ln p}$ to the residual
//! vector, so a least-squares minimizer maximizes the posterior.

mod g_prior;
pub use g_prior::*;

mod ln_prior_1d;
pub use ln_prior_1d::*;

mod separable;
pub use separable::SeparablePrior;

use crate::error::InvalidModelParameters;

use std::fmt::Debug;

/// Prior able to write its own residual terms
pub trait FdiffPrior: Debug {
    /// Number of terms written by [FdiffPrior::fill_fdiff]
    fn size(&self) -> usize;

    /// Write prior terms for `pars` at the start of `fdiff`, return the number of written terms
    fn fill_fdiff(&self, pars: &[f64], fdiff: &mut [f64]) -> Result<usize, InvalidModelParameters>;
}

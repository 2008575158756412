use crate::model::ModelVariant;

use itertools::Itertools;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// The solver reached its iteration limit
pub const MAXITER: u32 = 1 << 0;
/// The normal matrix could not be inverted
pub const SINGULAR_MATRIX: u32 = 1 << 1;
/// Some diagonal elements of the parameter covariance are not positive
pub const NEG_COV_DIAG: u32 = 1 << 2;
/// The best-fit parameters do not produce a valid model
pub const BAD_BEST_FIT: u32 = 1 << 3;

const FLAG_NAMES: [(u32, &str); 4] = [
    (MAXITER, "MAXITER"),
    (SINGULAR_MATRIX, "SINGULAR_MATRIX"),
    (NEG_COV_DIAG, "NEG_COV_DIAG"),
    (BAD_BEST_FIT, "BAD_BEST_FIT"),
];

/// Names of the set flag bits joined by `|`, unknown bits are ignored
pub fn flags_str(flags: u32) -> String {
    FLAG_NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| name)
        .join("|")
}

/// Residual function a least-squares solver minimizes
pub trait LeastSquaresProblem {
    fn npars(&self) -> usize;

    fn fdiff_size(&self) -> usize;

    /// Fill `fdiff` of [LeastSquaresProblem::fdiff_size] length for parameters `pars`
    fn fill_fdiff(&mut self, pars: &[f64], fdiff: &mut [f64]);
}

/// External optimizer
pub trait LeastSquaresSolver {
    fn solve<P>(&self, problem: &mut P, guess: &[f64]) -> SolverResult
    where
        P: LeastSquaresProblem + ?Sized;
}

/// Raw output of a [LeastSquaresSolver]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    /// Bit flags, zero on success
    pub flags: u32,
    pub pars: Array1<f64>,
    pub pars_cov: Option<Array2<f64>>,
    /// Number of residual function evaluations
    pub nfev: usize,
}

/// Fit statistics available for successful fits only
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitStats {
    /// Signal-to-noise ratio of the round model
    pub s2n_r: f64,
    pub chi2per: f64,
    pub dof: usize,
    pub g: [f64; 2],
    pub g_cov: Option<[[f64; 2]; 2]>,
    pub flux: Array1<f64>,
    pub flux_err: Option<Array1<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelVariant,
    pub flags: u32,
    pub pars: Array1<f64>,
    pub pars_cov: Option<Array2<f64>>,
    pub nfev: usize,
    pub npars: usize,
    pub fdiff_size: usize,
    /// `Some` if and only if `flags` is zero
    pub stats: Option<FitStats>,
}

impl FitResult {
    pub fn is_success(&self) -> bool {
        self.flags == 0
    }

    pub fn flags_str(&self) -> String {
        flags_str(self.flags)
    }
}

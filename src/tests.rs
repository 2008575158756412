//! Shared test helpers: observation builders and a Levenberg-Marquardt solver

use crate::fit::{LeastSquaresProblem, LeastSquaresSolver, MAXITER, SINGULAR_MATRIX, SolverResult};
use crate::model::{ModelVariant, ProfileModelTrait};
use crate::observation::{Jacobian, KObservation, Observation, PsfObservation};
use crate::render::KGrid;

use levenberg_marquardt::{LevenbergMarquardt, TerminationReason};
use light_profile_kfit_test_util::{gaussian_image, sheared_covariance};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use ndarray::Array2;
use std::cell::{Cell, RefCell};

pub const SCALE: f64 = 0.2;

pub fn hlr_to_sigma(hlr: f64) -> f64 {
    hlr / f64::sqrt(2.0 * std::f64::consts::LN_2)
}

/// Noiseless pixel-space observation of a Gaussian galaxy `[c1, c2, g1, g2, r50, flux]`,
/// optionally convolved with a round Gaussian PSF of the given half-light radius
pub fn gaussian_obs(shape: (usize, usize), pars: [f64; 6], psf_hlr: Option<f64>) -> Observation {
    let [c1, c2, g1, g2, hlr, flux] = pars;
    let jacobian = Jacobian::diagonal(SCALE, 0.5 * shape.0 as f64 - 0.3, 0.5 * shape.1 as f64 + 0.2);
    let mut cov = sheared_covariance(hlr_to_sigma(hlr), g1, g2);
    if let Some(psf_hlr) = psf_hlr {
        let psf_var = hlr_to_sigma(psf_hlr).powi(2);
        cov[0][0] += psf_var;
        cov[1][1] += psf_var;
    }
    let image = gaussian_image(
        shape,
        (jacobian.row0, jacobian.col0),
        SCALE,
        [c1, c2],
        cov,
        flux,
    );
    let obs = Observation::new(image, Array2::from_elem(shape, 1e4), jacobian).unwrap();
    match psf_hlr {
        Some(psf_hlr) => {
            let psf_sigma = hlr_to_sigma(psf_hlr);
            let image = gaussian_image(
                (41, 41),
                (20.0, 20.0),
                SCALE,
                [0.0, 0.0],
                sheared_covariance(psf_sigma, 0.0, 0.0),
                1.0,
            );
            obs.with_psf(PsfObservation::Image {
                image,
                jacobian: Jacobian::diagonal(SCALE, 20.0, 20.0),
            })
        }
        None => obs,
    }
}

/// K-space observation holding exactly the model of `variant` for `band_pars`
pub fn model_kobs(
    variant: ModelVariant,
    band_pars: &[f64],
    shape: (usize, usize),
    psf_kimage: Option<Array2<num_complex::Complex64>>,
) -> KObservation {
    let jacobian = Jacobian::new(
        0.5 * shape.0 as f64,
        0.5 * shape.1 as f64,
        0.25,
        0.01,
        -0.02,
        0.26,
    );
    let kgrid = KGrid::from_jacobian(shape, &jacobian).unwrap();
    let profile = variant.profile_model().render_full(band_pars).unwrap();
    let mut kimage = Array2::zeros(shape);
    profile.draw_into(&kgrid, &mut kimage, psf_kimage.as_ref());
    KObservation::new(kimage, Array2::from_elem(shape, 0.5), kgrid, psf_kimage).unwrap()
}

/// [LeastSquaresProblem] seen through the residual interface of the `levenberg-marquardt` crate
///
/// Residuals are evaluated on every parameter update, the Jacobian by central differences.
struct LmProblem<'a, P: ?Sized> {
    problem: RefCell<&'a mut P>,
    pars: DVector<f64>,
    fdiff: DVector<f64>,
    nfev: Cell<usize>,
}

impl<'a, P> LmProblem<'a, P>
where
    P: LeastSquaresProblem + ?Sized,
{
    fn new(problem: &'a mut P, guess: &[f64]) -> Self {
        let fdiff = DVector::zeros(problem.fdiff_size());
        let mut lm_problem = Self {
            problem: RefCell::new(problem),
            pars: DVector::from_column_slice(guess),
            fdiff,
            nfev: Cell::new(0),
        };
        lm_problem.evaluate();
        lm_problem
    }

    fn evaluate(&mut self) {
        self.problem
            .get_mut()
            .fill_fdiff(self.pars.as_slice(), self.fdiff.as_mut_slice());
        self.nfev.set(self.nfev.get() + 1);
    }

    fn numerical_jacobian(&self) -> DMatrix<f64> {
        let mut problem = self.problem.borrow_mut();
        let (m, n) = (self.fdiff.len(), self.pars.len());
        let mut jac = DMatrix::zeros(m, n);
        let mut plus = vec![0.0; m];
        let mut minus = vec![0.0; m];
        let mut shifted = self.pars.as_slice().to_vec();
        for i in 0..n {
            let h = 1e-6 * (1.0 + self.pars[i].abs());
            shifted[i] = self.pars[i] + h;
            problem.fill_fdiff(&shifted, &mut plus);
            shifted[i] = self.pars[i] - h;
            problem.fill_fdiff(&shifted, &mut minus);
            shifted[i] = self.pars[i];
            for (j, (p, m)) in plus.iter().zip(&minus).enumerate() {
                jac[(j, i)] = (p - m) / (2.0 * h);
            }
        }
        self.nfev.set(self.nfev.get() + 2 * n);
        jac
    }
}

impl<P> levenberg_marquardt::LeastSquaresProblem<f64, Dyn, Dyn> for LmProblem<'_, P>
where
    P: LeastSquaresProblem + ?Sized,
{
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, pars: &DVector<f64>) {
        self.pars.copy_from(pars);
        self.evaluate();
    }

    fn params(&self) -> DVector<f64> {
        self.pars.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(self.fdiff.clone())
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        Some(self.numerical_jacobian())
    }
}

/// Solver backed by the `levenberg-marquardt` crate
pub struct LmSolver {
    lm: LevenbergMarquardt<f64>,
}

impl Default for LmSolver {
    fn default() -> Self {
        Self {
            lm: LevenbergMarquardt::new(),
        }
    }
}

impl LeastSquaresSolver for LmSolver {
    fn solve<P>(&self, problem: &mut P, guess: &[f64]) -> SolverResult
    where
        P: LeastSquaresProblem + ?Sized,
    {
        let (lm_problem, report) = self.lm.minimize(LmProblem::new(problem, guess));
        let mut flags = match report.termination {
            TerminationReason::LostPatience => MAXITER,
            TerminationReason::Numerical(_) => SINGULAR_MATRIX,
            _ => 0,
        };

        let jac = lm_problem.numerical_jacobian();
        let npars = lm_problem.pars.len();
        let pars_cov = (jac.transpose() * &jac)
            .try_inverse()
            .map(|cov| Array2::from_shape_fn((npars, npars), |(i, j)| cov[(i, j)]));
        if pars_cov.is_none() {
            flags |= SINGULAR_MATRIX;
        }
        SolverResult {
            flags,
            pars: lm_problem.pars.iter().copied().collect(),
            pars_cov,
            nfev: lm_problem.nfev.get(),
        }
    }
}

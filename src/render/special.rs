//! Special functions behind the analytic k-space profiles

use lazy_static::lazy_static;
use std::cell::Cell;
use std::f64::consts::{LN_2, PI};

/// Modified Bessel function of the second kind $K_\nu(x)$ for real order and $x > 0$
pub fn bessel_k(nu: f64, x: f64) -> f64 {
    debug_assert!(x > 0.0);
    let (_, k) = puruspe::Inu_Knu(nu.abs(), x);
    k
}

/// $x^\nu K_\nu(x)$, finite at $x = 0$ for $\nu > 0$ where it equals $2^{\nu-1}\Gamma(\nu)$
pub fn x_pow_nu_bessel_k(nu: f64, x: f64) -> f64 {
    if x < 1e-12 {
        return f64::powf(2.0, nu - 1.0) * libm::tgamma(nu);
    }
    f64::powf(x, nu) * bessel_k(nu, x)
}

/// Beyond this argument the Moffat k-profile is below $10^{-200}$ for $\nu \leq 99$
const MOFFAT_X_MAX: f64 = 800.0;

/// Unit-flux Moffat k-profile $x^\nu K_\nu(x) / (2^{\nu-1}\Gamma(\nu))$ of index
/// $\nu = \beta - 1 > 0$ at $x = k r_d$
///
/// The ratio is evaluated in log space. Where $K_\nu(x)$ overflows, which only happens for
/// $x^2 \ll \nu$, the small-argument expansion
/// $1 - x^2 / (4(\nu - 1)) + x^4 / (32(\nu - 1)(\nu - 2))$ is used.
pub fn moffat_kprofile(nu: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x > MOFFAT_X_MAX {
        return 0.0;
    }
    let k = bessel_k(nu, x);
    if k == 0.0 {
        return 0.0;
    }
    if k.is_finite() {
        let ln_norm = (nu - 1.0) * LN_2 + libm::lgamma(nu);
        return f64::exp(nu * x.ln() + k.ln() - ln_norm);
    }
    let x2 = x * x;
    1.0 - x2 / (4.0 * (nu - 1.0)) + x2 * x2 / (32.0 * (nu - 1.0) * (nu - 2.0))
}

/// Flux fraction of a Spergel profile of index `nu` enclosed within $x = r / r_0$
fn spergel_enclosed_flux(nu: f64, x: f64) -> f64 {
    1.0 - f64::powf(2.0, -nu) / libm::tgamma(nu + 1.0) * x_pow_nu_bessel_k(nu + 1.0, x)
}

thread_local! {
    /// Last `(nu, ratio)` pair, fits keep the index fixed over most evaluations
    static LAST_SPERGEL_HLR_RATIO: Cell<(f64, f64)> = const { Cell::new((f64::NAN, f64::NAN)) };
}

/// Half-light radius of a Spergel profile in units of its scale radius $r_0$
///
/// The last computed value is memoized per thread.
pub fn spergel_hlr_ratio(nu: f64) -> f64 {
    let (last_nu, last_ratio) = LAST_SPERGEL_HLR_RATIO.with(Cell::get);
    if last_nu == nu {
        return last_ratio;
    }
    let ratio = solve_spergel_hlr_ratio(nu);
    LAST_SPERGEL_HLR_RATIO.with(|cell| cell.set((nu, ratio)));
    ratio
}

fn solve_spergel_hlr_ratio(nu: f64) -> f64 {
    let (mut left, mut right) = (1e-8, 1.0);
    while spergel_enclosed_flux(nu, right) < 0.5 {
        right *= 2.0;
    }
    for _ in 0..100 {
        let mid = 0.5 * (left + right);
        if spergel_enclosed_flux(nu, mid) < 0.5 {
            left = mid;
        } else {
            right = mid;
        }
        if right - left < 1e-14 * right {
            break;
        }
    }
    0.5 * (left + right)
}

/// $b_n$ constant of the $n = 4$ Sérsic profile, $\gamma(8, b) = \Gamma(8) / 2$
const DEV_B: f64 = 7.669_249_443_105_31;

/// Radial Fourier transform of a unit-flux profile tabulated over $q = k r_{50}$
#[derive(Clone, Debug)]
pub struct RadialKTable {
    ln_q_min: f64,
    ln_q_step: f64,
    values: Vec<f64>,
    tail_index: f64,
}

impl RadialKTable {
    const SIZE: usize = 256;
    const Q_MIN: f64 = 1e-3;
    const Q_MAX: f64 = 50.0;

    /// Hankel transform of the de Vaucouleurs profile with $r_{50} = 1$
    ///
    /// With $r = s^4$ the transform is
    /// $F(q) = 8\pi I_0 \int_0^\infty e^{-b s} s^7 J_0(q s^4)\,ds$,
    /// where $I_0 = b^8 / (8!\,\pi)$ normalizes the flux to unity.
    fn dev() -> Self {
        let i0 = DEV_B.powi(8) / (40320.0 * PI);
        let ln_q_min = Self::Q_MIN.ln();
        let ln_q_step = (Self::Q_MAX.ln() - ln_q_min) / (Self::SIZE - 1) as f64;
        let values = (0..Self::SIZE)
            .map(|i| {
                let q = f64::exp(ln_q_min + ln_q_step * i as f64);
                8.0 * PI * i0 * Self::dev_integral(q)
            })
            .collect();
        Self {
            ln_q_min,
            ln_q_step,
            values,
            tail_index: 2.25,
        }
    }

    fn dev_integral(q: f64) -> f64 {
        // the integrand is below 1e-12 of its peak beyond s = 5
        const S_MAX: f64 = 5.0;
        const MAX_STEP: f64 = 2e-3;
        // radians of the J0 argument per step
        const MAX_PHASE_STEP: f64 = 0.15;

        let integrand = |s: f64| f64::exp(-DEV_B * s) * s.powi(7) * libm::j0(q * s.powi(4));
        let mut sum = 0.0;
        let mut s = 0.0;
        while s < S_MAX {
            let rate = 4.0 * q * (s + MAX_STEP).powi(3);
            let step = f64::min(MAX_STEP, MAX_PHASE_STEP / rate.max(f64::MIN_POSITIVE));
            let step = f64::min(step, S_MAX - s);
            sum += step * integrand(s + 0.5 * step);
            s += step;
        }
        sum
    }

    /// Value at $q \geq 0$
    ///
    /// Linear interpolation in $\ln q$ inside the table, linear towards $F(0) = 1$ below it and a
    /// power-law tail above it.
    pub fn eval(&self, q: f64) -> f64 {
        let q_min = self.ln_q_min.exp();
        if q <= q_min {
            return 1.0 + (self.values[0] - 1.0) * q / q_min;
        }
        let x = (q.ln() - self.ln_q_min) / self.ln_q_step;
        let last = self.values.len() - 1;
        if x >= last as f64 {
            let q_max = f64::exp(self.ln_q_min + self.ln_q_step * last as f64);
            return self.values[last] * f64::powf(q_max / q, self.tail_index);
        }
        let i = x.floor() as usize;
        let frac = x - i as f64;
        self.values[i] * (1.0 - frac) + self.values[i + 1] * frac
    }
}

lazy_static! {
    pub static ref DEV_KTABLE: RadialKTable = RadialKTable::dev();
}

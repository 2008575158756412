use enum_dispatch::enum_dispatch;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Unnormalized natural logarithm of a single-parameter prior
///
/// Priors are scaled to have zero maximum, so $\sqrt{-2 \ln p}$ is a proper residual term.
#[enum_dispatch]
pub trait LnPrior1DTrait: Clone + Debug + Serialize + DeserializeOwned + PartialEq {
    fn ln_prob(&self, x: f64) -> f64;
}

/// Prior for a single parameter of the model
#[enum_dispatch(LnPrior1DTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[non_exhaustive]
pub enum LnPrior1D {
    None(NoneLnPrior1D),
    Normal(NormalLnPrior1D),
    LogNormal(LogNormalLnPrior1D),
    Flat(FlatLnPrior1D),
    TwoSidedErf(TwoSidedErfLnPrior1D),
}

impl LnPrior1D {
    pub fn none() -> Self {
        NoneLnPrior1D {}.into()
    }

    pub fn normal(mu: f64, std: f64) -> Self {
        NormalLnPrior1D::new(mu, std).into()
    }

    pub fn log_normal(mu: f64, std: f64) -> Self {
        LogNormalLnPrior1D::new(mu, std).into()
    }

    pub fn flat(left: f64, right: f64) -> Self {
        FlatLnPrior1D::new(left, right).into()
    }

    pub fn two_sided_erf(min: f64, width_at_min: f64, max: f64, width_at_max: f64) -> Self {
        TwoSidedErfLnPrior1D::new(min, width_at_min, max, width_at_max).into()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NoneLnPrior1D {}

impl LnPrior1DTrait for NoneLnPrior1D {
    fn ln_prob(&self, _x: f64) -> f64 {
        0.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(into = "NormalParameters", from = "NormalParameters")]
pub struct NormalLnPrior1D {
    mu: f64,
    inv_std: f64,
}

impl NormalLnPrior1D {
    pub fn new(mu: f64, std: f64) -> Self {
        assert!(mu.is_finite(), "mu must be finite");
        assert!(std > 0.0 && std.is_finite(), "std must be positive and finite");
        Self {
            mu,
            inv_std: std.recip(),
        }
    }
}

impl LnPrior1DTrait for NormalLnPrior1D {
    fn ln_prob(&self, x: f64) -> f64 {
        -0.5 * ((x - self.mu) * self.inv_std).powi(2)
    }
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename = "NormalLnPrior1D")]
struct NormalParameters {
    mu: f64,
    std: f64,
}

impl From<NormalLnPrior1D> for NormalParameters {
    fn from(f: NormalLnPrior1D) -> Self {
        Self {
            mu: f.mu,
            std: f.inv_std.recip(),
        }
    }
}

impl From<NormalParameters> for NormalLnPrior1D {
    fn from(f: NormalParameters) -> Self {
        Self::new(f.mu, f.std)
    }
}

/// Normal distribution of $\ln x$, $x$ must be positive
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(into = "LogNormalParameters", from = "LogNormalParameters")]
pub struct LogNormalLnPrior1D {
    mu: f64,
    inv_std: f64,
}

impl LogNormalLnPrior1D {
    /// `mu` and `std` are the mean and the standard deviation of $\ln x$
    pub fn new(mu: f64, std: f64) -> Self {
        assert!(mu.is_finite(), "mu must be finite");
        assert!(std > 0.0 && std.is_finite(), "std must be positive and finite");
        Self {
            mu,
            inv_std: std.recip(),
        }
    }
}

impl LnPrior1DTrait for LogNormalLnPrior1D {
    fn ln_prob(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return f64::NEG_INFINITY;
        }
        -0.5 * ((x.ln() - self.mu) * self.inv_std).powi(2)
    }
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename = "LogNormalLnPrior1D")]
struct LogNormalParameters {
    mu: f64,
    std: f64,
}

impl From<LogNormalLnPrior1D> for LogNormalParameters {
    fn from(f: LogNormalLnPrior1D) -> Self {
        Self {
            mu: f.mu,
            std: f.inv_std.recip(),
        }
    }
}

impl From<LogNormalParameters> for LogNormalLnPrior1D {
    fn from(f: LogNormalParameters) -> Self {
        Self::new(f.mu, f.std)
    }
}

/// Zero inside the closed range, $-\infty$ outside of it
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(into = "FlatParameters", from = "FlatParameters")]
pub struct FlatLnPrior1D {
    range: std::ops::RangeInclusive<f64>,
}

impl FlatLnPrior1D {
    pub fn new(left: f64, right: f64) -> Self {
        assert!(left < right, "left must be smaller than right");
        Self { range: left..=right }
    }
}

impl LnPrior1DTrait for FlatLnPrior1D {
    fn ln_prob(&self, x: f64) -> f64 {
        if self.range.contains(&x) {
            0.0
        } else {
            f64::NEG_INFINITY
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(rename = "FlatLnPrior1D")]
struct FlatParameters {
    range: std::ops::RangeInclusive<f64>,
}

impl From<FlatLnPrior1D> for FlatParameters {
    fn from(f: FlatLnPrior1D) -> Self {
        Self { range: f.range }
    }
}

impl From<FlatParameters> for FlatLnPrior1D {
    fn from(f: FlatParameters) -> Self {
        Self::new(*f.range.start(), *f.range.end())
    }
}

/// Smooth top-hat: a product of two error-function steps, rising at `min` and falling at `max`
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TwoSidedErfLnPrior1D {
    pub min: f64,
    pub width_at_min: f64,
    pub max: f64,
    pub width_at_max: f64,
}

impl TwoSidedErfLnPrior1D {
    pub fn new(min: f64, width_at_min: f64, max: f64, width_at_max: f64) -> Self {
        assert!(min < max, "min must be smaller than max");
        assert!(width_at_min > 0.0, "width_at_min must be positive");
        assert!(width_at_max > 0.0, "width_at_max must be positive");
        Self {
            min,
            width_at_min,
            max,
            width_at_max,
        }
    }
}

impl LnPrior1DTrait for TwoSidedErfLnPrior1D {
    fn ln_prob(&self, x: f64) -> f64 {
        let rise = 0.5 * libm::erfc((self.min - x) / self.width_at_min);
        let fall = 0.5 * libm::erfc((x - self.max) / self.width_at_max);
        f64::ln(rise * fall)
    }
}

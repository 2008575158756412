use enum_dispatch::enum_dispatch;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Unnormalized natural logarithm of a prior on the reduced shear $(g_1, g_2)$
///
/// As for [LnPrior1D](crate::prior::LnPrior1D), the maximum value is zero.
#[enum_dispatch]
pub trait GPriorTrait: Clone + Debug {
    fn ln_prob(&self, g1: f64, g2: f64) -> f64;
}

#[enum_dispatch(GPriorTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[non_exhaustive]
pub enum GPrior {
    None(NoneGPrior),
    Normal(NormalGPrior),
    Ba(BaGPrior),
}

impl GPrior {
    pub fn none() -> Self {
        NoneGPrior {}.into()
    }

    pub fn normal(sigma: f64) -> Self {
        NormalGPrior::new(sigma).into()
    }

    pub fn ba(sigma: f64) -> Self {
        BaGPrior::new(sigma).into()
    }
}

/// Flat inside the unit disk
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NoneGPrior {}

impl GPriorTrait for NoneGPrior {
    fn ln_prob(&self, g1: f64, g2: f64) -> f64 {
        if g1 * g1 + g2 * g2 < 1.0 {
            0.0
        } else {
            f64::NEG_INFINITY
        }
    }
}

/// Isotropic Gaussian truncated at $|g| = 1$
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NormalGPrior {
    pub sigma: f64,
}

impl NormalGPrior {
    pub fn new(sigma: f64) -> Self {
        assert!(sigma > 0.0, "sigma must be positive");
        Self { sigma }
    }
}

impl GPriorTrait for NormalGPrior {
    fn ln_prob(&self, g1: f64, g2: f64) -> f64 {
        let g2_sum = g1 * g1 + g2 * g2;
        if g2_sum >= 1.0 {
            return f64::NEG_INFINITY;
        }
        -0.5 * g2_sum / (self.sigma * self.sigma)
    }
}

/// Bernstein & Armstrong (2014) ellipticity distribution
///
/// $p(g) \propto (1 - g^2)^2 \exp(-g^2 / 2\sigma^2)$ for $|g| < 1$.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BaGPrior {
    pub sigma: f64,
}

impl BaGPrior {
    pub fn new(sigma: f64) -> Self {
        assert!(sigma > 0.0, "sigma must be positive");
        Self { sigma }
    }
}

impl GPriorTrait for BaGPrior {
    fn ln_prob(&self, g1: f64, g2: f64) -> f64 {
        let g2_sum = g1 * g1 + g2 * g2;
        if g2_sum >= 1.0 {
            return f64::NEG_INFINITY;
        }
        2.0 * f64::ln_1p(-g2_sum) - 0.5 * g2_sum / (self.sigma * self.sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn maximum_at_round() {
        for prior in [GPrior::none(), GPrior::normal(0.3), GPrior::ba(0.3)] {
            assert_eq!(prior.ln_prob(0.0, 0.0), 0.0);
            assert!(prior.ln_prob(0.1, 0.05) <= 0.0);
            assert_eq!(prior.ln_prob(0.8, 0.8), f64::NEG_INFINITY);
        }
    }

    #[test]
    fn ba_is_isotropic() {
        let prior = GPrior::ba(0.25);
        let g = 0.4;
        let desired = prior.ln_prob(g, 0.0);
        for angle in [0.3_f64, 1.1, 2.5, 4.0] {
            let (sin, cos) = angle.sin_cos();
            assert_relative_eq!(
                prior.ln_prob(g * cos, g * sin),
                desired,
                max_relative = 1e-12
            );
        }
        assert_relative_eq!(
            desired,
            2.0 * f64::ln(1.0 - g * g) - 0.5 * g * g / 0.0625,
            max_relative = 1e-12
        );
    }
}

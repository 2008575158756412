use crate::error::InvalidModelParameters;
use crate::prior::{FdiffPrior, GPrior, GPriorTrait, LnPrior1D, LnPrior1DTrait};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Independent priors on the center, the shear, the size, the optional extra shape parameter and
/// every band flux
///
/// Writes one term per center coordinate, one for the shear, one for `r50`, one for the extra
/// parameter when it is set, and one per flux.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SeparablePrior {
    pub cen: [LnPrior1D; 2],
    pub g: GPrior,
    pub r50: LnPrior1D,
    #[serde(default)]
    pub extra: Option<LnPrior1D>,
    pub fluxes: Vec<LnPrior1D>,
}

impl SeparablePrior {
    pub fn new(cen: [LnPrior1D; 2], g: GPrior, r50: LnPrior1D, fluxes: Vec<LnPrior1D>) -> Self {
        Self {
            cen,
            g,
            r50,
            extra: None,
            fluxes,
        }
    }

    /// Prior on the Spergel index or the Moffat beta
    pub fn with_extra(self, extra: LnPrior1D) -> Self {
        Self {
            extra: Some(extra),
            ..self
        }
    }
}

fn term(name: &str, ln_prob: f64) -> Result<f64, InvalidModelParameters> {
    let chi2 = -2.0 * ln_prob;
    if chi2.is_finite() {
        Ok(f64::sqrt(chi2.max(0.0)))
    } else {
        Err(InvalidModelParameters::new(format!(
            "{name} is outside of the prior support"
        )))
    }
}

impl FdiffPrior for SeparablePrior {
    fn size(&self) -> usize {
        4 + usize::from(self.extra.is_some()) + self.fluxes.len()
    }

    fn fill_fdiff(&self, pars: &[f64], fdiff: &mut [f64]) -> Result<usize, InvalidModelParameters> {
        let flux_start = 5 + usize::from(self.extra.is_some());
        if pars.len() != flux_start + self.fluxes.len() {
            return Err(InvalidModelParameters::new(format!(
                "prior expects {} parameters, got {}",
                flux_start + self.fluxes.len(),
                pars.len()
            )));
        }

        if fdiff.len() < self.size() {
            return Err(InvalidModelParameters::new(format!(
                "prior writes {} terms into a residual vector of size {}",
                self.size(),
                fdiff.len()
            )));
        }

        fdiff[0] = term("c1", self.cen[0].ln_prob(pars[0]))?;
        fdiff[1] = term("c2", self.cen[1].ln_prob(pars[1]))?;
        fdiff[2] = term("g", self.g.ln_prob(pars[2], pars[3]))?;
        fdiff[3] = term("r50", self.r50.ln_prob(pars[4]))?;
        let mut offset = 4;
        if let Some(extra) = &self.extra {
            fdiff[offset] = term("extra shape parameter", extra.ln_prob(pars[5]))?;
            offset += 1;
        }
        for (prior, &flux) in self.fluxes.iter().zip(&pars[flux_start..]) {
            fdiff[offset] = term("flux", prior.ln_prob(flux))?;
            offset += 1;
        }
        Ok(offset)
    }
}

//! Model variant registry

mod profile_model;
pub use profile_model::{
    MIN_HLR, MoffatProfileModel, ProfileModel, ProfileModelTrait, SimpleFamily,
    SimpleProfileModel, SpergelProfileModel,
};

use crate::error::FitError;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Light-profile family to fit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Exp,
    Dev,
    Gauss,
    Spergel,
    Moffat,
}

impl ModelVariant {
    pub const ALL: [Self; 5] = [
        Self::Exp,
        Self::Dev,
        Self::Gauss,
        Self::Spergel,
        Self::Moffat,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Exp => "exp",
            Self::Dev => "dev",
            Self::Gauss => "gauss",
            Self::Spergel => "spergel",
            Self::Moffat => "moffat",
        }
    }

    pub fn profile_model(&self) -> ProfileModel {
        match self {
            Self::Exp => SimpleProfileModel {
                family: SimpleFamily::Exponential,
            }
            .into(),
            Self::Dev => SimpleProfileModel {
                family: SimpleFamily::DeVaucouleurs,
            }
            .into(),
            Self::Gauss => SimpleProfileModel {
                family: SimpleFamily::Gaussian,
            }
            .into(),
            Self::Spergel => SpergelProfileModel.into(),
            Self::Moffat => MoffatProfileModel.into(),
        }
    }

    /// Number of band-independent parameters
    pub fn n_shape_pars(&self) -> usize {
        self.profile_model().n_shape_pars()
    }

    /// Total number of parameters for `nband` bands
    pub fn npars(&self, nband: usize) -> usize {
        self.profile_model().npars(nband)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelVariant {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.name() == s)
            .ok_or_else(|| FitError::UnsupportedModel(s.to_owned()))
    }
}

/// Number of parameters of the `model` fit to `nband` bands
pub fn get_npars(model: &str, nband: usize) -> Result<usize, FitError> {
    Ok(model.parse::<ModelVariant>()?.npars(nband))
}

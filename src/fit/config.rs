use crate::model::ModelVariant;
use crate::prior::SeparablePrior;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Serializable description of a fit: the model to fit and its optional prior
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct KFitConfig {
    pub model: ModelVariant,
    #[serde(default)]
    pub prior: Option<SeparablePrior>,
}

impl KFitConfig {
    pub fn new(model: ModelVariant) -> Self {
        Self { model, prior: None }
    }

    pub fn with_prior(self, prior: SeparablePrior) -> Self {
        Self {
            prior: Some(prior),
            ..self
        }
    }
}

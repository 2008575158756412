/// Error returned from the profile constructors of the built-in k-space renderer
///
/// It never leaves the crate's rendering adapter: [crate::render] converts it into
/// [InvalidModelParameters].
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("{name} = {value} is outside of the allowed range {range}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("requested shear |g| = {0} exceeds 1")]
    ShearExceedsUnity(f64),

    #[error("{0} is not finite")]
    NonFinite(&'static str),
}

/// The model cannot be rendered for the given parameters
///
/// This is an expected condition while an optimizer explores the parameter space: the residual
/// function never returns it, it fills the residual vector with [crate::FDIFF_SENTINEL] instead.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[error("invalid model parameters: {reason}")]
pub struct InvalidModelParameters {
    pub reason: String,
}

impl InvalidModelParameters {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<ProfileError> for InvalidModelParameters {
    fn from(err: ProfileError) -> Self {
        Self::new(err.to_string())
    }
}

/// Error returned from [crate::KFitModel] constructors and the model registry
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum FitError {
    #[error("can't fit {0:?}: unsupported model")]
    UnsupportedModel(String),

    #[error("expected {expected} entries in the guess, but got {actual}")]
    WrongGuessSize { expected: usize, actual: usize },

    #[error("guess doesn't produce a valid model: {0}")]
    InvalidGuess(#[from] InvalidModelParameters),

    #[error("no observations were given")]
    NoObservations,

    #[error("band {0} has no observations")]
    EmptyBand(usize),

    #[error("{what} is empty")]
    EmptyArray { what: &'static str },

    #[error("{what} shape {actual:?} doesn't match the image shape {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("weight map has no positive values")]
    NoPositiveWeight,

    #[error("jacobian is singular")]
    SingularJacobian,

    #[error("PSF image total flux must be positive, got {0}")]
    NonPositivePsfFlux(f64),

    #[error("observation {0} has no PSF")]
    MissingPsf(usize),

    #[error("template total flux must be positive, got {0}")]
    NonPositiveTemplateFlux(f64),

    #[error("prior fills {actual} residual terms, but {expected} are expected")]
    WrongPriorSize { expected: usize, actual: usize },

    #[error("FFTW failed: {0}")]
    Fft(String),
}

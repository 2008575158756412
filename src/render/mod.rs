//! Built-in k-space renderer
//!
//! Profiles are evaluated directly in Fourier space, $F(k) = \int I(x) e^{-i k \cdot x} d^2x$,
//! on the wave vectors of a [KGrid]. Constructors report renderer-level failures as
//! [ProfileError](crate::error::ProfileError), which the model layer turns into
//! [InvalidModelParameters](crate::InvalidModelParameters).

mod kgrid;
pub use kgrid::KGrid;

mod profile;
pub use profile::{Profile, RoundProfile, Shear};

pub mod special;

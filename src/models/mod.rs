//! Domain models for Genux.
//!
//! # Core Concepts
//!
//! - [`Feature`]: A stored pairing of a natural-language request with the code
//!   artifact generated for it. Features are re-applied to the page every time
//!   Genux initializes.
//! - [`ArtifactType`]: What kind of code a feature carries (script, markup or
//!   stylesheet), which decides how it is applied to the document.
//! - [`FeatureId`]: Time-derived, strictly increasing identity. Nodes injected
//!   into the document are tagged with it so they can be found and removed later.

mod feature;

pub use feature::*;

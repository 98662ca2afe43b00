//! Genux: natural-language requests turned into UI features.
//!
//! A request is compiled into a prompt with page context, sent to a
//! generation backend, sanitized, persisted and applied to a [`Document`].
//! Stored features are re-applied every time [`Genux`] is initialized.
//!
//! ```no_run
//! # async fn demo() -> Result<(), genux::GenuxError> {
//! use genux::{ArtifactType, Config, FeatureRequest, Genux};
//!
//! let genux = Genux::builder(Config::default()).initialize().await?;
//! genux
//!     .create(FeatureRequest::new("Add a dark mode toggle", ArtifactType::Markup))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod dom;
pub mod engine;
pub mod error;
pub mod models;
pub mod prompt;
pub mod proxy;
pub mod sanitize;
pub mod store;
pub mod surface;
pub mod transport;

pub use config::{Config, ConfigOverrides, StorageBackend};
pub use coordinator::{FeatureRequest, GenerationState, Genux, GenuxBuilder};
pub use dom::{Document, PageDocument, Selector};
pub use error::{GenuxError, ValidationError};
pub use models::{ArtifactType, Feature, FeatureId, NewFeature};
pub use surface::{Confirmer, Level, MemoryNotifier, Notifier, Surface};

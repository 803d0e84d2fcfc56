//! sq-core: shared types, IDs, errors, configuration, progress broadcasting
//! and the ephemeral artifact store.
//!
//! This crate is the foundational dependency for the other sq-* crates. It
//! owns the two pieces of shared mutable state the server has: the
//! [`events::ProgressBroadcaster`] fan-out channel and the
//! [`artifacts::ArtifactStore`] that holds finished conversions until they
//! are downloaded or expire.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use artifacts::{ArtifactRecord, ArtifactStore};
pub use error::{Error, Result};
pub use events::{ProgressBroadcaster, ProgressEvent};
pub use ids::*;

//! Credential rotation over hierarchical secret stores.
//!
//! The engine walks every secret reachable below a base path, finds fields
//! whose value equals an old credential and either reports them (list mode)
//! or rewrites them (edit mode). Storage is delegated to a [`SecretStore`].

pub mod error;
pub mod memory;
pub mod path;
pub mod processor;
pub mod rotate;
pub mod store;
pub mod walker;

pub use error::{RotationError, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use processor::{PayloadShape, RotationResult, WriteErrorAttribution};
pub use rotate::{
    DEFAULT_ROOT, OperationMode, RotationOutcome, RotationRequest, RotationSummary, Rotator,
};
pub use store::{SecretPayload, SecretStore};
pub use walker::{TreeWalker, WalkOptions};

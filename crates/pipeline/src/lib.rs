//! The action runner: one invocation in, exactly one verdict out.
//!
//! [`runner::ActionRunner`] drives the stage sequence for a single job
//! type described by a [`profile::JobProfile`]. Every exit path, panics
//! and dropped futures included, reports through
//! [`completion::CompletionGuard`].

pub mod completion;
pub mod error;
pub mod profile;
pub mod runner;

pub use error::{RunnerError, Stage, StageError};
pub use profile::{JobProfile, PublishPolicy};
pub use runner::{ActionRunner, Collaborators};

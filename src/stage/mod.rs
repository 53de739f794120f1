//! Staging: placing credentials and input data where a run needs them
//! before any execution step.

pub mod credential;
pub mod data;

pub use credential::{CredentialStager, StagedCredential};
pub use data::{DataStager, DfsInput, StagedInput, MERGED_INPUT_FILE};

pub mod cleanup;
pub mod command;
pub mod config;
pub mod dfs;
pub mod errors;
pub mod observability;
pub mod remote;
pub mod run;
pub mod runner;
pub mod stage;
pub mod topology;
pub mod transfer;

pub use cleanup::{Cleanup, CleanupTargets};
pub use command::{
    render_blocks, ConfigRendering, DistributedInvocation, Invocation, LocalInvocation,
};
pub use config::{ConfigBlock, LaunchConfig};
pub use dfs::{Dfs, HdfsCli, MockDfs};
pub use errors::{LaunchError, Result};
pub use observability::{init_production_logging, init_simple_logging};
pub use remote::{CommandInvocation, ExecTarget, RemoteShell};
pub use run::{LaunchRun, RunContext};
pub use runner::{CommandOutput, CommandRunner, MockRunner, ProcessRunner};
pub use stage::{CredentialStager, DataStager, DfsInput, StagedCredential, StagedInput};
pub use topology::{Node, NodeTopology};
pub use transfer::SecureCopy;

//! Trainlaunch - Command Line Interface
//!
//! Trainlaunch drives distributed training runs on a private GPU
//! cluster: it materializes trainer configuration, stages the SSH
//! credential and input data, ships the working directory, invokes the
//! trainer (directly or under the MPI launcher), pulls back the model
//! artifacts, and cleans up.
//!
//! ## Commands
//!
//! - `init` - Write the default configuration file
//! - `run` - Execute a full training launch
//! - `assemble` - Print the command a launch would execute, without running it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use trainlaunch::{
    init_production_logging, init_simple_logging, ConfigBlock, ConfigRendering,
    DistributedInvocation, DfsInput, HdfsCli, Invocation, LaunchConfig, LaunchRun,
    LocalInvocation, NodeTopology, ProcessRunner, RunContext,
};

/// Distributed training launch orchestrator
#[derive(Parser, Debug)]
#[command(name = "trainlaunch")]
#[command(about = "Distributed training launch orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Execute a full training launch
    Run {
        /// Trainer config files; each becomes one block named after its stem
        #[arg(short, long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Extra settings appended as an override block (KEY=VALUE)
        #[arg(short, long = "set")]
        sets: Vec<String>,

        /// Cluster nodes as host,count entries; first is the primary
        #[arg(short, long = "node", required = true)]
        nodes: Vec<String>,

        /// Working directory, same absolute path locally and remotely
        #[arg(short, long)]
        working_dir: PathBuf,

        /// Artifact directory under the working directory
        #[arg(short, long, default_value = "output")]
        output_dir: String,

        /// Pass config blocks inline instead of as configFile= references
        #[arg(long)]
        inline: bool,

        /// Distributed-filesystem directory holding input part-files
        #[arg(long)]
        dfs_source: Option<String>,

        /// Remote directory where the merged input is placed
        #[arg(long, default_value = "/data/mount")]
        dfs_mount: String,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },

    /// Print the command a launch would execute, without running it
    Assemble {
        /// Trainer config files; each becomes one block named after its stem
        #[arg(short, long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Extra settings appended as an override block (KEY=VALUE)
        #[arg(short, long = "set")]
        sets: Vec<String>,

        /// Cluster nodes as host,count entries; first is the primary
        #[arg(short, long = "node", required = true)]
        nodes: Vec<String>,

        /// Working directory used for configFile= paths
        #[arg(short, long)]
        working_dir: PathBuf,

        /// Pass config blocks inline instead of as configFile= references
        #[arg(long)]
        inline: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            init_simple_logging("info")?;
            cmd_init(force)?;
        }

        Commands::Run {
            configs,
            sets,
            nodes,
            working_dir,
            output_dir,
            inline,
            dfs_source,
            dfs_mount,
            log_level,
        } => {
            // Production logging with file rotation for actual runs
            init_production_logging(&log_level, None)?;
            cmd_run(
                configs, sets, nodes, working_dir, output_dir, inline, dfs_source, dfs_mount,
            )?;
        }

        Commands::Assemble {
            configs,
            sets,
            nodes,
            working_dir,
            inline,
        } => {
            init_simple_logging("warn")?;
            cmd_assemble(configs, sets, nodes, working_dir, inline)?;
        }
    }

    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let path = LaunchConfig::default_path()?;
    if path.exists() && !force {
        anyhow::bail!(
            "configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let config = LaunchConfig::default();
    config.save(&path)?;
    println!("✓ Configuration written to: {}", path.display());
    println!("   Trainer: {}", config.trainer.command);
    println!("   Launcher: {}", config.launcher.command);
    println!("   Remote user: {}", config.remote.user);
    println!("   Credential: {}", config.dfs.credential_path);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    configs: Vec<PathBuf>,
    sets: Vec<String>,
    nodes: Vec<String>,
    working_dir: PathBuf,
    output_dir: String,
    inline: bool,
    dfs_source: Option<String>,
    dfs_mount: String,
) -> Result<()> {
    let config = load_config()?;
    let blocks = load_blocks(&configs, &sets)?;
    let topology = NodeTopology::resolve(&nodes)?;

    let runner = ProcessRunner;
    let dfs = HdfsCli::new(&runner, config.dfs.namenode_uri.clone());

    let mut ctx = RunContext::new(working_dir, topology)
        .with_blocks(blocks)
        .with_output_dir(output_dir)
        .with_rendering(rendering(inline));
    if let Some(source_dir) = dfs_source {
        ctx = ctx.with_dfs_input(DfsInput {
            namenode_uri: config.dfs.namenode_uri.clone(),
            source_dir,
            mounted_dir: dfs_mount,
        });
    }

    println!("🚀 Launching training run {}", ctx.run_id);
    let output = LaunchRun::new(&config, &runner, &dfs).execute(&ctx)?;

    println!("✓ Training completed");
    if !output.is_empty() {
        println!("{output}");
    }
    println!(
        "   Artifacts: {}",
        ctx.working_dir.join(&ctx.output_dir).display()
    );
    Ok(())
}

fn cmd_assemble(
    configs: Vec<PathBuf>,
    sets: Vec<String>,
    nodes: Vec<String>,
    working_dir: PathBuf,
    inline: bool,
) -> Result<()> {
    let config = load_config()?;
    let blocks = load_blocks(&configs, &sets)?;
    let topology = NodeTopology::resolve(&nodes)?;
    let rendering = rendering(inline);

    let invocation = if topology.is_distributed() {
        DistributedInvocation::new(
            &config.trainer,
            &config.launcher,
            &blocks,
            rendering,
            &working_dir,
            &topology,
        )
        .assemble()?
    } else {
        LocalInvocation::new(&config.trainer, &blocks, rendering, &working_dir)
            .on_host(&topology.primary().host)
            .assemble()?
    };

    println!("{}", invocation.command_line());
    Ok(())
}

fn load_config() -> Result<LaunchConfig> {
    let path = LaunchConfig::default_path()?;
    if path.exists() {
        LaunchConfig::load(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))
    } else {
        Ok(LaunchConfig::default())
    }
}

/// Build config blocks from files, in argument order, plus an
/// `override` block holding any `--set` entries.
fn load_blocks(configs: &[PathBuf], sets: &[String]) -> Result<Vec<ConfigBlock>> {
    let mut blocks = Vec::with_capacity(configs.len() + 1);
    for path in configs {
        blocks.push(block_from_file(path)?);
    }
    if !sets.is_empty() {
        blocks.push(ConfigBlock::new("override", sets.to_vec()));
    }
    Ok(blocks)
}

fn block_from_file(path: &Path) -> Result<ConfigBlock> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("config file has no usable name: {}", path.display()))?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let lines = text.lines().map(|l| l.to_string()).collect();
    Ok(ConfigBlock::new(name, lines))
}

fn rendering(inline: bool) -> ConfigRendering {
    if inline {
        ConfigRendering::Inline
    } else {
        ConfigRendering::FileBased
    }
}

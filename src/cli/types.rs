use autostack::config::StackErrorPolicy;
use autostack::stack_ref::clap_stack_validator;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autostack")]
#[command(about = "Bootstrap a Pulumi workspace and make sure a stack exists", long_about = None)]
#[command(version)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Config file (default: autostack.toml in the base directory, if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base directory the project directory is resolved against
    #[arg(short = 'C', long = "dir", global = true, value_name = "DIR", default_value = ".")]
    pub base_dir: PathBuf,

    /// Project directory holding Pulumi.yaml, relative to the base directory (default: program)
    #[arg(long, global = true, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Pulumi CLI binary name or path
    #[arg(long = "pulumi", global = true, value_name = "PATH")]
    pub pulumi: Option<String>,

    /// Deadline for each engine step in seconds (0 disables it)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the workspace and create the stack
    Init {
        /// Stack reference (org/project/stack); falls back to `stack` in the config file
        #[arg(value_parser = clap_stack_validator)]
        stack: Option<String>,

        /// Exit status policy when the stack cannot be created
        #[arg(long, value_enum, value_name = "POLICY")]
        on_stack_error: Option<StackErrorPolicy>,

        /// Select the stack if it already exists instead of failing
        #[arg(long)]
        select_existing: bool,
    },

    /// List stacks in the workspace
    Ls,

    /// Open the workspace and show project and engine details
    Check,
}

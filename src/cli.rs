use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "storyforge")]
#[command(author, version, about = "Run declarative AI generation chains")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a chain
    Run {
        /// Chain definition (YAML or JSON)
        #[arg(required = true)]
        chain: PathBuf,

        /// Initial input: a prompt, a file path, a URL, or JSON
        #[arg(short, long)]
        input: Option<String>,

        /// Skip the cost confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Emit JSONL lifecycle events (result on stdout, progress on stderr)
        #[arg(long, conflicts_with = "json")]
        stream: bool,

        /// Print the chain result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate what a chain will cost without running it
    Estimate {
        /// Chain definition (YAML or JSON)
        #[arg(required = true)]
        chain: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a chain definition for structural problems
    Validate {
        /// Chain definition (YAML or JSON)
        #[arg(required = true)]
        chain: PathBuf,
    },

    /// List step types and whether an executor is available
    ListSteps,

    /// Display version information
    Version,
}

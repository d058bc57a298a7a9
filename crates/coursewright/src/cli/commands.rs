//! CLI command definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Coursewright - generate LMS courses with language models
#[derive(Parser, Debug)]
#[command(name = "coursewright")]
#[command(about = "Generate LMS courses with language models", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file to use instead of the user config files
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a course, resuming from its checkpoint when one exists
    Generate(GenerateArgs),

    /// Inspect or clear saved checkpoints
    #[command(subcommand)]
    Checkpoint(CheckpointCommands),
}

/// Arguments of `coursewright generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path to the course JSON (id, title, description, topics)
    #[arg(long)]
    pub course: PathBuf,

    /// LMS dialect: topic_based or section_based
    #[arg(long, env = "COURSEWRIGHT_LMS_TYPE")]
    pub lms_type: String,

    /// Root URL of the LMS REST API
    #[arg(long, env = "COURSEWRIGHT_LMS_URL")]
    pub lms_url: String,

    /// LMS account name
    #[arg(long, env = "COURSEWRIGHT_LMS_USER")]
    pub lms_user: String,

    /// LMS account password
    #[arg(long, env = "COURSEWRIGHT_LMS_PASSWORD", hide_env_values = true)]
    pub lms_password: String,

    /// API key for the completion provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Path to a JSON file mapping topic and lesson ids to knowledge libraries
    #[arg(long)]
    pub libraries: Option<PathBuf>,

    /// Run web research for topics and lessons
    #[arg(long)]
    pub web_research: bool,

    /// API key for the research provider (defaults to the completion key)
    #[arg(long, env = "PERPLEXITY_API_KEY", hide_env_values = true)]
    pub research_key: Option<String>,

    /// Resume under this checkpoint key instead of the one derived from the course id
    #[arg(long)]
    pub checkpoint_key: Option<String>,
}

/// Checkpoint subcommands
#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// List saved checkpoints with their progress
    List,

    /// Print a checkpoint as JSON
    Show {
        /// Checkpoint key
        key: String,
    },

    /// Delete a checkpoint so the next run starts from scratch
    Clear {
        /// Checkpoint key
        key: String,
    },
}

//! CLI command definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Coffer - transactional attachment storage
#[derive(Parser, Debug)]
#[command(name = "coffer")]
#[command(about = "Store and retrieve attachments across filesystem, database, repository and object-storage backends", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered over the bundled defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Object addressed by a command.
#[derive(Args, Debug, Clone)]
pub struct ObjectArgs {
    /// Store name
    pub store: String,

    /// Id of the owning object
    pub object_id: i64,

    /// Type id of the owning object
    pub type_id: i64,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a file as an object's content
    Put {
        #[command(flatten)]
        object: ObjectArgs,

        /// File to store
        file: PathBuf,

        /// File name to record (defaults to the file's own name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Write an object's content to a file or stdout
    Get {
        #[command(flatten)]
        object: ObjectArgs,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Report whether an object has content
    Exists {
        #[command(flatten)]
        object: ObjectArgs,
    },

    /// Show the recorded file name and length of an object's content
    Info {
        #[command(flatten)]
        object: ObjectArgs,
    },

    /// Remove an object's content
    Delete {
        #[command(flatten)]
        object: ObjectArgs,
    },

    /// List configured stores
    Stores,
}

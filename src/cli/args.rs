//! Clap argument types.

use clap::Parser;
use std::path::PathBuf;

/// AI-assisted auto-commit daemon.
///
/// With no subcommand, runs the daemon in the current directory (or the
/// directory given positionally or via `-C`).
#[derive(Parser, Debug)]
#[command(name = "gitpulse", version, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Directory to watch (daemon mode).
    pub path: Option<PathBuf>,

    /// Run as if gitpulse was started in <PATH>.
    #[arg(short = 'C', value_name = "PATH", global = true)]
    pub chdir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Write a default config and gitignore entries to a project.
    Init {
        /// Project directory (default: current directory).
        path: Option<PathBuf>,
    },

    /// Signal the running daemon to flush and push now.
    Push,

    /// Serve the read-only history dashboard over HTTP.
    Dashboard {
        /// HTTP server port.
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

impl Cli {
    /// The directory a command operates on: `-C`, then the positional
    /// path, then the current directory.
    pub fn target_dir(&self) -> PathBuf {
        if let Some(dir) = &self.chdir {
            return dir.clone();
        }
        if let Some(Command::Init { path: Some(dir) }) = &self.command {
            return dir.clone();
        }
        if let Some(dir) = &self.path {
            return dir.clone();
        }
        PathBuf::from(".")
    }
}

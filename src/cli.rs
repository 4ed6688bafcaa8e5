//! Command-line interface for bridgespoof
//!
//! Uses clap with derive for type-safe CLI parsing

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// bridgespoof - transparent Linux bridge with MAC spoofing and capture
#[derive(Parser)]
#[command(name = "bridgespoof")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Do not re-launch through sudo when not running as root
    #[arg(long, global = true)]
    pub no_elevate: bool,

    /// Defaults to `up`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Bridge two interfaces until interrupted
    Up(UpArgs),

    /// List network interfaces
    Interfaces {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Session options; anything left out is asked for interactively
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct UpArgs {
    /// First interface (index or name); its MAC is spoofed
    #[arg(long)]
    pub first: Option<String>,

    /// Second interface (index or name)
    #[arg(long)]
    pub second: Option<String>,

    /// Bridge name (defaults to br0)
    #[arg(short, long)]
    pub bridge: Option<String>,

    /// Hardware address for the first interface: a MAC, `random` or `keep`
    #[arg(short, long)]
    pub mac: Option<String>,

    /// Address with prefix to put on the bridge (e.g. 192.168.1.100/24)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Capture traffic on this interface (repeatable)
    #[arg(long = "monitor", value_name = "IFACE")]
    pub monitors: Vec<String>,

    /// Write capture output to this file instead of the terminal
    #[arg(short = 'w', long, requires = "monitors")]
    pub capture_file: Option<PathBuf>,

    /// Capture filter expression
    #[arg(short, long)]
    pub filter: Option<String>,
}

impl UpArgs {
    /// Both interfaces given: nothing is prompted for
    pub fn is_unattended(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run, `up` when none was given
    pub fn take_command(&mut self) -> Commands {
        self.command
            .take()
            .unwrap_or_else(|| Commands::Up(UpArgs::default()))
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "bridgespoof", &mut std::io::stdout());
    }
}

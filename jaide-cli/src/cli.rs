//! Command-line argument types.

use clap::{Parser, Subcommand, ValueEnum};

/// Manipulate one or more Junos devices.
#[derive(Parser, Debug)]
#[command(name = "jaide")]
#[command(author, version, about = "Run commands, commits, copies and diffs against many Junos devices")]
#[command(propagate_version = true, infer_subcommands = true)]
pub struct Cli {
    /// Target device(s): one host, a comma separated list, or a file with one host per line
    #[arg(short = 'i', long = "ip", value_name = "HOSTS", env = "JAIDE_HOSTS")]
    pub hosts: String,

    /// Username
    #[arg(short, long, env = "JAIDE_USERNAME")]
    pub username: String,

    /// Password
    #[arg(short, long, env = "JAIDE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// SSH port
    #[arg(short = 'P', long, default_value_t = 22)]
    pub port: u16,

    /// Show no output, except in certain error scenarios
    #[arg(long)]
    pub quiet: bool,

    /// Seconds a single command may run before the session is declared lost
    #[arg(
        short = 't',
        long,
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(5..=7200)
    )]
    pub session_timeout: u64,

    /// Seconds permitted to connect and log in
    #[arg(
        short = 'T',
        long,
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..=60)
    )]
    pub connect_timeout: u64,

    /// Write output to a file instead of stdout: MODE is s/single for one
    /// shared file, m/multiple for one file per device
    #[arg(short, long, num_args = 2, value_names = ["MODE", "FILE"])]
    pub write: Option<Vec<String>>,

    /// Maximum number of devices worked on at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available operations
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send set commands and commit them
    Commit {
        /// Set command(s): one command, a comma separated list, or a file with one per line
        #[arg(default_value = "")]
        commands: String,

        /// Make a commit with no changes
        #[arg(long)]
        blank: bool,

        /// Only run a commit check
        #[arg(long)]
        check: bool,

        /// Commit on both routing engines
        #[arg(long)]
        sync: bool,

        /// Commit log comment
        #[arg(short, long)]
        comment: Option<String>,

        /// Seconds to wait for confirmation before rolling back
        #[arg(
            short = 'C',
            long,
            value_parser = clap::value_parser!(u64).range(60..=7200)
        )]
        confirm: Option<u64>,

        /// Commit at a later time: 'hh:mm[:ss]' or 'yyyy-mm-dd hh:mm[:ss]'
        #[arg(short = 'a', long = "at")]
        at_time: Option<String>,
    },

    /// Compare set commands against the running configuration
    Compare {
        /// Set command(s): one command, a comma separated list, or a file with one per line
        commands: String,
    },

    /// Copy a file or directory from the device(s)
    Pull {
        /// Remote path
        source: String,

        /// Local directory
        destination: String,

        /// Show transfer progress
        #[arg(long)]
        progress: bool,
    },

    /// Copy a file or directory to the device(s)
    Push {
        /// Local path
        source: String,

        /// Remote directory
        destination: String,

        /// Show transfer progress
        #[arg(long)]
        progress: bool,
    },

    /// Run operational command(s)
    Operational {
        /// Command(s): one command, a comma separated list, or a file with one
        /// per line. A trailing '% <expr>' extracts part of the XML reply.
        commands: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = FormatArg::Text)]
        format: FormatArg,

        /// Extraction expression applied to the XML reply of every command
        #[arg(short = 'x', long)]
        xpath: Option<String>,
    },

    /// Show basic device information
    Info,

    /// Diff the configuration against a second device
    Diff {
        /// The device to compare against
        #[arg(short = 'i', long = "second-host")]
        second_host: String,

        /// Diff style
        #[arg(short, long, value_enum, default_value_t = DiffModeArg::Set)]
        mode: DiffModeArg,
    },

    /// Run a health check
    Health,

    /// Look for interface errors
    Errors,

    /// Run command(s) at the raw shell
    Shell {
        /// Command(s): one command, a comma separated list, or a file with one per line
        commands: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Text,
    Xml,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffModeArg {
    Set,
    Stanza,
}

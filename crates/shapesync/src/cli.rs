//! Clap derive structures for the `shapesync` daemon.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// shapesync -- keep LibreQoS shaping tables in sync with MikroTik routers
#[derive(Debug, Parser)]
#[command(
    name = "shapesync",
    version,
    about = "Sync MikroTik subscribers into LibreQoS shaping tables",
    long_about = "Polls MikroTik routers for PPPoE sessions, hotspot users and DHCP leases,\n\
        merges them with a hand-maintained static device list, and rewrites\n\
        ShapedDevices.csv and network.json whenever the subscriber set changes.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Router configuration file (defaults to the per-user config dir)
    #[arg(long, short = 'c', env = "SHAPESYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(
        long,
        env = "SHAPESYNC_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    pub log_format: LogFormat,

    /// Also write daily-rotated JSON logs into this directory
    #[arg(long, env = "SHAPESYNC_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll routers continuously until interrupted
    Run,

    /// Run a single sync cycle and exit
    Once,

    /// Validate the config and static device file without contacting routers
    Check,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shapesync",
            "once",
            "-vv",
            "--config",
            "/etc/shapesync/config.json",
            "--log-format",
            "json",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        assert!(matches!(cli.command, Command::Once));
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert_eq!(
            cli.global.config,
            Some(PathBuf::from("/etc/shapesync/config.json"))
        );
    }
}

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sous")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Execution reports for convergence runs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a recorded event log and dispatch its report
    Replay(ReplayArgs),

    /// Show a saved JSON report
    Show(ShowArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Event log (JSON lines)
    pub events: PathBuf,

    /// Treat the run as simulate-only
    #[arg(long)]
    pub why_run: bool,

    /// Explicit run name
    #[arg(long, value_name = "NAME")]
    pub run_name: Option<String>,

    /// Also write the report to this JSON file
    #[arg(long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,

    /// Do not print the report through the logger
    #[arg(long)]
    pub no_log: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Report written by the file output
    pub report: PathBuf,

    /// Hide nested resources
    #[arg(long)]
    pub top_level: bool,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Validate the config file
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay_flags() {
        let cli = Cli::parse_from([
            "sous",
            "-vv",
            "replay",
            "events.jsonl",
            "--why-run",
            "--run-name",
            "nightly",
            "--no-log",
        ]);

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Replay(args) => {
                assert_eq!(args.events, PathBuf::from("events.jsonl"));
                assert!(args.why_run);
                assert!(args.no_log);
                assert_eq!(args.run_name.as_deref(), Some("nightly"));
                assert!(args.output_file.is_none());
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn test_parse_show() {
        let cli = Cli::parse_from(["sous", "show", "report.json", "--top-level"]);
        match cli.command {
            Command::Show(args) => assert!(args.top_level),
            _ => panic!("expected show"),
        }
    }
}

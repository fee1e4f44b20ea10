mod cli;
mod commands;
mod config;
mod outputs;
mod paths;
mod replay;
mod retry;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let (level, report_level) = if cli.quiet {
        (log::LevelFilter::Error, log::LevelFilter::Error)
    } else {
        (log_level, log_level.max(log::LevelFilter::Info))
    };

    // Report lines from the log output show up without -v
    env_logger::Builder::new()
        .filter_level(level)
        .filter_module(outputs::log_sink::TARGET, report_level)
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Replay(args) => commands::replay::run(
            &ctx,
            commands::replay::ReplayArgs {
                events: args.events,
                overrides: config::Overrides {
                    why_run: args.why_run,
                    run_name: args.run_name,
                    output_file: args.output_file,
                    no_log: args.no_log,
                },
            },
        ),
        Command::Show(args) => commands::show::run(
            &ctx,
            commands::show::ShowArgs {
                report: args.report,
                top_level: args.top_level,
            },
        ),
        Command::Config(cmd) => commands::config::run(&ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sous", &mut io::stdout());
            Ok(())
        }
    }
}

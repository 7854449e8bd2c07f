//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Session client for a real-time negotiation venue
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version)]
pub struct Cli {
    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Debug, Default, clap::ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and stream venue events until Ctrl-C
    Run(ConfigPathArg),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),
}

#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate a configuration file
    Config(ConfigPathArg),
}

#[derive(Args, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_config() {
        let cli = Cli::parse_from(["parley", "check", "config", "--config", "x.toml"]);
        let Commands::Check(CheckCommand::Config(arg)) = cli.command else {
            panic!("expected check config");
        };
        assert_eq!(arg.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn run_defaults_config_path() {
        let cli = Cli::parse_from(["parley", "--json", "run"]);
        assert!(cli.json);
        let Commands::Run(arg) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(arg.config, PathBuf::from("config.toml"));
    }
}

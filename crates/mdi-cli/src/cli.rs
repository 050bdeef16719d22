use clap::{Args, Parser, Subcommand};
use mdi_engine::core::units::UnitStyle;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "MDI engine - serves an external driver that steers molecular dynamics and geometry optimization over the MDI node protocol.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a system, connect to a driver, and serve it until it sends EXIT.
    Run(RunArgs),
    /// Print the commands each node accepts.
    Schema,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the system definition file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub system: PathBuf,

    /// Path to the engine configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Driver Overrides ---
    /// Host the driver listens on.
    #[arg(long, value_name = "HOST")]
    pub hostname: Option<String>,

    /// Port the driver listens on.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    // --- Engine Overrides ---
    /// Number of workers sharing the atoms.
    #[arg(short = 'n', long, value_name = "INT")]
    pub ranks: Option<usize>,

    /// Override the unit style of the system file.
    #[arg(short, long, value_name = "STYLE")]
    pub units: Option<UnitStyle>,

    /// Serve commands a node does not list instead of rejecting them.
    #[arg(long)]
    pub permissive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_arguments_parse_with_overrides() {
        let cli = Cli::try_parse_from([
            "mdi-engine", "-vv", "run", "--system", "water.toml", "--port", "9000", "-n", "4",
            "--units", "metal", "--permissive",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.system, PathBuf::from("water.toml"));
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.ranks, Some(4));
        assert_eq!(args.units, Some(UnitStyle::Metal));
        assert!(args.permissive);
        assert!(args.hostname.is_none());
    }

    #[test]
    fn run_requires_a_system_file() {
        assert!(Cli::try_parse_from(["mdi-engine", "run"]).is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["mdi-engine", "-q", "-v", "schema"]).is_err());
    }
}

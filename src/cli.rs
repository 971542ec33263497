use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "abyss-eye", version, about = "Bottle data cleaning and TALK estimation")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter (e.g. `debug`, `abyss_eye=trace`); `RUST_LOG` also works
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP analysis endpoint
    Serve(ServeArg),
    /// Clean a bottle file and write statistics and TALK estimates
    Clean(CleanArg),
    /// Run the request pipeline on a local file and print JSON
    Analyze(AnalyzeArg),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArg {
    /// Address to listen on (overrides `server.bind`)
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Debug, Clone, Args)]
pub struct CleanArg {
    /// Input bottle file (overrides `batch.input`)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Directory for the output files (overrides `batch.output_dir`)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArg {
    /// CSV, JSON or Parquet file
    pub file: PathBuf,

    /// Number of leading rows to print
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_clean_with_overrides() {
        let cli = Cli::try_parse_from([
            "abyss-eye",
            "--config",
            "abyss.toml",
            "clean",
            "--input",
            "bottle.csv",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("abyss.toml")));
        match cli.command {
            Command::Clean(arg) => {
                assert_eq!(arg.input, Some(PathBuf::from("bottle.csv")));
                assert_eq!(arg.output_dir, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn analyze_rejects_zero_limit() {
        assert!(Cli::try_parse_from(["abyss-eye", "analyze", "b.csv", "--limit", "0"]).is_err());
        let cli = Cli::try_parse_from(["abyss-eye", "analyze", "b.csv", "--limit", "5"]).unwrap();
        assert!(matches!(cli.command, Command::Analyze(AnalyzeArg { limit: Some(5), .. })));
    }
}

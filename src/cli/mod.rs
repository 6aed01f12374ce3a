//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Veil using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Veil - field-level de-identification engine
#[derive(Parser, Debug)]
#[command(name = "veil")]
#[command(version, about, long_about = None)]
#[command(author = "Veil Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "veil.toml", env = "VEIL_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "VEIL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// De-identify a dataset under the configured policies
    Transform(commands::transform::TransformArgs),

    /// Report re-identification risk of a dataset without transforming it
    Assess(commands::assess::AssessArgs),

    /// Recover the original behind a reversible pseudonym
    Reverse(commands::reverse::ReverseArgs),

    /// Delete every correspondence entry of a technique id
    Purge(commands::purge::PurgeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file with fresh store keys
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_transform() {
        let cli = Cli::parse_from(["veil", "transform", "--input", "in.json"]);
        assert_eq!(cli.config, "veil.toml");
        match cli.command {
            Commands::Transform(args) => {
                assert_eq!(args.input.to_str(), Some("in.json"));
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_config_and_log_level() {
        let cli = Cli::parse_from([
            "veil",
            "--config",
            "custom.toml",
            "--log-level",
            "debug",
            "validate-config",
        ]);
        assert_eq!(cli.config, "custom.toml");
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_reverse_scopes() {
        let cli = Cli::parse_from([
            "veil",
            "reverse",
            "--technique-id",
            "customer",
            "--pseudonym",
            "PSN_ab12",
            "--principal",
            "auditor",
            "--scope",
            "reverse:customer",
            "--scope",
            "read",
        ]);
        match cli.command {
            Commands::Reverse(args) => assert_eq!(args.scope, vec!["reverse:customer", "read"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_purge_and_init() {
        let cli = Cli::parse_from(["veil", "purge", "--technique-id", "customer", "--yes"]);
        assert!(matches!(cli.command, Commands::Purge(ref args) if args.yes));

        let cli = Cli::parse_from(["veil", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }

    #[test]
    fn test_cli_parse_assess() {
        let cli = Cli::parse_from(["veil", "assess", "--input", "in.json", "--json"]);
        assert!(matches!(cli.command, Commands::Assess(ref args) if args.json));
    }
}

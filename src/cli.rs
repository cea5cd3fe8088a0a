use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::validator::ValidationMode;

/// Validate STAC catalogs, collections and items
#[derive(Parser, Debug, Clone)]
#[command(name = "stac-validate")]
#[command(about = "Validate STAC documents against their core and extension schemas")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate a STAC document, optionally walking its links
    Validate(ValidateArgs),
    /// Print name and version information as JSON
    Info,
}

#[derive(Args, Debug, Clone, Default)]
#[command(group(
    ArgGroup::new("mode")
        .args(["core", "extensions", "recursive", "custom"])
        .multiple(false)
))]
pub struct ValidateArgs {
    /// Path or URL of the STAC document
    #[arg(value_name = "PATH_OR_URL")]
    pub target: String,

    /// Validate against the core schema only
    #[arg(long = "core")]
    pub core: bool,

    /// Validate item extensions only
    #[arg(long = "extensions")]
    pub extensions: bool,

    /// Follow child and item links and validate everything reachable
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Deepest level whose links are followed (root is 0)
    #[arg(short = 'm', long = "max-depth", requires = "recursive")]
    pub max_depth: Option<u32>,

    /// Validate against a custom schema URL or path
    #[arg(short = 'c', long = "custom", value_name = "SCHEMA")]
    pub custom: Option<String>,

    /// Echo each record as it is produced and print a summary
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Do not print the records to stdout
    #[arg(long = "no-output")]
    pub no_output: bool,

    /// Also write the records to this file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Show items/second progress on stderr
    #[arg(long = "progress")]
    pub progress: bool,

    /// Number of linked documents fetched at once
    #[arg(long = "concurrency")]
    pub concurrency: Option<usize>,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory of schema files used instead of the network
    #[arg(long = "schema-dir", value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl ValidateArgs {
    /// The validation mode selected by the mutually exclusive mode flags
    pub fn mode(&self) -> ValidationMode {
        if let Some(schema) = &self.custom {
            ValidationMode::Custom(schema.clone())
        } else if self.recursive {
            ValidationMode::Recursive
        } else if self.core {
            ValidationMode::Core
        } else if self.extensions {
            ValidationMode::Extensions
        } else {
            ValidationMode::Default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_args(args: &[&str]) -> ValidateArgs {
        let mut argv = vec!["stac-validate", "validate"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Validate(args) => args,
            other => panic!("Expected validate command, got {:?}", other),
        }
    }

    #[test]
    fn test_basic_cli_parsing() {
        let args = validate_args(&["catalog.json"]);
        assert_eq!(args.target, "catalog.json");
        assert_eq!(args.mode(), ValidationMode::Default);
        assert!(args.concurrency.is_none());
    }

    #[test]
    fn test_mode_flags() {
        assert_eq!(
            validate_args(&["item.json", "--core"]).mode(),
            ValidationMode::Core
        );
        assert_eq!(
            validate_args(&["item.json", "--extensions"]).mode(),
            ValidationMode::Extensions
        );
        assert_eq!(
            validate_args(&["item.json", "--custom", "schema.json"]).mode(),
            ValidationMode::Custom("schema.json".to_string())
        );

        let recursive = validate_args(&["catalog.json", "--recursive", "--max-depth", "2"]);
        assert_eq!(recursive.mode(), ValidationMode::Recursive);
        assert_eq!(recursive.max_depth, Some(2));
    }

    #[test]
    fn test_mode_flags_are_exclusive() {
        let result =
            Cli::try_parse_from(["stac-validate", "validate", "x.json", "--core", "--recursive"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_max_depth_requires_recursive() {
        let result =
            Cli::try_parse_from(["stac-validate", "validate", "x.json", "--max-depth", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_info_command() {
        let cli = Cli::try_parse_from(["stac-validate", "info"]).unwrap();
        assert!(matches!(cli.command, Commands::Info));
    }
}

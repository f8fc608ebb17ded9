use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::FromXmlConfig;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    #[default]
    Normal,
    /// Per-file timings and compilation details
    Verbose,
}

impl VerbosityLevel {
    pub fn from_config(config: &FromXmlConfig) -> Self {
        if config.output.quiet {
            VerbosityLevel::Quiet
        } else if config.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default `tracing` filter directive when `RUST_LOG` is unset
    pub fn log_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "from_xml=debug,info",
        }
    }
}

/// How converted records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Indented JSON per document
    Pretty,
    /// Counts only
    Summary,
}

/// Convert XML documents into structured records using an XML Schema
#[derive(Parser, Debug, Clone)]
#[command(name = "from-xml")]
#[command(about = "Convert XML documents into structured records using an XML Schema")]
#[command(version)]
pub struct Cli {
    /// XML files or directories to convert
    #[arg(required = true, help = "XML files or directories to convert")]
    pub inputs: Vec<PathBuf>,

    /// Schema location (path or http(s) URL)
    #[arg(short = 's', long = "schema", help = "XSD path or http(s) URL")]
    pub schema: Option<String>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// File extensions to process (comma-separated)
    #[arg(
        short = 'e',
        long = "extensions",
        help = "File extensions to process (e.g., 'xml,msg')"
    )]
    pub extensions: Option<String>,

    /// Number of parallel conversion threads
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode (failures only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Directory for compilation workspaces
    #[arg(long = "workspace-dir")]
    pub workspace_dir: Option<PathBuf>,

    /// HTTP timeout in seconds for remote schemas
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Compile the schema even if an identical one is cached
    #[arg(long = "no-binding-cache")]
    pub no_binding_cache: bool,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(missing) = self.inputs.iter().find(|path| !path.exists()) {
            return Err(format!("Path does not exist: {}", missing.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cli_parsing() {
        let cli = Cli::try_parse_from(["from-xml", "--schema", "order.xsd", "/tmp"]).unwrap();
        assert_eq!(cli.inputs, vec![PathBuf::from("/tmp")]);
        assert_eq!(cli.schema.as_deref(), Some("order.xsd"));
        assert_eq!(cli.format, None);
        assert_eq!(cli.get_extensions(), None);
    }

    #[test]
    fn test_inputs_are_required() {
        assert!(Cli::try_parse_from(["from-xml", "--schema", "order.xsd"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["from-xml", "-v", "-q", "/tmp"]).is_err());
    }

    #[test]
    fn test_format_and_extensions() {
        let cli = Cli::try_parse_from([
            "from-xml", "-f", "pretty", "-e", "xml, .msg,", "a.xml", "b.xml",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Pretty));
        assert_eq!(cli.get_extensions(), Some(vec!["xml".to_string(), "msg".to_string()]));
        assert_eq!(cli.inputs.len(), 2);
    }

    #[test]
    fn test_validate_rejects_missing_input() {
        let cli = Cli::try_parse_from(["from-xml", "/definitely/not/here.xml"]).unwrap();
        assert!(cli.validate().unwrap_err().contains("does not exist"));

        let cli = Cli::try_parse_from(["from-xml", "-t", "0", "/tmp"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_verbosity_from_config() {
        let mut config = FromXmlConfig::default();
        assert_eq!(VerbosityLevel::from_config(&config), VerbosityLevel::Normal);
        config.output.quiet = true;
        assert_eq!(VerbosityLevel::from_config(&config), VerbosityLevel::Quiet);
        assert_eq!(VerbosityLevel::Quiet.log_directive(), "error");
    }
}

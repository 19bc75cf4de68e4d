//! CLI argument parsing for meta2deps

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::config::ConfigBuilder;

/// Output format for the dependency report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Makefile fragment with DIRDEPS and SRC_DIRDEPS (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "meta2deps")]
#[command(version)]
#[command(about = "Extract DIRDEPS and SRC_DIRDEPS from filemon meta files", long_about = None)]
pub struct Cli {
    /// Source tree root (repeatable)
    #[arg(short = 'S', long = "srctop", value_name = "DIR", env = "SRCTOP", value_delimiter = ' ')]
    pub srctops: Vec<String>,

    /// Object tree root (repeatable)
    #[arg(short = 'O', long = "objroot", value_name = "DIR", env = "OBJROOT", value_delimiter = ' ')]
    pub objroots: Vec<String>,

    /// Machine the meta files were built for ("none" disables qualification)
    #[arg(short = 'm', long = "machine", env = "MACHINE")]
    pub machine: Option<String>,

    /// Machine architecture
    #[arg(long = "machine-arch", env = "MACHINE_ARCH")]
    pub machine_arch: Option<String>,

    /// Target spec, possibly compound (e.g. amd64,amd64)
    #[arg(long = "target-spec", env = "TARGET_SPEC")]
    pub target_spec: Option<String>,

    /// Host target accepted as the current machine when machine is "host"
    #[arg(short = 'H', long = "host-target", env = "HOST_TARGET")]
    pub host_target: Option<String>,

    /// Directory being built; its own files are not dependencies
    #[arg(short = 'C', long = "curdir", value_name = "DIR")]
    pub curdir: Option<String>,

    /// Directory being built, relative to the source root
    #[arg(short = 'R', long = "reldir", value_name = "DIR", env = "RELDIR")]
    pub reldir: Option<String>,

    /// Path prefix to ignore (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "PREFIX")]
    pub excludes: Vec<String>,

    /// Append DEPENDS_ON_FILE/DEPENDS_ON_DIR lines to FILE
    #[arg(short = 'd', long = "dpdeps", value_name = "FILE")]
    pub dpdeps: Option<PathBuf>,

    /// Classify W records as reads in captures older than protocol version 4
    #[arg(long = "legacy-writes")]
    pub legacy_writes: bool,

    /// TOML configuration file; command-line values take precedence
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Meta files to process
    #[arg(value_name = "META", required = true)]
    pub meta_files: Vec<PathBuf>,
}

impl Cli {
    /// Configuration given on the command line and in the environment
    pub fn config_builder(&self) -> ConfigBuilder {
        ConfigBuilder {
            srctops: self.srctops.clone(),
            objroots: self.objroots.clone(),
            machine: self.machine.clone(),
            machine_arch: self.machine_arch.clone(),
            target_spec: self.target_spec.clone(),
            host_target: self.host_target.clone(),
            excludes: self.excludes.clone(),
            curdir: self.curdir.clone(),
            reldir: self.reldir.clone(),
            dpdeps: self.dpdeps.clone(),
            classify_legacy_writes: self.legacy_writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_roots_and_files() {
        let cli = Cli::parse_from([
            "meta2deps", "-S", "/src", "-O", "/obj", "-m", "amd64", "a.meta", "b.meta",
        ]);
        assert_eq!(cli.srctops, vec!["/src"]);
        assert_eq!(cli.objroots, vec!["/obj"]);
        assert_eq!(cli.machine.as_deref(), Some("amd64"));
        assert_eq!(cli.meta_files.len(), 2);
    }

    #[test]
    fn test_cli_requires_meta_files() {
        assert!(Cli::try_parse_from(["meta2deps", "-S", "/src"]).is_err());
    }

    #[test]
    fn test_cli_repeatable_options() {
        let cli = Cli::parse_from([
            "meta2deps", "-S", "/src", "-S", "/src2", "-x", "/tmp/", "-x", "/dev/", "x.meta",
        ]);
        assert_eq!(cli.srctops, vec!["/src", "/src2"]);
        assert_eq!(cli.excludes, vec!["/tmp/", "/dev/"]);
    }

    #[test]
    fn test_cli_format_default_text() {
        let cli = Cli::parse_from(["meta2deps", "x.meta"]);
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.legacy_writes);
    }

    #[test]
    fn test_cli_verbose_count() {
        let cli = Cli::parse_from(["meta2deps", "-vv", "--format", "json", "x.meta"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_config_builder() {
        let cli = Cli::parse_from([
            "meta2deps",
            "-O",
            "/obj",
            "--legacy-writes",
            "-d",
            "/obj/files",
            "x.meta",
        ]);
        let builder = cli.config_builder();
        assert_eq!(builder.objroots, vec!["/obj"]);
        assert!(builder.classify_legacy_writes);
        assert_eq!(builder.dpdeps, Some(PathBuf::from("/obj/files")));
    }
}

//! Command-line interface for hoardd
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and merging with arguments
//! - Lookup mode selection
//! - The `config` subcommand

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use crate::config::{Config, LogLevel};
use crate::error::{HoarddError, Result};
use crate::query::LookupMode;

/// hoardd - concurrent exporter for leak indexes stored in Elasticsearch
#[derive(Parser, Debug)]
#[command(
    name = "hoardd",
    version,
    about = "Export credential records from Elasticsearch to CSV",
    long_about = "Scrolls an Elasticsearch index pattern, filters the matching documents and
writes email/password/breach rows to a CSV file using a pool of concurrent workers."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Elasticsearch URL
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Index name or pattern
    #[arg(long, value_name = "INDEX")]
    pub index: Option<String>,

    /// Username for authentication
    #[arg(short = 'u', long, value_name = "USERNAME")]
    pub username: Option<String>,

    /// Password for authentication
    #[arg(short = 'p', long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// CSV output file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub outfile: Option<PathBuf>,

    /// JSON Lines dump of every document received
    #[arg(long, value_name = "FILE")]
    pub dumpfile: Option<PathBuf>,

    /// Search by exact email address
    #[arg(long, value_name = "EMAIL")]
    pub email: Option<String>,

    /// Search by email domain
    #[arg(long, value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// Search by exact password
    #[arg(long = "pass", value_name = "PASSWORD")]
    pub pass: Option<String>,

    /// Raw query clause in JSON
    #[arg(long, value_name = "JSON")]
    pub raw: Option<String>,

    /// Maximum number of rows to write (0 for no limit)
    #[arg(short = 'l', long, value_name = "N")]
    pub limit: Option<u64>,

    /// Number of concurrent workers
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Documents per scroll page
    #[arg(long, value_name = "N")]
    pub page_size: Option<usize>,

    /// Scroll keep-alive (e.g. 2m)
    #[arg(long, value_name = "DURATION")]
    pub keep_alive: Option<String>,

    /// Append to an existing CSV file instead of truncating it
    #[arg(long)]
    pub append: bool,

    /// Disable the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Debug mode (trace logging)
    #[arg(long)]
    pub debug: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for hoardd
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Resolve the lookup mode
    ///
    /// Exactly one of `--email`, `--domain`, `--pass` or `--raw` must be
    /// given, either on the command line or in the `[lookup]` section.
    pub fn lookup(&self) -> Result<LookupMode> {
        self.config.lookup.mode()
    }

    /// Get the CSV output path
    ///
    /// Falls back to `output_<unix timestamp>.csv` in the working directory.
    pub fn outfile(&self) -> PathBuf {
        match &self.config.export.outfile {
            Some(path) => path.clone(),
            None => {
                let path = PathBuf::from(format!("output_{}.csv", chrono::Utc::now().timestamp()));
                warn!("No outfile given, writing to {}", path.display());
                path
            }
        }
    }

    /// Whether to draw the progress bar
    pub fn show_progress(&self) -> bool {
        !self.args.no_progress
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    ///
    /// # Arguments
    /// * `config` - Configuration to modify
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_connection_args(config, args);
        Self::apply_lookup_args(config, args);
        Self::apply_export_args(config, args);
        Self::apply_logging_args(config, args);
    }

    /// Apply connection-related CLI arguments to configuration
    fn apply_connection_args(config: &mut Config, args: &CliArgs) {
        let conn = &mut config.connection;
        override_with(&mut conn.url, &args.url);
        override_with(&mut conn.index, &args.index);
        override_with(&mut conn.username, &args.username);
        override_with(&mut conn.password, &args.password);
    }

    /// Apply lookup CLI arguments
    ///
    /// Any lookup flag on the command line replaces the whole `[lookup]`
    /// section so that file and flag lookups never combine.
    fn apply_lookup_args(config: &mut Config, args: &CliArgs) {
        let given = [&args.email, &args.domain, &args.pass, &args.raw];
        if given.iter().any(|v| v.is_some()) {
            config.lookup.email = args.email.clone();
            config.lookup.domain = args.domain.clone();
            config.lookup.pass = args.pass.clone();
            config.lookup.raw = args.raw.clone();
        }
    }

    /// Apply export-related CLI arguments to configuration
    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        let export = &mut config.export;
        if args.outfile.is_some() {
            export.outfile = args.outfile.clone();
        }
        if args.dumpfile.is_some() {
            export.dumpfile = args.dumpfile.clone();
        }
        if let Some(limit) = args.limit {
            export.limit = limit;
        }
        if let Some(workers) = args.workers {
            export.workers = workers;
        }
        if let Some(page_size) = args.page_size {
            export.page_size = page_size;
        }
        override_with(&mut export.keep_alive, &args.keep_alive);
        if args.append {
            export.append = true;
        }
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.debug {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else {
            config.logging.level
        };
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Config { show, validate }) => {
                if *validate {
                    self.validate_config()?;
                }
                if *show {
                    self.show_config()?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Validate the effective configuration
    ///
    /// An invalid configuration is returned as an error so the process exits
    /// with a failure status.
    fn validate_config(&self) -> Result<()> {
        println!("Validating configuration: {}", self.config_path().display());
        self.config.validate()?;
        self.lookup()?;
        println!("Configuration is valid");
        Ok(())
    }

    /// Show effective configuration with the password masked
    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.config_path().display());
        println!();

        let mut shown = self.config.clone();
        if !shown.connection.password.is_empty() {
            shown.connection.password = "***".to_string();
        }
        let text = toml::to_string_pretty(&shown).map_err(|e| HoarddError::Generic(e.to_string()))?;
        println!("{}", text);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}

fn override_with(target: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use std::io::Write;

    fn cli(argv: &[&str]) -> CliInterface {
        let args = CliArgs::try_parse_from(argv).unwrap();
        let mut config = Config::default();
        CliInterface::apply_args_to_config(&mut config, &args);
        CliInterface { args, config }
    }

    #[test]
    fn test_connection_args_override_defaults() {
        let cli = cli(&[
            "hoardd",
            "--url",
            "http://es:9200",
            "-u",
            "elastic",
            "-p",
            "changeme",
        ]);
        let conn = &cli.config().connection;
        assert_eq!(conn.url, "http://es:9200");
        assert_eq!(conn.username, "elastic");
        assert_eq!(conn.password, "changeme");
        assert_eq!(conn.index, "leak_*");
    }

    #[test]
    fn test_export_args_override_defaults() {
        let cli = cli(&[
            "hoardd",
            "--outfile",
            "out.csv",
            "--limit",
            "50",
            "--workers",
            "4",
            "--page-size",
            "200",
            "--keep-alive",
            "5m",
            "--append",
        ]);
        let export = &cli.config().export;
        assert_eq!(export.outfile, Some(PathBuf::from("out.csv")));
        assert_eq!(export.limit, 50);
        assert_eq!(export.workers, 4);
        assert_eq!(export.page_size, 200);
        assert_eq!(export.keep_alive, "5m");
        assert!(export.append);
        assert_eq!(cli.outfile(), PathBuf::from("out.csv"));
    }

    #[test]
    fn test_default_outfile_uses_timestamp() {
        let cli = cli(&["hoardd"]);
        let name = cli.outfile().display().to_string();
        assert!(name.starts_with("output_"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn test_lookup_from_flags() {
        let by_email = cli(&["hoardd", "--email", "a@b.com"]);
        assert_eq!(by_email.lookup().unwrap(), LookupMode::Email("a@b.com".into()));

        let by_domain = cli(&["hoardd", "--domain", "x.com"]);
        assert_eq!(by_domain.lookup().unwrap(), LookupMode::Domain("x.com".into()));
    }

    #[test]
    fn test_lookup_missing() {
        let cli = cli(&["hoardd"]);
        assert!(matches!(
            cli.lookup(),
            Err(HoarddError::Config(ConfigError::MissingLookup))
        ));
    }

    #[test]
    fn test_lookup_conflicting_flags() {
        let cli = cli(&["hoardd", "--email", "a@b.com", "--pass", "hunter2"]);
        assert!(matches!(
            cli.lookup(),
            Err(HoarddError::Config(ConfigError::ConflictingLookups(_)))
        ));
    }

    #[test]
    fn test_lookup_flag_replaces_config_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lookup]\ndomain = \"x.com\"").unwrap();

        let path = file.path().to_str().unwrap();
        let args = CliArgs::try_parse_from(["hoardd", "-c", path, "--email", "a@b.com"]).unwrap();
        let cli = CliInterface::from_args(args).unwrap();
        assert_eq!(cli.lookup().unwrap(), LookupMode::Email("a@b.com".into()));

        let args = CliArgs::try_parse_from(["hoardd", "-c", path]).unwrap();
        let cli = CliInterface::from_args(args).unwrap();
        assert_eq!(cli.lookup().unwrap(), LookupMode::Domain("x.com".into()));
    }

    #[test]
    fn test_logging_flags() {
        assert_eq!(cli(&["hoardd", "--debug"]).config().logging.level, LogLevel::Trace);
        assert_eq!(cli(&["hoardd", "-v"]).config().logging.level, LogLevel::Debug);
        assert_eq!(cli(&["hoardd"]).config().logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_config_validate_fails_on_invalid_config() {
        let invalid = cli(&["hoardd", "config", "--validate"]);
        assert!(matches!(
            invalid.handle_subcommand(),
            Err(HoarddError::Config(ConfigError::MissingField(_)))
        ));

        let valid = cli(&[
            "hoardd",
            "--url",
            "http://localhost:9200",
            "-u",
            "elastic",
            "-p",
            "changeme",
            "--domain",
            "x.com",
            "config",
            "--validate",
        ]);
        assert!(valid.handle_subcommand().unwrap());
    }

    #[test]
    fn test_config_validate_requires_lookup() {
        let no_lookup = cli(&[
            "hoardd",
            "--url",
            "http://localhost:9200",
            "-u",
            "elastic",
            "-p",
            "changeme",
            "config",
            "--validate",
        ]);
        assert!(matches!(
            no_lookup.handle_subcommand(),
            Err(HoarddError::Config(ConfigError::MissingLookup))
        ));
    }

    #[test]
    fn test_config_subcommand_parses() {
        let cli = cli(&["hoardd", "config", "--show"]);
        assert!(matches!(
            cli.args().command,
            Some(Commands::Config { show: true, validate: false })
        ));
    }
}

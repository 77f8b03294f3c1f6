//! Configuration module for echo-bench.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Largest message the client and server will buffer.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16MB

/// Which benchmark to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BenchMode {
    /// TCP echo round-trips over loopback
    #[default]
    Echo,
    /// Task hand-offs on the event loop
    Switch,
}

/// Command-line arguments for the benchmark
#[derive(Parser, Debug)]
#[command(name = "echo-bench")]
#[command(author = "echo-bench authors")]
#[command(version = "0.1.0")]
#[command(about = "Loopback TCP echo round-trip benchmark", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Benchmark to run
    #[arg(short, long, value_enum)]
    pub mode: Option<BenchMode>,

    /// Address the echo server binds to (e.g., 127.0.0.1:5530)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen backlog of the echo server socket
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Round-trips per client connection
    #[arg(short = 'i', long)]
    pub iterations: Option<u64>,

    /// Number of concurrent client connections
    #[arg(short = 'n', long)]
    pub clients: Option<usize>,

    /// Bytes per message
    #[arg(short = 's', long)]
    pub message_size: Option<usize>,

    /// Check that every reply matches what was sent
    #[arg(long)]
    pub verify: bool,

    /// Hand-offs per side in switch mode
    #[arg(long)]
    pub switch_iterations: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub bench: BenchSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Benchmark parameters
#[derive(Debug, Deserialize)]
pub struct BenchSection {
    #[serde(default)]
    pub mode: BenchMode,
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    #[serde(default = "default_clients")]
    pub clients: usize,
    #[serde(default = "default_message_size")]
    pub message_size: usize,
    #[serde(default)]
    pub verify: bool,
    #[serde(default = "default_switch_iterations")]
    pub switch_iterations: u64,
}

impl Default for BenchSection {
    fn default() -> Self {
        Self {
            mode: BenchMode::default(),
            iterations: default_iterations(),
            clients: default_clients(),
            message_size: default_message_size(),
            verify: false,
            switch_iterations: default_switch_iterations(),
        }
    }
}

/// Echo server configuration
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Accept backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backlog: default_backlog(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:5530".to_string()
}

fn default_backlog() -> i32 {
    128
}

fn default_iterations() -> u64 {
    500
}

fn default_clients() -> usize {
    100
}

fn default_message_size() -> usize {
    1
}

fn default_switch_iterations() -> u64 {
    1_000_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: BenchMode,
    pub listen: SocketAddr,
    pub backlog: i32,
    pub iterations: u64,
    pub clients: usize,
    pub message_size: usize,
    pub verify: bool,
    pub switch_iterations: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::resolve(cli, toml_config)
    }

    /// Merge CLI args over TOML values and validate the result.
    pub fn resolve(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let listen = listen
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("listen address '{}': {}", listen, e)))?;

        let config = Config {
            mode: cli.mode.unwrap_or(toml_config.bench.mode),
            listen,
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            iterations: cli.iterations.unwrap_or(toml_config.bench.iterations),
            clients: cli.clients.unwrap_or(toml_config.bench.clients),
            message_size: cli.message_size.unwrap_or(toml_config.bench.message_size),
            verify: cli.verify || toml_config.bench.verify,
            switch_iterations: cli
                .switch_iterations
                .unwrap_or(toml_config.bench.switch_iterations),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::Invalid("iterations must be positive".into()));
        }
        if self.clients == 0 {
            return Err(ConfigError::Invalid("clients must be positive".into()));
        }
        if self.message_size == 0 {
            return Err(ConfigError::Invalid("message size must be positive".into()));
        }
        if self.message_size > MAX_MESSAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "message size must be at most {} bytes",
                MAX_MESSAGE_SIZE
            )));
        }
        if self.iterations.checked_mul(self.clients as u64).is_none() {
            return Err(ConfigError::Invalid(
                "iterations x clients overflows the iteration counter".into(),
            ));
        }
        if self.switch_iterations == 0 {
            return Err(ConfigError::Invalid(
                "switch iterations must be positive".into(),
            ));
        }
        if self.switch_iterations.checked_mul(2).is_none() {
            return Err(ConfigError::Invalid(
                "switch iterations overflow the hand-off counter".into(),
            ));
        }
        if self.backlog <= 0 {
            return Err(ConfigError::Invalid("backlog must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["echo-bench"];
        argv.extend_from_slice(args);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_default_config() {
        let config = Config::resolve(cli(&[]), TomlConfig::default()).unwrap();
        assert_eq!(config.mode, BenchMode::Echo);
        assert_eq!(config.listen, "127.0.0.1:5530".parse::<SocketAddr>().unwrap());
        assert_eq!(config.backlog, 128);
        assert_eq!(config.iterations, 500);
        assert_eq!(config.clients, 100);
        assert_eq!(config.message_size, 1);
        assert!(!config.verify);
        assert_eq!(config.switch_iterations, 1_000_000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [bench]
            mode = "switch"
            iterations = 10
            clients = 4
            message_size = 8
            verify = true
            switch_iterations = 1000

            [server]
            listen = "127.0.0.1:6000"
            backlog = 32

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bench.mode, BenchMode::Switch);
        assert_eq!(config.bench.iterations, 10);
        assert_eq!(config.bench.clients, 4);
        assert_eq!(config.bench.message_size, 8);
        assert!(config.bench.verify);
        assert_eq!(config.bench.switch_iterations, 1000);
        assert_eq!(config.server.listen, "127.0.0.1:6000");
        assert_eq!(config.server.backlog, 32);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [bench]
            iterations = 10
            clients = 4

            [logging]
            level = "debug"
        "#,
        )
        .unwrap();

        let config = Config::resolve(
            cli(&["-i", "1", "--listen", "127.0.0.1:0", "--verify", "--log-level", "warn"]),
            toml_config,
        )
        .unwrap();
        assert_eq!(config.iterations, 1);
        assert_eq!(config.clients, 4);
        assert_eq!(config.listen.port(), 0);
        assert!(config.verify);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_rejects_zero_counts() {
        for args in [
            &["--iterations", "0"][..],
            &["--clients", "0"][..],
            &["--message-size", "0"][..],
            &["--switch-iterations", "0"][..],
        ] {
            match Config::resolve(cli(args), TomlConfig::default()) {
                Err(ConfigError::Invalid(_)) => {}
                other => panic!("unexpected for {:?}: {:?}", args, other),
            }
        }
    }

    #[test]
    fn test_rejects_oversized_messages() {
        let max = MAX_MESSAGE_SIZE.to_string();
        let config = Config::resolve(cli(&["-s", max.as_str()]), TomlConfig::default()).unwrap();
        assert_eq!(config.message_size, MAX_MESSAGE_SIZE);

        for size in [MAX_MESSAGE_SIZE + 1, 1_000_000_000_000_000] {
            let size = size.to_string();
            match Config::resolve(cli(&["-s", size.as_str()]), TomlConfig::default()) {
                Err(ConfigError::Invalid(msg)) => assert!(msg.contains("message size")),
                other => panic!("unexpected for {}: {:?}", size, other),
            }
        }
    }

    #[test]
    fn test_rejects_overflowing_totals() {
        let max = u64::MAX.to_string();
        for args in [
            &["-i", max.as_str(), "-n", "2"][..],
            &["--switch-iterations", max.as_str()][..],
        ] {
            match Config::resolve(cli(args), TomlConfig::default()) {
                Err(ConfigError::Invalid(msg)) => assert!(msg.contains("overflow")),
                other => panic!("unexpected for {:?}: {:?}", args, other),
            }
        }

        let config = Config::resolve(cli(&["-i", max.as_str(), "-n", "1"]), TomlConfig::default());
        assert!(config.is_ok());
    }

    #[test]
    fn test_rejects_bad_listen_address() {
        match Config::resolve(cli(&["-l", "localhost"]), TomlConfig::default()) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("localhost")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

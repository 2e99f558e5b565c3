//! CLI argument definitions for orbitd.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments. Every
//! override flag can also be supplied through its `ORBITD_*` environment
//! variable; an explicit flag wins over the variable.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use clap::builder::BoolishValueParser;

use orbitd_core::config::{OrbitdConfig, VALID_POLICIES, parse_duration_secs};
use orbitd_core::error::{ConfigError, OrbitdError};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/orbitd/orbitd.toml";

/// Container auto-update daemon.
///
/// Periodically checks running containers for newer images and replaces
/// them in place, rolling back when the replacement fails.
#[derive(Parser, Debug)]
#[command(name = "orbitd")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to orbitd.toml configuration file.
    ///
    /// A missing file at the default path is not an error.
    #[arg(long, env = "ORBITD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Global update policy (digest, patch, minor, major).
    #[arg(long, env = "ORBITD_POLICY", value_parser = parse_policy)]
    pub policy: Option<String>,

    /// Interval between update cycles (`3600`, `30m`, `12h`, `1d`).
    #[arg(short, long, env = "ORBITD_INTERVAL", value_parser = parse_duration_secs)]
    pub interval: Option<u64>,

    /// Remove the previous image after a successful update.
    ///
    /// A bare `-c` means `true`.
    #[arg(
        short,
        long,
        env = "ORBITD_CLEANUP",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub cleanup: Option<bool>,

    /// Only update containers labelled `orbitd.enable=true`.
    #[arg(long, env = "ORBITD_REQUIRE_LABEL", value_parser = BoolishValueParser::new())]
    pub require_label: bool,

    /// Force debug logging.
    #[arg(short, long, env = "ORBITD_DEBUG", value_parser = BoolishValueParser::new())]
    pub debug: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long, env = "ORBITD_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Run a single update cycle and exit.
    #[arg(long)]
    pub once: bool,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut OrbitdConfig) {
        if let Some(policy) = &self.policy {
            config.updater.policy.clone_from(policy);
        }
        if let Some(interval) = self.interval {
            config.updater.interval_secs = interval;
        }
        if let Some(cleanup) = self.cleanup {
            config.updater.cleanup = cleanup;
        }
        if self.require_label {
            config.updater.require_label = true;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if self.debug {
            config.general.log_level = "debug".to_owned();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
    }

    /// Load the configuration this invocation describes.
    ///
    /// Priority: flags > `ORBITD_*` variables > file > defaults.
    ///
    /// # Errors
    ///
    /// - The file is unreadable or malformed
    /// - The file is missing and was named explicitly
    /// - The merged configuration fails validation
    pub async fn load_config(&self) -> Result<OrbitdConfig> {
        let mut config = match OrbitdConfig::from_file(&self.config).await {
            Ok(config) => config,
            Err(OrbitdError::Config(ConfigError::FileNotFound { .. }))
                if self.config == Path::new(DEFAULT_CONFIG_PATH) =>
            {
                OrbitdConfig::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to load config {}: {}",
                    self.config.display(),
                    e
                ));
            }
        };

        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        Ok(config)
    }
}

fn parse_policy(value: &str) -> Result<String, String> {
    let policy = value.trim().to_ascii_lowercase();
    if VALID_POLICIES.contains(&policy.as_str()) {
        Ok(policy)
    } else {
        Err(format!(
            "unknown policy '{value}', expected one of: {}",
            VALID_POLICIES.join(", ")
        ))
    }
}

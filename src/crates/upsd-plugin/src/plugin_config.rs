use crate::netdata_env::NetdataEnv;
use crate::nut::DEFAULT_PORT;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in the agent's config dirs
pub const CONFIG_FILE: &str = "upsd.yaml";

const MAX_UPDATE_EVERY: u64 = 3600;

/// Parse a duration string for clap (e.g., "5s", "500ms", "1 minute")
fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| {
        format!(
            "Invalid duration format: '{}'. Use formats like '5s', '500ms', '1m'. Error: {}",
            s, e
        )
    })
}

fn default_address() -> String {
    format!("127.0.0.1:{}", DEFAULT_PORT)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_job_name() -> String {
    String::from("local")
}

#[derive(Debug, Parser, Clone, Deserialize)]
#[command(name = "upsd.plugin")]
#[command(about = "Collects UPS metrics from a NUT upsd daemon.")]
#[command(version)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// upsd address, host:port
    #[arg(long = "upsd-address", default_value_t = default_address())]
    #[serde(default = "default_address")]
    pub address: String,

    /// Time budget of every request to upsd (accepts durations like "5s", "500ms")
    #[arg(long = "upsd-timeout", default_value = "5s", value_parser = parse_duration)]
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Value of the `_collect_job` chart label
    #[arg(long = "job-name", default_value_t = default_job_name())]
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// Run a single collection cycle and exit
    #[arg(long)]
    #[serde(skip)]
    pub once: bool,

    /// Collection interval in seconds
    #[arg(value_name = "UPDATE_EVERY")]
    #[serde(default)]
    pub update_every: Option<u64>,

    // netdata env variables
    #[arg(skip)]
    #[serde(skip)]
    pub _netdata_env: NetdataEnv,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout: default_timeout(),
            job_name: default_job_name(),
            once: false,
            update_every: None,
            _netdata_env: NetdataEnv::default(),
        }
    }
}

impl PluginConfig {
    /// Build the effective configuration from parsed command line arguments
    /// and the agent's environment.
    ///
    /// Under Netdata the settings come from `upsd.yaml` (user dir, then stock
    /// dir, then built-in defaults); the command line only contributes the
    /// collection interval, which the agent passes as the first argument.
    pub fn resolve(cli: PluginConfig, netdata_env: NetdataEnv) -> Result<Self> {
        let mut config = if netdata_env.running_under_netdata() {
            let mut config = Self::from_netdata_dirs(&netdata_env)?;
            config.update_every = cli.update_every.or(config.update_every);
            config.once = cli.once;
            config
        } else {
            cli
        };

        config.update_every = Some(
            config
                .update_every
                .or(netdata_env.update_every)
                .unwrap_or(1),
        );
        config._netdata_env = netdata_env;
        config.validate()?;
        Ok(config)
    }

    fn from_netdata_dirs(netdata_env: &NetdataEnv) -> Result<Self> {
        if let Some(path) = netdata_env
            .user_config_dir
            .as_ref()
            .map(|dir| dir.join(CONFIG_FILE))
            .filter(|path| path.exists())
        {
            match Self::from_yaml_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::error!(
                    "failed to load user config from {}: {:#}. Falling back to stock config.",
                    path.display(),
                    e
                ),
            }
        }

        if let Some(path) = netdata_env
            .stock_config_dir
            .as_ref()
            .map(|dir| dir.join(CONFIG_FILE))
            .filter(|path| path.exists())
        {
            return Self::from_yaml_file(&path)
                .with_context(|| format!("loading stock config from {}", path.display()));
        }

        tracing::info!("no {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: PluginConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config file: {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => anyhow::bail!(
                "upsd address must be in format host:port, got: {}",
                self.address
            ),
        }

        if self.timeout.is_zero() {
            anyhow::bail!("upsd timeout must be greater than zero");
        }

        let update_every = self.update_every.unwrap_or(1);
        if !(1..=MAX_UPDATE_EVERY).contains(&update_every) {
            anyhow::bail!(
                "update_every must be between 1 and {} seconds, got: {}",
                MAX_UPDATE_EVERY,
                update_every
            );
        }

        if self.job_name.is_empty() {
            anyhow::bail!("job name cannot be empty");
        }

        Ok(())
    }

    /// Collection interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_every.unwrap_or(1))
    }
}

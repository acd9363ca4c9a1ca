use std::env;
use std::path::PathBuf;

/// The subset of the agent's environment the plugin cares about.
#[derive(Debug, Clone, Default)]
pub struct NetdataEnv {
    pub user_config_dir: Option<PathBuf>,
    pub stock_config_dir: Option<PathBuf>,
    pub plugins_dir: Option<PathBuf>,
    pub update_every: Option<u64>,
    pub invocation_id: Option<String>,
    pub log_method: Option<LogMethod>,
    pub log_level: Option<LogLevel>,
    pub systemd_journal_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMethod {
    Journal,
    Stderr,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl LogLevel {
    /// The closest `tracing` filter directive
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Emergency | LogLevel::Alert | LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Notice | LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl NetdataEnv {
    pub fn from_environment() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            user_config_dir: lookup("NETDATA_USER_CONFIG_DIR").map(PathBuf::from),
            stock_config_dir: lookup("NETDATA_STOCK_CONFIG_DIR").map(PathBuf::from),
            plugins_dir: lookup("NETDATA_PLUGINS_DIR").map(PathBuf::from),
            update_every: lookup("NETDATA_UPDATE_EVERY").and_then(|s| s.parse().ok()),
            invocation_id: lookup("NETDATA_INVOCATION_ID"),
            log_method: lookup("NETDATA_LOG_METHOD").and_then(|s| s.parse().ok()),
            log_level: lookup("NETDATA_LOG_LEVEL").and_then(|s| s.parse().ok()),
            systemd_journal_path: lookup("NETDATA_SYSTEMD_JOURNAL_PATH").map(PathBuf::from),
        }
    }

    pub fn running_under_netdata(&self) -> bool {
        self.user_config_dir.is_some()
            || self.stock_config_dir.is_some()
            || self.plugins_dir.is_some()
            || self.invocation_id.is_some()
    }
}

impl std::str::FromStr for LogMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "journal" => Ok(LogMethod::Journal),
            "stderr" => Ok(LogMethod::Stderr),
            "none" => Ok(LogMethod::None),
            _ => Err(format!("Invalid log method: {}", s)),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emergency" | "emerg" => Ok(LogLevel::Emergency),
            "alert" => Ok(LogLevel::Alert),
            "critical" | "crit" => Ok(LogLevel::Critical),
            "error" | "err" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "notice" => Ok(LogLevel::Notice),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

use crate::error::{AppError, Result};
use crate::ftp::FtpEndpoint;
use crate::parser::BoundingBox;
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::scheduler::SchedulerSettings;
use crate::transfer::TransferSettings;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub scheduler: SchedulerConfig,
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub host: String,
    #[serde(default = "default_ftp_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DestinationConfig {
    pub host: String,
    #[serde(default = "default_ftp_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    pub credentials_file: PathBuf,
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_ftp_port() -> u16 {
    21
}

fn default_user() -> String {
    "anonymous".to_string()
}

/// Custom deserializer that handles port as both number and string
///
/// Accepts:
/// - `port: 21` (number)
/// - `port: "21"` (string that parses to number)
/// - `port: ${FTP_PORT}` (env var substituted to either)
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        String(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => Ok(n),
        PortValue::String(s) => s
            .parse::<u16>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid port number: '{}'", s))),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub collection_interval_seconds: u64,
    #[serde(default)]
    pub offset_seconds: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    pub data_dir: PathBuf,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    #[serde(default = "default_bounding_box")]
    pub bounding_box: [f64; 4],
    #[serde(default = "default_exclusion_marker")]
    pub exclusion_marker: String,
    #[serde(default)]
    pub callsigns: ShipFilter,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

fn default_bounding_box() -> [f64; 4] {
    [-180.0, -90.0, 180.0, 90.0]
}

fn default_exclusion_marker() -> String {
    "do_not_use".to_string()
}

fn default_retry_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay() -> u64 {
    5
}

/// Glob patterns restricting which ship callsigns are relayed. Empty
/// matches every ship.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(transparent)]
pub struct ShipFilter {
    pub patterns: Vec<String>,
}

impl ShipFilter {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches_callsign(&self, callsign: &str) -> bool {
        if self.is_empty() {
            return true;
        }

        self.patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(callsign))
                .unwrap_or(false)
        })
    }
}

/// Login for the destination server, read from a `key: value` file.
/// Keys are `username` and `password`, or `NDBC-FTP-Username` and
/// `NDBC-FTP-Password`, in any case.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

impl Credentials {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Credentials(format!(
                "Unable to open credentials file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut username = None;
        let mut password = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                tracing::warn!("Ignoring credentials line without a ':' separator");
                continue;
            };

            match key.trim().to_lowercase().as_str() {
                "username" | "ndbc-ftp-username" => username = Some(value.trim().to_string()),
                "password" | "ndbc-ftp-password" => password = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (username, password) {
            (Some(username), Some(password)) => Ok(Self { username, password }),
            _ => Err(AppError::Credentials(
                "Credentials file must define both 'username' and 'password'".to_string(),
            )),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        // Substitute environment variables
        let expanded = expand_env_vars(&content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Non-empty hosts and non-zero ports
    /// - Positive collection interval
    /// - A bounding box with min below max, within world limits
    /// - Valid callsign glob patterns
    fn validate(&self) -> Result<()> {
        let hosts = [
            ("source", &self.source.host),
            ("destination", &self.destination.host),
        ];

        for (name, host) in &hosts {
            if host.contains("${") {
                return Err(AppError::Config(format!(
                    "{} host contains an unexpanded environment variable",
                    name
                )));
            }
            if host.is_empty() {
                return Err(AppError::Config(format!("{} host cannot be empty", name)));
            }
        }

        if self.source.port == 0 || self.destination.port == 0 {
            return Err(AppError::Config("FTP port cannot be 0".to_string()));
        }

        if self.scheduler.collection_interval_seconds == 0 {
            return Err(AppError::Config(
                "Scheduler collection_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.collection_interval_seconds < 60 {
            tracing::warn!(
                "Collection interval of {} seconds is very short, consider at least 60",
                self.scheduler.collection_interval_seconds
            );
        }

        let [min_lon, min_lat, max_lon, max_lat] = self.processing.bounding_box;
        if !(-180.0..=180.0).contains(&min_lon)
            || !(-180.0..=180.0).contains(&max_lon)
            || !(-90.0..=90.0).contains(&min_lat)
            || !(-90.0..=90.0).contains(&max_lat)
        {
            return Err(AppError::Config(format!(
                "Bounding box {:?} exceeds world limits",
                self.processing.bounding_box
            )));
        }
        if min_lon >= max_lon || min_lat >= max_lat {
            return Err(AppError::Config(format!(
                "Bounding box {:?} must be [min_lon, min_lat, max_lon, max_lat]",
                self.processing.bounding_box
            )));
        }

        for pattern in &self.processing.callsigns.patterns {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(AppError::Config(format!(
                    "Invalid callsign pattern '{}': {}",
                    pattern, e
                )));
            }
        }

        if self.processing.retry_attempts == 0 {
            return Err(AppError::Config(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from(self.processing.bounding_box)
    }

    pub fn source_endpoint(&self) -> FtpEndpoint {
        FtpEndpoint {
            host: self.source.host.clone(),
            port: self.source.port,
            username: self.source.user.clone(),
            password: self.source.password.clone(),
            directory: self.source.directory.clone(),
        }
    }

    pub fn destination_endpoint(&self, credentials: Credentials) -> FtpEndpoint {
        FtpEndpoint {
            host: self.destination.host.clone(),
            port: self.destination.port,
            username: credentials.username,
            password: credentials.password,
            directory: self.destination.directory.clone(),
        }
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            data_dir: self.processing.data_dir.clone(),
            bounds: self.bounding_box(),
            exclusion_marker: self.processing.exclusion_marker.clone(),
            ships: self.processing.callsigns.clone(),
            retry: RetryPolicy::new(
                self.processing.retry_attempts,
                Duration::from_secs(self.processing.retry_delay_seconds),
            ),
        }
    }

    pub fn scheduler_settings(&self, single_run: bool) -> SchedulerSettings {
        SchedulerSettings {
            collection_interval_seconds: self.scheduler.collection_interval_seconds,
            offset_seconds: self.scheduler.offset_seconds,
            single_run,
        }
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").unwrap();

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root\n\
             2. Set the missing variable{}: export {}=<value>",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
        )));
    }

    Ok(result)
}

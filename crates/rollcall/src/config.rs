//! Settings for the endpoints, timeouts, sync cadence and queue location.
//!
//! Layers, lowest to highest: built-in defaults, the TOML file, then
//! `ROLLCALL_` environment variables with `__` between section and key
//! (`ROLLCALL_SYNC__INTERVAL_SECS=60`).

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.toml";
const DATA_DIR_NAME: &str = "rollcall";
const DATABASE_FILE_NAME: &str = "queue.db";

/// Default attendance ledger endpoint.
const DEFAULT_REMOTE_URL: &str = "https://script.google.com/macros/s/AKfycbzexvWhRR0OmYm218G7vW6_5JlKt9oM0LcDjoGPN6CnfWeMjVP6CUSeTQtIXxw3G0slfQ/exec";

/// Default forwarding endpoint in front of the ledger.
const DEFAULT_PROXY_URL: &str = "https://attendance-cors.kuapc-das.workers.dev";

/// Complete client configuration. Every field has a working default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote endpoints.
    pub endpoints: EndpointsConfig,
    /// Submission gateway configuration.
    pub gateway: GatewayConfig,
    /// Sync scheduler configuration.
    pub sync: SyncConfig,
    /// Connectivity detection configuration.
    pub connectivity: ConnectivityConfig,
    /// Offline queue storage configuration.
    pub storage: StorageConfig,
    /// Volunteer session defaults.
    pub volunteer: VolunteerConfig,
}

/// The two URLs the client talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// The authoritative attendance ledger.
    pub remote_url: String,
    /// Forwarding endpoint that relays requests to `remote_url`.
    pub proxy_url: String,
}

/// Submission gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upper bound on one remote round trip, in seconds.
    pub timeout_secs: u64,
}

/// Sync scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Period of the background drain timer, in seconds.
    pub interval_secs: u64,
    /// Queue scans the remote explicitly declined, as well as failed ones.
    pub queue_rejections: bool,
}

/// Connectivity detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// URL probed for reachability. Defaults to the proxy URL.
    pub probe_url: Option<String>,
    /// Interval between reachability probes, in seconds.
    pub probe_interval_secs: u64,
    /// Connectivity assumed before the first probe completes.
    pub assume_online: bool,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the queue database.
    /// Defaults to `~/.local/share/rollcall/queue.db`
    pub database_path: Option<PathBuf>,
}

/// Volunteer session defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolunteerConfig {
    /// Token used when none is given on the command line.
    pub vtoken: Option<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            proxy_url: DEFAULT_PROXY_URL.to_string(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { timeout_secs: 8 }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            queue_rejections: true,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            probe_interval_secs: 10,
            assume_online: true,
        }
    }
}

impl Config {
    /// Load from `path`, or the default location when `None`. A missing
    /// file is not an error; the other layers still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer cannot be parsed or the merged result
    /// fails [`Config::validate`].
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let file = path.unwrap_or_else(Self::default_config_path);

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed("ROLLCALL_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.config/rollcall/config.toml` on Linux.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        base.join(DATA_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// `~/.local/share/rollcall` on Linux.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".local/share"));
        base.join(DATA_DIR_NAME)
    }

    /// Reject zero durations and endpoints that are not absolute URLs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] or [`Error::InvalidUrl`] naming
    /// the first bad setting.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("gateway.timeout_secs", self.gateway.timeout_secs),
            ("sync.interval_secs", self.sync.interval_secs),
            (
                "connectivity.probe_interval_secs",
                self.connectivity.probe_interval_secs,
            ),
        ];
        if let Some((key, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            return Err(Error::ConfigValidation {
                message: format!("{key} must be greater than 0"),
            });
        }

        self.remote_url()?;
        self.proxy_url()?;
        self.probe_url()?;

        Ok(())
    }

    /// The ledger endpoint as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not an absolute URL.
    pub fn remote_url(&self) -> Result<Url> {
        parse_endpoint(&self.endpoints.remote_url)
    }

    /// The forwarding endpoint as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not an absolute URL.
    pub fn proxy_url(&self) -> Result<Url> {
        parse_endpoint(&self.endpoints.proxy_url)
    }

    /// The reachability probe target, falling back to the proxy URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not an absolute URL.
    pub fn probe_url(&self) -> Result<Url> {
        match &self.connectivity.probe_url {
            Some(url) => parse_endpoint(url),
            None => self.proxy_url(),
        }
    }

    /// The queue database, `queue.db` under the data directory unless set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        match &self.storage.database_path {
            Some(path) => path.clone(),
            None => Self::default_data_dir().join(DATABASE_FILE_NAME),
        }
    }

    /// Bound on one gateway round trip.
    #[must_use]
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.timeout_secs)
    }

    /// Period of the background sync timer.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Period of the reachability probe.
    #[must_use]
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity.probe_interval_secs)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|source| Error::invalid_url(raw, source))?;
    if url.cannot_be_a_base() {
        return Err(Error::ConfigValidation {
            message: format!("endpoint is not a hierarchical URL: {raw}"),
        });
    }
    Ok(url)
}

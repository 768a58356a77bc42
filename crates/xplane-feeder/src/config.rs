/// Process configuration: where to read telemetry from, where to send it, and how often.
use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Deserializer};

use crate::{feeder::ErrorPolicy, Error, FeedResult};

/// X-Plane listens for UDP on this port by default.
pub const DEFAULT_XPLANE: &str = "127.0.0.1:49000";

// 10 Hz. Feeds labelled "20 Hz" in deployment notes need `tick_period: 50ms`.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Simulator `host:port`.
    pub xplane: String,
    /// Local address the outbound socket binds to.
    pub bind: String,
    #[serde(deserialize_with = "human_duration")]
    pub tick_period: Duration,
    pub on_error: ErrorPolicy,
    pub influx: InfluxConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            xplane: DEFAULT_XPLANE.to_string(),
            bind: "0.0.0.0:0".to_string(),
            tick_period: DEFAULT_TICK_PERIOD,
            on_error: ErrorPolicy::Exit,
            influx: InfluxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InfluxConfig {
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Prepended to the flight name to form the measurement name.
    pub measurement_prefix: String,
    /// Whole-request timeout for one query.
    #[serde(deserialize_with = "human_duration")]
    pub timeout: Duration,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8086".to_string(),
            database: "flightdata".to_string(),
            username: None,
            password: None,
            measurement_prefix: "flight.".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> FeedResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> FeedResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    /// Check values that would otherwise only fail once the feeder is running.
    pub fn validate(&self) -> FeedResult<()> {
        if self.tick_period.is_zero() {
            return Err(Error::Config("tick period must be non-zero".into()));
        }
        if self.influx.timeout.is_zero() {
            return Err(Error::Config("influx timeout must be non-zero".into()));
        }
        self.bind_addr()?;
        self.xplane_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> FeedResult<SocketAddr> {
        resolve(&self.bind)
    }

    pub fn xplane_addr(&self) -> FeedResult<SocketAddr> {
        resolve(&self.xplane)
    }
}

fn resolve(addr: &str) -> FeedResult<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| Error::Config(format!("address {addr}: {e}")))?
        .next()
        .ok_or_else(|| Error::Config(format!("address {addr} resolves to nothing")))
}

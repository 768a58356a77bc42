/// Telemetry-to-simulator feeder library.
///
/// A [`source::TelemetrySource`] yields the most recent [`sample::RawSample`] for a tracked
/// flight, [`sample::convert`] turns it into wire-ready units, [`protocol::veh1`] packs it into an
/// X-Plane `VEH1` datagram and [`feeder::Feeder`] repeats the cycle at a fixed cadence.
use std::sync::Once;

use thiserror::Error;

pub mod config;
pub mod feeder;
pub mod protocol;
pub mod sample;
pub mod source;
pub mod transport;

/// Result type for this library
pub type FeedResult<T> = std::result::Result<T, Error>;

/// Error type for this library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Transmit error: {0}")]
    Transmit(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Failures of a single "latest sample" query against the telemetry store.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no series found for flight {flight}")]
    NotFound { flight: String },
    #[error("{series} series match flight {flight}, expected exactly one")]
    Ambiguous { flight: String, series: usize },
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

impl From<nom::error::Error<&[u8]>> for Error {
    fn from(err: nom::error::Error<&[u8]>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}

/// Test helper to init tracing once per test binary. Installing a subscriber is otherwise the
/// job of the binary, never of the library.
pub fn lazy_init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Telemetry store adapters.
///
/// A source answers one question: what is the most recent recorded point for this flight? It
/// never retries; the next scheduler tick is the retry.
use crate::{sample::RawSample, FeedResult};

pub mod influx;

/// Trait implemented by telemetry stores the feeder can poll.
#[allow(async_fn_in_trait)]
pub trait TelemetrySource {
    /// Fetch the latest sample for `flight`. Zero or several matching series are both errors,
    /// as is a record whose fields don't coerce to numbers.
    async fn fetch_latest(&mut self, flight: &str) -> FeedResult<RawSample>;
}

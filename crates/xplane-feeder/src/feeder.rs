/// Fixed-rate fetch, convert, transmit loop.
///
/// One tick at a time: a slow fetch stretches the interval but never overlaps the next tick.
/// Nothing carries over between ticks except the flight, the vehicle id and the socket.
use std::{future::Future, time::Duration};

use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{
    sample::{convert, ConvertedSample},
    source::TelemetrySource,
    transport::{encode_and_send, Transmitter},
    Error, FeedResult,
};

/// What the loop does when a tick fails to fetch or transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the loop and return the error.
    Exit,
    /// Log, count the failure and wait for the next tick.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    Running,
    Stopped,
}

/// Tick counts for one [`Feeder::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    pub sent: u64,
    pub failed: u64,
}

pub struct Feeder<S, T> {
    source: S,
    transport: T,
    flight: String,
    vehicle_id: i32,
    period: Duration,
    policy: ErrorPolicy,
    state: FeederState,
}

impl<S, T> Feeder<S, T>
where
    S: TelemetrySource,
    T: Transmitter,
{
    pub fn new(
        source: S,
        transport: T,
        flight: impl Into<String>,
        vehicle_id: i32,
        period: Duration,
        policy: ErrorPolicy,
    ) -> FeedResult<Self> {
        let flight = flight.into();
        if flight.trim().is_empty() {
            return Err(Error::Config("flight name must not be empty".into()));
        }
        if period.is_zero() {
            return Err(Error::Config("tick period must be non-zero".into()));
        }
        Ok(Self {
            source,
            transport,
            flight,
            vehicle_id,
            period,
            policy,
            state: FeederState::Stopped,
        })
    }

    pub fn state(&self) -> FeederState {
        self.state
    }

    /// One fetch, convert, encode and send cycle. A failed fetch sends nothing.
    pub async fn tick(&mut self) -> FeedResult<ConvertedSample> {
        let raw = self.source.fetch_latest(&self.flight).await?;
        if let Some(t) = raw.time {
            debug!("{} sample recorded at {}", self.flight, t);
        }
        let sample = convert(self.vehicle_id, &raw);
        debug!("{:?}", sample);
        encode_and_send(&self.transport, &sample).await?;
        Ok(sample)
    }

    /// Tick every period until `shutdown` resolves. Shutdown is only observed between ticks, so
    /// a tick that has started always finishes.
    ///
    /// Under [`ErrorPolicy::Exit`] the first failed tick ends the loop with that error.
    pub async fn run<F>(&mut self, shutdown: F) -> FeedResult<FeedStats>
    where
        F: Future<Output = ()>,
    {
        info!(
            "feeding flight {} as vehicle {} every {:?} (on error: {:?})",
            self.flight, self.vehicle_id, self.period, self.policy
        );
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        self.state = FeederState::Running;
        let mut stats = FeedStats::default();
        let result = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break Ok(stats),
                _ = interval.tick() => {}
            }
            match self.tick().await {
                Ok(_) => stats.sent += 1,
                Err(e) => {
                    stats.failed += 1;
                    match self.policy {
                        ErrorPolicy::Exit => {
                            error!("tick failed, stopping: {}", e);
                            break Err(e);
                        }
                        ErrorPolicy::Continue => warn!("tick failed: {}", e),
                    }
                }
            }
        };
        self.state = FeederState::Stopped;
        info!("stopped after {} sent, {} failed", stats.sent, stats.failed);
        result
    }
}

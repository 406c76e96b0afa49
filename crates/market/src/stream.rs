use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use common::{BarUpdate, Error, MarketDataProvider, Resolution, Result, Session};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub resolution: Resolution,
    /// Bars requested per poll.
    pub window_bars: usize,
    #[serde(with = "crate::duration_millis")]
    pub poll_interval: Duration,
    #[serde(with = "crate::duration_millis")]
    pub error_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::M1,
            window_bars: 100,
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Polling market-data stream for a single instrument.
///
/// Polls the provider for the latest window, emits a `BarUpdate` only when
/// the newest bar timestamp changed, and sleeps between polls. Errors and
/// empty responses pause for the longer `error_backoff`.
pub struct BarPoller {
    provider: Arc<dyn MarketDataProvider>,
    session: Session,
    instrument: String,
    config: StreamConfig,
    last_seen: Option<DateTime<Utc>>,
}

impl BarPoller {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        session: Session,
        instrument: impl Into<String>,
        config: StreamConfig,
    ) -> Self {
        Self {
            provider,
            session,
            instrument: instrument.into(),
            config,
            last_seen: None,
        }
    }

    /// Run until `shutdown` turns true or the receiver side of `update_tx`
    /// is dropped. Cancellation is checked before every sleep and also
    /// interrupts a sleep in progress. Call this inside a `tokio::spawn`.
    pub async fn run(mut self, update_tx: mpsc::Sender<BarUpdate>, mut shutdown: watch::Receiver<bool>) {
        info!(instrument = %self.instrument, resolution = %self.config.resolution, "Starting bar poller");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.poll_once().await {
                Ok(Some(update)) => {
                    if update_tx.send(update).await.is_err() {
                        warn!(instrument = %self.instrument, "Update channel closed, stopping poller");
                        return;
                    }
                    self.config.poll_interval
                }
                Ok(None) => self.config.poll_interval,
                Err(e) => {
                    warn!(instrument = %self.instrument, error = %e, backoff = ?self.config.error_backoff, "Poll failed");
                    self.config.error_backoff
                }
            };

            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    // A dropped sender also ends the loop.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(instrument = %self.instrument, "Bar poller stopped");
    }

    /// One poll. `Ok(None)` means nothing new since the last emitted update.
    pub async fn poll_once(&mut self) -> Result<Option<BarUpdate>> {
        let bars = self
            .provider
            .fetch_recent(
                &self.session,
                &self.instrument,
                self.config.resolution,
                self.config.window_bars,
            )
            .await?
            .filter(|bars| !bars.is_empty())
            .ok_or_else(|| Error::fetch(self.instrument.as_str(), "provider returned no market data"))?;

        let latest = bars.last().map(|b| b.timestamp);
        if latest == self.last_seen {
            debug!(instrument = %self.instrument, "No new bar");
            return Ok(None);
        }

        self.last_seen = latest;
        if let Some(ts) = latest {
            info!(instrument = %self.instrument, at = %ts, "New bar received");
        }
        Ok(Some(BarUpdate {
            instrument: self.instrument.clone(),
            resolution: self.config.resolution,
            bars,
        }))
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{Bar, BarSeries, Error, MarketDataProvider, Resolution, Result, Session};

use crate::pacer::RequestPacer;

/// Lookback windows and fetch limits for historical assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub coarse_resolution: Resolution,
    /// Number of coarse bars ending now (2190 H4 bars ≈ 1 year of FX sessions).
    pub coarse_bars: usize,
    pub fine_resolution: Resolution,
    pub fine_days: i64,
    pub chunk_days: i64,
    /// Minimum time between two chunk request starts, across all workers.
    #[serde(with = "crate::duration_millis")]
    pub request_spacing: Duration,
    /// Upper bound on concurrently outstanding chunk requests.
    pub max_in_flight: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            coarse_resolution: Resolution::H4,
            coarse_bars: 2190,
            fine_resolution: Resolution::M1,
            fine_days: 90,
            chunk_days: 3,
            request_spacing: Duration::from_millis(100),
            max_in_flight: 4,
        }
    }
}

impl AssemblerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.coarse_bars == 0 {
            return Err(Error::Config("assembler.coarse_bars must be >= 1".into()));
        }
        if self.max_in_flight == 0 {
            return Err(Error::Config("assembler.max_in_flight must be >= 1".into()));
        }
        self.window(Utc::now()).map(|_| ())
    }

    /// Start of the coarse and fine windows ending at `now`, plus the chunk length.
    pub fn window(&self, now: DateTime<Utc>) -> Result<Window> {
        if self.fine_days < 0 {
            return Err(Error::Config(format!(
                "assembler.fine_days must be >= 0, got {}",
                self.fine_days
            )));
        }
        if self.chunk_days <= 0 {
            return Err(Error::Config(format!(
                "assembler.chunk_days must be >= 1, got {}",
                self.chunk_days
            )));
        }
        let fine = chrono::Duration::try_days(self.fine_days)
            .ok_or_else(|| Error::Config(format!("assembler.fine_days out of range: {}", self.fine_days)))?;
        let chunk = chrono::Duration::try_days(self.chunk_days)
            .ok_or_else(|| Error::Config(format!("assembler.chunk_days out of range: {}", self.chunk_days)))?;
        let coarse = i32::try_from(self.coarse_bars)
            .ok()
            .and_then(|n| self.coarse_resolution.duration().checked_mul(n))
            .ok_or_else(|| Error::Config(format!("assembler.coarse_bars out of range: {}", self.coarse_bars)))?;

        let coarse_start = now
            .checked_sub_signed(coarse)
            .ok_or_else(|| Error::Config("coarse window starts before the supported date range".into()))?;
        let fine_start = now
            .checked_sub_signed(fine)
            .ok_or_else(|| Error::Config("fine window starts before the supported date range".into()))?;
        Ok(Window {
            coarse_start,
            fine_start,
            chunk,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub coarse_start: DateTime<Utc>,
    pub fine_start: DateTime<Utc>,
    pub chunk: chrono::Duration,
}

/// One fine-resolution slice `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Split `[start, end)` into consecutive slices of `chunk` length.
/// The final slice is truncated at `end`.
pub fn plan_chunks(start: DateTime<Utc>, end: DateTime<Utc>, chunk: chrono::Duration) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    if chunk <= chrono::Duration::zero() {
        return chunks;
    }
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + chunk).min(end);
        chunks.push(Chunk {
            index: chunks.len(),
            start: cursor,
            end: next,
        });
        cursor = next;
    }
    chunks
}

/// Builds one merged multi-resolution series per instrument.
///
/// A long coarse batch is fetched in a single request; the recent fine window
/// is walked in fixed chunks with bounded overlap. Fine bars override coarse
/// bars at the same timestamp.
pub struct Assembler {
    provider: Arc<dyn MarketDataProvider>,
    config: AssemblerConfig,
    pacer: Arc<RequestPacer>,
}

impl Assembler {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: AssemblerConfig) -> Self {
        let pacer = Arc::new(RequestPacer::new(config.request_spacing));
        Self {
            provider,
            config,
            pacer,
        }
    }

    /// Share a pacer with other components talking to the same provider.
    pub fn with_pacer(mut self, pacer: Arc<RequestPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub async fn assemble(
        &self,
        session: &Session,
        instrument: &str,
        now: DateTime<Utc>,
    ) -> Result<BarSeries> {
        let window = self.config.window(now)?;

        info!(%instrument, resolution = %self.config.coarse_resolution, bars = self.config.coarse_bars, until = %now, "Fetching coarse batch");
        self.pacer.acquire().await;
        let mut coarse = self
            .provider
            .fetch_range(
                session,
                instrument,
                self.config.coarse_resolution,
                window.coarse_start,
                now,
            )
            .await
            .map_err(|e| Error::fetch(instrument, format!("coarse batch: {e}")))?
            .filter(|bars| !bars.is_empty())
            .ok_or_else(|| {
                Error::fetch(
                    instrument,
                    format!("missing {} coarse batch", self.config.coarse_resolution),
                )
            })?;
        if coarse.len() > self.config.coarse_bars {
            coarse.drain(..coarse.len() - self.config.coarse_bars);
        }
        info!(%instrument, rows = coarse.len(), "Coarse batch fetched");

        let chunks = plan_chunks(window.fine_start, now, window.chunk);
        let fine = self.fetch_fine_chunks(session, instrument, &chunks).await;

        if fine.is_empty() {
            warn!(%instrument, "No fine data available, using coarse bars only");
        } else {
            let rows: usize = fine.iter().map(Vec::len).sum();
            info!(%instrument, chunks = fine.len(), rows, "Combining coarse and fine data");
        }

        let batches = std::iter::once(coarse).chain(fine);
        let series = BarSeries::merge(instrument, batches);

        for bar in series.bars() {
            bar.validate().map_err(|reason| {
                Error::fetch(instrument, format!("malformed bar at {}: {reason}", bar.timestamp))
            })?;
        }

        if let (Some(first), Some(last)) = (series.first(), series.last()) {
            info!(
                %instrument,
                rows = series.len(),
                from = %first.timestamp,
                to = %last.timestamp,
                "Historical series assembled"
            );
        }
        Ok(series)
    }

    /// Fetch all chunks with bounded overlap. Returns non-empty chunk results
    /// in chunk order regardless of completion order. Failed chunks are
    /// logged and treated as empty.
    async fn fetch_fine_chunks(
        &self,
        session: &Session,
        instrument: &str,
        chunks: &[Chunk],
    ) -> Vec<Vec<Bar>> {
        let resolution = self.config.fine_resolution;
        let max_in_flight = self.config.max_in_flight.max(1);

        let mut results: Vec<(usize, Vec<Bar>)> = stream::iter(chunks.iter().copied())
            .map(|chunk| async move {
                self.pacer.acquire().await;
                debug!(%instrument, from = %chunk.start, to = %chunk.end, "Fetching fine chunk");
                let outcome = self
                    .provider
                    .fetch_range(session, instrument, resolution, chunk.start, chunk.end)
                    .await;
                (chunk, outcome)
            })
            .buffer_unordered(max_in_flight)
            .filter_map(|(chunk, outcome)| async move {
                match outcome {
                    Ok(Some(bars)) if !bars.is_empty() => {
                        debug!(%instrument, chunk = chunk.index, rows = bars.len(), "Fine chunk fetched");
                        Some((chunk.index, bars))
                    }
                    Ok(_) => {
                        debug!(%instrument, chunk = chunk.index, from = %chunk.start, "Fine chunk empty, skipping");
                        None
                    }
                    Err(e) => {
                        warn!(%instrument, chunk = chunk.index, from = %chunk.start, error = %e, "Fine chunk failed, treating as empty");
                        None
                    }
                }
            })
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, bars)| bars).collect()
    }
}

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use common::{Error, MarketDataProvider, MarketSignal, Result, Session};
use features::{build_labels, derive, FeatureTable};
use market::Assembler;
use model::{grid_search, GridSearchResult, Metrics, ModelConfig, ModelKind, Trainer};
use settings::{recommend, Recommendation, SettingsDocument};

use crate::config::PipelineConfig;
use crate::stage::Stage;

/// Everything one successful instrument run produced.
#[derive(Debug)]
pub struct InstrumentRun {
    pub instrument: String,
    pub bars: usize,
    /// Complete feature rows (before the final unlabeled row is dropped).
    pub feature_rows: usize,
    pub metrics: Metrics,
    pub signal: MarketSignal,
    pub recommendation: Option<Recommendation>,
    pub search: Option<GridSearchResult>,
    /// The fitted model, reused by the live tuning loop.
    pub trainer: Trainer,
}

/// Outcome of one instrument within a batch.
#[derive(Debug)]
pub struct InstrumentReport {
    pub instrument: String,
    /// Last stage entered; `Done` on success.
    pub stage: Stage,
    pub outcome: Result<InstrumentRun>,
}

impl InstrumentReport {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Load the settings file recommendations are made against.
///
/// An unreadable file only disables recommendations; training and metrics
/// still run for every instrument.
pub fn load_settings(path: Option<&Path>) -> Option<SettingsDocument> {
    let path = path?;
    match SettingsDocument::load(path) {
        Ok(doc) => Some(doc),
        Err(e) => {
            error!(file = %path.display(), error = %e, "Settings file unreadable, running without recommendations");
            None
        }
    }
}

/// Fetch → features → labels → train → recommend, per instrument.
pub struct Pipeline {
    assembler: Assembler,
    config: PipelineConfig,
    settings: Option<SettingsDocument>,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: PipelineConfig) -> Self {
        let assembler = Assembler::new(provider, config.assembler.clone());
        Self {
            assembler,
            config,
            settings: None,
        }
    }

    /// Attach the settings document recommendations are made against.
    pub fn with_settings(mut self, settings: Option<SettingsDocument>) -> Self {
        self.settings = settings;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn settings(&self) -> Option<&SettingsDocument> {
        self.settings.as_ref()
    }

    pub async fn run_instrument(
        &self,
        session: &Session,
        instrument: &str,
        now: DateTime<Utc>,
    ) -> Result<InstrumentRun> {
        let mut stage = Stage::Fetching;
        self.run_tracked(session, instrument, now, &mut stage).await
    }

    /// Run every instrument in order. A failing instrument is logged and
    /// reported; the batch carries on with the next one.
    pub async fn run_batch(
        &self,
        session: &Session,
        instruments: &[String],
        now: DateTime<Utc>,
    ) -> Vec<InstrumentReport> {
        let mut reports = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            let mut stage = Stage::Fetching;
            let outcome = self.run_tracked(session, instrument, now, &mut stage).await;
            if let Err(e) = &outcome {
                error!(instrument = %instrument, stage = %stage, error = %e, "Instrument failed");
            }
            reports.push(InstrumentReport {
                instrument: instrument.clone(),
                stage,
                outcome,
            });
        }

        let failed = reports.iter().filter(|r| !r.is_ok()).count();
        info!(total = reports.len(), failed, "Batch complete");
        reports
    }

    async fn run_tracked(
        &self,
        session: &Session,
        instrument: &str,
        now: DateTime<Utc>,
        stage: &mut Stage,
    ) -> Result<InstrumentRun> {
        *stage = Stage::Fetching;
        info!(instrument = %instrument, stage = %stage, "Stage started");
        let series = self.assembler.assemble(session, instrument, now).await?;

        *stage = Stage::Featuring;
        info!(instrument = %instrument, stage = %stage, bars = series.len(), "Stage started");
        let table = derive(&series, &self.config.features);

        *stage = Stage::Labeling;
        info!(instrument = %instrument, stage = %stage, "Stage started");
        let complete = table.drop_incomplete();
        let (aligned, labels) = build_labels(&complete);

        *stage = Stage::Training;
        info!(instrument = %instrument, stage = %stage, rows = aligned.len(), "Stage started");
        let recent = complete.tail(self.config.signal_window);
        let (trainer, metrics, search, predictions) =
            train_blocking(self.config.model.clone(), aligned, labels, recent).await?;
        let signal = MarketSignal::from_predictions(&predictions);
        info!(
            instrument = %instrument,
            trend_strength = signal.trend_strength,
            window = predictions.len(),
            "Trend signal"
        );

        let recommendation = match &self.settings {
            Some(doc) => {
                *stage = Stage::Recommending;
                info!(instrument = %instrument, stage = %stage, "Stage started");
                Some(recommend(doc, &signal, &self.config.recommender))
            }
            None => None,
        };

        *stage = Stage::Done;
        info!(instrument = %instrument, stage = %stage, accuracy = metrics.accuracy, "Instrument complete");
        Ok(InstrumentRun {
            instrument: instrument.to_string(),
            bars: series.len(),
            feature_rows: complete.len(),
            metrics,
            signal,
            recommendation,
            search,
            trainer,
        })
    }
}

type Trained = (Trainer, Metrics, Option<GridSearchResult>, Vec<u8>);

/// Search, fit and predict on the blocking pool; forests are CPU bound.
async fn train_blocking(
    config: ModelConfig,
    aligned: FeatureTable,
    labels: Vec<u8>,
    recent: FeatureTable,
) -> Result<Trained> {
    let instrument = aligned.instrument.clone();
    tokio::task::spawn_blocking(move || {
        let mut trainer = Trainer::new(config.clone());

        let search = if config.grid_search {
            match config.kind {
                ModelKind::RandomForest => {
                    let result = grid_search(&aligned, &labels, &config.grid, config.forest, config.cv_folds)?;
                    trainer.use_forest(result.best);
                    Some(result)
                }
                ModelKind::LogisticRegression => {
                    warn!(instrument = %aligned.instrument, "Grid search only applies to random forests, skipping");
                    None
                }
            }
        } else {
            None
        };

        let metrics = trainer.train(&aligned, &labels)?;
        let predictions = trainer.predict(&recent)?;
        Ok((trainer, metrics, search, predictions))
    })
    .await
    .map_err(|e| Error::training(instrument, format!("training task failed: {e}")))?
}

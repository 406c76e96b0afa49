use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use common::{BarSeries, BarUpdate, MarketSignal, Result};
use features::{derive, FeatureConfig};
use model::Trainer;
use settings::{recommend, Recommendation, RecommenderConfig, SettingsDocument};

use crate::config::PipelineConfig;

/// Re-tunes the settings file as new bars arrive.
///
/// Each update's window is turned into features, scored by that
/// instrument's trained model, and fed to the recommender. The file is
/// rewritten only when a recommended value differs from the current one.
pub struct LiveTuner {
    models: HashMap<String, Trainer>,
    features: FeatureConfig,
    recommender: RecommenderConfig,
    signal_window: usize,
    document: SettingsDocument,
    settings_path: PathBuf,
}

impl LiveTuner {
    pub fn new(document: SettingsDocument, settings_path: impl Into<PathBuf>, config: &PipelineConfig) -> Self {
        Self {
            models: HashMap::new(),
            features: config.features.clone(),
            recommender: config.recommender.clone(),
            signal_window: config.signal_window,
            document,
            settings_path: settings_path.into(),
        }
    }

    pub fn add_model(&mut self, instrument: impl Into<String>, trainer: Trainer) {
        self.models.insert(instrument.into(), trainer);
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    /// Score one polled window. Returns the recommendation when it changed
    /// the settings file, `None` when nothing was written.
    pub fn handle_update(&mut self, update: &BarUpdate) -> Result<Option<Recommendation>> {
        let Some(trainer) = self.models.get(&update.instrument) else {
            debug!(instrument = %update.instrument, "No trained model for update");
            return Ok(None);
        };

        let series = BarSeries::merge(update.instrument.clone(), [update.bars.clone()]);
        let complete = derive(&series, &self.features).drop_incomplete();
        if complete.is_empty() {
            warn!(
                instrument = %update.instrument,
                bars = series.len(),
                "Polled window too short for features"
            );
            return Ok(None);
        }

        let predictions = trainer.predict(&complete.tail(self.signal_window))?;
        let signal = MarketSignal::from_predictions(&predictions);
        let recommendation = recommend(&self.document, &signal, &self.recommender);

        let changes = recommendation.changes(&self.document);
        if changes.is_empty() {
            debug!(instrument = %update.instrument, trend_strength = signal.trend_strength, "Settings unchanged");
            return Ok(None);
        }

        let updated = self.document.with_updates(&recommendation);
        updated.save(&self.settings_path)?;
        for (name, from, to) in &changes {
            info!(instrument = %update.instrument, name = %name, from, to, "Setting updated");
        }
        self.document = updated;
        Ok(Some(recommendation))
    }

    /// Consume updates until the channel closes or `shutdown` turns true.
    pub async fn run(mut self, mut update_rx: mpsc::Receiver<BarUpdate>, mut shutdown: watch::Receiver<bool>) {
        info!(
            models = self.models.len(),
            file = %self.settings_path.display(),
            "Live tuning started"
        );
        loop {
            tokio::select! {
                update = update_rx.recv() => {
                    match update {
                        Some(update) => {
                            if let Err(e) = self.handle_update(&update) {
                                warn!(instrument = %update.instrument, error = %e, "Live tuning step failed");
                            }
                        }
                        None => {
                            warn!("Update channel closed, live tuning exiting");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Live tuning stopped");
    }
}

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, MarketDataProvider};
use market::{BarPoller, BinanceClient};
use pipeline::{load_settings, LiveTuner, Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid environment configuration")?;
    let mut pipeline_cfg = PipelineConfig::load(&cfg.pipeline_config_path)?;
    if let Some(instruments) = &cfg.instruments {
        pipeline_cfg.instruments = instruments.clone();
    }
    info!(
        instruments = ?pipeline_cfg.instruments,
        live = cfg.live,
        authenticated = cfg.has_credentials(),
        "bartune starting"
    );

    // ── Market data provider ─────────────────────────────────────────────────
    let mut client = BinanceClient::new()?;
    if let (Some(key), Some(secret)) = (&cfg.binance_api_key, &cfg.binance_secret) {
        client = client.with_credentials(key, secret);
    }
    let provider: Arc<dyn MarketDataProvider> = Arc::new(client);
    let session = provider
        .initialize()
        .await
        .context("market data provider unavailable")?;
    info!(session = %session.id, provider = %session.provider, authenticated = session.authenticated, "Session opened");

    // ── Settings file ────────────────────────────────────────────────────────
    if cfg.settings_path.is_none() {
        info!("BARTUNE_SETTINGS not set, running without recommendations");
    }
    let settings = load_settings(cfg.settings_path.as_deref().map(Path::new));

    // ── Batch run ────────────────────────────────────────────────────────────
    let pipeline = Pipeline::new(provider.clone(), pipeline_cfg.clone()).with_settings(settings.clone());
    let reports = pipeline
        .run_batch(&session, &pipeline_cfg.instruments, Utc::now())
        .await;

    let mut trained = Vec::new();
    for report in reports {
        match report.outcome {
            Ok(run) => {
                info!(
                    instrument = %run.instrument,
                    bars = run.bars,
                    feature_rows = run.feature_rows,
                    accuracy = run.metrics.accuracy,
                    precision = run.metrics.precision,
                    recall = run.metrics.recall,
                    trend_strength = run.signal.trend_strength,
                    "Instrument report"
                );
                if let Some(rec) = &run.recommendation {
                    for (name, value) in rec.iter() {
                        info!(instrument = %run.instrument, name = %name, value, "Recommended");
                    }
                }
                trained.push((run.instrument, run.trainer));
            }
            Err(e) => {
                error!(instrument = %report.instrument, stage = %report.stage, error = %e, "Instrument failed");
            }
        }
    }

    if !cfg.live {
        return Ok(());
    }

    // ── Live tuning ──────────────────────────────────────────────────────────
    let (Some(document), Some(path)) = (settings, cfg.settings_path.clone()) else {
        warn!("BARTUNE_LIVE needs a readable BARTUNE_SETTINGS file, skipping live tuning");
        return Ok(());
    };
    if trained.is_empty() {
        warn!("No instrument trained, nothing to tune live");
        return Ok(());
    }

    let (update_tx, update_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tuner = LiveTuner::new(document, path, &pipeline_cfg);
    let mut pollers = Vec::new();
    for (instrument, trainer) in trained {
        let poller = BarPoller::new(
            provider.clone(),
            session.clone(),
            instrument.clone(),
            pipeline_cfg.stream.clone(),
        );
        pollers.push(tokio::spawn(poller.run(update_tx.clone(), shutdown_rx.clone())));
        tuner.add_model(instrument, trainer);
    }
    drop(update_tx);
    let tuner_handle = tokio::spawn(tuner.run(update_rx, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    for handle in pollers {
        let _ = handle.await;
    }
    let _ = tuner_handle.await;
    info!("bartune stopped");
    Ok(())
}

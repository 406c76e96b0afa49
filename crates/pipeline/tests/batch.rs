use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use common::{Bar, Error, MarketDataProvider, Resolution, Result, Session};
use market::AssemblerConfig;
use model::{ForestConfig, ModelConfig};
use pipeline::{Pipeline, PipelineConfig, Stage};
use settings::SettingsDocument;

/// Coarse batches per instrument; an absent instrument fails like a dead feed.
struct MockProvider {
    coarse: HashMap<String, Vec<Bar>>,
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn initialize(&self) -> Result<Session> {
        Ok(Session::new("mock", false))
    }

    async fn fetch_range(
        &self,
        _session: &Session,
        instrument: &str,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Vec<Bar>>> {
        if resolution != Resolution::H4 {
            return Ok(None);
        }
        match self.coarse.get(instrument) {
            Some(bars) => Ok(Some(
                bars.iter()
                    .filter(|b| b.timestamp >= start && b.timestamp < end)
                    .cloned()
                    .collect(),
            )),
            None => Err(Error::Http("connection refused".into())),
        }
    }

    async fn fetch_recent(
        &self,
        _session: &Session,
        _instrument: &str,
        _resolution: Resolution,
        _count: usize,
    ) -> Result<Option<Vec<Bar>>> {
        Ok(None)
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn bars(n: usize) -> Vec<Bar> {
    let start = now() - Duration::hours(4 * n as i64);
    (0..n)
        .map(|i| {
            let c = 1.1 + (i as f64 * 0.35).sin() * 0.01 + i as f64 * 0.0001;
            Bar::new(start + Duration::hours(4 * i as i64), c, c + 0.002, c - 0.002, c, 10.0)
        })
        .collect()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        assembler: AssemblerConfig {
            fine_days: 1,
            chunk_days: 1,
            request_spacing: StdDuration::ZERO,
            ..AssemblerConfig::default()
        },
        model: ModelConfig {
            forest: ForestConfig {
                n_estimators: 8,
                ..ForestConfig::default()
            },
            ..ModelConfig::default()
        },
        ..PipelineConfig::default()
    }
}

fn provider() -> Arc<dyn MarketDataProvider> {
    let mut coarse = HashMap::new();
    coarse.insert("EURUSD".to_string(), bars(300));
    coarse.insert("SHORT".to_string(), bars(10));
    Arc::new(MockProvider { coarse })
}

const SET: &str = ";=====Take Profit=====\nTakeProfit=50||Y||10||200\n;=====Stop Loss=====\nStopLoss=30||Y||5||100\n";

#[tokio::test]
async fn failing_instrument_does_not_stop_batch() {
    let provider = provider();
    let session = provider.initialize().await.unwrap();
    let pipeline = Pipeline::new(provider, config());

    let instruments: Vec<String> = ["DEAD", "EURUSD", "SHORT"].iter().map(|s| s.to_string()).collect();
    let reports = pipeline.run_batch(&session, &instruments, now()).await;
    assert_eq!(reports.len(), 3);

    let dead = &reports[0];
    assert_eq!(dead.instrument, "DEAD");
    assert_eq!(dead.stage, Stage::Fetching);
    assert!(matches!(dead.outcome, Err(Error::Fetch { .. })));

    let ok = &reports[1];
    assert_eq!(ok.stage, Stage::Done);
    let run = ok.outcome.as_ref().unwrap();
    assert_eq!(run.bars, 300);
    assert_eq!(run.feature_rows, 300 - 49);
    assert_eq!(run.metrics.test_rows, 50);
    assert!((0.0..=1.0).contains(&run.signal.trend_strength));
    assert!(run.recommendation.is_none());
    assert!(run.trainer.is_fitted());

    let short = &reports[2];
    assert_eq!(short.stage, Stage::Training);
    assert!(matches!(short.outcome, Err(Error::Training { .. })));
}

#[tokio::test]
async fn attached_settings_produce_bounded_recommendation() {
    let provider = provider();
    let session = provider.initialize().await.unwrap();
    let doc = SettingsDocument::parse("ea.set", SET);
    let pipeline = Pipeline::new(provider, config()).with_settings(Some(doc));

    let run = pipeline.run_instrument(&session, "EURUSD", now()).await.unwrap();
    let rec = run.recommendation.expect("settings attached");
    assert_eq!(rec.len(), 2);
    let tp = rec.get("TakeProfit").unwrap();
    let sl = rec.get("StopLoss").unwrap();
    assert!((10.0..=200.0).contains(&tp));
    assert!((5.0..=100.0).contains(&sl));
    if run.signal.trend_strength > 0.7 {
        assert_eq!(tp, 60.0);
        assert_eq!(sl, 24.0);
    } else {
        assert_eq!(tp, 50.0);
        assert_eq!(sl, 30.0);
    }
}

#[tokio::test]
async fn grid_search_runs_when_enabled() {
    let provider = provider();
    let session = provider.initialize().await.unwrap();
    let mut cfg = config();
    cfg.model.grid_search = true;
    cfg.model.cv_folds = 3;
    cfg.model.forest.seed = 9;
    cfg.model.grid = model::ParamGrid {
        n_estimators: vec![3, 5],
        max_depth: vec![3],
        min_samples_split: vec![2],
    };
    let pipeline = Pipeline::new(provider, cfg);

    let run = pipeline.run_instrument(&session, "EURUSD", now()).await.unwrap();
    let search = run.search.expect("search enabled");
    assert_eq!(search.scores.len(), 2);
    assert_eq!(run.trainer.config().forest.n_estimators, search.best.n_estimators);
    assert_eq!(search.best.seed, 9);
    assert!(search.scores.iter().all(|(c, _)| c.seed == 9));
}

#[tokio::test]
async fn unreadable_settings_only_disable_recommendations() {
    let dir = tempfile::tempdir().unwrap();
    assert!(pipeline::load_settings(Some(dir.path().join("missing.set").as_path())).is_none());
    assert!(pipeline::load_settings(None).is_none());

    let path = dir.path().join("ea.set");
    std::fs::write(&path, SET).unwrap();
    let loaded = pipeline::load_settings(Some(path.as_path())).expect("readable file");
    assert_eq!(loaded.len(), 2);

    let settings = pipeline::load_settings(Some(dir.path().join("missing.set").as_path()));
    let provider = provider();
    let session = provider.initialize().await.unwrap();
    let pipeline = Pipeline::new(provider, config()).with_settings(settings);

    let reports = pipeline.run_batch(&session, &["EURUSD".to_string()], now()).await;
    assert_eq!(reports[0].stage, Stage::Done);
    let run = reports[0].outcome.as_ref().unwrap();
    assert!(run.trainer.is_fitted());
    assert!(run.recommendation.is_none());
}

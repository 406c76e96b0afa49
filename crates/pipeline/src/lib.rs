pub mod config;
pub mod live;
pub mod orchestrator;
pub mod stage;

pub use config::PipelineConfig;
pub use live::LiveTuner;
pub use orchestrator::{load_settings, InstrumentReport, InstrumentRun, Pipeline};
pub use stage::Stage;

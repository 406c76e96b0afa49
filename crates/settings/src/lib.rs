pub mod document;
pub mod recommend;

pub use document::{decode, Section, Setting, SettingValue, SettingsDocument, SkippedLine, Summary};
pub use recommend::{recommend, Recommendation, RecommenderConfig};

use serde::{Deserialize, Serialize};

/// Progress of one instrument through the pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Fetching,
    Featuring,
    Labeling,
    Training,
    Recommending,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fetching => write!(f, "fetching"),
            Stage::Featuring => write!(f, "featuring"),
            Stage::Labeling => write!(f, "labeling"),
            Stage::Training => write!(f, "training"),
            Stage::Recommending => write!(f, "recommending"),
            Stage::Done => write!(f, "done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Fetching < Stage::Featuring);
        assert!(Stage::Training < Stage::Recommending);
        assert!(Stage::Recommending < Stage::Done);
        assert_eq!(Stage::default(), Stage::Fetching);
        assert_eq!(Stage::Labeling.to_string(), "labeling");
    }
}

use tracing::debug;

use crate::engine::FeatureTable;

/// Next-step direction labels.
///
/// Drops incomplete rows first, then labels row `i` with 1 when the next
/// close is strictly higher, else 0. The returned table omits the final row
/// so that `labels.len() == table.len()`.
pub fn build_labels(table: &FeatureTable) -> (FeatureTable, Vec<u8>) {
    let complete = table.drop_incomplete();
    let closes = complete.closes();

    let labels: Vec<u8> = closes.windows(2).map(|w| u8::from(w[1] > w[0])).collect();
    let aligned = complete.head(labels.len());

    debug!(
        instrument = %table.instrument,
        rows = aligned.len(),
        ups = labels.iter().filter(|&&l| l == 1).count(),
        "Built direction labels"
    );
    (aligned, labels)
}

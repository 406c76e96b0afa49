use common::Result;
use features::{FEATURE_COLUMNS, FEATURE_COUNT};

/// One feature vector, columns in `FEATURE_COLUMNS` order.
pub type Sample = [f64; FEATURE_COUNT];

/// A binary direction classifier (0 = not up, 1 = up).
///
/// The column list a model was trained on is read-only; callers feed samples
/// in exactly that order.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fit on `x` with labels `y`. Lengths must match and be non-zero.
    fn fit(&mut self, x: &[Sample], y: &[u8]) -> Result<()>;

    /// Predict one label per sample. An unfitted model predicts 0.
    fn predict(&self, x: &[Sample]) -> Vec<u8>;

    fn is_fitted(&self) -> bool;

    fn feature_columns(&self) -> &[&'static str] {
        &FEATURE_COLUMNS
    }
}

/// Shared input check for `Classifier::fit` implementations.
pub(crate) fn check_fit_input(x: &[Sample], y: &[u8]) -> Result<()> {
    if x.len() != y.len() {
        return Err(common::Error::Other(format!(
            "{} samples but {} labels",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(common::Error::Other("no samples to fit".into()));
    }
    Ok(())
}

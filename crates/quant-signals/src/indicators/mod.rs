//! Technical indicators consumed by the signal generator.

mod momentum;
mod volatility;

pub use momentum::{Macd, MacdPoint, Rsi};
pub use volatility::RollingStd;

/// A windowed indicator over a close-price series.
pub trait Indicator {
    /// Calculate indicator values for the input series.
    ///
    /// Returns one value per fully-formed window; an input shorter than
    /// [`Indicator::min_len`] yields an empty vector.
    fn calculate(&self, closes: &[f64]) -> Vec<f64>;

    /// Minimum number of input points for one output value.
    fn min_len(&self) -> usize;

    /// Indicator name for diagnostics.
    fn name(&self) -> &'static str;

    /// Convenience: the most recent indicator value, if computable.
    fn last(&self, closes: &[f64]) -> Option<f64> {
        self.calculate(closes).last().copied()
    }
}

//! Market data port trait.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;

pub trait DataPort {
    /// Up to `limit` most recent bars in source order. An unknown symbol is an
    /// empty series, not an error; ordering is checked by the caller.
    fn fetch_price_series(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<PriceBar>, TraderError>;
}

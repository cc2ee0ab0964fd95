#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use cryptotrader::domain::error::TraderError;
pub use cryptotrader::domain::ohlcv::PriceBar;
use cryptotrader::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_price_series(
        &self,
        symbol: &str,
        _timeframe: &str,
        limit: usize,
    ) -> Result<Vec<PriceBar>, TraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TraderError::DataSource {
                reason: reason.clone(),
            });
        }
        let mut bars = self.data.get(symbol).cloned().unwrap_or_default();
        let skip = bars.len().saturating_sub(limit);
        Ok(bars.split_off(skip))
    }
}

pub fn hour(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64)
}

pub fn make_bar(i: usize, close: f64) -> PriceBar {
    PriceBar {
        timestamp: hour(i),
        open: close,
        high: close * 1.005,
        low: close * 0.995,
        close,
        volume: 1000.0,
    }
}

pub fn bars_from(closes: &[f64]) -> Vec<PriceBar> {
    closes.iter().enumerate().map(|(i, &c)| make_bar(i, c)).collect()
}

/// Steady geometric rise from 100.
pub fn uptrend(n: usize, growth: f64) -> Vec<PriceBar> {
    bars_from(&(0..n).map(|i| 100.0 * growth.powi(i as i32)).collect::<Vec<_>>())
}

pub fn flat(n: usize) -> Vec<PriceBar> {
    (0..n)
        .map(|i| PriceBar {
            timestamp: hour(i),
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 1000.0,
        })
        .collect()
}

/// Write bars in the CSV layout read by `CsvAdapter`.
pub fn write_csv(path: &Path, bars: &[PriceBar]) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    for b in bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            b.timestamp.to_rfc3339(),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        )
        .unwrap();
    }
}

//! CSV file market data adapter.
//!
//! One file per symbol and timeframe: `<dir>/<SYMBOL>_<timeframe>.csv` with
//! the `/` dropped from the symbol, e.g. `BTCUSDT_1h.csv`. Columns are
//! `timestamp,open,high,low,close,volume`.

use chrono::{DateTime, TimeZone, Utc};
use csv::StringRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        let file_symbol: String = symbol.chars().filter(|c| *c != '/').collect();
        self.base_path
            .join(format!("{}_{}.csv", file_symbol, timeframe))
    }
}

/// RFC 3339, or Unix milliseconds.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TraderError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| TraderError::DataSource {
            reason: format!("invalid timestamp '{}'", raw),
        })
}

fn field(record: &StringRecord, index: usize, name: &str) -> Result<f64, TraderError> {
    let raw = record.get(index).ok_or_else(|| TraderError::DataSource {
        reason: format!("missing {} column", name),
    })?;
    raw.trim().parse().map_err(|e| TraderError::DataSource {
        reason: format!("invalid {} value '{}': {}", name, raw, e),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_price_series(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<PriceBar>, TraderError> {
        let path = self.csv_path(symbol, timeframe);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(TraderError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                })
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TraderError::DataSource {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let timestamp = parse_timestamp(record.get(0).ok_or_else(|| TraderError::DataSource {
                reason: "missing timestamp column".into(),
            })?)?;

            bars.push(PriceBar {
                timestamp,
                open: field(&record, 1, "open")?,
                high: field(&record, 2, "high")?,
                low: field(&record, 3, "low")?,
                close: field(&record, 4, "close")?,
                volume: field(&record, 5, "volume")?,
            });
        }

        let skip = bars.len().saturating_sub(limit);
        Ok(bars.split_off(skip))
    }
}

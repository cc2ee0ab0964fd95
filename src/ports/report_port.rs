//! Report generation port trait.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::TraderError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output_path: &str) -> Result<(), TraderError>;
}

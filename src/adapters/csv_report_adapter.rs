//! Trade list report: one CSV row per closed position.

use std::fs::File;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::TraderError;
use crate::ports::report_port::ReportPort;

const HEADER: [&str; 10] = [
    "symbol",
    "side",
    "quantity",
    "entry_price",
    "entry_time",
    "exit_price",
    "exit_time",
    "exit_reason",
    "pnl",
    "pnl_pct",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }

    fn write_to<W: std::io::Write>(&self, report: &BacktestReport, sink: W) -> Result<(), TraderError> {
        let to_err = |e: csv::Error| TraderError::Persistence {
            reason: format!("report write failed: {}", e),
        };
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(HEADER).map_err(to_err)?;

        for position in report.closed_positions() {
            let Some(exit) = &position.exit else {
                continue;
            };
            writer
                .write_record([
                    position.symbol.clone(),
                    position.side.to_string(),
                    position.quantity.to_string(),
                    format!("{:.8}", position.entry_price),
                    position.entry_time.to_rfc3339(),
                    format!("{:.8}", exit.price),
                    exit.time.to_rfc3339(),
                    exit.reason.to_string(),
                    format!("{:.8}", exit.realized_pnl),
                    format!("{:.4}", exit.realized_pnl_pct),
                ])
                .map_err(to_err)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &str) -> Result<(), TraderError> {
        let file = File::create(output_path)?;
        self.write_to(report, file)
    }
}

//! SQLite position store.

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};

use crate::domain::error::TraderError;
use crate::domain::position::{ExitReason, Position, PositionExit, PositionUpdate, Side};
use crate::ports::config_port::ConfigPort;
use crate::ports::position_store::PositionStore;

const SELECT_POSITIONS: &str = "SELECT id, symbol, side, quantity, entry_price, entry_time,
        stop_loss, take_profit, last_price, exit_price, exit_time, exit_reason,
        realized_pnl, realized_pnl_pct
     FROM positions";

pub struct SqlitePositionStore {
    pool: Pool<SqliteConnectionManager>,
}

fn persistence(e: impl std::fmt::Display) -> TraderError {
    TraderError::Persistence {
        reason: e.to_string(),
    }
}

fn sql_id(id: u64) -> Result<i64, TraderError> {
    i64::try_from(id).map_err(|_| persistence(format!("position id {} out of range", id)))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, TraderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| persistence(format!("invalid stored time '{}': {}", raw, e)))
}

/// Columns as stored, before domain parsing.
struct StoredRow {
    id: i64,
    symbol: String,
    side: String,
    quantity: f64,
    entry_price: f64,
    entry_time: String,
    stop_loss: f64,
    take_profit: f64,
    last_price: f64,
    exit_price: Option<f64>,
    exit_time: Option<String>,
    exit_reason: Option<String>,
    realized_pnl: Option<f64>,
    realized_pnl_pct: Option<f64>,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredRow {
            id: row.get(0)?,
            symbol: row.get(1)?,
            side: row.get(2)?,
            quantity: row.get(3)?,
            entry_price: row.get(4)?,
            entry_time: row.get(5)?,
            stop_loss: row.get(6)?,
            take_profit: row.get(7)?,
            last_price: row.get(8)?,
            exit_price: row.get(9)?,
            exit_time: row.get(10)?,
            exit_reason: row.get(11)?,
            realized_pnl: row.get(12)?,
            realized_pnl_pct: row.get(13)?,
        })
    }

    fn into_position(self) -> Result<Position, TraderError> {
        let exit = match (self.exit_price, self.exit_time, self.exit_reason) {
            (Some(price), Some(time), Some(reason)) => Some(PositionExit {
                price,
                time: parse_time(&time)?,
                reason: reason.parse::<ExitReason>().map_err(persistence)?,
                realized_pnl: self.realized_pnl.unwrap_or(0.0),
                realized_pnl_pct: self.realized_pnl_pct.unwrap_or(0.0),
            }),
            (None, None, None) => None,
            _ => return Err(persistence(format!("position {} has partial exit data", self.id))),
        };

        Ok(Position {
            id: u64::try_from(self.id).map_err(persistence)?,
            symbol: self.symbol,
            side: self.side.parse::<Side>().map_err(persistence)?,
            quantity: self.quantity,
            entry_price: self.entry_price,
            entry_time: parse_time(&self.entry_time)?,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            last_price: self.last_price,
            exit,
        })
    }
}

impl SqlitePositionStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| TraderError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let raw_pool_size = config.get_int("sqlite", "pool_size", 4);
        let pool_size = u32::try_from(raw_pool_size)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| TraderError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: format!("must be between 1 and {}, got {}", u32::MAX, raw_pool_size),
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(persistence)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(persistence)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TraderError> {
        self.pool.get().map_err(persistence)
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS positions (
                    id INTEGER PRIMARY KEY,
                    symbol TEXT NOT NULL,
                    side TEXT NOT NULL,
                    quantity REAL NOT NULL,
                    entry_price REAL NOT NULL,
                    entry_time TEXT NOT NULL,
                    stop_loss REAL NOT NULL,
                    take_profit REAL NOT NULL,
                    last_price REAL NOT NULL,
                    exit_price REAL,
                    exit_time TEXT,
                    exit_reason TEXT,
                    realized_pnl REAL,
                    realized_pnl_pct REAL
                );
                CREATE INDEX IF NOT EXISTS idx_positions_symbol ON positions(symbol);
                CREATE INDEX IF NOT EXISTS idx_positions_open ON positions(exit_reason);",
            )
            .map_err(persistence)
    }

    fn query(&self, sql: &str) -> Result<Vec<Position>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(persistence)?;
        let rows = stmt.query_map([], StoredRow::read).map_err(persistence)?;

        let mut positions = Vec::new();
        for row in rows {
            positions.push(row.map_err(persistence)?.into_position()?);
        }
        Ok(positions)
    }
}

impl PositionStore for SqlitePositionStore {
    fn persist_position(&self, position: &Position) -> Result<(), TraderError> {
        let exit = position.exit.as_ref();
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO positions (id, symbol, side, quantity, entry_price,
                    entry_time, stop_loss, take_profit, last_price, exit_price, exit_time,
                    exit_reason, realized_pnl, realized_pnl_pct)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    sql_id(position.id)?,
                    position.symbol,
                    position.side.as_str(),
                    position.quantity,
                    position.entry_price,
                    position.entry_time.to_rfc3339(),
                    position.stop_loss,
                    position.take_profit,
                    position.last_price,
                    exit.map(|e| e.price),
                    exit.map(|e| e.time.to_rfc3339()),
                    exit.map(|e| e.reason.as_str()),
                    exit.map(|e| e.realized_pnl),
                    exit.map(|e| e.realized_pnl_pct),
                ],
            )
            .map_err(persistence)?;
        Ok(())
    }

    fn load_open_positions(&self) -> Result<Vec<Position>, TraderError> {
        self.query(&format!("{} WHERE exit_reason IS NULL ORDER BY id", SELECT_POSITIONS))
    }

    fn load_all_positions(&self) -> Result<Vec<Position>, TraderError> {
        self.query(&format!("{} ORDER BY id", SELECT_POSITIONS))
    }

    fn update_position(&self, id: u64, update: &PositionUpdate) -> Result<(), TraderError> {
        let key = sql_id(id)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(persistence)?;

        let found: i64 = tx
            .query_row("SELECT COUNT(*) FROM positions WHERE id = ?1", params![key], |row| {
                row.get(0)
            })
            .map_err(persistence)?;
        if found == 0 {
            return Err(TraderError::PositionNotFound { id });
        }

        if let Some(stop) = update.stop_loss {
            tx.execute("UPDATE positions SET stop_loss = ?1 WHERE id = ?2", params![stop, key])
                .map_err(persistence)?;
        }
        if let Some(price) = update.last_price {
            tx.execute("UPDATE positions SET last_price = ?1 WHERE id = ?2", params![price, key])
                .map_err(persistence)?;
        }
        if let Some(exit) = &update.exit {
            tx.execute(
                "UPDATE positions SET exit_price = ?1, exit_time = ?2, exit_reason = ?3,
                    realized_pnl = ?4, realized_pnl_pct = ?5
                 WHERE id = ?6",
                params![
                    exit.price,
                    exit.time.to_rfc3339(),
                    exit.reason.as_str(),
                    exit.realized_pnl,
                    exit.realized_pnl_pct,
                    key
                ],
            )
            .map_err(persistence)?;
        }

        tx.commit().map_err(persistence)
    }
}

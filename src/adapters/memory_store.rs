//! In-process position store, used when no database is configured.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::domain::error::TraderError;
use crate::domain::position::{Position, PositionUpdate};
use crate::ports::position_store::PositionStore;

#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    positions: Mutex<BTreeMap<u64, Position>>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u64, Position>>, TraderError> {
        self.positions.lock().map_err(|_| TraderError::Persistence {
            reason: "position store lock poisoned".to_string(),
        })
    }
}

impl PositionStore for MemoryPositionStore {
    fn persist_position(&self, position: &Position) -> Result<(), TraderError> {
        self.lock()?.insert(position.id, position.clone());
        Ok(())
    }

    fn load_open_positions(&self) -> Result<Vec<Position>, TraderError> {
        Ok(self.lock()?.values().filter(|p| p.is_open()).cloned().collect())
    }

    fn load_all_positions(&self) -> Result<Vec<Position>, TraderError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn update_position(&self, id: u64, update: &PositionUpdate) -> Result<(), TraderError> {
        let mut positions = self.lock()?;
        let position = positions
            .get_mut(&id)
            .ok_or(TraderError::PositionNotFound { id })?;
        update.apply(position);
        Ok(())
    }
}

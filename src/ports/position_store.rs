//! Position persistence port trait.

use crate::domain::error::TraderError;
use crate::domain::position::{Position, PositionUpdate};

pub trait PositionStore {
    /// Insert a new position, or overwrite one with the same id.
    fn persist_position(&self, position: &Position) -> Result<(), TraderError>;

    fn load_open_positions(&self) -> Result<Vec<Position>, TraderError>;

    /// Every stored position, open and closed, by ascending id.
    fn load_all_positions(&self) -> Result<Vec<Position>, TraderError>;

    fn update_position(&self, id: u64, update: &PositionUpdate) -> Result<(), TraderError>;
}

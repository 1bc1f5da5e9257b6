//! piece - a movable token, positions are broadcast as-is

use crate::protocol::PieceId;
use crate::signal::Signal;

#[derive(Debug, Default)]
pub struct PieceSignals {
    /// (x, y)
    pub moved: Signal<(f64, f64)>,
}

#[derive(Debug)]
pub struct Piece {
    id: PieceId,
    position: Option<(f64, f64)>,
    pub on: PieceSignals,
}

impl Piece {
    pub fn new(id: PieceId) -> Self {
        Self {
            id,
            position: None,
            on: PieceSignals::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// last position moved to, by anyone
    pub fn position(&self) -> Option<(f64, f64)> {
        self.position
    }

    pub(crate) fn moved(&mut self, x: f64, y: f64) {
        self.position = Some((x, y));
        self.on.moved.dispatch((x, y));
    }
}

//! Typed tool motion.

use millforge_math::{Bounds3, Point3};
use serde::{Deserialize, Serialize};

use crate::error::{CamError, Result};

/// How a move is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// Positioning at machine maximum speed, not in material.
    Rapid,
    /// Vertical entry into material at plunge feed.
    Plunge,
    /// Cutting move at cut feed.
    LinearCut,
    /// Vertical exit to clearance height at machine maximum speed.
    Retract,
}

/// A single straight tool move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Kind of motion.
    pub kind: MoveKind,
    /// Start position (tool tip).
    pub start: Point3,
    /// End position (tool tip).
    pub end: Point3,
    /// Feed rate; `None` means machine maximum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<f64>,
}

impl Move {
    /// Rapid positioning move.
    pub fn rapid(start: Point3, end: Point3) -> Self {
        Self {
            kind: MoveKind::Rapid,
            start,
            end,
            feed: None,
        }
    }

    /// Plunge at `feed`.
    pub fn plunge(start: Point3, end: Point3, feed: f64) -> Self {
        Self {
            kind: MoveKind::Plunge,
            start,
            end,
            feed: Some(feed),
        }
    }

    /// Cutting move at `feed`.
    pub fn cut(start: Point3, end: Point3, feed: f64) -> Self {
        Self {
            kind: MoveKind::LinearCut,
            start,
            end,
            feed: Some(feed),
        }
    }

    /// Retract to clearance.
    pub fn retract(start: Point3, end: Point3) -> Self {
        Self {
            kind: MoveKind::Retract,
            start,
            end,
            feed: None,
        }
    }

    /// Length of the move.
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Plunges and linear cuts touch material.
    pub fn is_cutting(&self) -> bool {
        matches!(self.kind, MoveKind::Plunge | MoveKind::LinearCut)
    }
}

/// Ordered moves of one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Toolpath {
    /// The moves in execution order.
    pub moves: Vec<Move>,
}

impl Toolpath {
    /// Create an empty toolpath.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a move.
    pub fn push(&mut self, m: Move) {
        self.moves.push(m);
    }

    /// Number of moves.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// True if there are no moves.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Iterate over the moves.
    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.moves.iter()
    }

    /// Position after the last move.
    pub fn end(&self) -> Option<Point3> {
        self.moves.last().map(|m| m.end)
    }

    /// Total distance travelled in material.
    pub fn cutting_length(&self) -> f64 {
        self.moves
            .iter()
            .filter(|m| m.is_cutting())
            .map(Move::length)
            .sum()
    }

    /// Total distance travelled at rapid speed.
    pub fn rapid_length(&self) -> f64 {
        self.moves
            .iter()
            .filter(|m| !m.is_cutting())
            .map(Move::length)
            .sum()
    }

    /// Bounds of all move end points.
    pub fn bounds(&self) -> Option<Bounds3> {
        Bounds3::from_points(self.moves.iter().map(|m| &m.end))
    }

    /// Check that adjacent moves connect.
    ///
    /// Every pair must share its joint point unless it is a reposition
    /// pair: (retract, rapid) or (rapid, plunge).
    pub fn validate_continuity(&self, tol: f64) -> Result<()> {
        for (i, pair) in self.moves.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            let gap = (b.start - a.end).norm();
            let reposition = matches!(
                (a.kind, b.kind),
                (MoveKind::Retract, MoveKind::Rapid) | (MoveKind::Rapid, MoveKind::Plunge)
            );
            if gap > tol && !reposition {
                return Err(CamError::SequencingInconsistency {
                    move_index: i,
                    detail: format!(
                        "{:?} ends at ({:.4}, {:.4}, {:.4}) but {:?} starts at ({:.4}, {:.4}, {:.4})",
                        a.kind, a.end.x, a.end.y, a.end.z, b.kind, b.start.x, b.start.y, b.start.z
                    ),
                });
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Toolpath {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.moves.iter()
    }
}

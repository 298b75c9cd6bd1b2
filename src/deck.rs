//! Deck slot geometry.
//!
//! The deck is a 3 x 4 grid of slots numbered 1..=12, left to right and front
//! to back. Slot 1 is the front-left corner and sits at the origin; `+Y`
//! points toward the back of the robot.

use bevy_math::bounding::Aabb2d;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CommandCreatorError;

/// Footprint of a single slot, in mm.
pub const SLOT_SIZE: Vec2 = Vec2::new(127.76, 85.48);

/// Distance between the origins of neighbouring slots, in mm.
pub const SLOT_PITCH: Vec2 = Vec2::new(132.5, 90.5);

pub const SLOT_COLUMNS: u8 = 3;
pub const SLOT_COUNT: u8 = 12;

/// A numbered deck slot.
///
/// Deserializing rejects numbers outside `1..=12`. A slot built directly from
/// an out-of-range number is caught by [`RobotState::initial`](crate::state::RobotState::initial).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DeckSlot(pub u8);

/// Compass direction on the deck, as seen from the front of the robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl DeckSlot {
    pub fn new(number: u8) -> Option<Self> {
        (1..=SLOT_COUNT).contains(&number).then_some(Self(number))
    }

    pub fn is_valid(self) -> bool {
        (1..=SLOT_COUNT).contains(&self.0)
    }

    pub fn validate(self) -> Result<Self, CommandCreatorError> {
        Self::try_from(self.0)
    }

    fn column(self) -> u8 {
        self.0.saturating_sub(1) % SLOT_COLUMNS
    }

    fn row(self) -> u8 {
        self.0.saturating_sub(1) / SLOT_COLUMNS
    }

    /// Front-left corner of the slot.
    pub fn origin(self) -> Vec2 {
        Vec2::new(
            f32::from(self.column()) * SLOT_PITCH.x,
            f32::from(self.row()) * SLOT_PITCH.y,
        )
    }

    /// Axis-aligned footprint of the slot.
    pub fn footprint(self) -> Aabb2d {
        let min = self.origin();
        Aabb2d {
            min,
            max: min + SLOT_SIZE,
        }
    }

    /// The slot bordering this one in `direction`, if any.
    pub fn neighbor(self, direction: Direction) -> Option<DeckSlot> {
        if !self.is_valid() {
            return None;
        }
        let n = self.0;
        match direction {
            Direction::North => DeckSlot::new(n + SLOT_COLUMNS),
            Direction::South => n.checked_sub(SLOT_COLUMNS).and_then(DeckSlot::new),
            Direction::East => (self.column() + 1 < SLOT_COLUMNS).then_some(DeckSlot(n + 1)),
            Direction::West => (self.column() > 0).then_some(DeckSlot(n - 1)),
        }
    }

    /// Which side of `self` the slot `other` borders, if they are adjacent.
    pub fn direction_to(self, other: DeckSlot) -> Option<Direction> {
        [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
        ]
        .into_iter()
        .find(|&d| self.neighbor(d) == Some(other))
    }
}

impl TryFrom<u8> for DeckSlot {
    type Error = CommandCreatorError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number).ok_or(CommandCreatorError::InvalidDeckSlot { slot: number })
    }
}

impl From<DeckSlot> for u8 {
    fn from(slot: DeckSlot) -> u8 {
        slot.0
    }
}

impl fmt::Display for DeckSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Smallest box containing both `a` and `b`.
pub(crate) fn union(a: Aabb2d, b: Aabb2d) -> Aabb2d {
    Aabb2d {
        min: a.min.min(b.min),
        max: a.max.max(b.max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_one_is_at_origin() {
        assert_eq!(DeckSlot(1).origin(), Vec2::ZERO);
        assert_eq!(DeckSlot(5).origin(), Vec2::new(132.5, 90.5));
    }

    #[test]
    fn neighbors_respect_deck_edges() {
        assert_eq!(DeckSlot(1).neighbor(Direction::North), Some(DeckSlot(4)));
        assert_eq!(DeckSlot(1).neighbor(Direction::South), None);
        assert_eq!(DeckSlot(1).neighbor(Direction::West), None);
        assert_eq!(DeckSlot(3).neighbor(Direction::East), None);
        assert_eq!(DeckSlot(11).neighbor(Direction::North), None);
        assert_eq!(DeckSlot(5).direction_to(DeckSlot(6)), Some(Direction::East));
        assert_eq!(DeckSlot(5).direction_to(DeckSlot(9)), None);
    }

    #[test]
    fn slot_numbers_outside_the_deck_are_rejected() {
        assert_eq!(
            DeckSlot(0).validate(),
            Err(CommandCreatorError::InvalidDeckSlot { slot: 0 })
        );
        assert_eq!(DeckSlot(12).validate(), Ok(DeckSlot(12)));
        assert!(serde_json::from_str::<DeckSlot>("13").is_err());
        assert_eq!(serde_json::from_str::<DeckSlot>("3").ok(), Some(DeckSlot(3)));
        assert_eq!(serde_json::to_string(&DeckSlot(3)).ok().as_deref(), Some("3"));
    }

    #[test]
    fn neighbouring_footprints_do_not_touch() {
        use bevy_math::bounding::IntersectsVolume;
        let a = DeckSlot(1).footprint();
        for n in [2, 4, 5] {
            assert!(!a.intersects(&DeckSlot(n).footprint()));
        }
    }
}

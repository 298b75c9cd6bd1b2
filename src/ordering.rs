//! Deterministic well traversal order for multi-well operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::entity::WellName;
use crate::error::CommandCreatorError;

/// Direction of travel along one axis of a labware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WellOrder {
    #[serde(rename = "t2b")]
    TopToBottom,
    #[serde(rename = "b2t")]
    BottomToTop,
    #[serde(rename = "l2r")]
    LeftToRight,
    #[serde(rename = "r2l")]
    RightToLeft,
}

impl WellOrder {
    fn is_vertical(self) -> bool {
        matches!(self, Self::TopToBottom | Self::BottomToTop)
    }
}

/// Orders the wells of a labware.
///
/// `ordering` lists wells column by column, each column top (row A) to
/// bottom, as in a labware definition. `first` is the direction walked within
/// a run and `second` the direction in which runs advance, so
/// `(TopToBottom, LeftToRight)` yields `A1, B1, ..., H1, A2, ...` and
/// `(LeftToRight, TopToBottom)` yields `A1, A2, ..., A12, B1, ...`.
///
/// The two directions must lie on different axes. Ragged orderings are
/// handled by skipping positions a shorter column does not have.
pub fn order_wells(
    ordering: &[Vec<WellName>],
    first: WellOrder,
    second: WellOrder,
) -> Result<Vec<WellName>, CommandCreatorError> {
    if first.is_vertical() == second.is_vertical() {
        return Err(CommandCreatorError::InvalidWellOrder { first, second });
    }

    let columns: Vec<Vec<&WellName>> = ordering.iter().map(|c| c.iter().collect()).collect();

    let runs: Vec<Vec<&WellName>> = if first.is_vertical() {
        // Runs are columns.
        let mut runs: Vec<Vec<&WellName>> = columns;
        if second == WellOrder::RightToLeft {
            runs.reverse();
        }
        if first == WellOrder::BottomToTop {
            runs.iter_mut().for_each(|run| run.reverse());
        }
        runs
    } else {
        // Runs are rows.
        let mut columns = columns;
        if first == WellOrder::RightToLeft {
            columns.reverse();
        }
        let height = columns.iter().map(Vec::len).max().unwrap_or(0);
        let mut runs: Vec<Vec<&WellName>> = (0..height)
            .map(|row| columns.iter().filter_map(|c| c.get(row).copied()).collect())
            .collect();
        if second == WellOrder::BottomToTop {
            runs.reverse();
        }
        runs
    };

    Ok(runs.into_iter().flatten().cloned().collect())
}

/// Orders only the `selected` wells of a labware, following [`order_wells`].
pub fn order_selected_wells(
    ordering: &[Vec<WellName>],
    selected: &[WellName],
    first: WellOrder,
    second: WellOrder,
) -> Result<Vec<WellName>, CommandCreatorError> {
    let selected: BTreeSet<&WellName> = selected.iter().collect();
    Ok(order_wells(ordering, first, second)?
        .into_iter()
        .filter(|w| selected.contains(w))
        .collect())
}

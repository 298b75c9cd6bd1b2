use serde::{Deserialize, Serialize};

use super::require_tip;
use crate::collision::check_pipette_access;
use crate::command::{Command, CommandCreatorResult, CommandsAndWarnings, TipParams};
use crate::entity::{EntityContext, PipetteId};
use crate::error::CommandCreatorError;
use crate::pipeline::{CurriedCommandCreator, curry_command_creator, reduce_command_creators};
use crate::state::RobotState;

pub fn pick_up_tip(
    args: &TipParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let tiprack = ctx.labware_entity(&args.labware)?;
    if !tiprack.def.parameters.is_tiprack {
        return Err(CommandCreatorError::NotATiprack {
            labware: args.labware.clone(),
        });
    }
    let wells = ctx.channel_wells(&args.pipette, &args.labware, &args.well)?;
    check_pipette_access(&args.pipette, &args.labware, ctx, state)?;
    if state.has_tip(&args.pipette) {
        return Err(CommandCreatorError::TipAlreadyAttached {
            pipette: args.pipette.clone(),
        });
    }
    if let Some(empty) = wells.iter().find(|w| !state.tip_present(&args.labware, w)) {
        return Err(CommandCreatorError::NoTipAtWell {
            labware: args.labware.clone(),
            well: empty.clone(),
        });
    }
    Ok(CommandsAndWarnings::single(Command::PickUpTip(args.clone())))
}

pub fn drop_tip(
    args: &TipParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    ctx.channel_wells(&args.pipette, &args.labware, &args.well)?;
    check_pipette_access(&args.pipette, &args.labware, ctx, state)?;
    require_tip(&args.pipette, state)?;
    Ok(CommandsAndWarnings::single(Command::DropTip(args.clone())))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceTipArgs {
    pub pipette: PipetteId,
}

/// Swaps the pipette's tip for a fresh one.
///
/// A held tip goes to the trash first. The new tip is the first full set of
/// wells found by [`RobotState::next_tip`].
pub fn replace_tip(
    args: &ReplaceTipArgs,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    ctx.pipette(&args.pipette)?;
    let (tiprack, well) = state.next_tip(ctx, &args.pipette).ok_or_else(|| {
        CommandCreatorError::InsufficientTips {
            pipette: args.pipette.clone(),
        }
    })?;

    let mut legs: Vec<CurriedCommandCreator> = Vec::with_capacity(2);
    if state.has_tip(&args.pipette) {
        legs.push(drop_in_trash(&args.pipette, ctx)?);
    }
    legs.push(curry_command_creator(
        pick_up_tip,
        TipParams {
            pipette: args.pipette.clone(),
            labware: tiprack,
            well,
        },
    ));
    reduce_command_creators(&legs, ctx, state)
}

/// Drops the tip of every pipette that has one, in pipette id order.
pub fn drop_all_tips(_: &(), ctx: &EntityContext, state: &RobotState) -> CommandCreatorResult {
    let legs = state
        .tip_state
        .pipettes
        .iter()
        .filter(|(_, has_tip)| **has_tip)
        .map(|(pipette, _)| drop_in_trash(pipette, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    reduce_command_creators(&legs, ctx, state)
}

fn drop_in_trash(
    pipette: &str,
    ctx: &EntityContext,
) -> Result<CurriedCommandCreator, CommandCreatorError> {
    let trash = ctx
        .trash()
        .ok_or(CommandCreatorError::DropTipLocationDoesNotExist)?;
    let well = trash
        .def
        .ordering
        .first()
        .and_then(|column| column.first())
        .ok_or(CommandCreatorError::DropTipLocationDoesNotExist)?;
    Ok(curry_command_creator(
        drop_tip,
        TipParams {
            pipette: pipette.to_string(),
            labware: trash.id.clone(),
            well: well.clone(),
        },
    ))
}

use std::collections::BTreeMap;

use super::{require_non_negative, require_positive, require_tip};
use crate::collision::check_pipette_access;
use crate::command::{
    BlowOutParams, Command, CommandCreatorResult, CommandsAndWarnings, PipettingParams,
    TouchTipParams, Warning,
};
use crate::entity::{EntityContext, PipetteEntity, WellName};
use crate::error::CommandCreatorError;
use crate::state::{LocationLiquidState, RobotState, total_volume};

/// Draws `volume` uL into every channel of the pipette.
pub fn aspirate(
    args: &PipettingParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let pipette = ctx.pipette(&args.pipette)?;
    let wells = ctx.channel_wells(&args.pipette, &args.labware, &args.well)?;
    check_pipette_access(&args.pipette, &args.labware, ctx, state)?;
    require_tip(&args.pipette, state)?;
    check_pipetting_params(pipette, args)?;

    let tolerance = ctx.config().volume_tolerance_ul;
    let capacity = pipette.max_volume_with_tip();
    let held = state.max_channel_volume(&args.pipette);
    if held + args.volume > capacity + tolerance {
        return Err(CommandCreatorError::TipVolumeExceeded {
            pipette: args.pipette.clone(),
            requested: held + args.volume,
            capacity,
        });
    }

    // Channels sharing a well (a trough) all draw from it.
    for (well, requested) in demand_per_well(&wells, args.volume) {
        let available = state.well_volume(&args.labware, well);
        if requested > available + tolerance {
            return Err(CommandCreatorError::InsufficientWellVolume {
                labware: args.labware.clone(),
                well: well.clone(),
                requested,
                available,
            });
        }
    }

    let threshold = ctx.config().mixing_residual_threshold_ul;
    let warning = channels(&wells).find_map(|(channel, well)| {
        let tip = state.channel_contents(&args.pipette, channel)?;
        let residual = total_volume(tip);
        let source = state.well_contents(&args.labware, well);
        (residual > threshold && has_foreign(tip, source)).then(|| Warning::MixedLiquidInTip {
            pipette: args.pipette.clone(),
            labware: args.labware.clone(),
            well: well.clone(),
            residual_volume: residual,
        })
    });

    Ok(CommandsAndWarnings::with_warnings(
        Command::Aspirate(args.clone()),
        warning.into_iter().collect(),
    ))
}

/// Expels `volume` uL from every channel of the pipette.
pub fn dispense(
    args: &PipettingParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let pipette = ctx.pipette(&args.pipette)?;
    let wells = ctx.channel_wells(&args.pipette, &args.labware, &args.well)?;
    check_pipette_access(&args.pipette, &args.labware, ctx, state)?;
    require_tip(&args.pipette, state)?;
    check_pipetting_params(pipette, args)?;

    let tolerance = ctx.config().volume_tolerance_ul;
    let held = channels(&wells)
        .map(|(channel, _)| state.channel_volume(&args.pipette, channel))
        .fold(f64::INFINITY, f64::min);
    if args.volume > held + tolerance {
        return Err(CommandCreatorError::InsufficientPipetteVolume {
            pipette: args.pipette.clone(),
            requested: args.volume,
            held,
        });
    }

    check_well_capacity(
        ctx,
        state,
        &args.labware,
        demand_per_well(&wells, args.volume),
    )?;

    let threshold = ctx.config().mixing_residual_threshold_ul;
    let warning = channels(&wells).find_map(|(channel, well)| {
        let tip = state.channel_contents(&args.pipette, channel)?;
        let residual = total_volume(tip) - args.volume;
        let dest = state.well_contents(&args.labware, well)?;
        (residual > threshold && has_foreign(dest, Some(tip))).then(|| {
            Warning::ResidualTouchedForeignLiquid {
                pipette: args.pipette.clone(),
                labware: args.labware.clone(),
                well: well.clone(),
                residual_volume: residual,
            }
        })
    });

    Ok(CommandsAndWarnings::with_warnings(
        Command::Dispense(args.clone()),
        warning.into_iter().collect(),
    ))
}

/// Pushes any remaining liquid (and air) out of the tip into a well.
pub fn blow_out(
    args: &BlowOutParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let wells = ctx.channel_wells(&args.pipette, &args.labware, &args.well)?;
    check_pipette_access(&args.pipette, &args.labware, ctx, state)?;
    require_tip(&args.pipette, state)?;
    require_positive("flow rate", args.flow_rate)?;

    // Everything left in each channel lands in its well.
    let mut incoming = BTreeMap::new();
    for (channel, well) in channels(&wells) {
        *incoming.entry(well).or_insert(0.0) += state.channel_volume(&args.pipette, channel);
    }
    check_well_capacity(ctx, state, &args.labware, incoming)?;

    Ok(CommandsAndWarnings::single(Command::BlowOut(args.clone())))
}

pub fn touch_tip(
    args: &TouchTipParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    ctx.channel_wells(&args.pipette, &args.labware, &args.well)?;
    check_pipette_access(&args.pipette, &args.labware, ctx, state)?;
    require_tip(&args.pipette, state)?;
    Ok(CommandsAndWarnings::single(Command::TouchTip(args.clone())))
}

fn check_pipetting_params(
    pipette: &PipetteEntity,
    args: &PipettingParams,
) -> Result<(), CommandCreatorError> {
    if !pipette.spec.volume_range().contains(&args.volume) {
        return Err(CommandCreatorError::VolumeOutOfRange {
            pipette: args.pipette.clone(),
            volume: args.volume,
            min: pipette.spec.min_volume,
            max: pipette.spec.max_volume,
        });
    }
    require_positive("flow rate", args.flow_rate)?;
    require_non_negative("offset from bottom", args.offset_from_bottom_mm)
}

fn check_well_capacity(
    ctx: &EntityContext,
    state: &RobotState,
    labware: &str,
    incoming: BTreeMap<&WellName, f64>,
) -> Result<(), CommandCreatorError> {
    let tolerance = ctx.config().volume_tolerance_ul;
    let def = &ctx.labware_entity(labware)?.def;
    for (well, requested) in incoming {
        let max_volume = def.well(well).map_or(0.0, |w| w.max_volume);
        let remaining = max_volume - state.well_volume(labware, well);
        if requested > remaining + tolerance {
            return Err(CommandCreatorError::WellCapacityExceeded {
                labware: labware.to_string(),
                well: well.clone(),
                requested,
                remaining,
            });
        }
    }
    Ok(())
}

fn channels(wells: &[WellName]) -> impl Iterator<Item = (u8, &WellName)> {
    (0u8..).zip(wells)
}

fn demand_per_well(wells: &[WellName], volume: f64) -> BTreeMap<&WellName, f64> {
    let mut demand = BTreeMap::new();
    for well in wells {
        *demand.entry(well).or_insert(0.0) += volume;
    }
    demand
}

/// Whether `contents` holds an ingredient that `other` lacks.
fn has_foreign(contents: &LocationLiquidState, other: Option<&LocationLiquidState>) -> bool {
    contents
        .iter()
        .filter(|(_, volume)| **volume > 0.0)
        .any(|(ingredient, _)| other.is_none_or(|o| !o.contains_key(ingredient)))
}

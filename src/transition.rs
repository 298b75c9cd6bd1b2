//! The state transition function.
//!
//! [`next_robot_state`] computes the state that follows a single command. It
//! does not validate physical preconditions (command creators do that before
//! emitting), but it does refuse commands naming entities that do not exist.

use std::sync::Arc;
use tracing::debug;

use crate::command::{Command, PipettingParams, TipParams};
use crate::entity::{EntityContext, ModuleType, WellName};
use crate::error::TransitionError;
use crate::state::{
    HeaterShakerModuleState, LocationLiquidState, MagneticModuleState, ModuleState, RobotState,
    TemperatureModuleState, TemperatureStatus, ThermocyclerModuleState, WellLiquidState,
    total_volume,
};

/// Applies `command` to `prev` and returns the resulting snapshot.
///
/// `prev` is never modified. Labware well maps that the command does not
/// touch stay shared between the two snapshots.
pub fn next_robot_state(
    command: &Command,
    ctx: &EntityContext,
    prev: &RobotState,
) -> Result<RobotState, TransitionError> {
    let mut next = prev.clone();
    let tolerance = ctx.config().volume_tolerance_ul;
    debug!(?command, "applying command");

    match command {
        Command::Aspirate(params) => aspirate(&mut next, ctx, params, tolerance)?,
        Command::Dispense(params) => dispense(&mut next, ctx, params, tolerance)?,
        Command::BlowOut(params) => {
            let wells = channel_wells(ctx, &params.pipette, &params.labware, &params.well)?;
            for (channel, well) in wells.iter().enumerate() {
                let held = std::mem::take(pipette_channel(&mut next, &params.pipette, channel)?);
                merge(well_contents(&mut next, ctx, &params.labware, well)?, held);
            }
        }
        Command::TouchTip(params) => {
            channel_wells(ctx, &params.pipette, &params.labware, &params.well)?;
        }
        Command::PickUpTip(params) => pick_up_tip(&mut next, ctx, params)?,
        Command::DropTip(params) => drop_tip(&mut next, ctx, params)?,
        Command::Delay(_) => {}

        Command::SetTemperature(params) => {
            *temperature_module(&mut next, &params.module)? = TemperatureModuleState {
                status: TemperatureStatus::ApproachingTarget,
                target_temperature: Some(params.celsius),
                current_temperature: None,
            };
        }
        Command::AwaitTemperature(params) => {
            let module = temperature_module(&mut next, &params.module)?;
            module.status = TemperatureStatus::AtTarget;
            module.current_temperature = Some(params.celsius);
        }
        Command::DeactivateTemperature(params) => {
            *temperature_module(&mut next, &params.module)? = TemperatureModuleState {
                status: TemperatureStatus::Deactivated,
                target_temperature: None,
                current_temperature: None,
            };
        }

        Command::EngageMagnet(params) => {
            *magnetic_module(&mut next, &params.module)? = MagneticModuleState {
                engaged: true,
                engage_height: Some(params.height),
            };
        }
        Command::DisengageMagnet(params) => {
            *magnetic_module(&mut next, &params.module)? = MagneticModuleState {
                engaged: false,
                engage_height: None,
            };
        }

        Command::SetBlockTemperature(params) => {
            thermocycler(&mut next, &params.module)?.block_target_temperature =
                Some(params.celsius);
        }
        Command::DeactivateBlock(params) => {
            thermocycler(&mut next, &params.module)?.block_target_temperature = None;
        }
        Command::SetLidTemperature(params) => {
            thermocycler(&mut next, &params.module)?.lid_target_temperature = Some(params.celsius);
        }
        Command::DeactivateLid(params) => {
            thermocycler(&mut next, &params.module)?.lid_target_temperature = None;
        }
        Command::OpenLid(params) => {
            thermocycler(&mut next, &params.module)?.lid_open = Some(true);
        }
        Command::CloseLid(params) => {
            thermocycler(&mut next, &params.module)?.lid_open = Some(false);
        }
        Command::RunProfile(params) => {
            let tc = thermocycler(&mut next, &params.module)?;
            if let Some(last) = params.profile.last() {
                tc.block_target_temperature = Some(last.celsius);
            }
        }
        Command::AwaitBlockTemperature(params)
        | Command::AwaitLidTemperature(params)
        | Command::AwaitProfileComplete(params) => {
            thermocycler(&mut next, &params.module)?;
        }

        Command::SetHeaterShakerTemperature(params) => {
            heater_shaker(&mut next, &params.module)?.target_temperature = Some(params.celsius);
        }
        Command::AwaitHeaterShakerTemperature(params) => {
            heater_shaker(&mut next, &params.module)?;
        }
        Command::DeactivateHeater(params) => {
            heater_shaker(&mut next, &params.module)?.target_temperature = None;
        }
        Command::SetShakeSpeed(params) => {
            heater_shaker(&mut next, &params.module)?.target_speed = Some(params.rpm);
        }
        Command::DeactivateShaker(params) => {
            heater_shaker(&mut next, &params.module)?.target_speed = None;
        }
        Command::OpenLatch(params) => {
            heater_shaker(&mut next, &params.module)?.latch_open = Some(true);
        }
        Command::CloseLatch(params) => {
            heater_shaker(&mut next, &params.module)?.latch_open = Some(false);
        }
    }

    Ok(next)
}

/// Applies every command in order, starting from `prev`.
pub fn apply_commands<'a>(
    commands: impl IntoIterator<Item = &'a Command>,
    ctx: &EntityContext,
    prev: &RobotState,
) -> Result<RobotState, TransitionError> {
    commands
        .into_iter()
        .try_fold(prev.clone(), |state, command| {
            next_robot_state(command, ctx, &state)
        })
}

fn aspirate(
    state: &mut RobotState,
    ctx: &EntityContext,
    params: &PipettingParams,
    tolerance: f64,
) -> Result<(), TransitionError> {
    let wells = channel_wells(ctx, &params.pipette, &params.labware, &params.well)?;
    for (channel, well) in wells.iter().enumerate() {
        let taken = split_off(
            well_contents(state, ctx, &params.labware, well)?,
            params.volume,
            tolerance,
        );
        merge(pipette_channel(state, &params.pipette, channel)?, taken);
    }
    Ok(())
}

fn dispense(
    state: &mut RobotState,
    ctx: &EntityContext,
    params: &PipettingParams,
    tolerance: f64,
) -> Result<(), TransitionError> {
    let wells = channel_wells(ctx, &params.pipette, &params.labware, &params.well)?;
    for (channel, well) in wells.iter().enumerate() {
        let released = split_off(
            pipette_channel(state, &params.pipette, channel)?,
            params.volume,
            tolerance,
        );
        merge(well_contents(state, ctx, &params.labware, well)?, released);
    }
    Ok(())
}

fn pick_up_tip(
    state: &mut RobotState,
    ctx: &EntityContext,
    params: &TipParams,
) -> Result<(), TransitionError> {
    let wells = channel_wells(ctx, &params.pipette, &params.labware, &params.well)?;
    set_tips(state, &params.labware, &wells, false);
    state.tip_state.pipettes.insert(params.pipette.clone(), true);
    Ok(())
}

fn drop_tip(
    state: &mut RobotState,
    ctx: &EntityContext,
    params: &TipParams,
) -> Result<(), TransitionError> {
    let wells = channel_wells(ctx, &params.pipette, &params.labware, &params.well)?;
    let into_tiprack = ctx
        .labware()
        .get(&params.labware)
        .is_some_and(|lw| lw.def.parameters.is_tiprack);
    if into_tiprack {
        set_tips(state, &params.labware, &wells, true);
    }
    state.tip_state.pipettes.insert(params.pipette.clone(), false);
    // Whatever the tip still held leaves with it.
    if let Some(channels) = state.liquid_state.pipettes.get_mut(&params.pipette) {
        channels.values_mut().for_each(LocationLiquidState::clear);
    }
    Ok(())
}

fn set_tips(state: &mut RobotState, tiprack: &str, wells: &[WellName], present: bool) {
    let tips = Arc::make_mut(
        state
            .tip_state
            .tipracks
            .entry(tiprack.to_string())
            .or_default(),
    );
    for well in wells {
        tips.insert(well.clone(), present);
    }
}

fn channel_wells(
    ctx: &EntityContext,
    pipette: &str,
    labware: &str,
    well: &str,
) -> Result<Vec<WellName>, TransitionError> {
    let channels = ctx
        .pipettes()
        .get(pipette)
        .ok_or_else(|| TransitionError::UnknownPipette(pipette.to_string()))?
        .spec
        .channels;
    ctx.labware()
        .get(labware)
        .ok_or_else(|| TransitionError::UnknownLabware(labware.to_string()))?
        .def
        .wells_for_channels(well, channels)
        .ok_or_else(|| TransitionError::UnknownWell {
            labware: labware.to_string(),
            well: well.to_string(),
        })
}

fn well_contents<'a>(
    state: &'a mut RobotState,
    ctx: &EntityContext,
    labware: &str,
    well: &str,
) -> Result<&'a mut LocationLiquidState, TransitionError> {
    if !ctx.labware().contains_key(labware) {
        return Err(TransitionError::UnknownLabware(labware.to_string()));
    }
    let wells: &mut Arc<WellLiquidState> = state
        .liquid_state
        .labware
        .entry(labware.to_string())
        .or_default();
    Ok(Arc::make_mut(wells).entry(well.to_string()).or_default())
}

fn pipette_channel<'a>(
    state: &'a mut RobotState,
    pipette: &str,
    channel: usize,
) -> Result<&'a mut LocationLiquidState, TransitionError> {
    let channel =
        u8::try_from(channel).map_err(|_| TransitionError::UnknownPipette(pipette.to_string()))?;
    Ok(state
        .liquid_state
        .pipettes
        .entry(pipette.to_string())
        .or_default()
        .entry(channel)
        .or_default())
}

/// Removes `volume` from `contents`, taking every ingredient in proportion.
/// Asking for (almost) everything empties the location.
fn split_off(
    contents: &mut LocationLiquidState,
    volume: f64,
    tolerance: f64,
) -> LocationLiquidState {
    let total = total_volume(contents);
    if total <= tolerance {
        contents.clear();
        return LocationLiquidState::new();
    }
    if volume >= total - tolerance {
        return std::mem::take(contents);
    }
    let fraction = volume / total;
    let removed: LocationLiquidState = contents
        .iter_mut()
        .map(|(ingredient, amount)| {
            let moved = *amount * fraction;
            *amount -= moved;
            (ingredient.clone(), moved)
        })
        .collect();
    contents.retain(|_, amount| *amount > tolerance);
    removed
}

fn merge(into: &mut LocationLiquidState, from: LocationLiquidState) {
    for (ingredient, amount) in from {
        *into.entry(ingredient).or_insert(0.0) += amount;
    }
}

fn module_state<'a>(
    state: &'a mut RobotState,
    module: &str,
) -> Result<&'a mut ModuleState, TransitionError> {
    state
        .modules
        .get_mut(module)
        .ok_or_else(|| TransitionError::UnknownModule(module.to_string()))
}

fn mismatch(module: &str, expected: ModuleType) -> TransitionError {
    TransitionError::ModuleTypeMismatch {
        module: module.to_string(),
        expected,
    }
}

fn temperature_module<'a>(
    state: &'a mut RobotState,
    module: &str,
) -> Result<&'a mut TemperatureModuleState, TransitionError> {
    match module_state(state, module)? {
        ModuleState::Temperature(s) => Ok(s),
        _ => Err(mismatch(module, ModuleType::Temperature)),
    }
}

fn magnetic_module<'a>(
    state: &'a mut RobotState,
    module: &str,
) -> Result<&'a mut MagneticModuleState, TransitionError> {
    match module_state(state, module)? {
        ModuleState::Magnetic(s) => Ok(s),
        _ => Err(mismatch(module, ModuleType::Magnetic)),
    }
}

fn thermocycler<'a>(
    state: &'a mut RobotState,
    module: &str,
) -> Result<&'a mut ThermocyclerModuleState, TransitionError> {
    match module_state(state, module)? {
        ModuleState::Thermocycler(s) => Ok(s),
        _ => Err(mismatch(module, ModuleType::Thermocycler)),
    }
}

fn heater_shaker<'a>(
    state: &'a mut RobotState,
    module: &str,
) -> Result<&'a mut HeaterShakerModuleState, TransitionError> {
    match module_state(state, module)? {
        ModuleState::HeaterShaker(s) => Ok(s),
        _ => Err(mismatch(module, ModuleType::HeaterShaker)),
    }
}

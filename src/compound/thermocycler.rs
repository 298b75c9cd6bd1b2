use serde::{Deserialize, Serialize};

use crate::command::{
    CommandCreatorResult, ModuleParams, ProfileStep, RunProfileParams, TemperatureParams,
};
use crate::creators;
use crate::entity::{EntityContext, ModuleId, ModuleType};
use crate::error::CommandCreatorError;
use crate::pipeline::{CurriedCommandCreator, curry_command_creator, reduce_command_creators};
use crate::state::{ModuleState, RobotState, ThermocyclerModuleState};

/// Desired resting state of a thermocycler. `None` temperatures mean "off".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermocyclerStateArgs {
    pub module: ModuleId,
    pub block_target_temperature: Option<f64>,
    pub lid_target_temperature: Option<f64>,
    pub lid_open: bool,
}

/// Runs a profile with the lid closed and heated, then settles into a hold state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermocyclerProfileArgs {
    pub module: ModuleId,
    pub profile: Vec<ProfileStep>,
    /// Largest well volume in the block, in uL.
    pub profile_volume: f64,
    pub profile_lid_temperature: f64,
    pub block_hold_temperature: Option<f64>,
    pub lid_hold_temperature: Option<f64>,
    pub lid_open_after: bool,
}

fn current_state(
    module: &ModuleId,
    ctx: &EntityContext,
    state: &RobotState,
) -> Result<ThermocyclerModuleState, CommandCreatorError> {
    ctx.module_of_type(module, ModuleType::Thermocycler)?;
    match state.modules.get(module) {
        Some(ModuleState::Thermocycler(tc)) => Ok(tc.clone()),
        Some(other) => Err(CommandCreatorError::WrongModuleType {
            module: module.clone(),
            expected: ModuleType::Thermocycler,
            actual: other.module_type(),
        }),
        None => Err(CommandCreatorError::ModuleDoesNotExist {
            module: module.clone(),
        }),
    }
}

fn module(id: &ModuleId) -> ModuleParams {
    ModuleParams { module: id.clone() }
}

fn temperature(id: &ModuleId, celsius: f64) -> TemperatureParams {
    TemperatureParams {
        module: id.clone(),
        celsius,
    }
}

/// Emits only what it takes to move the thermocycler from its current state
/// to the requested one.
///
/// A lid that must close does so first, so temperatures are reached under
/// it; a lid that must open does so last.
pub fn thermocycler_state_step(
    args: &ThermocyclerStateArgs,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let current = current_state(&args.module, ctx, state)?;
    let id = &args.module;
    let mut legs: Vec<CurriedCommandCreator> = Vec::new();

    if !args.lid_open && current.lid_open != Some(false) {
        legs.push(curry_command_creator(creators::close_lid, module(id)));
    }

    match (args.block_target_temperature, current.block_target_temperature) {
        (Some(target), existing) if existing != Some(target) => {
            legs.push(curry_command_creator(
                creators::set_block_temperature,
                temperature(id, target),
            ));
            legs.push(curry_command_creator(
                creators::await_block_temperature,
                module(id),
            ));
        }
        (None, Some(_)) => {
            legs.push(curry_command_creator(creators::deactivate_block, module(id)));
        }
        _ => {}
    }

    match (args.lid_target_temperature, current.lid_target_temperature) {
        (Some(target), existing) if existing != Some(target) => {
            legs.push(curry_command_creator(
                creators::set_lid_temperature,
                temperature(id, target),
            ));
            legs.push(curry_command_creator(
                creators::await_lid_temperature,
                module(id),
            ));
        }
        (None, Some(_)) => {
            legs.push(curry_command_creator(creators::deactivate_lid, module(id)));
        }
        _ => {}
    }

    if args.lid_open && current.lid_open != Some(true) {
        legs.push(curry_command_creator(creators::open_lid, module(id)));
    }

    reduce_command_creators(&legs, ctx, state)
}

pub fn thermocycler_profile_step(
    args: &ThermocyclerProfileArgs,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let current = current_state(&args.module, ctx, state)?;
    let id = &args.module;
    let mut legs: Vec<CurriedCommandCreator> = Vec::new();

    if current.lid_open != Some(false) {
        legs.push(curry_command_creator(creators::close_lid, module(id)));
    }
    legs.push(curry_command_creator(
        creators::set_lid_temperature,
        temperature(id, args.profile_lid_temperature),
    ));
    legs.push(curry_command_creator(creators::await_lid_temperature, module(id)));
    legs.push(curry_command_creator(
        creators::run_profile,
        RunProfileParams {
            module: id.clone(),
            profile: args.profile.clone(),
            block_max_volume: args.profile_volume,
        },
    ));
    legs.push(curry_command_creator(creators::await_profile_complete, module(id)));
    // The hold state is diffed against whatever the profile left behind.
    legs.push(curry_command_creator(
        thermocycler_state_step,
        ThermocyclerStateArgs {
            module: id.clone(),
            block_target_temperature: args.block_hold_temperature,
            lid_target_temperature: args.lid_hold_temperature,
            lid_open: args.lid_open_after,
        },
    ));

    reduce_command_creators(&legs, ctx, state)
}

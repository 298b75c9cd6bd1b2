//! Creators for temperature, magnetic, thermocycler and heater-shaker modules.

use std::ops::RangeInclusive;

use crate::command::{
    Command, CommandCreatorResult, CommandsAndWarnings, EngageMagnetParams, ModuleParams,
    RunProfileParams, ShakeSpeedParams, TemperatureParams,
};
use crate::entity::{EntityContext, ModuleEntity, ModuleType};
use crate::error::CommandCreatorError;
use crate::state::{
    HeaterShakerModuleState, ModuleState, RobotState, TemperatureModuleState,
    TemperatureStatus, ThermocyclerModuleState,
};

fn ok(command: Command) -> CommandCreatorResult {
    Ok(CommandsAndWarnings::single(command))
}

fn check_range(
    module: &str,
    value: f64,
    range: Option<RangeInclusive<f64>>,
) -> Result<(), CommandCreatorError> {
    match range {
        Some(range) if range.contains(&value) => Ok(()),
        Some(range) => Err(CommandCreatorError::ModuleSettingOutOfRange {
            module: module.to_string(),
            value,
            min: *range.start(),
            max: *range.end(),
        }),
        None => Err(CommandCreatorError::InvalidParameter {
            message: format!("module {module} has no adjustable range for this setting"),
        }),
    }
}

fn state_of<'a>(
    module: &ModuleEntity,
    state: &'a RobotState,
) -> Result<&'a ModuleState, CommandCreatorError> {
    state
        .modules
        .get(&module.id)
        .ok_or_else(|| CommandCreatorError::ModuleDoesNotExist {
            module: module.id.clone(),
        })
}

fn temperature_state<'a>(
    module: &ModuleEntity,
    state: &'a RobotState,
) -> Result<&'a TemperatureModuleState, CommandCreatorError> {
    match state_of(module, state)? {
        ModuleState::Temperature(s) => Ok(s),
        other => Err(wrong_state(module, ModuleType::Temperature, other)),
    }
}

fn thermocycler_state<'a>(
    module: &ModuleEntity,
    state: &'a RobotState,
) -> Result<&'a ThermocyclerModuleState, CommandCreatorError> {
    match state_of(module, state)? {
        ModuleState::Thermocycler(s) => Ok(s),
        other => Err(wrong_state(module, ModuleType::Thermocycler, other)),
    }
}

fn heater_shaker_state<'a>(
    module: &ModuleEntity,
    state: &'a RobotState,
) -> Result<&'a HeaterShakerModuleState, CommandCreatorError> {
    match state_of(module, state)? {
        ModuleState::HeaterShaker(s) => Ok(s),
        other => Err(wrong_state(module, ModuleType::HeaterShaker, other)),
    }
}

fn wrong_state(
    module: &ModuleEntity,
    expected: ModuleType,
    found: &ModuleState,
) -> CommandCreatorError {
    CommandCreatorError::WrongModuleType {
        module: module.id.clone(),
        expected,
        actual: found.module_type(),
    }
}

// Temperature module

pub fn set_temperature(
    args: &TemperatureParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::Temperature)?;
    check_range(&args.module, args.celsius, module.model.capabilities().temperature_range)?;
    ok(Command::SetTemperature(args.clone()))
}

/// Waits for a temperature module to reach `celsius`, which must be the
/// target it was last set to.
pub fn await_temperature(
    args: &TemperatureParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::Temperature)?;
    let current = temperature_state(module, state)?;
    if current.status == TemperatureStatus::Deactivated
        || current.target_temperature != Some(args.celsius)
    {
        return Err(CommandCreatorError::UnreachableTemperature {
            module: args.module.clone(),
            requested: Some(args.celsius),
            target: current.target_temperature,
        });
    }
    ok(Command::AwaitTemperature(args.clone()))
}

pub fn deactivate_temperature(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::Temperature)?;
    ok(Command::DeactivateTemperature(args.clone()))
}

// Magnetic module

pub fn engage_magnet(
    args: &EngageMagnetParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::Magnetic)?;
    check_range(&args.module, args.height, module.model.capabilities().engage_height_range)?;
    ok(Command::EngageMagnet(args.clone()))
}

pub fn disengage_magnet(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::Magnetic)?;
    ok(Command::DisengageMagnet(args.clone()))
}

// Thermocycler

pub fn set_block_temperature(
    args: &TemperatureParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    check_range(&args.module, args.celsius, module.model.capabilities().temperature_range)?;
    ok(Command::SetBlockTemperature(args.clone()))
}

pub fn set_lid_temperature(
    args: &TemperatureParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    check_range(
        &args.module,
        args.celsius,
        module.model.capabilities().lid_temperature_range,
    )?;
    ok(Command::SetLidTemperature(args.clone()))
}

pub fn await_block_temperature(
    args: &ModuleParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    let target = thermocycler_state(module, state)?.block_target_temperature;
    if target.is_none() {
        return Err(CommandCreatorError::UnreachableTemperature {
            module: args.module.clone(),
            requested: None,
            target,
        });
    }
    ok(Command::AwaitBlockTemperature(args.clone()))
}

pub fn await_lid_temperature(
    args: &ModuleParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    let target = thermocycler_state(module, state)?.lid_target_temperature;
    if target.is_none() {
        return Err(CommandCreatorError::UnreachableTemperature {
            module: args.module.clone(),
            requested: None,
            target,
        });
    }
    ok(Command::AwaitLidTemperature(args.clone()))
}

pub fn deactivate_block(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    ok(Command::DeactivateBlock(args.clone()))
}

pub fn deactivate_lid(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    ok(Command::DeactivateLid(args.clone()))
}

pub fn open_lid(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    ok(Command::OpenLid(args.clone()))
}

pub fn close_lid(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    ok(Command::CloseLid(args.clone()))
}

/// Starts a thermocycler profile. Every step must be a reachable block
/// temperature held for a non-negative time.
pub fn run_profile(
    args: &RunProfileParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    if args.profile.is_empty() {
        return Err(CommandCreatorError::InvalidParameter {
            message: "thermocycler profile has no steps".into(),
        });
    }
    let range = module.model.capabilities().temperature_range;
    for step in &args.profile {
        check_range(&args.module, step.celsius, range.clone())?;
        super::require_non_negative("hold time", step.hold_seconds)?;
    }
    super::require_non_negative("profile volume", args.block_max_volume)?;
    ok(Command::RunProfile(args.clone()))
}

pub fn await_profile_complete(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::Thermocycler)?;
    ok(Command::AwaitProfileComplete(args.clone()))
}

// Heater-shaker

pub fn set_heater_shaker_temperature(
    args: &TemperatureParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::HeaterShaker)?;
    check_range(&args.module, args.celsius, module.model.capabilities().temperature_range)?;
    ok(Command::SetHeaterShakerTemperature(args.clone()))
}

pub fn await_heater_shaker_temperature(
    args: &ModuleParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::HeaterShaker)?;
    let target = heater_shaker_state(module, state)?.target_temperature;
    if target.is_none() {
        return Err(CommandCreatorError::UnreachableTemperature {
            module: args.module.clone(),
            requested: None,
            target,
        });
    }
    ok(Command::AwaitHeaterShakerTemperature(args.clone()))
}

pub fn deactivate_heater(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::HeaterShaker)?;
    ok(Command::DeactivateHeater(args.clone()))
}

/// Starts shaking. The labware latch must not be open.
pub fn set_shake_speed(
    args: &ShakeSpeedParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::HeaterShaker)?;
    let speeds = module.model.capabilities().shake_speed_range;
    check_range(
        &args.module,
        f64::from(args.rpm),
        speeds.map(|r| f64::from(*r.start())..=f64::from(*r.end())),
    )?;
    if heater_shaker_state(module, state)?.latch_open == Some(true) {
        return Err(CommandCreatorError::HeaterShakerLatchOpen {
            module: args.module.clone(),
        });
    }
    ok(Command::SetShakeSpeed(args.clone()))
}

pub fn deactivate_shaker(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::HeaterShaker)?;
    ok(Command::DeactivateShaker(args.clone()))
}

pub fn open_latch(
    args: &ModuleParams,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module_of_type(&args.module, ModuleType::HeaterShaker)?;
    if heater_shaker_state(module, state)?.is_shaking() {
        return Err(CommandCreatorError::HeaterShakerIsShaking {
            module: args.module.clone(),
        });
    }
    ok(Command::OpenLatch(args.clone()))
}

pub fn close_latch(
    args: &ModuleParams,
    ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::HeaterShaker)?;
    ok(Command::CloseLatch(args.clone()))
}

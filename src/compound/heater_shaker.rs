use serde::{Deserialize, Serialize};

use crate::command::{
    CommandCreatorResult, DelayParams, ModuleParams, ShakeSpeedParams, TemperatureParams,
};
use crate::creators;
use crate::entity::{EntityContext, ModuleId, ModuleType};
use crate::error::CommandCreatorError;
use crate::pipeline::{CurriedCommandCreator, curry_command_creator, reduce_command_creators};
use crate::state::{ModuleState, RobotState};

/// Desired heater-shaker settings. `None` turns the heater or shaker off.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaterShakerArgs {
    pub module: ModuleId,
    pub target_temperature: Option<f64>,
    pub target_speed: Option<u32>,
    pub latch_open: bool,
    /// Run for this long, then switch the heater and shaker off again.
    #[serde(default)]
    pub timer_seconds: Option<f64>,
}

pub fn heater_shaker(
    args: &HeaterShakerArgs,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    ctx.module_of_type(&args.module, ModuleType::HeaterShaker)?;
    let current = match state.modules.get(&args.module) {
        Some(ModuleState::HeaterShaker(hs)) => hs,
        _ => {
            return Err(CommandCreatorError::ModuleDoesNotExist {
                module: args.module.clone(),
            });
        }
    };
    let module = || ModuleParams {
        module: args.module.clone(),
    };
    let mut legs: Vec<CurriedCommandCreator> = Vec::new();
    let mut latch_open = current.latch_open;

    match args.target_temperature {
        Some(celsius) => legs.push(curry_command_creator(
            creators::set_heater_shaker_temperature,
            TemperatureParams {
                module: args.module.clone(),
                celsius,
            },
        )),
        None if current.target_temperature.is_some() => {
            legs.push(curry_command_creator(creators::deactivate_heater, module()));
        }
        None => {}
    }

    match args.target_speed {
        Some(rpm) => {
            if latch_open != Some(false) {
                legs.push(curry_command_creator(creators::close_latch, module()));
                latch_open = Some(false);
            }
            legs.push(curry_command_creator(
                creators::set_shake_speed,
                ShakeSpeedParams {
                    module: args.module.clone(),
                    rpm,
                },
            ));
        }
        None if current.is_shaking() => {
            legs.push(curry_command_creator(creators::deactivate_shaker, module()));
        }
        None => {}
    }

    if let Some(seconds) = args.timer_seconds {
        legs.push(curry_command_creator(
            creators::delay,
            DelayParams {
                wait_for_resume: false,
                seconds: Some(seconds),
                message: None,
            },
        ));
        if args.target_speed.is_some() {
            legs.push(curry_command_creator(creators::deactivate_shaker, module()));
        }
        if args.target_temperature.is_some() {
            legs.push(curry_command_creator(creators::deactivate_heater, module()));
        }
    }

    if args.latch_open && latch_open != Some(true) {
        legs.push(curry_command_creator(creators::open_latch, module()));
    } else if !args.latch_open && latch_open != Some(false) {
        legs.push(curry_command_creator(creators::close_latch, module()));
    }

    reduce_command_creators(&legs, ctx, state)
}

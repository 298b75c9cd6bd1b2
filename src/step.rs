//! Step parameter objects as they arrive from a protocol.
//!
//! A [`StepArgs`] is the serialized form of one protocol step. Turning it into
//! a creator is a pure mapping; nothing is validated until the creator runs
//! against a state.

use serde::{Deserialize, Serialize};

use crate::command::{
    CommandCreatorResult, DelayParams, EngageMagnetParams, ModuleParams, TemperatureParams,
};
use crate::compound::{
    self, ConsolidateArgs, DistributeArgs, HeaterShakerArgs, MixArgs, ThermocyclerProfileArgs,
    ThermocyclerStateArgs, TransferArgs,
};
use crate::creators;
use crate::entity::{EntityContext, ModuleId, ModuleType};
use crate::error::CommandCreatorError;
use crate::pipeline::{CurriedCommandCreator, curry_command_creator};
use crate::state::{ModuleState, RobotState};

/// Sets a temperature module to `target`, or deactivates it when `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureStepArgs {
    pub module: ModuleId,
    pub target: Option<f64>,
}

/// Engages the magnet at `engage_height`, or disengages it when `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagnetStepArgs {
    pub module: ModuleId,
    pub engage_height: Option<f64>,
}

/// Holds the protocol until a temperature module or heater-shaker reaches
/// `celsius`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseUntilTemperatureArgs {
    pub module: ModuleId,
    pub celsius: f64,
}

/// One step of a protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stepType", rename_all = "camelCase")]
pub enum StepArgs {
    Transfer(TransferArgs),
    Consolidate(ConsolidateArgs),
    Distribute(DistributeArgs),
    Mix(MixArgs),
    Pause(DelayParams),
    PauseUntilTemperature(PauseUntilTemperatureArgs),
    Temperature(TemperatureStepArgs),
    Magnet(MagnetStepArgs),
    ThermocyclerState(ThermocyclerStateArgs),
    ThermocyclerProfile(ThermocyclerProfileArgs),
    HeaterShaker(HeaterShakerArgs),
    DropAllTips,
}

impl StepArgs {
    pub fn into_creator(self) -> CurriedCommandCreator {
        match self {
            Self::Transfer(args) => curry_command_creator(compound::transfer, args),
            Self::Consolidate(args) => curry_command_creator(compound::consolidate, args),
            Self::Distribute(args) => curry_command_creator(compound::distribute, args),
            Self::Mix(args) => curry_command_creator(compound::mix, args),
            Self::Pause(args) => curry_command_creator(creators::delay, args),
            Self::PauseUntilTemperature(args) => {
                curry_command_creator(pause_until_temperature, args)
            }
            Self::Temperature(TemperatureStepArgs {
                module,
                target: Some(celsius),
            }) => curry_command_creator(
                creators::set_temperature,
                TemperatureParams { module, celsius },
            ),
            Self::Temperature(TemperatureStepArgs { module, target: None }) => {
                curry_command_creator(creators::deactivate_temperature, ModuleParams { module })
            }
            Self::Magnet(MagnetStepArgs {
                module,
                engage_height: Some(height),
            }) => curry_command_creator(
                creators::engage_magnet,
                EngageMagnetParams { module, height },
            ),
            Self::Magnet(MagnetStepArgs {
                module,
                engage_height: None,
            }) => curry_command_creator(creators::disengage_magnet, ModuleParams { module }),
            Self::ThermocyclerState(args) => {
                curry_command_creator(compound::thermocycler_state_step, args)
            }
            Self::ThermocyclerProfile(args) => {
                curry_command_creator(compound::thermocycler_profile_step, args)
            }
            Self::HeaterShaker(args) => curry_command_creator(compound::heater_shaker, args),
            Self::DropAllTips => curry_command_creator(creators::drop_all_tips, ()),
        }
    }
}

fn pause_until_temperature(
    args: &PauseUntilTemperatureArgs,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let module = ctx.module(&args.module)?;
    match module.module_type() {
        ModuleType::Temperature => creators::await_temperature(
            &TemperatureParams {
                module: args.module.clone(),
                celsius: args.celsius,
            },
            ctx,
            state,
        ),
        ModuleType::HeaterShaker => {
            let target = match state.modules.get(&args.module) {
                Some(ModuleState::HeaterShaker(hs)) => hs.target_temperature,
                _ => None,
            };
            if target != Some(args.celsius) {
                return Err(CommandCreatorError::UnreachableTemperature {
                    module: args.module.clone(),
                    requested: Some(args.celsius),
                    target,
                });
            }
            creators::await_heater_shaker_temperature(
                &ModuleParams {
                    module: args.module.clone(),
                },
                ctx,
                state,
            )
        }
        actual => Err(CommandCreatorError::WrongModuleType {
            module: args.module.clone(),
            expected: ModuleType::Temperature,
            actual,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::fixtures;

    #[test]
    fn steps_deserialize_from_tagged_json() {
        let raw = r#"{
            "stepType": "transfer",
            "pipette": "p300SingleId",
            "volume": 50,
            "sourceLabware": "troughId",
            "sourceWells": ["A1"],
            "destLabware": "destPlateId",
            "destWells": ["A1", "B1"],
            "changeTip": "once"
        }"#;
        let step: StepArgs = serde_json::from_str(raw).expect("transfer step");
        let StepArgs::Transfer(args) = step else {
            panic!("expected a transfer step");
        };
        assert_eq!(args.change_tip, compound::ChangeTip::Once);
        assert_eq!(args.options, compound::PipettingOptions::default());

        let unknown = r#"{"stepType": "teleport"}"#;
        assert!(serde_json::from_str::<StepArgs>(unknown).is_err());
    }

    #[test]
    fn module_steps_map_to_set_or_deactivate() {
        let ctx = fixtures::context_with_modules();
        let state = fixtures::module_state(&ctx);
        let off = StepArgs::Temperature(TemperatureStepArgs {
            module: fixtures::TEMPERATURE_MODULE.into(),
            target: None,
        })
        .into_creator();
        assert_eq!(
            off(&ctx, &state).expect("deactivate").commands,
            vec![Command::DeactivateTemperature(ModuleParams {
                module: fixtures::TEMPERATURE_MODULE.into()
            })]
        );

        let engage = StepArgs::Magnet(MagnetStepArgs {
            module: fixtures::MAGNETIC_MODULE.into(),
            engage_height: Some(12.0),
        })
        .into_creator();
        assert!(matches!(
            engage(&ctx, &state).expect("engage").commands.as_slice(),
            [Command::EngageMagnet(_)]
        ));
    }

    #[test]
    fn pause_until_temperature_waits_on_a_heater_shaker_target() {
        let ctx = fixtures::context_with_heater_shaker();
        let state = fixtures::heater_shaker_state(&ctx);
        let pause = |celsius| {
            StepArgs::PauseUntilTemperature(PauseUntilTemperatureArgs {
                module: fixtures::HEATER_SHAKER.into(),
                celsius,
            })
            .into_creator()
        };

        let err = pause(50.0)(&ctx, &state).expect_err("heater never set");
        assert!(matches!(
            err,
            CommandCreatorError::UnreachableTemperature { target: None, .. }
        ));

        let set = creators::set_heater_shaker_temperature(
            &TemperatureParams {
                module: fixtures::HEATER_SHAKER.into(),
                celsius: 50.0,
            },
            &ctx,
            &state,
        )
        .expect("set");
        let state =
            crate::transition::apply_commands(&set.commands, &ctx, &state).expect("apply");

        assert!(pause(60.0)(&ctx, &state).is_err());
        assert_eq!(
            pause(50.0)(&ctx, &state).expect("await").commands,
            vec![Command::AwaitHeaterShakerTemperature(ModuleParams {
                module: fixtures::HEATER_SHAKER.into()
            })]
        );
    }

    #[test]
    fn pause_until_temperature_rejects_modules_without_a_heater() {
        let ctx = fixtures::context_with_modules();
        let state = fixtures::module_state(&ctx);
        let raw = r#"{"stepType": "pauseUntilTemperature", "module": "magneticModuleId", "celsius": 40}"#;
        let step: StepArgs = serde_json::from_str(raw).expect("pause step");
        let err = step.into_creator()(&ctx, &state).expect_err("magnets have no heater");
        assert!(matches!(
            err,
            CommandCreatorError::WrongModuleType {
                actual: ModuleType::Magnetic,
                ..
            }
        ));
    }
}

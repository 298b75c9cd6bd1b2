//! Atomic robot commands and the warnings that may accompany them.
//!
//! Both vocabularies are closed enums. On the wire a command is
//! `{"commandType": "...", "params": {...}}`; an unknown `commandType` fails to
//! deserialize rather than being skipped.

use serde::{Deserialize, Serialize};

use crate::entity::{LabwareId, ModuleId, PipetteId, WellName};
use crate::error::CommandCreatorError;

/// Parameters shared by aspirate and dispense.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipettingParams {
    pub pipette: PipetteId,
    /// Volume per channel, in uL.
    pub volume: f64,
    pub labware: LabwareId,
    pub well: WellName,
    /// uL/s.
    pub flow_rate: f64,
    pub offset_from_bottom_mm: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlowOutParams {
    pub pipette: PipetteId,
    pub labware: LabwareId,
    pub well: WellName,
    pub flow_rate: f64,
    pub offset_from_bottom_mm: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchTipParams {
    pub pipette: PipetteId,
    pub labware: LabwareId,
    pub well: WellName,
    pub offset_from_bottom_mm: f64,
}

/// Target of pick-up-tip and drop-tip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TipParams {
    pub pipette: PipetteId,
    pub labware: LabwareId,
    pub well: WellName,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayParams {
    /// Pause until the operator resumes instead of for a fixed time.
    pub wait_for_resume: bool,
    pub seconds: Option<f64>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleParams {
    pub module: ModuleId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureParams {
    pub module: ModuleId,
    pub celsius: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngageMagnetParams {
    pub module: ModuleId,
    /// Height above the labware bottom, in mm.
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShakeSpeedParams {
    pub module: ModuleId,
    pub rpm: u32,
}

/// One hold of a thermocycler profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStep {
    pub celsius: f64,
    pub hold_seconds: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProfileParams {
    pub module: ModuleId,
    pub profile: Vec<ProfileStep>,
    /// Largest well volume in the block, in uL.
    pub block_max_volume: f64,
}

/// A single primitive robot action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "commandType", content = "params", rename_all = "camelCase")]
pub enum Command {
    Aspirate(PipettingParams),
    Dispense(PipettingParams),
    BlowOut(BlowOutParams),
    TouchTip(TouchTipParams),
    PickUpTip(TipParams),
    DropTip(TipParams),
    Delay(DelayParams),

    #[serde(rename = "temperatureModule/setTargetTemperature")]
    SetTemperature(TemperatureParams),
    #[serde(rename = "temperatureModule/waitForTemperature")]
    AwaitTemperature(TemperatureParams),
    #[serde(rename = "temperatureModule/deactivate")]
    DeactivateTemperature(ModuleParams),

    #[serde(rename = "magneticModule/engage")]
    EngageMagnet(EngageMagnetParams),
    #[serde(rename = "magneticModule/disengage")]
    DisengageMagnet(ModuleParams),

    #[serde(rename = "thermocycler/setTargetBlockTemperature")]
    SetBlockTemperature(TemperatureParams),
    #[serde(rename = "thermocycler/waitForBlockTemperature")]
    AwaitBlockTemperature(ModuleParams),
    #[serde(rename = "thermocycler/setTargetLidTemperature")]
    SetLidTemperature(TemperatureParams),
    #[serde(rename = "thermocycler/waitForLidTemperature")]
    AwaitLidTemperature(ModuleParams),
    #[serde(rename = "thermocycler/deactivateBlock")]
    DeactivateBlock(ModuleParams),
    #[serde(rename = "thermocycler/deactivateLid")]
    DeactivateLid(ModuleParams),
    #[serde(rename = "thermocycler/openLid")]
    OpenLid(ModuleParams),
    #[serde(rename = "thermocycler/closeLid")]
    CloseLid(ModuleParams),
    #[serde(rename = "thermocycler/runProfile")]
    RunProfile(RunProfileParams),
    #[serde(rename = "thermocycler/awaitProfileComplete")]
    AwaitProfileComplete(ModuleParams),

    #[serde(rename = "heaterShaker/setTargetTemperature")]
    SetHeaterShakerTemperature(TemperatureParams),
    #[serde(rename = "heaterShaker/waitForTemperature")]
    AwaitHeaterShakerTemperature(ModuleParams),
    #[serde(rename = "heaterShaker/deactivateHeater")]
    DeactivateHeater(ModuleParams),
    #[serde(rename = "heaterShaker/setAndWaitForShakeSpeed")]
    SetShakeSpeed(ShakeSpeedParams),
    #[serde(rename = "heaterShaker/deactivateShaker")]
    DeactivateShaker(ModuleParams),
    #[serde(rename = "heaterShaker/openLabwareLatch")]
    OpenLatch(ModuleParams),
    #[serde(rename = "heaterShaker/closeLabwareLatch")]
    CloseLatch(ModuleParams),
}

/// Non-fatal notices raised alongside successfully created commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Warning {
    /// The tip still carries liquid that is not present in the well it is
    /// about to aspirate from, so the tip will hold a mixture.
    #[serde(rename_all = "camelCase")]
    MixedLiquidInTip {
        pipette: PipetteId,
        labware: LabwareId,
        well: WellName,
        residual_volume: f64,
    },
    /// After dispensing, liquid left in the tip has been in contact with a
    /// different liquid already present in the destination well.
    #[serde(rename_all = "camelCase")]
    ResidualTouchedForeignLiquid {
        pipette: PipetteId,
        labware: LabwareId,
        well: WellName,
        residual_volume: f64,
    },
}

/// Successful output of a command creator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandsAndWarnings {
    pub commands: Vec<Command>,
    pub warnings: Vec<Warning>,
}

impl CommandsAndWarnings {
    pub fn single(command: Command) -> Self {
        Self {
            commands: vec![command],
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(command: Command, warnings: Vec<Warning>) -> Self {
        Self {
            commands: vec![command],
            warnings,
        }
    }
}

/// Result returned by every command creator.
pub type CommandCreatorResult = Result<CommandsAndWarnings, CommandCreatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_tagged_wire_shape() {
        let cmd = Command::PickUpTip(TipParams {
            pipette: "p".into(),
            labware: "tiprack".into(),
            well: "A1".into(),
        });
        let json = serde_json::to_value(&cmd).expect("serialize");
        assert_eq!(json["commandType"], "pickUpTip");
        assert_eq!(json["params"]["labware"], "tiprack");

        let engage = Command::EngageMagnet(EngageMagnetParams {
            module: "mag".into(),
            height: 10.0,
        });
        let json = serde_json::to_value(&engage).expect("serialize");
        assert_eq!(json["commandType"], "magneticModule/engage");
    }

    #[test]
    fn unknown_command_kind_is_rejected() {
        let raw = r#"{"commandType": "teleport", "params": {"pipette": "p"}}"#;
        assert!(serde_json::from_str::<Command>(raw).is_err());
    }

    #[test]
    fn unknown_warning_kind_is_rejected() {
        let raw = r#"{"type": "somethingNew", "pipette": "p"}"#;
        assert!(serde_json::from_str::<Warning>(raw).is_err());
    }
}

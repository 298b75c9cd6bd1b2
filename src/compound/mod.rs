//! Compound operations built from atomic creators.
//!
//! Every compound creator only decides *which* atomic creators to run and in
//! what order; the legs are then folded by
//! [`reduce_command_creators`](crate::pipeline::reduce_command_creators),
//! which threads the state and stops at the first failing leg.

mod consolidate;
mod distribute;
mod heater_shaker;
mod mix;
mod thermocycler;
mod transfer;

pub use consolidate::{ConsolidateArgs, consolidate};
pub use distribute::{DistributeArgs, distribute};
pub use heater_shaker::{HeaterShakerArgs, heater_shaker};
pub use mix::{MixArgs, mix};
pub use thermocycler::{
    ThermocyclerProfileArgs, ThermocyclerStateArgs, thermocycler_profile_step,
    thermocycler_state_step,
};
pub use transfer::{TransferArgs, split_volume, transfer};

use serde::{Deserialize, Serialize};

use crate::command::{BlowOutParams, DelayParams, PipettingParams, TouchTipParams};
use crate::creators::{self, ReplaceTipArgs};
use crate::entity::{EntityContext, LabwareId, PipetteEntity, PipetteId, WellName};
use crate::error::CommandCreatorError;
use crate::pipeline::{CurriedCommandCreator, curry_command_creator};

/// When a compound operation swaps tips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeTip {
    /// Before every aspirate cycle.
    #[default]
    Always,
    /// Once, at the start of the operation.
    Once,
    /// Keep whatever tip is attached.
    Never,
    /// Whenever the source well changes.
    PerSource,
    /// Whenever the destination well changes.
    PerDest,
}

/// Where leftover liquid is blown out after dispensing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlowOutLocation {
    Trash,
    SourceWell,
    DestWell,
}

/// Aspirate/dispense repetitions in a single well.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixOptions {
    pub volume: f64,
    pub times: u32,
}

/// Liquid-handling knobs shared by transfer, consolidate and distribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipettingOptions {
    /// Falls back to the pipette's default when unset.
    pub aspirate_flow_rate: Option<f64>,
    pub dispense_flow_rate: Option<f64>,
    pub blow_out_flow_rate: Option<f64>,
    pub aspirate_offset_from_bottom_mm: f64,
    pub dispense_offset_from_bottom_mm: f64,
    pub touch_tip_after_aspirate: bool,
    pub touch_tip_after_dispense: bool,
    pub mix_before_aspirate: Option<MixOptions>,
    pub mix_after_dispense: Option<MixOptions>,
    pub delay_after_aspirate_seconds: Option<f64>,
    pub delay_after_dispense_seconds: Option<f64>,
    pub blow_out: Option<BlowOutLocation>,
}

impl Default for PipettingOptions {
    fn default() -> Self {
        Self {
            aspirate_flow_rate: None,
            dispense_flow_rate: None,
            blow_out_flow_rate: None,
            aspirate_offset_from_bottom_mm: 1.0,
            dispense_offset_from_bottom_mm: 0.5,
            touch_tip_after_aspirate: false,
            touch_tip_after_dispense: false,
            mix_before_aspirate: None,
            mix_after_dispense: None,
            delay_after_aspirate_seconds: None,
            delay_after_dispense_seconds: None,
            blow_out: None,
        }
    }
}

/// Builds the legs of one compound operation for a single pipette.
///
/// Flow rates and offsets are resolved once from [`PipettingOptions`] and the
/// pipette's defaults, so each leg only names its location.
pub(crate) struct Legs<'a> {
    pipette: &'a PipetteEntity,
    options: &'a PipettingOptions,
    legs: Vec<CurriedCommandCreator>,
}

impl<'a> Legs<'a> {
    pub(crate) fn new(pipette: &'a PipetteEntity, options: &'a PipettingOptions) -> Self {
        Self {
            pipette,
            options,
            legs: Vec::new(),
        }
    }

    fn id(&self) -> PipetteId {
        self.pipette.id.clone()
    }

    pub(crate) fn replace_tip(&mut self) {
        self.legs.push(curry_command_creator(
            creators::replace_tip,
            ReplaceTipArgs { pipette: self.id() },
        ));
    }

    pub(crate) fn aspirate(&mut self, labware: &LabwareId, well: &WellName, volume: f64) {
        let params = PipettingParams {
            pipette: self.id(),
            volume,
            labware: labware.clone(),
            well: well.clone(),
            flow_rate: self
                .options
                .aspirate_flow_rate
                .unwrap_or(self.pipette.spec.default_aspirate_flow_rate),
            offset_from_bottom_mm: self.options.aspirate_offset_from_bottom_mm,
        };
        self.legs
            .push(curry_command_creator(creators::aspirate, params));
    }

    pub(crate) fn dispense(&mut self, labware: &LabwareId, well: &WellName, volume: f64) {
        let params = PipettingParams {
            pipette: self.id(),
            volume,
            labware: labware.clone(),
            well: well.clone(),
            flow_rate: self
                .options
                .dispense_flow_rate
                .unwrap_or(self.pipette.spec.default_dispense_flow_rate),
            offset_from_bottom_mm: self.options.dispense_offset_from_bottom_mm,
        };
        self.legs
            .push(curry_command_creator(creators::dispense, params));
    }

    pub(crate) fn mix(&mut self, labware: &LabwareId, well: &WellName, mix: MixOptions) {
        for _ in 0..mix.times {
            self.aspirate(labware, well, mix.volume);
            self.dispense(labware, well, mix.volume);
        }
    }

    pub(crate) fn touch_tip(&mut self, labware: &LabwareId, well: &WellName, offset: f64) {
        self.legs.push(curry_command_creator(
            creators::touch_tip,
            TouchTipParams {
                pipette: self.id(),
                labware: labware.clone(),
                well: well.clone(),
                offset_from_bottom_mm: offset,
            },
        ));
    }

    pub(crate) fn delay(&mut self, seconds: Option<f64>) {
        if let Some(seconds) = seconds {
            self.legs.push(curry_command_creator(
                creators::delay,
                DelayParams {
                    wait_for_resume: false,
                    seconds: Some(seconds),
                    message: None,
                },
            ));
        }
    }

    pub(crate) fn blow_out(&mut self, labware: &LabwareId, well: &WellName) {
        self.legs.push(curry_command_creator(
            creators::blow_out,
            BlowOutParams {
                pipette: self.id(),
                labware: labware.clone(),
                well: well.clone(),
                flow_rate: self
                    .options
                    .blow_out_flow_rate
                    .unwrap_or(self.pipette.spec.default_blow_out_flow_rate),
                offset_from_bottom_mm: self.options.dispense_offset_from_bottom_mm,
            },
        ));
    }

    /// Post-aspirate delay and touch-tip, as configured.
    pub(crate) fn after_aspirate(&mut self, labware: &LabwareId, well: &WellName) {
        self.delay(self.options.delay_after_aspirate_seconds);
        if self.options.touch_tip_after_aspirate {
            self.touch_tip(labware, well, self.options.aspirate_offset_from_bottom_mm);
        }
    }

    /// Post-dispense delay and touch-tip, as configured.
    pub(crate) fn after_dispense(&mut self, labware: &LabwareId, well: &WellName) {
        self.delay(self.options.delay_after_dispense_seconds);
        if self.options.touch_tip_after_dispense {
            self.touch_tip(labware, well, self.options.dispense_offset_from_bottom_mm);
        }
    }

    pub(crate) fn into_vec(self) -> Vec<CurriedCommandCreator> {
        self.legs
    }
}

/// Resolves a blow-out location to a concrete well.
pub(crate) fn blow_out_target(
    location: BlowOutLocation,
    ctx: &EntityContext,
    source: (&LabwareId, &WellName),
    dest: (&LabwareId, &WellName),
) -> Result<(LabwareId, WellName), CommandCreatorError> {
    match location {
        BlowOutLocation::SourceWell => Ok((source.0.clone(), source.1.clone())),
        BlowOutLocation::DestWell => Ok((dest.0.clone(), dest.1.clone())),
        BlowOutLocation::Trash => {
            let trash = ctx
                .trash()
                .ok_or(CommandCreatorError::DropTipLocationDoesNotExist)?;
            let well = trash
                .def
                .ordering
                .first()
                .and_then(|column| column.first())
                .ok_or(CommandCreatorError::DropTipLocationDoesNotExist)?;
            Ok((trash.id.clone(), well.clone()))
        }
    }
}

pub(crate) fn require_volume(volume: f64) -> Result<(), CommandCreatorError> {
    creators::require_positive("volume", volume)
}

pub(crate) fn check_mix(mix: Option<MixOptions>) -> Result<(), CommandCreatorError> {
    match mix {
        Some(m) if m.times == 0 => Err(CommandCreatorError::InvalidParameter {
            message: "mix repetitions must be at least 1".into(),
        }),
        Some(m) => require_volume(m.volume),
        None => Ok(()),
    }
}

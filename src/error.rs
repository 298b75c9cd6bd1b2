//! Error taxonomy for command creation and state transitions.

use thiserror::Error;

use crate::entity::{LabwareId, ModuleId, ModuleType, PipetteId, WellName};
use crate::ordering::WellOrder;

/// Broad classification of a [`CommandCreatorError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The requested operation is invalid given the entities or the current state.
    Validation,
    /// The pipette would strike a module on its way to the labware.
    Collision,
}

/// Errors raised by command creators.
///
/// Every variant is fatal to the command (and to the compound operation that
/// issued it). Nothing in this crate retries.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CommandCreatorError {
    #[error("pipette does not exist: {pipette}")]
    PipetteDoesNotExist { pipette: PipetteId },

    #[error("labware does not exist: {labware}")]
    LabwareDoesNotExist { labware: LabwareId },

    #[error("module does not exist: {module}")]
    ModuleDoesNotExist { module: ModuleId },

    #[error("well {well} does not exist in labware {labware}")]
    WellDoesNotExist { labware: LabwareId, well: WellName },

    #[error("well {well} of {labware} cannot be addressed by a {channels}-channel pipette")]
    InvalidMultichannelWell {
        labware: LabwareId,
        well: WellName,
        channels: u8,
    },

    #[error("deck slot {slot} does not exist")]
    InvalidDeckSlot { slot: u8 },

    #[error("labware {labware} is off deck")]
    LabwareOffDeck { labware: LabwareId },

    #[error("labware {labware} is not a tiprack")]
    NotATiprack { labware: LabwareId },

    #[error("no trash labware is available to drop tips into")]
    DropTipLocationDoesNotExist,

    #[error("pipette {pipette} has no tip attached")]
    NoTipOnPipette { pipette: PipetteId },

    #[error("pipette {pipette} already has a tip attached")]
    TipAlreadyAttached { pipette: PipetteId },

    #[error("no tip present at {labware} {well}")]
    NoTipAtWell { labware: LabwareId, well: WellName },

    #[error("not enough tips remain on deck for pipette {pipette}")]
    InsufficientTips { pipette: PipetteId },

    #[error("volume {volume} uL is outside the range {min}..={max} uL of pipette {pipette}")]
    VolumeOutOfRange {
        pipette: PipetteId,
        volume: f64,
        min: f64,
        max: f64,
    },

    #[error("pipette {pipette} would hold {requested} uL, exceeding its tip capacity of {capacity} uL")]
    TipVolumeExceeded {
        pipette: PipetteId,
        requested: f64,
        capacity: f64,
    },

    #[error("cannot aspirate {requested} uL from {labware} {well}: only {available} uL present")]
    InsufficientWellVolume {
        labware: LabwareId,
        well: WellName,
        requested: f64,
        available: f64,
    },

    #[error("cannot dispense {requested} uL into {labware} {well}: only {remaining} uL of capacity left")]
    WellCapacityExceeded {
        labware: LabwareId,
        well: WellName,
        requested: f64,
        remaining: f64,
    },

    #[error("cannot dispense {requested} uL from pipette {pipette}: it holds {held} uL")]
    InsufficientPipetteVolume {
        pipette: PipetteId,
        requested: f64,
        held: f64,
    },

    #[error("{source_count} source wells cannot be paired with {dest_count} destination wells")]
    MismatchedWellCount {
        source_count: usize,
        dest_count: usize,
    },

    #[error("invalid well order: {first:?} then {second:?}")]
    InvalidWellOrder { first: WellOrder, second: WellOrder },

    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("module {module} is a {actual:?}, expected {expected:?}")]
    WrongModuleType {
        module: ModuleId,
        expected: ModuleType,
        actual: ModuleType,
    },

    #[error("{value} is outside the supported range {min}..={max} of module {module}")]
    ModuleSettingOutOfRange {
        module: ModuleId,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("module {module} cannot reach {requested:?} C (current target: {target:?})")]
    UnreachableTemperature {
        module: ModuleId,
        requested: Option<f64>,
        target: Option<f64>,
    },

    #[error("heater-shaker {module} cannot shake with its latch open")]
    HeaterShakerLatchOpen { module: ModuleId },

    #[error("heater-shaker {module} cannot open its latch while shaking")]
    HeaterShakerIsShaking { module: ModuleId },

    #[error("pipette {pipette} would collide with module {module} while accessing {labware}")]
    ModulePipetteCollision {
        pipette: PipetteId,
        labware: LabwareId,
        module: ModuleId,
    },

    #[error("thermocycler {module} lid is not open; cannot access {labware}")]
    ThermocyclerLidClosed { labware: LabwareId, module: ModuleId },

    #[error("pipette {pipette} cannot access {labware} because of heater-shaker {module}: {reason}")]
    HeaterShakerCollision {
        pipette: PipetteId,
        labware: LabwareId,
        module: ModuleId,
        reason: crate::collision::HeaterShakerConflict,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl CommandCreatorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ModulePipetteCollision { .. }
            | Self::ThermocyclerLidClosed { .. }
            | Self::HeaterShakerCollision { .. } => ErrorCategory::Collision,
            _ => ErrorCategory::Validation,
        }
    }
}

/// A command was applied that does not fit the state or entity context it
/// was applied to. Creators validate before emitting, so this indicates a
/// caller feeding hand-built commands or a bug in a creator.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("command references unknown pipette {0}")]
    UnknownPipette(PipetteId),

    #[error("command references unknown labware {0}")]
    UnknownLabware(LabwareId),

    #[error("command references unknown well {well} in {labware}")]
    UnknownWell { labware: LabwareId, well: WellName },

    #[error("command references unknown module {0}")]
    UnknownModule(ModuleId),

    #[error("command for a {expected:?} module applied to {module}")]
    ModuleTypeMismatch { module: ModuleId, expected: ModuleType },
}

/// Errors produced while loading a [`SimulationConfig`](crate::config::SimulationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse simulation config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid simulation config: {0}")]
    Invalid(String),
}

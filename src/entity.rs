//! The static entity context: pipettes, labware and modules known to a run.
//!
//! An [`EntityContext`] is assembled once with [`EntityContextBuilder`] and then
//! only ever handed out by shared reference. Command creators can look
//! entities up, but there is no way to change them after `build()`.

use bevy_math::bounding::Aabb2d;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::config::SimulationConfig;
use crate::deck::{self, DeckSlot};
use crate::error::CommandCreatorError;

pub type PipetteId = String;
pub type LabwareId = String;
pub type ModuleId = String;
pub type WellName = String;

/// Identifies a liquid (or a mixture component) tracked through the run.
pub type IngredientId = String;

// ---------------------------------------------------------------------------
// Pipettes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipetteGeneration {
    Gen1,
    Gen2,
}

/// Volumetric and mechanical description of a pipette model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipetteSpec {
    pub channels: u8,
    /// Smallest volume (uL) the pipette can accurately aspirate.
    pub min_volume: f64,
    /// Largest volume (uL) the pipette can hold.
    pub max_volume: f64,
    pub generation: PipetteGeneration,
    /// Default flow rates in uL/s.
    pub default_aspirate_flow_rate: f64,
    pub default_dispense_flow_rate: f64,
    pub default_blow_out_flow_rate: f64,
}

impl PipetteSpec {
    /// Volume range accepted by aspirate and dispense.
    pub fn volume_range(&self) -> RangeInclusive<f64> {
        self.min_volume..=self.max_volume
    }

    pub fn is_multi_channel(&self) -> bool {
        self.channels > 1
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipetteEntity {
    pub id: PipetteId,
    pub name: String,
    pub spec: PipetteSpec,
    /// Definition URI of the tipracks this pipette draws tips from.
    pub tiprack_def_uri: String,
    /// Capacity (uL) of a single tip from that tiprack.
    pub tip_max_volume: f64,
}

impl PipetteEntity {
    /// Largest volume the pipette can hold with its tip on.
    pub fn max_volume_with_tip(&self) -> f64 {
        self.spec.max_volume.min(self.tip_max_volume)
    }
}

// ---------------------------------------------------------------------------
// Labware
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum WellShape {
    Circular { diameter: f32 },
    Rectangular { x_dimension: f32, y_dimension: f32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellDefinition {
    /// Position of the well's top-center relative to the labware's front-left-bottom corner.
    pub position: Vec3,
    pub depth: f32,
    pub shape: WellShape,
    /// Capacity in uL.
    pub max_volume: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LabwareParameters {
    pub is_tiprack: bool,
    pub is_trash: bool,
    /// Capacity of each tip, for tipracks.
    pub tip_volume: Option<f64>,
}

/// Geometry of a labware type. Shared by every labware entity using the same URI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabwareDefinition {
    pub uri: String,
    pub display_name: String,
    /// Well names grouped by column, each column listed back (row A) to front.
    pub ordering: Vec<Vec<WellName>>,
    pub wells: BTreeMap<WellName, WellDefinition>,
    pub parameters: LabwareParameters,
}

impl LabwareDefinition {
    pub fn well(&self, name: &str) -> Option<&WellDefinition> {
        self.wells.get(name)
    }

    /// Wells touched by each channel of a `channels`-wide pipette whose first
    /// (back-most) channel is positioned over `well`.
    ///
    /// Columns with at least as many wells as channels are sampled with an
    /// even stride (every row on a 96-well plate, every other row on a
    /// 384-well plate). Shorter columns, such as troughs, receive every
    /// channel in the addressed well itself.
    pub fn wells_for_channels(&self, well: &str, channels: u8) -> Option<Vec<WellName>> {
        self.wells.get(well)?;
        let channels = usize::from(channels.max(1));
        if channels == 1 {
            return Some(vec![well.to_string()]);
        }
        let column = self
            .ordering
            .iter()
            .find(|column| column.iter().any(|w| w == well))?;
        if column.len() < channels {
            return Some(vec![well.to_string(); channels]);
        }
        let start = column.iter().position(|w| w == well)?;
        let stride = column.len() / channels;
        (0..channels)
            .map(|i| column.get(start + i * stride).cloned())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabwareEntity {
    pub id: LabwareId,
    pub def: Arc<LabwareDefinition>,
}

impl LabwareEntity {
    pub fn def_uri(&self) -> &str {
        &self.def.uri
    }
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleType {
    Temperature,
    Magnetic,
    Thermocycler,
    HeaterShaker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleModel {
    TemperatureModuleV1,
    TemperatureModuleV2,
    MagneticModuleV1,
    MagneticModuleV2,
    ThermocyclerModuleV1,
    HeaterShakerModuleV1,
}

/// Static limits and flags of a module model.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleCapabilities {
    /// Block (or plate) temperature range in degrees C.
    pub temperature_range: Option<RangeInclusive<f64>>,
    /// Thermocycler lid temperature range in degrees C.
    pub lid_temperature_range: Option<RangeInclusive<f64>>,
    /// Magnet engage height range, measured from the labware bottom.
    pub engage_height_range: Option<RangeInclusive<f64>>,
    /// Shake speed range in rpm.
    pub shake_speed_range: Option<RangeInclusive<u32>>,
    /// The module housing is tall enough to block GEN1 multi-channel pipettes
    /// reaching into the slot behind it.
    pub obstructs_gen1_multichannel: bool,
}

impl ModuleModel {
    pub fn module_type(self) -> ModuleType {
        match self {
            Self::TemperatureModuleV1 | Self::TemperatureModuleV2 => ModuleType::Temperature,
            Self::MagneticModuleV1 | Self::MagneticModuleV2 => ModuleType::Magnetic,
            Self::ThermocyclerModuleV1 => ModuleType::Thermocycler,
            Self::HeaterShakerModuleV1 => ModuleType::HeaterShaker,
        }
    }

    pub fn capabilities(self) -> ModuleCapabilities {
        let none = ModuleCapabilities {
            temperature_range: None,
            lid_temperature_range: None,
            engage_height_range: None,
            shake_speed_range: None,
            obstructs_gen1_multichannel: false,
        };
        match self {
            Self::TemperatureModuleV1 => ModuleCapabilities {
                temperature_range: Some(4.0..=95.0),
                obstructs_gen1_multichannel: true,
                ..none
            },
            Self::TemperatureModuleV2 => ModuleCapabilities {
                temperature_range: Some(4.0..=95.0),
                ..none
            },
            Self::MagneticModuleV1 => ModuleCapabilities {
                engage_height_range: Some(0.0..=45.0),
                obstructs_gen1_multichannel: true,
                ..none
            },
            Self::MagneticModuleV2 => ModuleCapabilities {
                engage_height_range: Some(-2.5..=25.0),
                ..none
            },
            Self::ThermocyclerModuleV1 => ModuleCapabilities {
                temperature_range: Some(4.0..=99.0),
                lid_temperature_range: Some(37.0..=110.0),
                ..none
            },
            Self::HeaterShakerModuleV1 => ModuleCapabilities {
                temperature_range: Some(37.0..=95.0),
                shake_speed_range: Some(200..=3000),
                ..none
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntity {
    pub id: ModuleId,
    pub model: ModuleModel,
    /// Slot the module is anchored in. A thermocycler anchors in slot 7 and
    /// also covers slots 8, 10 and 11.
    pub slot: DeckSlot,
}

impl ModuleEntity {
    pub fn module_type(&self) -> ModuleType {
        self.model.module_type()
    }

    /// Deck area occupied by the module housing.
    pub fn footprint(&self) -> Aabb2d {
        match self.model {
            ModuleModel::ThermocyclerModuleV1 => [1, 3, 4]
                .into_iter()
                .filter_map(|offset| self.slot.0.checked_add(offset).and_then(DeckSlot::new))
                .fold(self.slot.footprint(), |acc, s| deck::union(acc, s.footprint())),
            _ => self.slot.footprint(),
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Immutable catalog of every entity a simulation run may reference.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityContext {
    pipettes: BTreeMap<PipetteId, PipetteEntity>,
    labware: BTreeMap<LabwareId, LabwareEntity>,
    modules: BTreeMap<ModuleId, ModuleEntity>,
    config: SimulationConfig,
}

impl EntityContext {
    pub fn builder() -> EntityContextBuilder {
        EntityContextBuilder::default()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn pipettes(&self) -> &BTreeMap<PipetteId, PipetteEntity> {
        &self.pipettes
    }

    pub fn labware(&self) -> &BTreeMap<LabwareId, LabwareEntity> {
        &self.labware
    }

    pub fn modules(&self) -> &BTreeMap<ModuleId, ModuleEntity> {
        &self.modules
    }

    pub fn pipette(&self, id: &str) -> Result<&PipetteEntity, CommandCreatorError> {
        self.pipettes
            .get(id)
            .ok_or_else(|| CommandCreatorError::PipetteDoesNotExist {
                pipette: id.to_string(),
            })
    }

    pub fn labware_entity(&self, id: &str) -> Result<&LabwareEntity, CommandCreatorError> {
        self.labware
            .get(id)
            .ok_or_else(|| CommandCreatorError::LabwareDoesNotExist {
                labware: id.to_string(),
            })
    }

    pub fn module(&self, id: &str) -> Result<&ModuleEntity, CommandCreatorError> {
        self.modules
            .get(id)
            .ok_or_else(|| CommandCreatorError::ModuleDoesNotExist {
                module: id.to_string(),
            })
    }

    /// Looks up a module and checks that it is of `expected` type.
    pub fn module_of_type(
        &self,
        id: &str,
        expected: ModuleType,
    ) -> Result<&ModuleEntity, CommandCreatorError> {
        let module = self.module(id)?;
        let actual = module.module_type();
        if actual != expected {
            return Err(CommandCreatorError::WrongModuleType {
                module: id.to_string(),
                expected,
                actual,
            });
        }
        Ok(module)
    }

    pub fn well(
        &self,
        labware: &str,
        well: &str,
    ) -> Result<&WellDefinition, CommandCreatorError> {
        self.labware_entity(labware)?
            .def
            .well(well)
            .ok_or_else(|| CommandCreatorError::WellDoesNotExist {
                labware: labware.to_string(),
                well: well.to_string(),
            })
    }

    /// Wells reached by every channel of `pipette` when addressing `labware`/`well`.
    pub fn channel_wells(
        &self,
        pipette: &str,
        labware: &str,
        well: &str,
    ) -> Result<Vec<WellName>, CommandCreatorError> {
        let channels = self.pipette(pipette)?.spec.channels;
        self.well(labware, well)?;
        self.labware_entity(labware)?
            .def
            .wells_for_channels(well, channels)
            .ok_or_else(|| CommandCreatorError::InvalidMultichannelWell {
                labware: labware.to_string(),
                well: well.to_string(),
                channels,
            })
    }

    /// The trash labware tips are discarded into.
    pub fn trash(&self) -> Option<&LabwareEntity> {
        self.labware.values().find(|lw| lw.def.parameters.is_trash)
    }
}

/// Collects entity definitions for an [`EntityContext`].
#[derive(Debug, Default)]
pub struct EntityContextBuilder {
    context: EntityContext,
}

impl EntityContextBuilder {
    pub fn pipette(mut self, pipette: PipetteEntity) -> Self {
        self.context.pipettes.insert(pipette.id.clone(), pipette);
        self
    }

    pub fn labware(mut self, id: impl Into<LabwareId>, def: Arc<LabwareDefinition>) -> Self {
        let id = id.into();
        self.context
            .labware
            .insert(id.clone(), LabwareEntity { id, def });
        self
    }

    pub fn module(mut self, module: ModuleEntity) -> Self {
        self.context.modules.insert(module.id.clone(), module);
        self
    }

    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.context.config = config;
        self
    }

    pub fn build(self) -> EntityContext {
        self.context
    }
}

//! Robot state snapshots.
//!
//! A [`RobotState`] describes the robot at one point of a simulated run: which
//! pipettes hold tips, which tiprack wells still have tips, how much of which
//! ingredient sits in every well and every pipette channel, and what each
//! module is doing. Snapshots are values. The transition function takes one by
//! reference and returns the next one; per-labware well maps are shared
//! between snapshots and copied only when a command touches them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::deck::DeckSlot;
use crate::entity::{
    EntityContext, IngredientId, LabwareId, ModuleId, ModuleModel, ModuleType, PipetteId,
    WellName,
};
use crate::creators::require_non_negative;
use crate::error::CommandCreatorError;
use crate::ordering::{WellOrder, order_wells};

/// Ingredient volumes (uL) held at a single location.
pub type LocationLiquidState = BTreeMap<IngredientId, f64>;

/// Per-well contents of one labware.
pub type WellLiquidState = BTreeMap<WellName, LocationLiquidState>;

/// Per-channel contents of one pipette, keyed by channel index.
pub type PipetteLiquidState = BTreeMap<u8, LocationLiquidState>;

/// Total volume held at a location.
pub fn total_volume(contents: &LocationLiquidState) -> f64 {
    contents.values().sum()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipetteMount {
    Left,
    Right,
}

/// Where a labware currently sits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabwareLocation {
    Slot(DeckSlot),
    Module(ModuleId),
    OffDeck,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureStatus {
    Deactivated,
    ApproachingTarget,
    AtTarget,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemperatureModuleState {
    pub status: TemperatureStatus,
    pub target_temperature: Option<f64>,
    /// Known only once the module has been awaited at its target.
    pub current_temperature: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MagneticModuleState {
    pub engaged: bool,
    pub engage_height: Option<f64>,
}

/// `None` fields mean "unknown", which is how a thermocycler starts a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThermocyclerModuleState {
    pub block_target_temperature: Option<f64>,
    pub lid_target_temperature: Option<f64>,
    pub lid_open: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeaterShakerModuleState {
    pub target_temperature: Option<f64>,
    pub target_speed: Option<u32>,
    pub latch_open: Option<bool>,
}

impl HeaterShakerModuleState {
    pub fn is_shaking(&self) -> bool {
        self.target_speed.is_some()
    }
}

/// Operating state of one module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModuleState {
    Temperature(TemperatureModuleState),
    Magnetic(MagneticModuleState),
    Thermocycler(ThermocyclerModuleState),
    HeaterShaker(HeaterShakerModuleState),
}

impl ModuleState {
    /// State of a freshly powered module.
    pub fn initial(model: ModuleModel) -> Self {
        match model.module_type() {
            ModuleType::Temperature => Self::Temperature(TemperatureModuleState {
                status: TemperatureStatus::Deactivated,
                target_temperature: None,
                current_temperature: None,
            }),
            ModuleType::Magnetic => Self::Magnetic(MagneticModuleState {
                engaged: false,
                engage_height: None,
            }),
            ModuleType::Thermocycler => Self::Thermocycler(ThermocyclerModuleState {
                block_target_temperature: None,
                lid_target_temperature: None,
                lid_open: None,
            }),
            ModuleType::HeaterShaker => Self::HeaterShaker(HeaterShakerModuleState {
                target_temperature: None,
                target_speed: None,
                latch_open: None,
            }),
        }
    }

    pub fn module_type(&self) -> ModuleType {
        match self {
            Self::Temperature(_) => ModuleType::Temperature,
            Self::Magnetic(_) => ModuleType::Magnetic,
            Self::Thermocycler(_) => ModuleType::Thermocycler,
            Self::HeaterShaker(_) => ModuleType::HeaterShaker,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TipState {
    /// Whether each pipette currently carries a tip.
    pub pipettes: BTreeMap<PipetteId, bool>,
    /// Tip presence for every well of every tiprack.
    pub tipracks: BTreeMap<LabwareId, Arc<BTreeMap<WellName, bool>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LiquidState {
    pub pipettes: BTreeMap<PipetteId, PipetteLiquidState>,
    pub labware: BTreeMap<LabwareId, Arc<WellLiquidState>>,
}

/// Starting deck layout of a protocol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckSetup {
    pub pipettes: BTreeMap<PipetteId, PipetteMount>,
    pub labware: BTreeMap<LabwareId, LabwareLocation>,
}

/// Snapshot of the simulated robot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub pipettes: BTreeMap<PipetteId, PipetteMount>,
    pub labware: BTreeMap<LabwareId, LabwareLocation>,
    pub modules: BTreeMap<ModuleId, ModuleState>,
    pub tip_state: TipState,
    pub liquid_state: LiquidState,
}

impl RobotState {
    /// Builds the state at the start of a protocol.
    ///
    /// Every tiprack placed on deck starts full, every module starts idle and
    /// every well starts empty. Labware and modules must sit in slots that
    /// exist on the deck.
    pub fn initial(ctx: &EntityContext, setup: &DeckSetup) -> Result<Self, CommandCreatorError> {
        let mut state = RobotState::default();

        for (id, mount) in &setup.pipettes {
            let pipette = ctx.pipette(id)?;
            state.pipettes.insert(id.clone(), *mount);
            state.tip_state.pipettes.insert(id.clone(), false);
            let channels = (0..pipette.spec.channels)
                .map(|c| (c, LocationLiquidState::new()))
                .collect();
            state.liquid_state.pipettes.insert(id.clone(), channels);
        }

        for (id, module) in ctx.modules() {
            module.slot.validate()?;
            state
                .modules
                .insert(id.clone(), ModuleState::initial(module.model));
        }

        for (id, location) in &setup.labware {
            let entity = ctx.labware_entity(id)?;
            match location {
                LabwareLocation::Slot(slot) => {
                    slot.validate()?;
                }
                LabwareLocation::Module(module) => {
                    ctx.module(module)?;
                }
                LabwareLocation::OffDeck => {}
            }
            state.labware.insert(id.clone(), location.clone());
            if entity.def.parameters.is_tiprack {
                let tips = entity.def.wells.keys().map(|w| (w.clone(), true)).collect();
                state.tip_state.tipracks.insert(id.clone(), Arc::new(tips));
            }
            state
                .liquid_state
                .labware
                .insert(id.clone(), Arc::new(WellLiquidState::new()));
        }

        Ok(state)
    }

    /// Returns a copy of this state with `volume` uL of `ingredient` added to a well.
    ///
    /// The well must have room for the added volume.
    pub fn with_well_liquid(
        mut self,
        ctx: &EntityContext,
        labware: &str,
        well: &str,
        ingredient: &str,
        volume: f64,
    ) -> Result<Self, CommandCreatorError> {
        let max_volume = ctx.well(labware, well)?.max_volume;
        if !self.labware.contains_key(labware) {
            return Err(CommandCreatorError::LabwareOffDeck {
                labware: labware.to_string(),
            });
        }
        require_non_negative("seeded volume", volume)?;
        let remaining = max_volume - self.well_volume(labware, well);
        if volume > remaining + ctx.config().volume_tolerance_ul {
            return Err(CommandCreatorError::WellCapacityExceeded {
                labware: labware.to_string(),
                well: well.to_string(),
                requested: volume,
                remaining,
            });
        }
        let wells = self
            .liquid_state
            .labware
            .entry(labware.to_string())
            .or_default();
        *Arc::make_mut(wells)
            .entry(well.to_string())
            .or_default()
            .entry(ingredient.to_string())
            .or_insert(0.0) += volume;
        Ok(self)
    }

    /// Returns a copy of this state with every well of `tiprack` set to `filled`.
    pub fn with_tiprack_filled(mut self, tiprack: &str, filled: bool) -> Self {
        if let Some(tips) = self.tip_state.tipracks.get_mut(tiprack) {
            Arc::make_mut(tips).values_mut().for_each(|t| *t = filled);
        }
        self
    }

    pub fn has_tip(&self, pipette: &str) -> bool {
        self.tip_state.pipettes.get(pipette).copied().unwrap_or(false)
    }

    pub fn tip_present(&self, tiprack: &str, well: &str) -> bool {
        self.tip_state
            .tipracks
            .get(tiprack)
            .and_then(|tips| tips.get(well))
            .copied()
            .unwrap_or(false)
    }

    pub fn well_contents(&self, labware: &str, well: &str) -> Option<&LocationLiquidState> {
        self.liquid_state.labware.get(labware)?.get(well)
    }

    pub fn well_volume(&self, labware: &str, well: &str) -> f64 {
        self.well_contents(labware, well).map_or(0.0, total_volume)
    }

    pub fn channel_contents(&self, pipette: &str, channel: u8) -> Option<&LocationLiquidState> {
        self.liquid_state.pipettes.get(pipette)?.get(&channel)
    }

    /// Volume held by one channel of a pipette.
    pub fn channel_volume(&self, pipette: &str, channel: u8) -> f64 {
        self.channel_contents(pipette, channel)
            .map_or(0.0, total_volume)
    }

    /// Largest volume held by any channel of a pipette.
    pub fn max_channel_volume(&self, pipette: &str) -> f64 {
        self.liquid_state
            .pipettes
            .get(pipette)
            .map_or(0.0, |channels| {
                channels.values().map(total_volume).fold(0.0, f64::max)
            })
    }

    /// The module a labware sits on, if any.
    pub fn module_under_labware(&self, labware: &str) -> Option<&ModuleId> {
        match self.labware.get(labware)? {
            LabwareLocation::Module(module) => Some(module),
            _ => None,
        }
    }

    /// Deck slot of a labware, resolved through the module it sits on.
    pub fn labware_slot(&self, ctx: &EntityContext, labware: &str) -> Option<DeckSlot> {
        match self.labware.get(labware)? {
            LabwareLocation::Slot(slot) => Some(*slot),
            LabwareLocation::Module(module) => ctx.modules().get(module).map(|m| m.slot),
            LabwareLocation::OffDeck => None,
        }
    }

    /// Finds the next tip `pipette` would pick up.
    ///
    /// Tipracks compatible with the pipette are searched in slot order; within
    /// a tiprack wells are taken column by column, front to back. A
    /// multi-channel pipette needs every well under its channels to hold a tip.
    pub fn next_tip(&self, ctx: &EntityContext, pipette: &str) -> Option<(LabwareId, WellName)> {
        let entity = ctx.pipette(pipette).ok()?;
        let channels = entity.spec.channels;

        let mut tipracks: Vec<(DeckSlot, &LabwareId)> = self
            .tip_state
            .tipracks
            .keys()
            .filter(|id| {
                ctx.labware()
                    .get(*id)
                    .is_some_and(|lw| lw.def_uri() == entity.tiprack_def_uri)
            })
            .filter_map(|id| self.labware_slot(ctx, id).map(|slot| (slot, id)))
            .collect();
        tipracks.sort();

        tipracks.into_iter().find_map(|(_, tiprack)| {
            let def = &ctx.labware().get(tiprack)?.def;
            let ordered =
                order_wells(&def.ordering, WellOrder::TopToBottom, WellOrder::LeftToRight).ok()?;
            ordered
                .into_iter()
                .find(|well| {
                    def.wells_for_channels(well, channels).is_some_and(|wells| {
                        wells.iter().all(|w| self.tip_present(tiprack, w))
                    })
                })
                .map(|well| (tiprack.clone(), well))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn initial_state_fills_tipracks_and_empties_wells() {
        let ctx = fixtures::standard_context();
        let state = fixtures::standard_state(&ctx);
        assert!(state.tip_present(fixtures::TIPRACK_1, "A1"));
        assert!(state.tip_present(fixtures::TIPRACK_1, "H12"));
        assert!(!state.has_tip(fixtures::P300_SINGLE));
        assert_eq!(state.well_volume(fixtures::SOURCE_PLATE, "A1"), 0.0);
    }

    #[test]
    fn unknown_labware_in_setup_is_rejected() {
        let ctx = fixtures::standard_context();
        let mut setup = fixtures::standard_deck_setup();
        setup
            .labware
            .insert("ghost".into(), LabwareLocation::Slot(DeckSlot(9)));
        let err = RobotState::initial(&ctx, &setup).expect_err("unknown labware");
        assert_eq!(
            err,
            CommandCreatorError::LabwareDoesNotExist {
                labware: "ghost".into()
            }
        );
    }

    #[test]
    fn labware_and_modules_must_sit_on_the_deck() {
        let ctx = fixtures::standard_context();
        let mut setup = fixtures::standard_deck_setup();
        setup
            .labware
            .insert(fixtures::SOURCE_PLATE.into(), LabwareLocation::Slot(DeckSlot(0)));
        assert_eq!(
            RobotState::initial(&ctx, &setup),
            Err(CommandCreatorError::InvalidDeckSlot { slot: 0 })
        );

        let ctx = EntityContext::builder()
            .module(crate::entity::ModuleEntity {
                id: "lost".into(),
                model: ModuleModel::TemperatureModuleV2,
                slot: DeckSlot(252),
            })
            .build();
        assert_eq!(
            RobotState::initial(&ctx, &DeckSetup::default()),
            Err(CommandCreatorError::InvalidDeckSlot { slot: 252 })
        );
    }

    #[test]
    fn seeding_checks_volume_and_capacity() {
        let ctx = fixtures::standard_context();
        let state = fixtures::standard_state(&ctx);
        for volume in [-1.0, f64::NAN] {
            let err = state
                .clone()
                .with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "A1", "water", volume)
                .expect_err("bad volume");
            assert!(matches!(err, CommandCreatorError::InvalidParameter { .. }));
        }

        let err = state
            .with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "A1", "water", 300.0)
            .and_then(|s| s.with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "A1", "dye", 100.0))
            .expect_err("380 uL well");
        assert_eq!(
            err,
            CommandCreatorError::WellCapacityExceeded {
                labware: fixtures::SOURCE_PLATE.into(),
                well: "A1".into(),
                requested: 100.0,
                remaining: 80.0,
            }
        );
    }

    #[test]
    fn next_tip_walks_columns_then_tipracks() {
        let ctx = fixtures::standard_context();
        let state = fixtures::standard_state(&ctx);
        assert_eq!(
            state.next_tip(&ctx, fixtures::P300_SINGLE),
            Some((fixtures::TIPRACK_1.to_string(), "A1".to_string()))
        );

        let mut used = state.clone().with_tiprack_filled(fixtures::TIPRACK_1, false);
        assert_eq!(
            used.next_tip(&ctx, fixtures::P300_SINGLE),
            Some((fixtures::TIPRACK_2.to_string(), "A1".to_string()))
        );

        used = used.with_tiprack_filled(fixtures::TIPRACK_2, false);
        assert_eq!(used.next_tip(&ctx, fixtures::P300_SINGLE), None);
    }

    #[test]
    fn multichannel_skips_partial_columns() {
        let ctx = fixtures::standard_context();
        let mut state = fixtures::standard_state(&ctx);
        let tips = state
            .tip_state
            .tipracks
            .get_mut(fixtures::TIPRACK_1)
            .expect("tiprack");
        Arc::make_mut(tips).insert("D1".into(), false);
        assert_eq!(
            state.next_tip(&ctx, fixtures::P300_MULTI),
            Some((fixtures::TIPRACK_1.to_string(), "A2".to_string()))
        );
        assert_eq!(
            state.next_tip(&ctx, fixtures::P300_SINGLE),
            Some((fixtures::TIPRACK_1.to_string(), "A1".to_string()))
        );
    }

    #[test]
    fn seeding_liquid_leaves_the_original_untouched() {
        let ctx = fixtures::standard_context();
        let before = fixtures::standard_state(&ctx);
        let after = before
            .clone()
            .with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "A1", "water", 100.0)
            .expect("seed");
        assert_eq!(before.well_volume(fixtures::SOURCE_PLATE, "A1"), 0.0);
        assert_eq!(after.well_volume(fixtures::SOURCE_PLATE, "A1"), 100.0);
    }
}

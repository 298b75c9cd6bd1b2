//! Geometric and adjacency checks guarding pipette access to labware.
//!
//! Every predicate here is pure. A positive result is a hard precondition
//! failure for the command creator that asked: see [`check_pipette_access`].

use bevy_math::bounding::{Aabb2d, IntersectsVolume};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::deck::{DeckSlot, Direction};
use crate::entity::{EntityContext, ModuleEntity, ModuleId, PipetteEntity, PipetteGeneration};
use crate::error::CommandCreatorError;
use crate::state::{LabwareLocation, ModuleState, RobotState};

/// How far (mm) the body of a GEN1 multi-channel pipette reaches toward the
/// front of the deck past the slot it is working in.
pub const GEN1_MULTI_BODY_OVERHANG_MM: f32 = 30.0;

/// Deck area swept by `pipette` while working on labware in `slot`.
///
/// Only GEN1 multi-channel pipettes have a body wide enough to matter; for
/// every other pipette this returns `None`.
pub fn approach_envelope(pipette: &PipetteEntity, slot: DeckSlot) -> Option<Aabb2d> {
    if pipette.spec.generation != PipetteGeneration::Gen1 || !pipette.spec.is_multi_channel() {
        return None;
    }
    let mut envelope = slot.footprint();
    envelope.min.y -= GEN1_MULTI_BODY_OVERHANG_MM;
    Some(envelope)
}

/// Finds a module whose housing the pipette would strike while accessing
/// `labware`. The module carrying the labware is never counted.
pub fn find_module_pipette_collision<'a>(
    pipette: &str,
    labware: &str,
    ctx: &'a EntityContext,
    state: &RobotState,
) -> Option<&'a ModuleEntity> {
    if ctx.config().disable_module_restrictions {
        return None;
    }
    let pipette = ctx.pipettes().get(pipette)?;
    let slot = state.labware_slot(ctx, labware)?;
    let envelope = approach_envelope(pipette, slot)?;
    let carrier = state.module_under_labware(labware);

    ctx.modules().values().find(|module| {
        Some(&module.id) != carrier
            && module.model.capabilities().obstructs_gen1_multichannel
            && envelope.intersects(&module.footprint())
    })
}

/// `true` when the pipette's approach to `labware` intersects a module envelope.
pub fn module_pipette_collision(
    pipette: &str,
    labware: &str,
    ctx: &EntityContext,
    state: &RobotState,
) -> bool {
    find_module_pipette_collision(pipette, labware, ctx, state).is_some()
}

/// The thermocycler blocking access to `labware`, if it sits in one whose lid
/// is closed or in an unknown position.
pub fn find_thermocycler_collision<'a>(
    labware: &str,
    state: &'a RobotState,
) -> Option<&'a ModuleId> {
    let module = state.module_under_labware(labware)?;
    match state.modules.get(module)? {
        ModuleState::Thermocycler(tc) if tc.lid_open != Some(true) => Some(module),
        _ => None,
    }
}

/// `true` when `labware` sits in a thermocycler that is not known to be open.
pub fn thermocycler_pipette_collision(labware: &str, state: &RobotState) -> bool {
    find_thermocycler_collision(labware, state).is_some()
}

/// Reasons a heater-shaker blocks access to a labware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaterShakerConflict {
    /// The labware is on the heater-shaker and its latch is open.
    LatchOpen,
    /// The labware is on the heater-shaker while it shakes.
    Shaking,
    /// The labware is next to a shaking heater-shaker.
    AdjacentShaking,
    /// The labware is east or west of a heater-shaker whose latch is open.
    EastWestOfOpenLatch,
    /// A multi-channel pipette would pass over the heater-shaker to reach a
    /// labware east or west of it.
    EastWestMultiChannel,
    /// A multi-channel pipette would pass over the heater-shaker to reach a
    /// non-tiprack labware north or south of it.
    NorthSouthMultiChannel,
}

impl fmt::Display for HeaterShakerConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::LatchOpen => "labware latch is open",
            Self::Shaking => "module is shaking",
            Self::AdjacentShaking => "adjacent module is shaking",
            Self::EastWestOfOpenLatch => "open latch is in the way",
            Self::EastWestMultiChannel => "multi-channel access east or west of the module",
            Self::NorthSouthMultiChannel => {
                "multi-channel access to non-tiprack labware north or south of the module"
            }
        };
        f.write_str(reason)
    }
}

/// Checks every heater-shaker on deck against an access to `labware`.
pub fn heater_shaker_conflict(
    pipette: &str,
    labware: &str,
    ctx: &EntityContext,
    state: &RobotState,
) -> Option<(ModuleId, HeaterShakerConflict)> {
    let multi_channel = ctx
        .pipettes()
        .get(pipette)
        .is_some_and(|p| p.spec.is_multi_channel());
    let is_tiprack = ctx
        .labware()
        .get(labware)
        .is_some_and(|lw| lw.def.parameters.is_tiprack);
    let labware_slot = state.labware_slot(ctx, labware)?;

    state.modules.iter().find_map(|(id, module_state)| {
        let ModuleState::HeaterShaker(hs) = module_state else {
            return None;
        };
        let latch_open = hs.latch_open == Some(true);

        if matches!(state.labware.get(labware), Some(LabwareLocation::Module(m)) if m == id) {
            if latch_open {
                return Some((id.clone(), HeaterShakerConflict::LatchOpen));
            }
            if hs.is_shaking() {
                return Some((id.clone(), HeaterShakerConflict::Shaking));
            }
            return None;
        }

        let hs_slot = ctx.modules().get(id)?.slot;
        let direction = hs_slot.direction_to(labware_slot)?;
        let east_west = matches!(direction, Direction::East | Direction::West);
        let conflict = if hs.is_shaking() {
            HeaterShakerConflict::AdjacentShaking
        } else if east_west && latch_open {
            HeaterShakerConflict::EastWestOfOpenLatch
        } else if east_west && multi_channel {
            HeaterShakerConflict::EastWestMultiChannel
        } else if !east_west && multi_channel && !is_tiprack {
            HeaterShakerConflict::NorthSouthMultiChannel
        } else {
            return None;
        };
        Some((id.clone(), conflict))
    })
}

/// Verifies that `pipette` may reach into `labware` in the current state.
///
/// Checked in order: the labware is on deck, no module envelope is in the
/// way, no closed thermocycler lid covers it, no heater-shaker blocks it.
pub fn check_pipette_access(
    pipette: &str,
    labware: &str,
    ctx: &EntityContext,
    state: &RobotState,
) -> Result<(), CommandCreatorError> {
    match state.labware.get(labware) {
        None | Some(LabwareLocation::OffDeck) => {
            return Err(CommandCreatorError::LabwareOffDeck {
                labware: labware.to_string(),
            });
        }
        Some(_) => {}
    }
    if let Some(module) = find_module_pipette_collision(pipette, labware, ctx, state) {
        return Err(CommandCreatorError::ModulePipetteCollision {
            pipette: pipette.to_string(),
            labware: labware.to_string(),
            module: module.id.clone(),
        });
    }
    if let Some(module) = find_thermocycler_collision(labware, state) {
        return Err(CommandCreatorError::ThermocyclerLidClosed {
            labware: labware.to_string(),
            module: module.clone(),
        });
    }
    if let Some((module, reason)) = heater_shaker_conflict(pipette, labware, ctx, state) {
        return Err(CommandCreatorError::HeaterShakerCollision {
            pipette: pipette.to_string(),
            labware: labware.to_string(),
            module,
            reason,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::entity::ModuleModel;
    use crate::fixtures;
    use crate::state::{HeaterShakerModuleState, ThermocyclerModuleState};
    use std::sync::Arc;

    #[test]
    fn gen1_multi_behind_tall_module_collides() {
        let ctx = fixtures::context_with_modules();
        let state = fixtures::module_state(&ctx);
        // Temp plate sits in slot 9, directly behind the GEN1 magnetic module in slot 6.
        assert!(module_pipette_collision(
            fixtures::P300_MULTI_GEN1,
            fixtures::TEMP_PLATE,
            &ctx,
            &state
        ));
        assert_eq!(
            find_module_pipette_collision(
                fixtures::P300_MULTI_GEN1,
                fixtures::TEMP_PLATE,
                &ctx,
                &state
            )
            .map(|m| m.id.as_str()),
            Some(fixtures::MAGNETIC_MODULE)
        );
    }

    #[test]
    fn labware_on_the_module_itself_is_reachable() {
        let ctx = fixtures::context_with_modules();
        let state = fixtures::module_state(&ctx);
        assert!(!module_pipette_collision(
            fixtures::P300_MULTI_GEN1,
            fixtures::MAG_PLATE,
            &ctx,
            &state
        ));
    }

    #[test]
    fn labware_in_front_of_the_module_is_reachable() {
        let ctx = fixtures::context_with_modules();
        let state = fixtures::module_state(&ctx);
        // Dest plate in slot 3 is south of slot 6; the envelope extends south only.
        assert!(!module_pipette_collision(
            fixtures::P300_MULTI_GEN1,
            fixtures::DEST_PLATE,
            &ctx,
            &state
        ));
    }

    #[test]
    fn gen2_and_single_channel_pipettes_never_collide() {
        let ctx = fixtures::context_with_modules();
        let state = fixtures::module_state(&ctx);
        for pipette in [fixtures::P300_MULTI, fixtures::P300_SINGLE] {
            assert!(!module_pipette_collision(
                pipette,
                fixtures::TEMP_PLATE,
                &ctx,
                &state
            ));
        }
    }

    #[test]
    fn restrictions_can_be_disabled() {
        let ctx = fixtures::context_with_modules_and_config(SimulationConfig {
            disable_module_restrictions: true,
            ..SimulationConfig::default()
        });
        let state = fixtures::module_state(&ctx);
        assert!(!module_pipette_collision(
            fixtures::P300_MULTI_GEN1,
            fixtures::TEMP_PLATE,
            &ctx,
            &state
        ));
    }

    fn with_tc_lid(state: &RobotState, lid_open: Option<bool>) -> RobotState {
        let mut next = state.clone();
        next.modules.insert(
            fixtures::THERMOCYCLER.into(),
            ModuleState::Thermocycler(ThermocyclerModuleState {
                block_target_temperature: None,
                lid_target_temperature: None,
                lid_open,
            }),
        );
        next
    }

    #[test]
    fn thermocycler_lid_must_be_known_open() {
        let ctx = fixtures::context_with_modules();
        let state = fixtures::module_state(&ctx);
        assert!(thermocycler_pipette_collision(
            fixtures::TC_PLATE,
            &with_tc_lid(&state, None)
        ));
        assert!(thermocycler_pipette_collision(
            fixtures::TC_PLATE,
            &with_tc_lid(&state, Some(false))
        ));
        assert!(!thermocycler_pipette_collision(
            fixtures::TC_PLATE,
            &with_tc_lid(&state, Some(true))
        ));
        assert!(!thermocycler_pipette_collision(
            fixtures::SOURCE_PLATE,
            &state
        ));
    }

    fn heater_shaker_setup(hs: HeaterShakerModuleState) -> (EntityContext, RobotState) {
        let standard = fixtures::standard_context();
        let ctx = EntityContext::builder()
            .pipette(standard.pipette(fixtures::P300_SINGLE).cloned().expect("p300"))
            .pipette(standard.pipette(fixtures::P300_MULTI).cloned().expect("multi"))
            .module(ModuleEntity {
                id: "hs".into(),
                model: ModuleModel::HeaterShakerModuleV1,
                slot: DeckSlot(5),
            })
            .labware("hsPlate", Arc::new(fixtures::plate_96()))
            .labware("eastPlate", Arc::new(fixtures::plate_96()))
            .labware("northPlate", Arc::new(fixtures::plate_96()))
            .labware(
                "southTips",
                Arc::new(fixtures::tiprack(fixtures::TIPRACK_300_URI, 300.0)),
            )
            .build();
        let mut state = RobotState::default();
        state
            .labware
            .insert("hsPlate".into(), LabwareLocation::Module("hs".into()));
        state
            .labware
            .insert("eastPlate".into(), LabwareLocation::Slot(DeckSlot(6)));
        state
            .labware
            .insert("northPlate".into(), LabwareLocation::Slot(DeckSlot(8)));
        state
            .labware
            .insert("southTips".into(), LabwareLocation::Slot(DeckSlot(2)));
        state
            .modules
            .insert("hs".into(), ModuleState::HeaterShaker(hs));
        (ctx, state)
    }

    fn idle_hs() -> HeaterShakerModuleState {
        HeaterShakerModuleState {
            target_temperature: None,
            target_speed: None,
            latch_open: Some(false),
        }
    }

    #[test]
    fn heater_shaker_latch_and_shaking_block_own_labware() {
        let (ctx, state) = heater_shaker_setup(HeaterShakerModuleState {
            latch_open: Some(true),
            ..idle_hs()
        });
        assert_eq!(
            heater_shaker_conflict(fixtures::P300_SINGLE, "hsPlate", &ctx, &state),
            Some(("hs".into(), HeaterShakerConflict::LatchOpen))
        );

        let (ctx, state) = heater_shaker_setup(HeaterShakerModuleState {
            target_speed: Some(500),
            ..idle_hs()
        });
        assert_eq!(
            heater_shaker_conflict(fixtures::P300_SINGLE, "hsPlate", &ctx, &state),
            Some(("hs".into(), HeaterShakerConflict::Shaking))
        );
        assert_eq!(
            heater_shaker_conflict(fixtures::P300_SINGLE, "eastPlate", &ctx, &state),
            Some(("hs".into(), HeaterShakerConflict::AdjacentShaking))
        );
    }

    #[test]
    fn heater_shaker_blocks_multichannel_neighbours() {
        let (ctx, state) = heater_shaker_setup(idle_hs());
        assert_eq!(
            heater_shaker_conflict(fixtures::P300_SINGLE, "eastPlate", &ctx, &state),
            None
        );
        assert_eq!(
            heater_shaker_conflict(fixtures::P300_MULTI, "eastPlate", &ctx, &state),
            Some(("hs".into(), HeaterShakerConflict::EastWestMultiChannel))
        );
        assert_eq!(
            heater_shaker_conflict(fixtures::P300_MULTI, "northPlate", &ctx, &state),
            Some(("hs".into(), HeaterShakerConflict::NorthSouthMultiChannel))
        );
        // Tipracks north or south of the module are fine for a multi-channel.
        assert_eq!(
            heater_shaker_conflict(fixtures::P300_MULTI, "southTips", &ctx, &state),
            None
        );
    }

    #[test]
    fn access_check_reports_off_deck_first() {
        let ctx = fixtures::standard_context();
        let mut state = fixtures::standard_state(&ctx);
        state
            .labware
            .insert(fixtures::SOURCE_PLATE.into(), LabwareLocation::OffDeck);
        assert_eq!(
            check_pipette_access(fixtures::P300_SINGLE, fixtures::SOURCE_PLATE, &ctx, &state),
            Err(CommandCreatorError::LabwareOffDeck {
                labware: fixtures::SOURCE_PLATE.into()
            })
        );
    }
}

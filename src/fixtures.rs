//! Shared entity and state fixtures for tests.
//!
//! Compiled for the crate's own tests and for dependents enabling the
//! `test-support` feature.

use glam::Vec3;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::SimulationConfig;
use crate::deck::DeckSlot;
use crate::entity::{
    EntityContext, EntityContextBuilder, LabwareDefinition, LabwareParameters, ModuleEntity,
    ModuleModel, PipetteEntity, PipetteGeneration, PipetteSpec, WellDefinition, WellName,
    WellShape,
};
use crate::state::{DeckSetup, LabwareLocation, PipetteMount, RobotState};

pub const P300_SINGLE: &str = "p300SingleId";
pub const P300_MULTI: &str = "p300MultiId";
pub const P300_MULTI_GEN1: &str = "p300MultiGen1Id";
pub const P10_SINGLE: &str = "p10SingleId";

pub const TIPRACK_1: &str = "tiprack1Id";
pub const TIPRACK_2: &str = "tiprack2Id";
pub const SOURCE_PLATE: &str = "sourcePlateId";
pub const DEST_PLATE: &str = "destPlateId";
pub const TROUGH: &str = "troughId";
pub const TRASH: &str = "fixedTrash";

pub const MAGNETIC_MODULE: &str = "magneticModuleId";
pub const TEMPERATURE_MODULE: &str = "temperatureModuleId";
pub const THERMOCYCLER: &str = "thermocyclerId";
pub const MAG_PLATE: &str = "magPlateId";
pub const TEMP_PLATE: &str = "tempPlateId";
pub const TC_PLATE: &str = "tcPlateId";
pub const HEATER_SHAKER: &str = "heaterShakerId";
pub const HS_PLATE: &str = "hsPlateId";

pub const TIPRACK_300_URI: &str = "fixture/fixture_tiprack_300_ul/1";
pub const TIPRACK_10_URI: &str = "fixture/fixture_tiprack_10_ul/1";

const ROWS: &str = "ABCDEFGH";

fn grid(
    columns: usize,
    rows: usize,
    pitch: f32,
    max_volume: f64,
    shape: WellShape,
) -> (Vec<Vec<WellName>>, BTreeMap<WellName, WellDefinition>) {
    let mut ordering = Vec::with_capacity(columns);
    let mut wells = BTreeMap::new();
    for col in 0..columns {
        let mut column = Vec::with_capacity(rows);
        for (row, letter) in ROWS.chars().take(rows).enumerate() {
            let name = format!("{letter}{}", col + 1);
            wells.insert(
                name.clone(),
                WellDefinition {
                    position: Vec3::new(
                        14.38 + pitch * col as f32,
                        74.24 - 9.0 * row as f32,
                        10.5,
                    ),
                    depth: 10.5,
                    shape,
                    max_volume,
                },
            );
            column.push(name);
        }
        ordering.push(column);
    }
    (ordering, wells)
}

pub fn plate_96() -> LabwareDefinition {
    let (ordering, wells) = grid(12, 8, 9.0, 380.0, WellShape::Circular { diameter: 6.4 });
    LabwareDefinition {
        uri: "fixture/fixture_96_plate/1".into(),
        display_name: "96 well plate".into(),
        ordering,
        wells,
        parameters: LabwareParameters::default(),
    }
}

pub fn trough_12() -> LabwareDefinition {
    let (ordering, wells) = grid(
        12,
        1,
        9.0,
        3400.0,
        WellShape::Rectangular {
            x_dimension: 8.33,
            y_dimension: 71.88,
        },
    );
    LabwareDefinition {
        uri: "fixture/fixture_12_trough/1".into(),
        display_name: "12 channel trough".into(),
        ordering,
        wells,
        parameters: LabwareParameters::default(),
    }
}

pub fn tiprack(uri: &str, tip_volume: f64) -> LabwareDefinition {
    let (ordering, wells) = grid(12, 8, 9.0, tip_volume, WellShape::Circular { diameter: 5.2 });
    LabwareDefinition {
        uri: uri.into(),
        display_name: format!("{tip_volume} uL tiprack"),
        ordering,
        wells,
        parameters: LabwareParameters {
            is_tiprack: true,
            is_trash: false,
            tip_volume: Some(tip_volume),
        },
    }
}

pub fn trash() -> LabwareDefinition {
    let mut wells = BTreeMap::new();
    wells.insert(
        "A1".to_string(),
        WellDefinition {
            position: Vec3::new(82.84, 80.0, 58.0),
            depth: 0.0,
            shape: WellShape::Rectangular {
                x_dimension: 107.11,
                y_dimension: 165.67,
            },
            max_volume: 1_000_000.0,
        },
    );
    LabwareDefinition {
        uri: "fixture/fixture_trash/1".into(),
        display_name: "Trash".into(),
        ordering: vec![vec!["A1".to_string()]],
        wells,
        parameters: LabwareParameters {
            is_tiprack: false,
            is_trash: true,
            tip_volume: None,
        },
    }
}

fn pipette(
    id: &str,
    name: &str,
    channels: u8,
    min_volume: f64,
    max_volume: f64,
    generation: PipetteGeneration,
    tiprack_def_uri: &str,
) -> PipetteEntity {
    PipetteEntity {
        id: id.into(),
        name: name.into(),
        spec: PipetteSpec {
            channels,
            min_volume,
            max_volume,
            generation,
            default_aspirate_flow_rate: max_volume / 3.0,
            default_dispense_flow_rate: max_volume / 1.5,
            default_blow_out_flow_rate: max_volume / 1.5,
        },
        tiprack_def_uri: tiprack_def_uri.into(),
        tip_max_volume: if tiprack_def_uri == TIPRACK_10_URI {
            10.0
        } else {
            300.0
        },
    }
}

fn standard_builder() -> EntityContextBuilder {
    let plate = Arc::new(plate_96());
    let tips_300 = Arc::new(tiprack(TIPRACK_300_URI, 300.0));
    EntityContext::builder()
        .pipette(pipette(
            P300_SINGLE,
            "p300_single_gen2",
            1,
            20.0,
            300.0,
            PipetteGeneration::Gen2,
            TIPRACK_300_URI,
        ))
        .pipette(pipette(
            P300_MULTI,
            "p300_multi_gen2",
            8,
            20.0,
            300.0,
            PipetteGeneration::Gen2,
            TIPRACK_300_URI,
        ))
        .pipette(pipette(
            P10_SINGLE,
            "p10_single",
            1,
            1.0,
            10.0,
            PipetteGeneration::Gen1,
            TIPRACK_10_URI,
        ))
        .labware(TIPRACK_1, tips_300.clone())
        .labware(TIPRACK_2, tips_300)
        .labware(SOURCE_PLATE, plate.clone())
        .labware(DEST_PLATE, plate)
        .labware(TROUGH, Arc::new(trough_12()))
        .labware(TRASH, Arc::new(trash()))
}

/// Pipettes, two 300 uL tipracks, two plates, a trough and the trash.
pub fn standard_context() -> EntityContext {
    standard_builder().build()
}

pub fn standard_context_with_config(config: SimulationConfig) -> EntityContext {
    standard_builder().config(config).build()
}

pub fn standard_deck_setup() -> DeckSetup {
    let mut setup = DeckSetup::default();
    setup.pipettes.insert(P300_SINGLE.into(), PipetteMount::Left);
    setup.pipettes.insert(P300_MULTI.into(), PipetteMount::Right);
    for (labware, slot) in [
        (TIPRACK_1, 1),
        (SOURCE_PLATE, 2),
        (DEST_PLATE, 3),
        (TROUGH, 4),
        (TIPRACK_2, 5),
        (TRASH, 12),
    ] {
        setup
            .labware
            .insert(labware.into(), LabwareLocation::Slot(DeckSlot(slot)));
    }
    setup
}

/// Initial state for [`standard_context`]: full tipracks, no tips, empty wells.
pub fn standard_state(ctx: &EntityContext) -> RobotState {
    RobotState::initial(ctx, &standard_deck_setup()).expect("standard deck setup")
}

/// [`standard_state`] with `pipette` already holding a tip taken from
/// `tiprack1Id` (A1 for single-channel, column 1 for multi-channel).
pub fn state_with_tip(ctx: &EntityContext, pipette: &str) -> RobotState {
    let mut state = standard_state(ctx);
    let channels = ctx.pipette(pipette).expect("fixture pipette").spec.channels;
    let wells = ctx
        .labware_entity(TIPRACK_1)
        .expect("fixture tiprack")
        .def
        .wells_for_channels("A1", channels)
        .expect("tiprack column");
    let tips = state
        .tip_state
        .tipracks
        .get_mut(TIPRACK_1)
        .expect("tiprack on deck");
    for well in wells {
        Arc::make_mut(tips).insert(well, false);
    }
    state.tip_state.pipettes.insert(pipette.into(), true);
    state
}

/// [`standard_context`] plus a GEN1 8-channel pipette, a magnetic module
/// GEN1 in slot 6, a temperature module GEN2 in slot 9 and a thermocycler in
/// slot 7.
pub fn context_with_modules() -> EntityContext {
    context_with_modules_and_config(SimulationConfig::default())
}

pub fn context_with_modules_and_config(config: SimulationConfig) -> EntityContext {
    let plate = Arc::new(plate_96());
    standard_builder()
        .pipette(pipette(
            P300_MULTI_GEN1,
            "p300_multi",
            8,
            30.0,
            300.0,
            PipetteGeneration::Gen1,
            TIPRACK_300_URI,
        ))
        .module(ModuleEntity {
            id: MAGNETIC_MODULE.into(),
            model: ModuleModel::MagneticModuleV1,
            slot: DeckSlot(6),
        })
        .module(ModuleEntity {
            id: TEMPERATURE_MODULE.into(),
            model: ModuleModel::TemperatureModuleV2,
            slot: DeckSlot(9),
        })
        .module(ModuleEntity {
            id: THERMOCYCLER.into(),
            model: ModuleModel::ThermocyclerModuleV1,
            slot: DeckSlot(7),
        })
        .labware(MAG_PLATE, plate.clone())
        .labware(TEMP_PLATE, plate.clone())
        .labware(TC_PLATE, plate)
        .config(config)
        .build()
}

pub fn module_deck_setup() -> DeckSetup {
    let mut setup = standard_deck_setup();
    setup
        .pipettes
        .insert(P300_MULTI_GEN1.into(), PipetteMount::Left);
    for (labware, module) in [
        (MAG_PLATE, MAGNETIC_MODULE),
        (TEMP_PLATE, TEMPERATURE_MODULE),
        (TC_PLATE, THERMOCYCLER),
    ] {
        setup
            .labware
            .insert(labware.into(), LabwareLocation::Module(module.into()));
    }
    setup
}

/// Initial state for [`context_with_modules`].
pub fn module_state(ctx: &EntityContext) -> RobotState {
    RobotState::initial(ctx, &module_deck_setup()).expect("module deck setup")
}

/// [`standard_context`] plus a heater-shaker in slot 6 carrying a plate.
pub fn context_with_heater_shaker() -> EntityContext {
    standard_builder()
        .module(ModuleEntity {
            id: HEATER_SHAKER.into(),
            model: ModuleModel::HeaterShakerModuleV1,
            slot: DeckSlot(6),
        })
        .labware(HS_PLATE, Arc::new(plate_96()))
        .build()
}

/// Initial state for [`context_with_heater_shaker`].
pub fn heater_shaker_state(ctx: &EntityContext) -> RobotState {
    let mut setup = standard_deck_setup();
    setup
        .labware
        .insert(HS_PLATE.into(), LabwareLocation::Module(HEATER_SHAKER.into()));
    RobotState::initial(ctx, &setup).expect("heater-shaker deck setup")
}

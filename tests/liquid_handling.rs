// tests/liquid_handling.rs
use stepgen::compound::{
    ChangeTip, ConsolidateArgs, DistributeArgs, PipettingOptions, TransferArgs,
};
use stepgen::fixtures;
use stepgen::state::total_volume;
use stepgen::{
    CommandCreatorError, ErrorCategory, RobotState, SequentialIdGenerator, SimulationConfig,
    StepArgs, build_timeline,
};

/// All liquid on the deck, in wells and in tips.
fn deck_volume(state: &RobotState) -> f64 {
    let in_wells: f64 = state
        .liquid_state
        .labware
        .values()
        .flat_map(|wells| wells.values())
        .map(total_volume)
        .sum();
    let in_tips: f64 = state
        .liquid_state
        .pipettes
        .values()
        .flat_map(|channels| channels.values())
        .map(total_volume)
        .sum();
    in_wells + in_tips
}

fn wells(names: &[&str]) -> Vec<String> {
    names.iter().map(|w| w.to_string()).collect()
}

#[test]
fn test_protocol_conserves_liquid() {
    let ctx = fixtures::standard_context();
    let initial = fixtures::standard_state(&ctx)
        .with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "A1", "dye", 350.0)
        .unwrap()
        .with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "B1", "sample", 300.0)
        .unwrap()
        .with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "C1", "sample", 300.0)
        .unwrap()
        .with_well_liquid(&ctx, fixtures::TROUGH, "A1", "water", 2000.0)
        .unwrap();

    let steps = vec![
        StepArgs::Transfer(TransferArgs {
            pipette: fixtures::P300_SINGLE.into(),
            volume: 100.0,
            source_labware: fixtures::SOURCE_PLATE.into(),
            source_wells: wells(&["A1"]),
            dest_labware: fixtures::DEST_PLATE.into(),
            dest_wells: wells(&["A1", "A2", "A3"]),
            change_tip: ChangeTip::Once,
            pre_wet_tip: false,
            options: PipettingOptions::default(),
        }),
        StepArgs::Consolidate(ConsolidateArgs {
            pipette: fixtures::P300_SINGLE.into(),
            volume: 50.0,
            source_labware: fixtures::SOURCE_PLATE.into(),
            source_wells: wells(&["B1", "C1"]),
            dest_labware: fixtures::DEST_PLATE.into(),
            dest_well: "H12".into(),
            change_tip: ChangeTip::Always,
            options: PipettingOptions::default(),
        }),
        StepArgs::Distribute(DistributeArgs {
            pipette: fixtures::P300_SINGLE.into(),
            volume: 40.0,
            source_labware: fixtures::TROUGH.into(),
            source_well: "A1".into(),
            dest_labware: fixtures::DEST_PLATE.into(),
            dest_wells: wells(&["B1", "B2", "B3", "B4", "B5", "B6"]),
            change_tip: ChangeTip::Always,
            disposal_volume: Some(20.0),
            options: PipettingOptions::default(),
        }),
        StepArgs::DropAllTips,
    ];

    let timeline = build_timeline(&steps, &ctx, &initial, &mut SequentialIdGenerator::default());
    assert!(timeline.is_ok(), "{:?}", timeline.errors().collect::<Vec<_>>());

    // Every intermediate snapshot holds the same total volume.
    let expected = deck_volume(&initial);
    for frame in timeline.commands() {
        assert!((deck_volume(&frame.robot_state) - expected).abs() < 1e-6);
    }

    let last = timeline.final_state().unwrap();
    assert!((last.well_volume(fixtures::SOURCE_PLATE, "A1") - 50.0).abs() < 1e-9);
    assert!((last.well_volume(fixtures::DEST_PLATE, "H12") - 100.0).abs() < 1e-9);
    assert!((last.well_volume(fixtures::DEST_PLATE, "B6") - 40.0).abs() < 1e-9);
    assert!((last.well_volume(fixtures::TRASH, "A1") - 20.0).abs() < 1e-9);
    assert!(!last.has_tip(fixtures::P300_SINGLE));
}

#[test]
fn test_multichannel_transfer_moves_whole_columns() {
    let ctx = fixtures::standard_context();
    let mut initial = fixtures::standard_state(&ctx);
    for row in "ABCDEFGH".chars() {
        initial = initial
            .with_well_liquid(&ctx, fixtures::SOURCE_PLATE, &format!("{row}2"), "buffer", 150.0)
            .unwrap();
    }

    let step = StepArgs::Transfer(TransferArgs {
        pipette: fixtures::P300_MULTI.into(),
        volume: 100.0,
        source_labware: fixtures::SOURCE_PLATE.into(),
        source_wells: wells(&["A2"]),
        dest_labware: fixtures::DEST_PLATE.into(),
        dest_wells: wells(&["A5"]),
        change_tip: ChangeTip::Always,
        pre_wet_tip: false,
        options: PipettingOptions::default(),
    });
    let timeline = build_timeline(&[step], &ctx, &initial, &mut SequentialIdGenerator::default());
    assert!(timeline.is_ok());

    let last = timeline.final_state().unwrap();
    for row in "ABCDEFGH".chars() {
        assert_eq!(last.well_volume(fixtures::SOURCE_PLATE, &format!("{row}2")), 50.0);
        assert_eq!(last.well_volume(fixtures::DEST_PLATE, &format!("{row}5")), 100.0);
    }
    // The whole first tip column was taken.
    assert!(!last.tip_present(fixtures::TIPRACK_1, "H1"));
    assert!(last.tip_present(fixtures::TIPRACK_1, "A2"));
}

fn gen1_transfer_into_temp_plate() -> StepArgs {
    StepArgs::Transfer(TransferArgs {
        pipette: fixtures::P300_MULTI_GEN1.into(),
        volume: 50.0,
        source_labware: fixtures::SOURCE_PLATE.into(),
        source_wells: wells(&["A1"]),
        dest_labware: fixtures::TEMP_PLATE.into(),
        dest_wells: wells(&["A1"]),
        change_tip: ChangeTip::Always,
        pre_wet_tip: false,
        options: PipettingOptions::default(),
    })
}

fn seeded_source_column(ctx: &stepgen::EntityContext, state: RobotState) -> RobotState {
    "ABCDEFGH".chars().fold(state, |state, row| {
        state
            .with_well_liquid(ctx, fixtures::SOURCE_PLATE, &format!("{row}1"), "water", 200.0)
            .unwrap()
    })
}

#[test]
fn test_gen1_multichannel_is_blocked_by_module() {
    let ctx = fixtures::context_with_modules();
    let initial = seeded_source_column(&ctx, fixtures::module_state(&ctx));

    let timeline = build_timeline(
        &[gen1_transfer_into_temp_plate()],
        &ctx,
        &initial,
        &mut SequentialIdGenerator::default(),
    );

    let errors: Vec<_> = timeline.errors().collect();
    assert_eq!(errors.len(), 1);
    let (_, error) = errors[0];
    assert_eq!(error.category(), ErrorCategory::Collision);
    assert_eq!(
        *error,
        CommandCreatorError::ModulePipetteCollision {
            pipette: fixtures::P300_MULTI_GEN1.into(),
            labware: fixtures::TEMP_PLATE.into(),
            module: fixtures::MAGNETIC_MODULE.into(),
        }
    );
    // Nothing was aspirated on the way to the failure.
    assert_eq!(timeline.final_state().unwrap(), &initial);
}

#[test]
fn test_module_restrictions_can_be_disabled() {
    let config = SimulationConfig {
        disable_module_restrictions: true,
        ..SimulationConfig::default()
    };
    let ctx = fixtures::context_with_modules_and_config(config);
    let initial = seeded_source_column(&ctx, fixtures::module_state(&ctx));

    let timeline = build_timeline(
        &[gen1_transfer_into_temp_plate()],
        &ctx,
        &initial,
        &mut SequentialIdGenerator::default(),
    );
    assert!(timeline.is_ok());
    assert_eq!(
        timeline
            .final_state()
            .unwrap()
            .well_volume(fixtures::TEMP_PLATE, "H1"),
        50.0
    );
}

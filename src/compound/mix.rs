use serde::{Deserialize, Serialize};

use super::{ChangeTip, Legs, MixOptions, PipettingOptions, blow_out_target, check_mix};
use crate::command::CommandCreatorResult;
use crate::entity::{EntityContext, LabwareId, PipetteId, WellName};
use crate::pipeline::reduce_command_creators;
use crate::state::RobotState;

/// Mixes each listed well in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixArgs {
    pub pipette: PipetteId,
    pub labware: LabwareId,
    pub wells: Vec<WellName>,
    pub volume: f64,
    pub times: u32,
    #[serde(default)]
    pub change_tip: ChangeTip,
    /// Flow rates and offsets, plus touch-tip after dispense and blow-out.
    #[serde(default)]
    pub options: PipettingOptions,
}

pub fn mix(args: &MixArgs, ctx: &EntityContext, state: &RobotState) -> CommandCreatorResult {
    let pipette = ctx.pipette(&args.pipette)?;
    let repetitions = MixOptions {
        volume: args.volume,
        times: args.times,
    };
    check_mix(Some(repetitions))?;

    let options = &args.options;
    let mut legs = Legs::new(pipette, options);
    for (index, well) in args.wells.iter().enumerate() {
        let new_tip = match args.change_tip {
            ChangeTip::Always | ChangeTip::PerSource | ChangeTip::PerDest => true,
            ChangeTip::Once => index == 0,
            ChangeTip::Never => false,
        };
        if new_tip {
            legs.replace_tip();
        }
        legs.mix(&args.labware, well, repetitions);
        if let Some(location) = options.blow_out {
            let here = (&args.labware, well);
            let (labware, target) = blow_out_target(location, ctx, here, here)?;
            legs.blow_out(&labware, &target);
        }
        legs.after_dispense(&args.labware, well);
    }

    reduce_command_creators(&legs.into_vec(), ctx, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::error::CommandCreatorError;
    use crate::fixtures;
    use crate::transition::apply_commands;

    fn args(times: u32) -> MixArgs {
        MixArgs {
            pipette: fixtures::P300_SINGLE.into(),
            labware: fixtures::SOURCE_PLATE.into(),
            wells: vec!["A1".into(), "B1".into()],
            volume: 50.0,
            times,
            change_tip: ChangeTip::Always,
            options: PipettingOptions::default(),
        }
    }

    #[test]
    fn mixing_leaves_volumes_unchanged() {
        let ctx = fixtures::standard_context();
        let state = fixtures::standard_state(&ctx)
            .with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "A1", "cells", 100.0)
            .and_then(|s| s.with_well_liquid(&ctx, fixtures::SOURCE_PLATE, "B1", "cells", 100.0))
            .expect("seed");
        let out = mix(&args(3), &ctx, &state).expect("mix");

        let aspirates = out
            .commands
            .iter()
            .filter(|c| matches!(c, Command::Aspirate(_)))
            .count();
        assert_eq!(aspirates, 6);
        let picks = out
            .commands
            .iter()
            .filter(|c| matches!(c, Command::PickUpTip(_)))
            .count();
        assert_eq!(picks, 2);

        let after = apply_commands(&out.commands, &ctx, &state).expect("apply");
        assert!((after.well_volume(fixtures::SOURCE_PLATE, "A1") - 100.0).abs() < 1e-9);
        assert!((after.well_volume(fixtures::SOURCE_PLATE, "B1") - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_repetitions_is_invalid() {
        let ctx = fixtures::standard_context();
        let state = fixtures::standard_state(&ctx);
        assert!(matches!(
            mix(&args(0), &ctx, &state),
            Err(CommandCreatorError::InvalidParameter { .. })
        ));
    }
}

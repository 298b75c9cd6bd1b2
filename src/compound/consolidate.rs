use serde::{Deserialize, Serialize};

use super::{ChangeTip, Legs, PipettingOptions, blow_out_target, check_mix, require_volume};
use crate::command::CommandCreatorResult;
use crate::entity::{EntityContext, LabwareId, PipetteId, WellName};
use crate::error::CommandCreatorError;
use crate::pipeline::reduce_command_creators;
use crate::state::RobotState;

/// Pools `volume` uL from each of many source wells into one destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateArgs {
    pub pipette: PipetteId,
    pub volume: f64,
    pub source_labware: LabwareId,
    pub source_wells: Vec<WellName>,
    pub dest_labware: LabwareId,
    pub dest_well: WellName,
    #[serde(default)]
    pub change_tip: ChangeTip,
    #[serde(default)]
    pub options: PipettingOptions,
}

/// Aspirates from as many sources as fit in the tip, then dispenses the lot.
pub fn consolidate(
    args: &ConsolidateArgs,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let pipette = ctx.pipette(&args.pipette)?;
    require_volume(args.volume)?;
    check_mix(args.options.mix_before_aspirate)?;
    check_mix(args.options.mix_after_dispense)?;

    let capacity = pipette.max_volume_with_tip();
    let per_chunk = (capacity / args.volume).floor() as usize;
    if per_chunk == 0 {
        return Err(CommandCreatorError::TipVolumeExceeded {
            pipette: args.pipette.clone(),
            requested: args.volume,
            capacity,
        });
    }

    let options = &args.options;
    let mut legs = Legs::new(pipette, options);
    for (index, chunk) in args.source_wells.chunks(per_chunk).enumerate() {
        let new_tip = match args.change_tip {
            ChangeTip::Always | ChangeTip::PerSource | ChangeTip::PerDest => true,
            ChangeTip::Once => index == 0,
            ChangeTip::Never => false,
        };
        if new_tip {
            legs.replace_tip();
        }
        for (position, source) in chunk.iter().enumerate() {
            // Only an empty tip can mix without contaminating the source.
            if let (0, Some(mix)) = (position, options.mix_before_aspirate) {
                legs.mix(&args.source_labware, source, mix);
            }
            legs.aspirate(&args.source_labware, source, args.volume);
            legs.after_aspirate(&args.source_labware, source);
        }

        legs.dispense(&args.dest_labware, &args.dest_well, args.volume * chunk.len() as f64);
        legs.after_dispense(&args.dest_labware, &args.dest_well);
        if let Some(mix) = options.mix_after_dispense {
            legs.mix(&args.dest_labware, &args.dest_well, mix);
        }
        if let (Some(location), Some(last)) = (options.blow_out, chunk.last()) {
            let (labware, well) = blow_out_target(
                location,
                ctx,
                (&args.source_labware, last),
                (&args.dest_labware, &args.dest_well),
            )?;
            legs.blow_out(&labware, &well);
        }
    }

    reduce_command_creators(&legs.into_vec(), ctx, state)
}

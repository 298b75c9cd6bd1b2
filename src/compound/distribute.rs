use serde::{Deserialize, Serialize};

use super::{
    BlowOutLocation, ChangeTip, Legs, PipettingOptions, blow_out_target, check_mix,
    require_volume,
};
use crate::command::CommandCreatorResult;
use crate::creators;
use crate::entity::{EntityContext, LabwareId, PipetteId, WellName};
use crate::error::CommandCreatorError;
use crate::pipeline::reduce_command_creators;
use crate::state::RobotState;

/// Splits liquid from one source well into `volume` uL portions across many
/// destination wells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeArgs {
    pub pipette: PipetteId,
    pub volume: f64,
    pub source_labware: LabwareId,
    pub source_well: WellName,
    pub dest_labware: LabwareId,
    pub dest_wells: Vec<WellName>,
    #[serde(default)]
    pub change_tip: ChangeTip,
    /// Extra volume drawn with every aspirate and blown out afterwards.
    #[serde(default)]
    pub disposal_volume: Option<f64>,
    #[serde(default)]
    pub options: PipettingOptions,
}

/// Fills the tip once per group of destinations and dispenses into each.
///
/// The disposal volume is blown out at the configured location (the trash
/// when none is set) after every group. Mixing after dispense is ignored,
/// since the tip still holds liquid for the remaining wells.
pub fn distribute(
    args: &DistributeArgs,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let pipette = ctx.pipette(&args.pipette)?;
    require_volume(args.volume)?;
    check_mix(args.options.mix_before_aspirate)?;
    let disposal = args.disposal_volume.unwrap_or(0.0);
    creators::require_non_negative("disposal volume", disposal)?;

    let capacity = pipette.max_volume_with_tip();
    let per_chunk = ((capacity - disposal) / args.volume).floor().max(0.0) as usize;
    if per_chunk == 0 {
        return Err(CommandCreatorError::TipVolumeExceeded {
            pipette: args.pipette.clone(),
            requested: args.volume + disposal,
            capacity,
        });
    }

    let options = &args.options;
    let mut legs = Legs::new(pipette, options);
    for (index, chunk) in args.dest_wells.chunks(per_chunk).enumerate() {
        let new_tip = match args.change_tip {
            ChangeTip::Always | ChangeTip::PerDest => true,
            ChangeTip::Once | ChangeTip::PerSource => index == 0,
            ChangeTip::Never => false,
        };
        if new_tip {
            legs.replace_tip();
        }
        if let Some(mix) = options.mix_before_aspirate {
            legs.mix(&args.source_labware, &args.source_well, mix);
        }
        let total = args.volume * chunk.len() as f64 + disposal;
        legs.aspirate(&args.source_labware, &args.source_well, total);
        legs.after_aspirate(&args.source_labware, &args.source_well);
        for dest in chunk {
            legs.dispense(&args.dest_labware, dest, args.volume);
            legs.after_dispense(&args.dest_labware, dest);
        }

        let location = match (options.blow_out, disposal > 0.0) {
            (Some(location), _) => Some(location),
            (None, true) => Some(BlowOutLocation::Trash),
            (None, false) => None,
        };
        if let (Some(location), Some(last)) = (location, chunk.last()) {
            let (labware, well) = blow_out_target(
                location,
                ctx,
                (&args.source_labware, &args.source_well),
                (&args.dest_labware, last),
            )?;
            legs.blow_out(&labware, &well);
        }
    }

    reduce_command_creators(&legs.into_vec(), ctx, state)
}

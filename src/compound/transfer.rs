use serde::{Deserialize, Serialize};

use super::{ChangeTip, Legs, PipettingOptions, blow_out_target, check_mix, require_volume};
use crate::command::CommandCreatorResult;
use crate::entity::{EntityContext, LabwareId, PipetteId, WellName};
use crate::error::CommandCreatorError;
use crate::pipeline::reduce_command_creators;
use crate::state::RobotState;

/// Moves `volume` uL from each source well to its paired destination well.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferArgs {
    pub pipette: PipetteId,
    pub volume: f64,
    pub source_labware: LabwareId,
    pub source_wells: Vec<WellName>,
    pub dest_labware: LabwareId,
    pub dest_wells: Vec<WellName>,
    #[serde(default)]
    pub change_tip: ChangeTip,
    /// Aspirate and dispense back into the source once per fresh tip.
    #[serde(default)]
    pub pre_wet_tip: bool,
    #[serde(default)]
    pub options: PipettingOptions,
}

/// Most aspirations a single well pair may be split into.
pub const MAX_VOLUME_CHUNKS: usize = 1000;

/// Splits `volume` into aspirations no larger than `max`.
///
/// All chunks are `max` except the last. If the last would fall below `min`,
/// it is merged with the one before and the two are split evenly instead.
/// Volumes needing more than [`MAX_VOLUME_CHUNKS`] aspirations are rejected.
pub fn split_volume(volume: f64, max: f64, min: f64) -> Result<Vec<f64>, CommandCreatorError> {
    if volume <= max || max <= 0.0 {
        return Ok(vec![volume]);
    }
    let needed = (volume / max).ceil();
    if !needed.is_finite() || needed > MAX_VOLUME_CHUNKS as f64 {
        return Err(CommandCreatorError::InvalidParameter {
            message: format!(
                "volume {volume} uL needs more than {MAX_VOLUME_CHUNKS} aspirations of {max} uL"
            ),
        });
    }
    let count = needed as usize;
    let remainder = volume - max * (count - 1) as f64;
    let mut chunks = vec![max; count - 1];
    if remainder < min {
        chunks.pop();
        let even = (max + remainder) / 2.0;
        chunks.extend([even, even]);
    } else {
        chunks.push(remainder);
    }
    Ok(chunks)
}

/// Pairs sources with destinations. One well on either side is reused for
/// every well on the other.
fn pair_wells<'a>(
    sources: &'a [WellName],
    dests: &'a [WellName],
) -> Result<Vec<(&'a WellName, &'a WellName)>, CommandCreatorError> {
    match (sources, dests) {
        _ if sources.len() == dests.len() => Ok(sources.iter().zip(dests).collect()),
        ([source], _) if !dests.is_empty() => Ok(dests.iter().map(|d| (source, d)).collect()),
        (_, [dest]) if !sources.is_empty() => Ok(sources.iter().map(|s| (s, dest)).collect()),
        _ => Err(CommandCreatorError::MismatchedWellCount {
            source_count: sources.len(),
            dest_count: dests.len(),
        }),
    }
}

pub fn transfer(
    args: &TransferArgs,
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let pipette = ctx.pipette(&args.pipette)?;
    require_volume(args.volume)?;
    check_mix(args.options.mix_before_aspirate)?;
    check_mix(args.options.mix_after_dispense)?;
    let pairs = pair_wells(&args.source_wells, &args.dest_wells)?;
    let chunks = split_volume(
        args.volume,
        pipette.max_volume_with_tip(),
        pipette.spec.min_volume,
    )?;

    let options = &args.options;
    let mut legs = Legs::new(pipette, options);
    let mut previous: Option<(&WellName, &WellName)> = None;

    for (source, dest) in pairs {
        for &chunk in &chunks {
            let first = previous.is_none();
            let new_tip = match args.change_tip {
                ChangeTip::Always => true,
                ChangeTip::Once => first,
                ChangeTip::Never => false,
                ChangeTip::PerSource => previous.is_none_or(|(s, _)| s != source),
                ChangeTip::PerDest => previous.is_none_or(|(_, d)| d != dest),
            };
            previous = Some((source, dest));

            if new_tip {
                legs.replace_tip();
            }
            if args.pre_wet_tip && (new_tip || first) {
                legs.aspirate(&args.source_labware, source, chunk);
                legs.dispense(&args.source_labware, source, chunk);
            }
            if let Some(mix) = options.mix_before_aspirate {
                legs.mix(&args.source_labware, source, mix);
            }
            legs.aspirate(&args.source_labware, source, chunk);
            legs.after_aspirate(&args.source_labware, source);
            legs.dispense(&args.dest_labware, dest, chunk);
            legs.after_dispense(&args.dest_labware, dest);
            if let Some(mix) = options.mix_after_dispense {
                legs.mix(&args.dest_labware, dest, mix);
            }
            if let Some(location) = options.blow_out {
                let (labware, well) = blow_out_target(
                    location,
                    ctx,
                    (&args.source_labware, source),
                    (&args.dest_labware, dest),
                )?;
                legs.blow_out(&labware, &well);
            }
        }
    }

    reduce_command_creators(&legs.into_vec(), ctx, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::compound::{BlowOutLocation, MixOptions};
    use crate::fixtures;
    use crate::transition::apply_commands;

    fn args(volume: f64, sources: &[&str], dests: &[&str]) -> TransferArgs {
        TransferArgs {
            pipette: fixtures::P300_SINGLE.into(),
            volume,
            source_labware: fixtures::TROUGH.into(),
            source_wells: sources.iter().map(|w| w.to_string()).collect(),
            dest_labware: fixtures::TROUGH.into(),
            dest_wells: dests.iter().map(|w| w.to_string()).collect(),
            change_tip: ChangeTip::Always,
            pre_wet_tip: false,
            options: PipettingOptions::default(),
        }
    }

    fn kinds(commands: &[Command]) -> Vec<&'static str> {
        commands
            .iter()
            .map(|c| match c {
                Command::Aspirate(_) => "aspirate",
                Command::Dispense(_) => "dispense",
                Command::PickUpTip(_) => "pickUpTip",
                Command::DropTip(_) => "dropTip",
                Command::BlowOut(_) => "blowOut",
                Command::TouchTip(_) => "touchTip",
                Command::Delay(_) => "delay",
                _ => "module",
            })
            .collect()
    }

    fn seeded(ctx: &EntityContext) -> RobotState {
        fixtures::standard_state(ctx)
            .with_well_liquid(ctx, fixtures::TROUGH, "A1", "water", 2000.0)
            .expect("seed")
    }

    #[test]
    fn split_volume_averages_a_small_remainder() {
        let split = |volume| split_volume(volume, 300.0, 20.0).expect("split");
        assert_eq!(split(250.0), vec![250.0]);
        assert_eq!(split(600.0), vec![300.0, 300.0]);
        assert_eq!(split(700.0), vec![300.0, 300.0, 100.0]);
        assert_eq!(split(610.0), vec![300.0, 155.0, 155.0]);
    }

    #[test]
    fn huge_volumes_are_rejected_before_splitting() {
        assert_eq!(split_volume(300_000.0, 300.0, 20.0).expect("split").len(), 1000);
        assert!(matches!(
            split_volume(1e13, 300.0, 20.0),
            Err(CommandCreatorError::InvalidParameter { .. })
        ));

        let ctx = fixtures::standard_context();
        let state = seeded(&ctx);
        let err = transfer(&args(1e13, &["A1"], &["A2"]), &ctx, &state).expect_err("too large");
        assert!(matches!(err, CommandCreatorError::InvalidParameter { .. }));
    }

    #[test]
    fn large_volumes_are_chunked_with_a_fresh_tip_each_time() {
        let ctx = fixtures::standard_context();
        let state = seeded(&ctx);
        let out = transfer(&args(500.0, &["A1"], &["A2"]), &ctx, &state).expect("transfer");
        assert_eq!(
            kinds(&out.commands),
            [
                "pickUpTip", "aspirate", "dispense", "dropTip", "pickUpTip", "aspirate",
                "dispense"
            ]
        );
        let after = apply_commands(&out.commands, &ctx, &state).expect("apply");
        assert!((after.well_volume(fixtures::TROUGH, "A1") - 1500.0).abs() < 1e-9);
        assert!((after.well_volume(fixtures::TROUGH, "A2") - 500.0).abs() < 1e-9);
    }

    #[test]
    fn change_tip_once_keeps_one_tip() {
        let ctx = fixtures::standard_context();
        let state = seeded(&ctx);
        let mut once = args(100.0, &["A1"], &["A2", "A3", "A4"]);
        once.change_tip = ChangeTip::Once;
        let out = transfer(&once, &ctx, &state).expect("transfer");
        let picks = kinds(&out.commands)
            .into_iter()
            .filter(|k| *k == "pickUpTip")
            .count();
        assert_eq!(picks, 1);
        assert_eq!(out.commands.len(), 7);
    }

    #[test]
    fn change_tip_never_requires_an_attached_tip() {
        let ctx = fixtures::standard_context();
        let state = seeded(&ctx);
        let mut never = args(100.0, &["A1"], &["A2"]);
        never.change_tip = ChangeTip::Never;
        let err = transfer(&never, &ctx, &state).expect_err("no tip");
        assert!(matches!(err, CommandCreatorError::NoTipOnPipette { .. }));
    }

    #[test]
    fn mismatched_well_lists_are_rejected() {
        let ctx = fixtures::standard_context();
        let state = seeded(&ctx);
        let err = transfer(&args(50.0, &["A1", "A2"], &["A3", "A4", "A5"]), &ctx, &state)
            .expect_err("2 vs 3");
        assert_eq!(
            err,
            CommandCreatorError::MismatchedWellCount {
                source_count: 2,
                dest_count: 3
            }
        );
    }

    #[test]
    fn options_add_mix_touch_tip_and_blow_out() {
        let ctx = fixtures::standard_context();
        let state = seeded(&ctx);
        let mut full = args(100.0, &["A1"], &["A2"]);
        full.options = PipettingOptions {
            touch_tip_after_aspirate: true,
            mix_after_dispense: Some(MixOptions {
                volume: 50.0,
                times: 2,
            }),
            blow_out: Some(BlowOutLocation::Trash),
            ..PipettingOptions::default()
        };
        let out = transfer(&full, &ctx, &state).expect("transfer");
        assert_eq!(
            kinds(&out.commands),
            [
                "pickUpTip", "aspirate", "touchTip", "dispense", "aspirate", "dispense",
                "aspirate", "dispense", "blowOut"
            ]
        );
    }

    #[test]
    fn a_failing_leg_discards_the_whole_transfer() {
        let ctx = fixtures::standard_context();
        let state = fixtures::standard_state(&ctx)
            .with_well_liquid(&ctx, fixtures::TROUGH, "A1", "water", 150.0)
            .expect("seed");
        let err = transfer(&args(100.0, &["A1"], &["A2", "A3"]), &ctx, &state)
            .expect_err("second aspirate runs dry");
        assert!(matches!(err, CommandCreatorError::InsufficientWellVolume { .. }));
    }
}

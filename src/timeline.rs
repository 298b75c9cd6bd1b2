//! The timeline: a whole protocol run step by step.
//!
//! Each step is evaluated against the state left by the last step that
//! succeeded. A failing step is recorded with its error and contributes no
//! commands, but later steps still run, so one bad step does not hide
//! problems further down the protocol.

use tracing::{info, warn};

use crate::command::{Command, Warning};
use crate::entity::EntityContext;
use crate::error::CommandCreatorError;
use crate::pipeline::CurriedCommandCreator;
use crate::state::RobotState;
use crate::step::StepArgs;
use crate::transition::next_robot_state;

/// Source of command keys.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Yields `prefix0`, `prefix1`, ...
#[derive(Clone, Debug, Default)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: u64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

/// A command with its key and the state right after it.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandFrame {
    pub key: String,
    pub command: Command,
    pub robot_state: RobotState,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepFrame {
    pub step_index: usize,
    pub commands: Vec<CommandFrame>,
    /// State after the step, or the last good state if it failed.
    pub robot_state: RobotState,
    pub warnings: Vec<Warning>,
    pub error: Option<CommandCreatorError>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    pub frames: Vec<StepFrame>,
}

impl Timeline {
    /// Failed steps with their errors, in step order.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &CommandCreatorError)> {
        self.frames
            .iter()
            .filter_map(|f| f.error.as_ref().map(|e| (f.step_index, e)))
    }

    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn final_state(&self) -> Option<&RobotState> {
        self.frames.last().map(|f| &f.robot_state)
    }

    /// Every emitted command in run order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandFrame> {
        self.frames.iter().flat_map(|f| f.commands.iter())
    }
}

/// Evaluates every step in order, starting from `initial`.
pub fn command_creators_timeline(
    steps: &[CurriedCommandCreator],
    ctx: &EntityContext,
    initial: &RobotState,
    ids: &mut dyn IdGenerator,
) -> Timeline {
    let mut last_good = initial.clone();
    let mut frames = Vec::with_capacity(steps.len());

    for (step_index, creator) in steps.iter().enumerate() {
        match run_step(creator, ctx, &last_good) {
            Ok((snapshots, warnings)) => {
                for warning in &warnings {
                    warn!(step_index, ?warning, "step raised a warning");
                }
                if let Some((_, state)) = snapshots.last() {
                    last_good = state.clone();
                }
                let commands: Vec<CommandFrame> = snapshots
                    .into_iter()
                    .map(|(command, robot_state)| CommandFrame {
                        key: ids.next_id(),
                        command,
                        robot_state,
                    })
                    .collect();
                info!(step_index, commands = commands.len(), "step complete");
                frames.push(StepFrame {
                    step_index,
                    commands,
                    robot_state: last_good.clone(),
                    warnings,
                    error: None,
                });
            }
            Err(error) => {
                warn!(step_index, %error, category = ?error.category(), "step failed");
                frames.push(StepFrame {
                    step_index,
                    commands: Vec::new(),
                    robot_state: last_good.clone(),
                    warnings: Vec::new(),
                    error: Some(error),
                });
            }
        }
    }

    Timeline { frames }
}

/// Maps step parameter objects to creators and runs them as a timeline.
pub fn build_timeline(
    steps: &[StepArgs],
    ctx: &EntityContext,
    initial: &RobotState,
    ids: &mut dyn IdGenerator,
) -> Timeline {
    let creators: Vec<CurriedCommandCreator> =
        steps.iter().cloned().map(StepArgs::into_creator).collect();
    command_creators_timeline(&creators, ctx, initial, ids)
}

type StepOutput = (Vec<(Command, RobotState)>, Vec<Warning>);

fn run_step(
    creator: &CurriedCommandCreator,
    ctx: &EntityContext,
    state: &RobotState,
) -> Result<StepOutput, CommandCreatorError> {
    let out = creator(ctx, state)?;
    let mut current = state.clone();
    let mut snapshots = Vec::with_capacity(out.commands.len());
    for command in out.commands {
        current = next_robot_state(&command, ctx, &current)?;
        snapshots.push((command, current.clone()));
    }
    Ok((snapshots, out.warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandsAndWarnings, DelayParams};
    use crate::pipeline::curry_command_creator;
    use crate::fixtures;

    #[test]
    fn sequential_ids_are_deterministic() {
        let mut ids = SequentialIdGenerator::new("cmd-");
        assert_eq!(ids.next_id(), "cmd-0");
        assert_eq!(ids.next_id(), "cmd-1");
    }

    #[test]
    fn empty_steps_still_produce_frames() {
        let ctx = fixtures::standard_context();
        let state = fixtures::standard_state(&ctx);
        let nothing = curry_command_creator(
            |_: &(), _: &EntityContext, _: &RobotState| Ok(CommandsAndWarnings::default()),
            (),
        );
        let pause = curry_command_creator(
            crate::creators::delay,
            DelayParams {
                wait_for_resume: true,
                seconds: None,
                message: None,
            },
        );
        let timeline = command_creators_timeline(
            &[nothing, pause],
            &ctx,
            &state,
            &mut SequentialIdGenerator::default(),
        );
        assert!(timeline.is_ok());
        assert_eq!(timeline.frames.len(), 2);
        assert!(timeline.frames[0].commands.is_empty());
        assert_eq!(timeline.frames[0].robot_state, state);
        let keys: Vec<&str> = timeline.commands().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["0"]);
    }
}

use crate::command::{Command, CommandCreatorResult, CommandsAndWarnings, DelayParams};
use crate::entity::EntityContext;
use crate::error::CommandCreatorError;
use crate::state::RobotState;

/// Pauses the run, either for a fixed time or until the operator resumes it.
pub fn delay(
    args: &DelayParams,
    _ctx: &EntityContext,
    _state: &RobotState,
) -> CommandCreatorResult {
    match args.seconds {
        Some(seconds) => super::require_non_negative("delay", seconds)?,
        None if !args.wait_for_resume => {
            return Err(CommandCreatorError::InvalidParameter {
                message: "a delay needs a duration unless it waits for resume".into(),
            });
        }
        None => {}
    }
    Ok(CommandsAndWarnings::single(Command::Delay(args.clone())))
}

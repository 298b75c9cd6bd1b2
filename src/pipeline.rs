//! Currying and reduction of command creators.
//!
//! A creator bound to its arguments becomes a [`CurriedCommandCreator`], a
//! function of the entity context and the current state alone. Compound
//! operations are lists of curried creators folded together by
//! [`reduce_command_creators`].

use tracing::debug;

use crate::command::{CommandCreatorResult, CommandsAndWarnings};
use crate::entity::EntityContext;
use crate::state::RobotState;
use crate::transition::next_robot_state;

/// A command creator with its arguments already bound.
pub type CurriedCommandCreator =
    Box<dyn Fn(&EntityContext, &RobotState) -> CommandCreatorResult + Send + Sync>;

/// Binds `args` to `creator`.
pub fn curry_command_creator<A, F>(creator: F, args: A) -> CurriedCommandCreator
where
    A: Send + Sync + 'static,
    F: Fn(&A, &EntityContext, &RobotState) -> CommandCreatorResult + Send + Sync + 'static,
{
    Box::new(move |ctx: &EntityContext, state: &RobotState| creator(&args, ctx, state))
}

/// Runs `creators` left to right, feeding each one the state produced by the
/// commands of all earlier ones.
///
/// The first error aborts the whole chain: it is returned as-is and none of
/// the commands gathered so far are.
pub fn reduce_command_creators(
    creators: &[CurriedCommandCreator],
    ctx: &EntityContext,
    state: &RobotState,
) -> CommandCreatorResult {
    let mut current = state.clone();
    let mut out = CommandsAndWarnings::default();

    for (index, creator) in creators.iter().enumerate() {
        let next = creator(ctx, &current).inspect_err(|error| {
            debug!(index, %error, "command creator failed, aborting chain");
        })?;
        for command in &next.commands {
            current = next_robot_state(command, ctx, &current)?;
        }
        out.commands.extend(next.commands);
        out.warnings.extend(next.warnings);
    }

    debug!(
        creators = creators.len(),
        commands = out.commands.len(),
        warnings = out.warnings.len(),
        "reduced command creators"
    );
    Ok(out)
}

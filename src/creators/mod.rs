//! Atomic command creators.
//!
//! Each creator validates its arguments against the entity context and the
//! current robot state, then emits one command (occasionally none, or a few
//! for the tip helpers). Creators never modify the state they are given.

mod misc;
mod modules;
mod pipetting;
mod tips;

pub use misc::delay;
pub use modules::{
    await_block_temperature, await_heater_shaker_temperature, await_lid_temperature,
    await_profile_complete, await_temperature, close_latch, close_lid, deactivate_block,
    deactivate_heater, deactivate_lid, deactivate_shaker, deactivate_temperature,
    disengage_magnet, engage_magnet, open_latch, open_lid, run_profile, set_block_temperature,
    set_heater_shaker_temperature, set_lid_temperature, set_shake_speed, set_temperature,
};
pub use pipetting::{aspirate, blow_out, dispense, touch_tip};
pub use tips::{ReplaceTipArgs, drop_all_tips, drop_tip, pick_up_tip, replace_tip};

use crate::error::CommandCreatorError;
use crate::state::RobotState;

fn require_tip(pipette: &str, state: &RobotState) -> Result<(), CommandCreatorError> {
    if state.has_tip(pipette) {
        Ok(())
    } else {
        Err(CommandCreatorError::NoTipOnPipette {
            pipette: pipette.to_string(),
        })
    }
}

pub(crate) fn require_non_negative(name: &str, value: f64) -> Result<(), CommandCreatorError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CommandCreatorError::InvalidParameter {
            message: format!("{name} must be a non-negative number, got {value}"),
        })
    }
}

pub(crate) fn require_positive(name: &str, value: f64) -> Result<(), CommandCreatorError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CommandCreatorError::InvalidParameter {
            message: format!("{name} must be a positive number, got {value}"),
        })
    }
}

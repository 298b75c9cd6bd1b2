//! # stepgen
//!
//! A deterministic step-generation engine for liquid-handling robots.
//!
//! High-level protocol steps (transfer, consolidate, distribute, mix, module
//! actions) are expanded into ordered sequences of atomic robot commands
//! while the simulated robot state (tips, per-well liquids, module settings)
//! is carried from command to command. Anything physically impossible or
//! unsafe, from aspirating an empty well to steering a pipette into a module,
//! is reported as a typed error before a single command is emitted.
//!
//! The building blocks, leaves first:
//!
//! - [`EntityContext`]: the pipettes, labware and modules of a run. Immutable.
//! - [`RobotState`]: a value snapshot of the robot.
//! - [`creators`]: atomic command creators, `fn(&Args, &EntityContext, &RobotState)`.
//! - [`next_robot_state`]: the pure transition function.
//! - [`pipeline`]: currying and reduction of creators into compound operations.
//! - [`compound`]: transfer, consolidate, distribute, mix and module steps.
//! - [`timeline`]: a whole protocol, step by step, with per-command snapshots.

pub mod collision;
pub mod command;
pub mod compound;
pub mod config;
pub mod creators;
pub mod deck;
pub mod entity;
pub mod error;
pub mod ordering;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod timeline;
pub mod transition;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use command::{Command, CommandCreatorResult, CommandsAndWarnings, Warning};
pub use config::SimulationConfig;
pub use entity::{EntityContext, EntityContextBuilder};
pub use error::{CommandCreatorError, ConfigError, ErrorCategory, TransitionError};
pub use ordering::{WellOrder, order_wells};
pub use pipeline::{CurriedCommandCreator, curry_command_creator, reduce_command_creators};
pub use state::{DeckSetup, RobotState};
pub use step::StepArgs;
pub use timeline::{
    IdGenerator, SequentialIdGenerator, Timeline, build_timeline, command_creators_timeline,
};
pub use transition::next_robot_state;

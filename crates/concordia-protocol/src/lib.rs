//! Shared data types for the Concordia turn orchestration engine.
//!
//! Everything here is plain serializable data exchanged between the engine
//! and its collaborators (session layer, AI, simulation).

mod command;
mod diplomacy;
mod event;
mod ids;
mod types;
mod victory;

pub use crate::command::*;
pub use crate::diplomacy::*;
pub use crate::event::*;
pub use crate::ids::*;
pub use crate::types::*;
pub use crate::victory::*;

//! Concordia server
//!
//! Authoritative turn, phase and diplomacy orchestration for multiplayer
//! strategy games. The engine owns the game lifecycle, decides when phases
//! end and keeps the pairwise treaty table; the world itself is reached
//! through the hook traits in [`hooks`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod game;
pub mod headless;
pub mod hooks;
pub mod players;

pub use config::GameConfig;
pub use dispatch::{Disposition, InputDispatcher, InputHandle};
pub use error::{
    ConfigError, FatalError, HookError, LoadError, RegistryError, StartError, TreatyError,
};
pub use game::{DiplomacyTable, TurnController, TurnOutcome, Upset};
pub use headless::HeadlessWorld;
pub use hooks::{AiEngine, Hooks, Persistence, Simulation, Vision};
pub use players::{Player, PlayerRegistry, PlayerStatus};

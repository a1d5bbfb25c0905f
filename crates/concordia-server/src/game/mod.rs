//! Turn, phase and diplomacy orchestration.

mod calendar;
mod diplomacy;
mod environment;
mod phase;
mod readiness;
mod turn;
mod victory;

pub use calendar::year_for_turn;
pub use diplomacy::DiplomacyTable;
pub use environment::{Upset, UpsetTracker};
pub use phase::{active_players, phase_count, PhaseDriver};
pub use readiness::{phase_done, ReadinessInput};
pub use turn::{TurnController, TurnOutcome};
pub use victory::{check_victory, VictoryInputs};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level server state.
///
/// `Initial -> Running -> Over -> Initial`. No turn or phase processing
/// happens outside `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GameState {
    /// Lobby: players join and ready up
    #[default]
    Initial,
    /// Turns are being played
    Running,
    /// A victory condition fired or the operator ended the game
    Over,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameState::Initial => "initial",
            GameState::Running => "running",
            GameState::Over => "over",
        };
        f.write_str(name)
    }
}

/// How the players of a turn are split into phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMode {
    /// One phase, everybody moves at once
    #[default]
    Concurrent,
    /// One phase per player slot
    PlayersAlternate,
    /// One phase per team
    TeamsAlternate,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase mode `{0}` (expected concurrent, players_alternate or teams_alternate)")]
pub struct UnknownPhaseMode(pub String);

impl FromStr for PhaseMode {
    type Err = UnknownPhaseMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "concurrent" => Ok(PhaseMode::Concurrent),
            "players_alternate" | "players" => Ok(PhaseMode::PlayersAlternate),
            "teams_alternate" | "teams" => Ok(PhaseMode::TeamsAlternate),
            _ => Err(UnknownPhaseMode(s.to_string())),
        }
    }
}

impl fmt::Display for PhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseMode::Concurrent => "concurrent",
            PhaseMode::PlayersAlternate => "players_alternate",
            PhaseMode::TeamsAlternate => "teams_alternate",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_mode_parses_aliases() {
        assert_eq!("concurrent".parse(), Ok(PhaseMode::Concurrent));
        assert_eq!("players-alternate".parse(), Ok(PhaseMode::PlayersAlternate));
        assert_eq!("Teams".parse(), Ok(PhaseMode::TeamsAlternate));
        assert!("round_robin".parse::<PhaseMode>().is_err());
    }
}

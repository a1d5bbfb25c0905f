//! Victory conditions.
//!
//! This module defines which victory types are enabled and how a finished
//! game is reported.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// The condition that ended the game, in evaluation priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryKind {
    /// Forced by the scenario script.
    Scenario,
    /// Every non-barbarian player is dead or surrendered.
    Draw,
    /// One player left standing.
    Conquest,
    /// All surviving players are mutually allied.
    Allied,
    /// Only the members of one team survive.
    Team,
    /// Cultural dominance over the runner-up.
    Culture,
    /// A spaceship reached its destination.
    Spaceship,
    /// The configured last turn has passed.
    TurnLimit,
    /// Ended by an operator command.
    Operator,
}

impl fmt::Display for VictoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VictoryKind::Scenario => "scenario",
            VictoryKind::Draw => "draw",
            VictoryKind::Conquest => "conquest",
            VictoryKind::Allied => "allied",
            VictoryKind::Team => "team",
            VictoryKind::Culture => "culture",
            VictoryKind::Spaceship => "spaceship",
            VictoryKind::TurnLimit => "turn limit",
            VictoryKind::Operator => "operator",
        };
        f.write_str(name)
    }
}

/// Result of a victory check that fired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Victory {
    pub kind: VictoryKind,
    /// May be empty (draw, operator end).
    pub winners: Vec<PlayerId>,
    /// Human-readable explanation for the game-over notice.
    pub reason: String,
}

/// Victory condition settings for a game. Read-only once the game runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VictoryConfig {
    pub conquest: bool,
    pub allied: bool,
    pub team: bool,
    pub culture: bool,
    pub spaceship: bool,
    pub scenario: bool,
    pub turn_limit: bool,
    /// Minimum culture score for a culture victory.
    pub culture_points: i32,
    /// Required lead over the runner-up, in percent.
    pub culture_lead_pct: i32,
}

impl Default for VictoryConfig {
    fn default() -> Self {
        Self {
            conquest: true,
            allied: true,
            team: true,
            culture: false,
            spaceship: true,
            scenario: false,
            turn_limit: true,
            culture_points: 1000,
            culture_lead_pct: 300,
        }
    }
}

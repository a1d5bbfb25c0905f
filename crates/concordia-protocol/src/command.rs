use serde::{Deserialize, Serialize};

use crate::{PhaseMode, PlayerId, TeamId, TechId, TileId, TreatyAction, UnitId};

/// Orders a player submits for the current phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Order {
    // Unit orders, forwarded to the simulation
    MoveUnit { unit: UnitId, to: TileId },
    Fortify { unit: UnitId },
    Disband { unit: UnitId },

    // Player orders, held by the core
    SetResearch { tech: TechId },
    SetResearchGoal { tech: Option<TechId> },
    SetMultiplier { index: usize, target: i32 },
}

impl Order {
    pub fn is_unit_order(&self) -> bool {
        matches!(
            self,
            Order::MoveUnit { .. } | Order::Fortify { .. } | Order::Disband { .. }
        )
    }
}

/// Everything the session layer can hand to the control task.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    Connect {
        player: PlayerId,
    },
    Disconnect {
        player: PlayerId,
    },
    /// Lobby ready in `Initial`, "phase done" in `Running`
    PlayerReady {
        player: PlayerId,
    },
    Orders {
        player: PlayerId,
        orders: Vec<Order>,
    },
    Treaty {
        player: PlayerId,
        other: PlayerId,
        action: TreatyAction,
    },
    Surrender {
        player: PlayerId,
    },
    Admin {
        command: AdminCommand,
    },
}

impl Inbound {
    /// The player this event originates from, if any.
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Inbound::Connect { player }
            | Inbound::Disconnect { player }
            | Inbound::PlayerReady { player }
            | Inbound::Orders { player, .. }
            | Inbound::Treaty { player, .. }
            | Inbound::Surrender { player } => Some(*player),
            Inbound::Admin { .. } => None,
        }
    }
}

/// Out-of-band operator commands.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AdminCommand {
    StartGame {
        force: bool,
    },
    /// Ends the current phase as if every player were done
    ForceEndPhase,
    EndGame,
    /// Takes effect at the next turn boundary
    SetPhaseMode {
        mode: PhaseMode,
    },
    /// Takes effect at the start of the next new turn
    SetFogOfWar {
        enabled: bool,
    },
    /// 0 disables the timeout
    SetTimeout {
        secs: u32,
    },
    CreatePlayer {
        name: String,
        ai: bool,
        team: Option<TeamId>,
    },
}

/// Why an inbound event was refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    UnknownPlayer,
    PlayerDead,
    GameNotRunning,
    GameAlreadyStarted,
    NotConnected,
    AlreadyConnected,
    TreatyRefused { reason: String },
    CannotStart { reason: String },
}

use serde::{Deserialize, Serialize};

use crate::{DiplState, GameState, PlayerId, RejectReason, TechId, VictoryKind};

/// All core→session notifications. Fully serializable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    // Game flow
    StateChanged {
        from: GameState,
        to: GameState,
    },
    TurnBegan {
        turn: u32,
        year: i32,
    },
    PhaseBegan {
        turn: u32,
        phase: usize,
        active: Vec<PlayerId>,
    },
    PhaseEnded {
        turn: u32,
        phase: usize,
    },
    TurnEnded {
        turn: u32,
    },
    GameOver {
        kind: VictoryKind,
        reason: String,
        winners: Vec<PlayerId>,
    },
    /// The game ends at the end of the current turn.
    LastTurn {
        turn: u32,
    },
    TimeoutWarning {
        seconds_remaining: u32,
    },

    // Diplomacy
    TreatyChanged {
        a: PlayerId,
        b: PlayerId,
        old: DiplState,
        new: DiplState,
    },
    CeasefireExpiring {
        a: PlayerId,
        b: PlayerId,
    },
    ArmisticeCountdown {
        a: PlayerId,
        b: PlayerId,
        turns_left: u16,
    },
    /// `breaker` broke a pact with `victim`.
    TreatyBroken {
        breaker: PlayerId,
        victim: PlayerId,
    },
    TreatyProposed {
        from: PlayerId,
        to: PlayerId,
        new: DiplState,
    },
    FirstContact {
        a: PlayerId,
        b: PlayerId,
    },
    /// Units removed from foreign territory when an armistice became peace.
    UnitsDisbanded {
        owner: PlayerId,
        territory_of: PlayerId,
        count: usize,
    },

    // Players
    PlayerCreated {
        player: PlayerId,
    },
    PlayerDied {
        player: PlayerId,
    },
    PlayerSurrendered {
        player: PlayerId,
    },
    AiTakeover {
        player: PlayerId,
    },
    PoliciesEnacted {
        player: PlayerId,
    },
    ResearchChosen {
        player: PlayerId,
        tech: TechId,
    },
    InputRejected {
        player: Option<PlayerId>,
        reason: RejectReason,
    },
}

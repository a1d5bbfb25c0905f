//! Diplomatic relationship types.
//!
//! A relationship is held for every ordered pair of players. The pact type
//! and its countdown are always identical in both directions; the decaying
//! counters (`has_reason_to_cancel`) are per direction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pact between two players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiplState {
    #[default]
    War,
    /// Timed truce, reverts to war when it runs out
    Ceasefire,
    /// Timed pre-peace, becomes peace when it runs out
    Armistice,
    Peace,
    Alliance,
    /// Same team; permanent while both stay teammates
    Team,
}

impl DiplState {
    /// Whether this pact carries a countdown in `turns_left`.
    pub fn is_timed(self) -> bool {
        matches!(self, DiplState::Ceasefire | DiplState::Armistice)
    }

    /// Alliance or team.
    pub fn is_allied(self) -> bool {
        matches!(self, DiplState::Alliance | DiplState::Team)
    }
}

impl fmt::Display for DiplState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiplState::War => "war",
            DiplState::Ceasefire => "cease-fire",
            DiplState::Armistice => "armistice",
            DiplState::Peace => "peace",
            DiplState::Alliance => "alliance",
            DiplState::Team => "team",
        };
        f.write_str(name)
    }
}

/// One direction of a relationship, as seen from the first player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiplomaticState {
    pub state: DiplState,
    /// Countdown for cease-fire and armistice, 0 otherwise.
    pub turns_left: u16,
    /// Turns during which this side may accuse the other of breaking a treaty.
    pub has_reason_to_cancel: u8,
    /// Freshness of the last contact.
    pub contact_turns_left: u16,
    /// Turn on which this pact was force-created by an alliance cascade.
    pub auto_cancel_turn: Option<u32>,
    /// Turn on which the two players first met.
    pub first_contact_turn: Option<u32>,
}

impl DiplomaticState {
    pub fn has_contact(&self) -> bool {
        self.contact_turns_left > 0
    }

    pub fn has_met(&self) -> bool {
        self.first_contact_turn.is_some()
    }
}

/// Treaty actions a player can take toward another player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatyAction {
    /// Needs the counterpart's matching proposal
    ProposeCeasefire,
    /// Needs the counterpart's matching proposal
    SignPeace,
    DeclareWar,
    /// Needs the counterpart's matching proposal
    ProposeAlliance,
    CancelAlliance,
}

impl TreatyAction {
    /// Actions that only take effect once both sides have issued them.
    pub fn needs_consent(self) -> bool {
        matches!(
            self,
            TreatyAction::ProposeCeasefire | TreatyAction::SignPeace | TreatyAction::ProposeAlliance
        )
    }
}

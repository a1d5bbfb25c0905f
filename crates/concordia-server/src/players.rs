//! Player registry: identity, liveness, connectivity and per-phase flags.
//!
//! Ids are slot indices handed out in order and never reused, so other
//! tables may key on them across player death.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use concordia_protocol::{PlayerId, TeamId, TechId};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::RegistryError;

/// Player lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerStatus {
    Alive,
    /// Lost all assets; removed at the next kill pass
    Dying,
    /// Permanently gone
    Dead,
}

/// A policy slider a player ramps toward
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Multiplier {
    pub value: i32,
    pub target: i32,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team: TeamId,
    pub is_ai: bool,
    pub is_barbarian: bool,
    pub is_connected: bool,
    /// Player-driven work for this phase is finished
    pub phase_done: bool,
    /// AI work for this phase is finished
    pub ai_phase_done: bool,
    /// Lobby ready flag
    pub ready: bool,
    pub status: PlayerStatus,
    pub surrendered: bool,
    pub is_winner: bool,
    /// AI is standing in for a disconnected human
    pub ai_takeover: bool,
    pub disconnected_at: Option<Instant>,
    /// Last known asset counts
    pub cities: u32,
    pub units: u32,
    pub turns_without_assets: u32,
    pub score: i32,
    pub culture: i32,
    /// Turns this player was connected at turn start
    pub turns_played: u32,
    pub researching: Option<TechId>,
    pub research_goal: Option<TechId>,
    pub multipliers: Vec<Multiplier>,
    /// Passive bonuses applied at the end of each of the player's phases
    pub reveals_map: bool,
    pub reveals_cities: bool,
    pub has_contacts: bool,
}

impl Player {
    fn new(id: PlayerId, name: String, is_ai: bool, team: TeamId) -> Self {
        Self {
            id,
            name,
            team,
            is_ai,
            is_barbarian: false,
            is_connected: false,
            phase_done: false,
            ai_phase_done: false,
            ready: is_ai,
            status: PlayerStatus::Alive,
            surrendered: false,
            is_winner: false,
            ai_takeover: false,
            disconnected_at: None,
            cities: 0,
            units: 0,
            turns_without_assets: 0,
            score: 0,
            culture: 0,
            turns_played: 0,
            researching: None,
            research_goal: None,
            multipliers: Vec::new(),
            reveals_map: false,
            reveals_cities: false,
            has_contacts: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status != PlayerStatus::Dead
    }

    pub fn is_human(&self) -> bool {
        !self.is_ai
    }

    pub fn has_assets(&self) -> bool {
        self.cities > 0 || self.units > 0
    }

    /// Still competing for victory.
    pub fn is_candidate(&self) -> bool {
        self.is_alive() && !self.surrendered && !self.is_barbarian
    }
}

/// Owns every player record.
#[derive(Clone, Debug)]
pub struct PlayerRegistry {
    players: Vec<Player>,
    /// Order in which per-player hooks run; reshuffled on new turns
    order: Vec<PlayerId>,
    max_players: u8,
}

impl PlayerRegistry {
    pub fn new(max_players: u8) -> Self {
        Self {
            players: Vec::new(),
            order: Vec::new(),
            max_players,
        }
    }

    /// Add a player. Without an explicit team the player gets a team of its own.
    pub fn add_player(
        &mut self,
        name: impl Into<String>,
        is_ai: bool,
        team: Option<TeamId>,
    ) -> Result<PlayerId, RegistryError> {
        let id = self.next_player_id()?;
        let team = team.unwrap_or_else(|| self.fresh_team());
        self.players.push(Player::new(id, name.into(), is_ai, team));
        self.order.push(id);
        Ok(id)
    }

    pub fn add_barbarian(&mut self, name: impl Into<String>) -> Result<PlayerId, RegistryError> {
        let id = self.add_player(name, true, None)?;
        if let Some(p) = self.get_mut(id) {
            p.is_barbarian = true;
        }
        Ok(id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.0 as usize)
    }

    pub fn require_mut(&mut self, id: PlayerId) -> Result<&mut Player, RegistryError> {
        self.get_mut(id).ok_or(RegistryError::UnknownPlayer(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn alive_ids(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.id)
            .collect()
    }

    /// Number of slots ever handed out, dead players included.
    pub fn slot_count(&self) -> usize {
        self.players.len()
    }

    /// Teams with at least one member, ascending.
    pub fn teams(&self) -> Vec<TeamId> {
        self.players
            .iter()
            .map(|p| p.team)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn team_members(&self, team: TeamId) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.team == team)
            .map(|p| p.id)
            .collect()
    }

    pub fn same_team(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(pa), Some(pb)) => pa.team == pb.team,
            _ => false,
        }
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_connected).count()
    }

    /// Mark a player connected. A returning human takes control back from the AI.
    pub fn connect(&mut self, id: PlayerId) -> Result<(), RegistryError> {
        let player = self.require_mut(id)?;
        player.is_connected = true;
        player.disconnected_at = None;
        if player.ai_takeover {
            player.ai_takeover = false;
            player.is_ai = false;
        }
        Ok(())
    }

    pub fn disconnect(&mut self, id: PlayerId, now: Instant) -> Result<(), RegistryError> {
        let player = self.require_mut(id)?;
        player.is_connected = false;
        player.disconnected_at = Some(now);
        Ok(())
    }

    /// Hand disconnected humans over to the AI once their grace period ran out.
    pub fn process_disconnections(&mut self, now: Instant, grace: Duration) -> Vec<PlayerId> {
        let mut ai_takeovers = Vec::new();

        for player in self.players.iter_mut() {
            if player.is_ai || !player.is_alive() {
                continue;
            }
            if let Some(disconnected_at) = player.disconnected_at {
                if now.duration_since(disconnected_at) >= grace {
                    player.is_ai = true;
                    player.ai_takeover = true;
                    player.disconnected_at = None;
                    ai_takeovers.push(player.id);
                }
            }
        }

        ai_takeovers
    }

    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> Result<(), RegistryError> {
        self.require_mut(id)?.ready = ready;
        Ok(())
    }

    /// Every human player has readied up (AI players are always ready).
    pub fn all_ready(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.is_alive() && !p.is_barbarian)
            .all(|p| p.ready)
    }

    /// Number of non-barbarian players, for the lobby minimum.
    pub fn player_count(&self) -> usize {
        self.players.iter().filter(|p| !p.is_barbarian).count()
    }

    pub fn acting_order(&self) -> &[PlayerId] {
        &self.order
    }

    pub fn shuffle_order<R: Rng>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
    }

    pub fn reset_phase_flags(&mut self, ids: &[PlayerId]) {
        for &id in ids {
            if let Some(p) = self.get_mut(id) {
                p.phase_done = false;
                p.ai_phase_done = false;
            }
        }
    }

    /// Record current assets. Returns true when the player just started dying.
    pub fn record_assets(&mut self, id: PlayerId, cities: u32, units: u32, grace: u32) -> bool {
        let Some(player) = self.get_mut(id) else {
            return false;
        };
        player.cities = cities;
        player.units = units;
        if player.status != PlayerStatus::Alive || player.is_barbarian {
            return false;
        }
        if player.has_assets() {
            player.turns_without_assets = 0;
            return false;
        }
        player.turns_without_assets += 1;
        if player.turns_without_assets > grace {
            player.status = PlayerStatus::Dying;
            return true;
        }
        false
    }

    /// Finish off dying players. Returns the newly dead.
    pub fn kill_dying(&mut self) -> Vec<PlayerId> {
        let mut dead = Vec::new();
        for player in self.players.iter_mut() {
            if player.status == PlayerStatus::Dying {
                player.status = PlayerStatus::Dead;
                player.phase_done = true;
                player.ai_phase_done = true;
                dead.push(player.id);
            }
        }
        dead
    }

    /// Bring everybody back to life for another game in the same lobby.
    pub fn reset_for_new_game(&mut self) {
        for player in self.players.iter_mut() {
            if player.ai_takeover {
                player.is_ai = false;
                player.ai_takeover = false;
            }
            player.disconnected_at = None;
            player.status = PlayerStatus::Alive;
            player.surrendered = false;
            player.is_winner = false;
            player.ready = player.is_ai;
            player.phase_done = false;
            player.ai_phase_done = false;
            player.turns_without_assets = 0;
            player.researching = None;
            player.research_goal = None;
            player.multipliers.clear();
        }
    }

    fn next_player_id(&self) -> Result<PlayerId, RegistryError> {
        let next = self.players.len();
        if next >= self.max_players as usize {
            return Err(RegistryError::SlotsExhausted);
        }
        Ok(PlayerId(next as u8))
    }

    fn fresh_team(&self) -> TeamId {
        let next = self
            .players
            .iter()
            .map(|p| p.team.0)
            .max()
            .map_or(0, |t| t.saturating_add(1));
        TeamId(next)
    }
}

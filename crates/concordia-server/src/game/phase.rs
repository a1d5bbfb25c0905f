//! Phase layout and the begin/end-of-phase protocol.

use concordia_protocol::{Notification, PhaseMode, PlayerId};
use tracing::{debug, error, info};

use crate::config::GameConfig;
use crate::error::FatalError;
use crate::game::DiplomacyTable;
use crate::hooks::{absorb, Hooks};
use crate::players::PlayerRegistry;

/// Number of phases in a turn. Always at least one.
pub fn phase_count(mode: PhaseMode, players: &PlayerRegistry) -> usize {
    match mode {
        PhaseMode::Concurrent => 1,
        PhaseMode::PlayersAlternate => players.slot_count().max(1),
        PhaseMode::TeamsAlternate => players.teams().len().max(1),
    }
}

/// Living players who act in `phase`, in acting order.
pub fn active_players(mode: PhaseMode, phase: usize, players: &PlayerRegistry) -> Vec<PlayerId> {
    let count = phase_count(mode, players);
    debug_assert!(phase < count, "phase {phase} out of range ({count} phases)");
    let phase = if phase < count {
        phase
    } else {
        error!(phase, count, "phase index out of range, clamped");
        count - 1
    };

    let in_phase = |id: PlayerId| -> bool {
        match mode {
            PhaseMode::Concurrent => true,
            PhaseMode::PlayersAlternate => id.0 as usize == phase,
            PhaseMode::TeamsAlternate => {
                let teams = players.teams();
                players
                    .get(id)
                    .is_some_and(|p| teams.get(phase) == Some(&p.team))
            }
        }
    };

    players
        .acting_order()
        .iter()
        .copied()
        .filter(|&id| players.get(id).is_some_and(|p| p.is_alive()) && in_phase(id))
        .collect()
}

/// Runs the begin/end-of-phase protocol for the active players.
///
/// Borrows the controller's state for the duration of one call.
pub struct PhaseDriver<'a, H> {
    pub players: &'a mut PlayerRegistry,
    pub diplomacy: &'a mut DiplomacyTable,
    pub hooks: &'a mut H,
    pub config: &'a GameConfig,
    pub turn: u32,
    pub notes: &'a mut Vec<Notification>,
}

impl<H: Hooks> PhaseDriver<'_, H> {
    /// Start a phase. `is_new_phase` is false only for a loaded, partially
    /// played phase: done flags are kept and unit work is not repeated.
    pub fn begin_phase(&mut self, active: &[PlayerId], is_new_phase: bool) -> Result<(), FatalError> {
        if is_new_phase {
            self.players.reset_phase_flags(active);

            // Activities first: orders may rely on their results.
            for id in self.alive(active) {
                debug!(player = %id, "resolving unit activities");
                absorb(
                    "resolve_queued_activities",
                    Some(id),
                    self.hooks.resolve_queued_activities(id),
                )?;
            }
            for id in self.alive(active) {
                debug!(player = %id, "executing queued orders");
                absorb(
                    "execute_queued_orders",
                    Some(id),
                    self.hooks.execute_queued_orders(id),
                )?;
            }
        }

        // Barbarians take no input and run no AI turn; never wait on them.
        for &id in active {
            if let Some(p) = self.players.get_mut(id).filter(|p| p.is_barbarian) {
                p.phase_done = true;
                p.ai_phase_done = true;
            }
        }

        for id in self.humans(active) {
            absorb("advisor_activities", Some(id), self.hooks.advisor_activities(id))?;
        }

        self.kill_dying();

        for id in self.ais(active) {
            let Some(actions) =
                absorb("diplomacy_actions", Some(id), self.hooks.diplomacy_actions(id))?
            else {
                continue;
            };
            for (other, action) in actions {
                match self.diplomacy.apply_action(
                    id,
                    other,
                    action,
                    self.turn,
                    &*self.players,
                    &mut *self.hooks,
                ) {
                    Ok(notes) => self.notes.extend(notes),
                    Err(err) => debug!(player = %id, %other, ?action, %err, "AI treaty action refused"),
                }
            }
        }

        for id in self.ais(active) {
            debug!(player = %id, "AI first activities");
            absorb("first_activities", Some(id), self.hooks.first_activities(id))?;
            if let Some(p) = self.players.get_mut(id) {
                p.ai_phase_done = true;
            }
        }

        Ok(())
    }

    pub fn end_phase(&mut self, active: &[PlayerId]) -> Result<(), FatalError> {
        for id in self.alive(active) {
            let Some(player) = self.players.get_mut(id) else {
                continue;
            };
            let mut changed = false;
            for m in player.multipliers.iter_mut() {
                if m.value != m.target {
                    m.value = m.target;
                    changed = true;
                }
            }
            if changed {
                debug!(player = %id, "policy changes enacted");
                self.notes.push(Notification::PoliciesEnacted { player: id });
            }
        }

        for id in self.alive(active) {
            self.pick_research(id);
            absorb("update_bulbs", Some(id), self.hooks.update_bulbs(id, 0, false))?;
        }

        for id in self.ais(active) {
            debug!(player = %id, "AI last activities");
            absorb("last_activities", Some(id), self.hooks.last_activities(id))?;
        }

        for id in self.alive(active) {
            absorb("refresh_cities", Some(id), self.hooks.refresh_cities(id))?;
            let upkeep = self.hooks.tech_upkeep(id);
            absorb(
                "update_bulbs",
                Some(id),
                self.hooks.update_bulbs(id, -upkeep, true),
            )?;
        }

        for id in self.alive(active) {
            let cities = self.hooks.city_count(id);
            let units = self.hooks.unit_count(id);
            if self
                .players
                .record_assets(id, cities, units, self.config.dying_grace_turns)
            {
                info!(player = %id, "player has no cities or units left");
            }
        }
        self.kill_dying();

        for id in self.alive(active) {
            self.passive_bonuses(id);
        }

        Ok(())
    }

    fn pick_research(&mut self, id: PlayerId) {
        let Some(player) = self.players.get(id) else {
            return;
        };
        let (None, Some(goal)) = (player.researching, player.research_goal) else {
            return;
        };
        if let Some(tech) = self.hooks.research_goal_step(id, goal) {
            if let Some(player) = self.players.get_mut(id) {
                player.researching = Some(tech);
            }
            debug!(player = %id, tech = tech.0, "research picked from goal");
            self.notes.push(Notification::ResearchChosen { player: id, tech });
        }
    }

    fn passive_bonuses(&mut self, id: PlayerId) {
        let Some(player) = self.players.get(id) else {
            return;
        };
        let (reveals_map, reveals_cities, has_contacts) =
            (player.reveals_map, player.reveals_cities, player.has_contacts);
        let others: Vec<PlayerId> = self
            .players
            .alive_ids()
            .into_iter()
            .filter(|&other| other != id)
            .collect();

        if reveals_map {
            self.hooks.show_all(id);
        }
        if reveals_cities {
            for &other in &others {
                for tile in self.hooks.city_tiles(other) {
                    self.hooks.show_tile(id, tile);
                }
            }
        }
        if has_contacts {
            for &other in &others {
                if let Some(note) = self.diplomacy.make_contact(id, other, self.turn) {
                    self.notes.push(note);
                }
            }
        }
    }

    fn kill_dying(&mut self) {
        for id in self.players.kill_dying() {
            info!(player = %id, "player died");
            self.notes.push(Notification::PlayerDied { player: id });
        }
    }

    fn alive(&self, active: &[PlayerId]) -> Vec<PlayerId> {
        self.filtered(active, |_| true)
    }

    fn humans(&self, active: &[PlayerId]) -> Vec<PlayerId> {
        self.filtered(active, |is_ai| !is_ai)
    }

    fn ais(&self, active: &[PlayerId]) -> Vec<PlayerId> {
        self.filtered(active, |is_ai| is_ai)
    }

    fn filtered(&self, active: &[PlayerId], keep: impl Fn(bool) -> bool) -> Vec<PlayerId> {
        active
            .iter()
            .copied()
            .filter(|&id| {
                self.players
                    .get(id)
                    .is_some_and(|p| p.is_alive() && !p.is_barbarian && keep(p.is_ai))
            })
            .collect()
    }
}

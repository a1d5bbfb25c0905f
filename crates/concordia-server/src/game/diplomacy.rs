//! Diplomatic relation table.
//!
//! One `DiplomaticState` per ordered pair of players. The pact type and its
//! countdown are written to both directions together; `has_reason_to_cancel`
//! and contact freshness are kept per direction.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use concordia_protocol::{DiplState, DiplomaticState, Notification, PlayerId, TreatyAction};
use tracing::{debug, error, info, warn};

use crate::config::{CascadePolicy, DiplomacyConfig};
use crate::error::{FatalError, TreatyError};
use crate::hooks::{absorb, Simulation, Vision};
use crate::players::PlayerRegistry;

/// Relation matrix plus pending treaty proposals.
#[derive(Clone, Debug)]
pub struct DiplomacyTable {
    relations: BTreeMap<(PlayerId, PlayerId), DiplomaticState>,
    /// Proposals waiting for the counterpart: (from, to, action)
    proposals: HashSet<(PlayerId, PlayerId, TreatyAction)>,
    config: DiplomacyConfig,
}

/// Countdown work computed from the pre-tick snapshot.
#[derive(Clone, Copy, Debug)]
enum Countdown {
    Armistice {
        a: PlayerId,
        b: PlayerId,
        turns_left: u16,
    },
    Ceasefire {
        a: PlayerId,
        b: PlayerId,
        turns_left: u16,
    },
}

fn ordered(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl DiplomacyTable {
    pub fn new(config: DiplomacyConfig) -> Self {
        Self {
            relations: BTreeMap::new(),
            proposals: HashSet::new(),
            config,
        }
    }

    pub fn config(&self) -> &DiplomacyConfig {
        &self.config
    }

    /// Create relations for players that have none yet: war and no contact,
    /// or a team pact between teammates.
    pub fn sync_players(&mut self, players: &PlayerRegistry) {
        let ids = players.ids();
        for &a in &ids {
            for &b in &ids {
                if a == b || self.relations.contains_key(&(a, b)) {
                    continue;
                }
                let mut rel = DiplomaticState::default();
                if players.same_team(a, b) {
                    rel.state = DiplState::Team;
                }
                self.relations.insert((a, b), rel);
            }
        }
    }

    pub fn get(&self, a: PlayerId, b: PlayerId) -> Option<&DiplomaticState> {
        self.relations.get(&(a, b))
    }

    /// Read-only snapshot of one direction. Unknown pairs read as war.
    pub fn state(&self, a: PlayerId, b: PlayerId) -> DiplomaticState {
        self.get(a, b).cloned().unwrap_or_default()
    }

    pub fn pact(&self, a: PlayerId, b: PlayerId) -> DiplState {
        self.get(a, b).map_or(DiplState::War, |rel| rel.state)
    }

    pub fn is_allied(&self, a: PlayerId, b: PlayerId) -> bool {
        a != b && self.pact(a, b).is_allied()
    }

    pub fn has_proposal(&self, from: PlayerId, to: PlayerId, action: TreatyAction) -> bool {
        self.proposals.contains(&(from, to, action))
    }

    /// Overwrite a pair in both directions, for saved games and scenarios.
    pub fn set_pair(&mut self, a: PlayerId, b: PlayerId, pact: DiplState, turns_left: u16) {
        for (x, y) in [(a, b), (b, a)] {
            let rel = self.rel_mut(x, y);
            rel.state = pact;
            rel.turns_left = if pact.is_timed() { turns_left } else { 0 };
        }
        self.clear_proposals(a, b);
    }

    /// Refresh contact between two players. Returns a notification on first meeting.
    pub fn make_contact(&mut self, a: PlayerId, b: PlayerId, turn: u32) -> Option<Notification> {
        if a == b {
            return None;
        }
        let first = self.get(a, b).map_or(true, |rel| !rel.has_met());
        let contact_turns = self.config.contact_turns;
        for (x, y) in [(a, b), (b, a)] {
            let rel = self.rel_mut(x, y);
            rel.contact_turns_left = contact_turns;
            if first {
                rel.first_contact_turn = Some(turn);
            }
        }
        if !first {
            return None;
        }
        let (a, b) = ordered(a, b);
        info!(%a, %b, turn, "first contact");
        Some(Notification::FirstContact { a, b })
    }

    /// Once-per-turn update of every living pair.
    ///
    /// Countdowns are computed from a snapshot and applied afterwards; the
    /// alliance cascade is evaluated only once every countdown has landed.
    pub fn tick_turn<H: Simulation + Vision>(
        &mut self,
        turn: u32,
        players: &PlayerRegistry,
        hooks: &mut H,
    ) -> Result<Vec<Notification>, FatalError> {
        let mut notes = Vec::new();
        let alive = players.alive_ids();
        let mut countdowns = Vec::new();

        for (i, &a) in alive.iter().enumerate() {
            for &b in &alive[i + 1..] {
                self.repair_symmetry(a, b);
                let rel = self.state(a, b);
                if rel.state == DiplState::Team {
                    continue;
                }

                if rel.first_contact_turn != Some(turn) {
                    for (x, y) in [(a, b), (b, a)] {
                        let dir = self.rel_mut(x, y);
                        dir.has_reason_to_cancel = dir.has_reason_to_cancel.saturating_sub(1);
                        dir.contact_turns_left = dir.contact_turns_left.saturating_sub(1);
                    }
                }

                match rel.state {
                    DiplState::Armistice if rel.auto_cancel_turn != Some(turn) => {
                        countdowns.push(Countdown::Armistice {
                            a,
                            b,
                            turns_left: rel.turns_left.saturating_sub(1),
                        });
                    }
                    DiplState::Ceasefire => {
                        countdowns.push(Countdown::Ceasefire {
                            a,
                            b,
                            turns_left: rel.turns_left.saturating_sub(1),
                        });
                    }
                    _ => {}
                }
            }
        }

        let mut new_wars = Vec::new();
        for step in countdowns {
            match step {
                Countdown::Armistice { a, b, turns_left: 0 } => {
                    self.set_pact(a, b, DiplState::Peace, &mut notes);
                    enforce_armistice(a, b, hooks, &mut notes)?;
                }
                Countdown::Armistice { a, b, turns_left } => {
                    self.set_turns_left(a, b, turns_left);
                    notes.push(Notification::ArmisticeCountdown { a, b, turns_left });
                }
                Countdown::Ceasefire { a, b, turns_left: 0 } => {
                    self.set_pact(a, b, DiplState::War, &mut notes);
                    hooks.recompute_city_map(a);
                    hooks.recompute_city_map(b);
                    new_wars.push((a, b));
                }
                Countdown::Ceasefire { a, b, turns_left } => {
                    self.set_turns_left(a, b, turns_left);
                    if turns_left == 1 {
                        info!(%a, %b, "cease-fire runs out next turn");
                        notes.push(Notification::CeasefireExpiring { a, b });
                    }
                }
            }
        }

        for (ally, partner) in self.ceasefire_cascade(&new_wars, players) {
            self.cancel_alliance_forced(ally, partner, turn, &mut notes);
        }

        Ok(notes)
    }

    /// Apply a treaty action from `actor` toward `other`.
    ///
    /// Consent-requiring actions are stored until the counterpart issues the
    /// same action; the second call makes the change.
    pub fn apply_action<H: Vision>(
        &mut self,
        actor: PlayerId,
        other: PlayerId,
        action: TreatyAction,
        turn: u32,
        players: &PlayerRegistry,
        hooks: &mut H,
    ) -> Result<Vec<Notification>, TreatyError> {
        check_parties(actor, other, players)?;
        let current = self.pact(actor, other);
        if current == DiplState::Team {
            return Err(TreatyError::TeamPact);
        }

        let (target, legal) = match action {
            TreatyAction::ProposeCeasefire => (DiplState::Ceasefire, current == DiplState::War),
            TreatyAction::SignPeace => (
                self.peace_pact(),
                matches!(current, DiplState::War | DiplState::Ceasefire),
            ),
            TreatyAction::ProposeAlliance => (
                DiplState::Alliance,
                matches!(current, DiplState::Armistice | DiplState::Peace),
            ),
            TreatyAction::DeclareWar => (
                DiplState::War,
                matches!(
                    current,
                    DiplState::Ceasefire | DiplState::Armistice | DiplState::Peace
                ),
            ),
            TreatyAction::CancelAlliance => (self.peace_pact(), current == DiplState::Alliance),
        };
        if !legal {
            return Err(TreatyError::IllegalTransition {
                from: current,
                to: target,
            });
        }
        if action == TreatyAction::ProposeAlliance {
            self.check_alliance_conflicts(actor, other, players)?;
        }

        let mut notes = Vec::new();
        if action.needs_consent() && !self.proposals.remove(&(other, actor, action)) {
            debug!(from = %actor, to = %other, ?action, "treaty proposed");
            self.proposals.insert((actor, other, action));
            notes.push(Notification::TreatyProposed {
                from: actor,
                to: other,
                new: target,
            });
            return Ok(notes);
        }

        if matches!(action, TreatyAction::DeclareWar | TreatyAction::CancelAlliance) {
            self.record_breach(actor, other, &mut notes);
        }
        self.set_pact(actor, other, target, &mut notes);

        if action == TreatyAction::DeclareWar {
            hooks.recompute_city_map(actor);
            hooks.recompute_city_map(other);
            for (ally, partner) in self.declared_war_cascade(actor, other, players) {
                self.cancel_alliance_forced(ally, partner, turn, &mut notes);
            }
        }

        Ok(notes)
    }

    fn rel_mut(&mut self, a: PlayerId, b: PlayerId) -> &mut DiplomaticState {
        self.relations.entry((a, b)).or_default()
    }

    /// Pact that signing peace (or cancelling an alliance) leads to.
    fn peace_pact(&self) -> DiplState {
        if self.config.armistice_turns == 0 {
            DiplState::Peace
        } else {
            DiplState::Armistice
        }
    }

    fn pact_duration(&self, pact: DiplState) -> u16 {
        match pact {
            DiplState::Ceasefire => self.config.ceasefire_turns,
            DiplState::Armistice => self.config.armistice_turns,
            _ => 0,
        }
    }

    fn set_pact(&mut self, a: PlayerId, b: PlayerId, pact: DiplState, notes: &mut Vec<Notification>) {
        let old = self.pact(a, b);
        let turns_left = self.pact_duration(pact);
        for (x, y) in [(a, b), (b, a)] {
            let rel = self.rel_mut(x, y);
            rel.state = pact;
            rel.turns_left = turns_left;
        }
        self.clear_proposals(a, b);

        if old != pact {
            let (a, b) = ordered(a, b);
            info!(%a, %b, %old, new = %pact, "treaty changed");
            notes.push(Notification::TreatyChanged {
                a,
                b,
                old,
                new: pact,
            });
        }
    }

    fn set_turns_left(&mut self, a: PlayerId, b: PlayerId, turns_left: u16) {
        self.rel_mut(a, b).turns_left = turns_left;
        self.rel_mut(b, a).turns_left = turns_left;
    }

    fn clear_proposals(&mut self, a: PlayerId, b: PlayerId) {
        self.proposals
            .retain(|&(from, to, _)| !((from == a && to == b) || (from == b && to == a)));
    }

    /// Give the victim grounds for complaint, unless the breaker had them.
    fn record_breach(&mut self, breaker: PlayerId, victim: PlayerId, notes: &mut Vec<Notification>) {
        let own = self.rel_mut(breaker, victim);
        if own.has_reason_to_cancel > 0 {
            own.has_reason_to_cancel = 0;
            debug!(%breaker, %victim, "pact cancelled with standing reason");
            return;
        }

        let reason_turns = self.config.reason_to_cancel_turns;
        let theirs = self.rel_mut(victim, breaker);
        let had_reason = theirs.has_reason_to_cancel > 0;
        theirs.has_reason_to_cancel = reason_turns;
        if !had_reason {
            info!(%breaker, %victim, "treaty broken");
            notes.push(Notification::TreatyBroken { breaker, victim });
        }
    }

    /// Refuse an alliance that would put an ally of one side next to an
    /// enemy of the other.
    fn check_alliance_conflicts(
        &self,
        actor: PlayerId,
        other: PlayerId,
        players: &PlayerRegistry,
    ) -> Result<(), TreatyError> {
        for third in players.alive_ids() {
            if third == actor || third == other {
                continue;
            }
            let conflict = (self.is_allied(actor, third) && self.pact(third, other) == DiplState::War)
                || (self.is_allied(other, third) && self.pact(third, actor) == DiplState::War);
            if conflict {
                return Err(TreatyError::AllianceConflict { ally: third });
            }
        }
        Ok(())
    }

    /// Alliances to cancel after cease-fires ran out into war.
    fn ceasefire_cascade(
        &self,
        wars: &[(PlayerId, PlayerId)],
        players: &PlayerRegistry,
    ) -> BTreeSet<(PlayerId, PlayerId)> {
        let mut cancel = BTreeSet::new();
        for &(a, b) in wars {
            for third in players.alive_ids() {
                if third == a || third == b || !self.is_allied(third, a) || !self.is_allied(third, b) {
                    continue;
                }
                let targets = match self.config.cascade {
                    CascadePolicy::CancelBoth => vec![a, b],
                    CascadePolicy::CancelOne => {
                        match (players.same_team(third, a), players.same_team(third, b)) {
                            (true, true) => {
                                warn!(%third, %a, %b, "ally of both sides is on both teams, nothing to cancel");
                                Vec::new()
                            }
                            (true, false) => vec![b],
                            (false, true) => vec![a],
                            (false, false) => vec![a.max(b)],
                        }
                    }
                };
                cancel.extend(
                    targets
                        .into_iter()
                        .filter(|&partner| self.pact(third, partner) == DiplState::Alliance)
                        .map(|partner| (third, partner)),
                );
            }
        }
        cancel
    }

    /// An ally of both sides drops the aggressor, or the victim when the
    /// aggressor is its teammate.
    fn declared_war_cascade(
        &self,
        aggressor: PlayerId,
        victim: PlayerId,
        players: &PlayerRegistry,
    ) -> Vec<(PlayerId, PlayerId)> {
        players
            .alive_ids()
            .into_iter()
            .filter(|&third| {
                third != aggressor
                    && third != victim
                    && self.is_allied(third, aggressor)
                    && self.is_allied(third, victim)
            })
            .filter_map(|third| {
                let partner = if players.same_team(third, aggressor) {
                    victim
                } else {
                    aggressor
                };
                (self.pact(third, partner) == DiplState::Alliance).then_some((third, partner))
            })
            .collect()
    }

    fn cancel_alliance_forced(
        &mut self,
        ally: PlayerId,
        partner: PlayerId,
        turn: u32,
        notes: &mut Vec<Notification>,
    ) {
        warn!(%ally, %partner, "alliance cancelled to keep alliances consistent");
        let pact = self.peace_pact();
        self.set_pact(ally, partner, pact, notes);
        self.rel_mut(ally, partner).auto_cancel_turn = Some(turn);
        self.rel_mut(partner, ally).auto_cancel_turn = Some(turn);
    }

    fn repair_symmetry(&mut self, a: PlayerId, b: PlayerId) {
        let (lo, hi) = ordered(a, b);
        let (state, turns_left, symmetric) = match (self.get(lo, hi), self.get(hi, lo)) {
            (Some(fwd), Some(back)) => (
                fwd.state,
                fwd.turns_left,
                fwd.state == back.state && fwd.turns_left == back.turns_left,
            ),
            _ => return,
        };
        debug_assert!(symmetric, "asymmetric relation between {lo} and {hi}");
        if !symmetric {
            error!(a = %lo, b = %hi, %state, "asymmetric relation repaired from lower id");
            let back = self.rel_mut(hi, lo);
            back.state = state;
            back.turns_left = turns_left;
        }
    }
}

fn check_parties(actor: PlayerId, other: PlayerId, players: &PlayerRegistry) -> Result<(), TreatyError> {
    if actor == other {
        return Err(TreatyError::SamePlayer);
    }
    for id in [actor, other] {
        match players.get(id) {
            None => return Err(TreatyError::UnknownPlayer(id)),
            Some(p) if !p.is_alive() => return Err(TreatyError::Dead(id)),
            Some(_) => {}
        }
    }
    Ok(())
}

/// Disband military units left in the other side's territory once peace holds.
fn enforce_armistice<H: Simulation>(
    a: PlayerId,
    b: PlayerId,
    hooks: &mut H,
    notes: &mut Vec<Notification>,
) -> Result<(), FatalError> {
    for (owner, territory_of) in [(a, b), (b, a)] {
        let mut count = 0;
        for unit in hooks.units_violating_armistice(owner, territory_of) {
            if absorb("disband_unit", Some(owner), hooks.disband_unit(unit))?.is_some() {
                count += 1;
            }
        }
        if count > 0 {
            info!(%owner, %territory_of, count, "units disbanded on peace");
            notes.push(Notification::UnitsDisbanded {
                owner,
                territory_of,
                count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use concordia_protocol::{TeamId, TileId};

    use super::*;
    use crate::headless::HeadlessWorld;

    const A: PlayerId = PlayerId(0);
    const B: PlayerId = PlayerId(1);
    const C: PlayerId = PlayerId(2);

    fn setup(teams: &[Option<TeamId>]) -> (DiplomacyTable, PlayerRegistry, HeadlessWorld) {
        let mut players = PlayerRegistry::new(8);
        for (i, team) in teams.iter().enumerate() {
            players.add_player(format!("P{i}"), true, *team).unwrap();
        }
        let mut table = DiplomacyTable::new(DiplomacyConfig::default());
        table.sync_players(&players);
        (table, players, HeadlessWorld::new())
    }

    fn both(
        table: &mut DiplomacyTable,
        players: &PlayerRegistry,
        world: &mut HeadlessWorld,
        a: PlayerId,
        b: PlayerId,
        action: TreatyAction,
    ) -> Vec<Notification> {
        table.apply_action(a, b, action, 1, players, world).unwrap();
        table.apply_action(b, a, action, 1, players, world).unwrap()
    }

    #[test]
    fn new_players_start_at_war_without_contact() {
        let (table, _, _) = setup(&[None, None, Some(TeamId(0))]);
        let rel = table.state(A, B);
        assert_eq!(rel.state, DiplState::War);
        assert!(!rel.has_contact());
        assert!(!rel.has_met());
        assert_eq!(table.pact(A, C), DiplState::Team);
        assert_eq!(table.pact(C, A), DiplState::Team);
    }

    #[test]
    fn consent_actions_wait_for_counterpart() {
        let (mut table, players, mut world) = setup(&[None, None]);

        let notes = table
            .apply_action(A, B, TreatyAction::ProposeCeasefire, 1, &players, &mut world)
            .unwrap();
        assert!(matches!(notes[0], Notification::TreatyProposed { from: A, to: B, .. }));
        assert_eq!(table.pact(A, B), DiplState::War);
        assert!(table.has_proposal(A, B, TreatyAction::ProposeCeasefire));

        let notes = table
            .apply_action(B, A, TreatyAction::ProposeCeasefire, 1, &players, &mut world)
            .unwrap();
        assert_eq!(
            notes,
            vec![Notification::TreatyChanged {
                a: A,
                b: B,
                old: DiplState::War,
                new: DiplState::Ceasefire,
            }]
        );
        assert_eq!(table.state(A, B).turns_left, 16);
        assert_eq!(table.state(B, A).turns_left, 16);
        assert!(!table.has_proposal(A, B, TreatyAction::ProposeCeasefire));
    }

    #[test]
    fn illegal_transitions_are_refused() {
        let (mut table, players, mut world) = setup(&[None, None, Some(TeamId(0))]);

        assert_eq!(
            table.apply_action(A, A, TreatyAction::DeclareWar, 1, &players, &mut world),
            Err(TreatyError::SamePlayer)
        );
        assert_eq!(
            table.apply_action(A, B, TreatyAction::DeclareWar, 1, &players, &mut world),
            Err(TreatyError::IllegalTransition {
                from: DiplState::War,
                to: DiplState::War,
            })
        );
        assert_eq!(
            table.apply_action(A, C, TreatyAction::DeclareWar, 1, &players, &mut world),
            Err(TreatyError::TeamPact)
        );
        assert_eq!(
            table.apply_action(A, PlayerId(9), TreatyAction::SignPeace, 1, &players, &mut world),
            Err(TreatyError::UnknownPlayer(PlayerId(9)))
        );

        table.set_pair(A, B, DiplState::Alliance, 0);
        assert_eq!(
            table.apply_action(A, B, TreatyAction::DeclareWar, 1, &players, &mut world),
            Err(TreatyError::IllegalTransition {
                from: DiplState::Alliance,
                to: DiplState::War,
            })
        );
    }

    #[test]
    fn ceasefire_warns_then_reverts_to_war() {
        let (mut table, players, mut world) = setup(&[None, None]);
        table.set_pair(A, B, DiplState::Ceasefire, 3);

        let notes = table.tick_turn(1, &players, &mut world).unwrap();
        assert_eq!(table.state(A, B).turns_left, 2);
        assert!(notes.is_empty());

        let notes = table.tick_turn(2, &players, &mut world).unwrap();
        assert_eq!(notes, vec![Notification::CeasefireExpiring { a: A, b: B }]);

        table.tick_turn(3, &players, &mut world).unwrap();
        assert_eq!(table.pact(A, B), DiplState::War);
        assert_eq!(table.pact(B, A), DiplState::War);
        assert_eq!(table.state(A, B).turns_left, 0);
        assert_eq!(world.calls_to("recompute_city_map"), vec![A, B]);
    }

    #[test]
    fn expired_ceasefire_cancels_exactly_one_alliance() {
        let (mut table, players, mut world) = setup(&[None, None, None]);
        table.set_pair(A, B, DiplState::Ceasefire, 1);
        table.set_pair(A, C, DiplState::Alliance, 0);
        table.set_pair(B, C, DiplState::Alliance, 0);

        table.tick_turn(5, &players, &mut world).unwrap();

        assert_eq!(table.pact(A, B), DiplState::War);
        assert_eq!(table.pact(A, C), DiplState::Alliance);
        assert_eq!(table.pact(B, C), DiplState::Armistice);
        assert_eq!(table.state(C, B).auto_cancel_turn, Some(5));
        // Force-created this turn, so not yet counted down.
        assert_eq!(table.state(B, C).turns_left, 16);
    }

    #[test]
    fn cascade_spares_the_teammate() {
        // C shares A's team.
        let (mut table, players, mut world) = setup(&[None, None, Some(TeamId(0))]);
        table.set_pair(A, B, DiplState::Ceasefire, 1);
        table.set_pair(B, C, DiplState::Alliance, 0);

        table.tick_turn(5, &players, &mut world).unwrap();

        assert_eq!(table.pact(A, B), DiplState::War);
        assert_eq!(table.pact(A, C), DiplState::Team);
        assert_eq!(table.pact(B, C), DiplState::Armistice);
    }

    #[test]
    fn cancel_both_policy_drops_every_alliance() {
        let (mut table, players, mut world) = setup(&[None, None, None]);
        table.config.cascade = CascadePolicy::CancelBoth;
        table.set_pair(A, B, DiplState::Ceasefire, 1);
        table.set_pair(A, C, DiplState::Alliance, 0);
        table.set_pair(B, C, DiplState::Alliance, 0);

        table.tick_turn(5, &players, &mut world).unwrap();

        assert_eq!(table.pact(A, C), DiplState::Armistice);
        assert_eq!(table.pact(B, C), DiplState::Armistice);
    }

    #[test]
    fn armistice_becomes_peace_and_evicts_units() {
        let (mut table, players, mut world) = setup(&[None, None]);
        world.claim_tile(TileId(7), B);
        world.claim_tile(TileId(8), A);
        let trespasser = world.spawn_unit(A, TileId(7), true).unwrap();
        let worker = world.spawn_unit(A, TileId(7), false).unwrap();
        let home = world.spawn_unit(A, TileId(8), true).unwrap();
        table.set_pair(A, B, DiplState::Armistice, 1);

        let notes = table.tick_turn(3, &players, &mut world).unwrap();

        assert_eq!(table.pact(A, B), DiplState::Peace);
        assert!(!world.has_unit(trespasser));
        assert!(world.has_unit(worker));
        assert!(world.has_unit(home));
        assert!(notes.contains(&Notification::UnitsDisbanded {
            owner: A,
            territory_of: B,
            count: 1,
        }));
    }

    #[test]
    fn armistice_counts_down_with_notice() {
        let (mut table, players, mut world) = setup(&[None, None]);
        table.set_pair(A, B, DiplState::Armistice, 4);

        let notes = table.tick_turn(1, &players, &mut world).unwrap();
        assert_eq!(
            notes,
            vec![Notification::ArmisticeCountdown {
                a: A,
                b: B,
                turns_left: 3,
            }]
        );
    }

    #[test]
    fn countdowns_never_increase_or_go_negative() {
        let (mut table, players, mut world) = setup(&[None, None, None]);
        table.set_pair(A, B, DiplState::Ceasefire, 16);
        table.set_pair(A, C, DiplState::Armistice, 16);

        let mut last = (16, 16);
        for turn in 1..40 {
            table.tick_turn(turn, &players, &mut world).unwrap();
            let now = (table.state(A, B).turns_left, table.state(A, C).turns_left);
            assert!(now.0 <= last.0 && now.1 <= last.1);
            last = now;
        }
        assert_eq!(table.pact(A, B), DiplState::War);
        assert_eq!(table.pact(A, C), DiplState::Peace);
        assert_eq!(last, (0, 0));
    }

    #[test]
    fn peace_is_stable() {
        let (mut table, players, mut world) = setup(&[None, None]);
        table.config.armistice_turns = 0;
        both(&mut table, &players, &mut world, A, B, TreatyAction::SignPeace);
        assert_eq!(table.pact(A, B), DiplState::Peace);

        for turn in 1..=100 {
            let notes = table.tick_turn(turn, &players, &mut world).unwrap();
            assert!(notes.is_empty());
        }
        assert_eq!(table.pact(A, B), DiplState::Peace);
        assert_eq!(table.state(A, B).turns_left, 0);
    }

    #[test]
    fn first_contact_skips_decay_that_turn() {
        let (mut table, players, mut world) = setup(&[None, None]);
        let note = table.make_contact(A, B, 4);
        assert_eq!(note, Some(Notification::FirstContact { a: A, b: B }));
        assert_eq!(table.make_contact(B, A, 4), None);

        table.tick_turn(4, &players, &mut world).unwrap();
        assert_eq!(table.state(A, B).contact_turns_left, 10);
        assert_eq!(table.state(B, A).contact_turns_left, 10);

        table.tick_turn(5, &players, &mut world).unwrap();
        assert_eq!(table.state(A, B).contact_turns_left, 9);
        assert_eq!(table.state(B, A).contact_turns_left, 9);
    }

    #[test]
    fn breaking_a_pact_gives_reason_to_cancel() {
        let (mut table, players, mut world) = setup(&[None, None]);
        table.set_pair(A, B, DiplState::Peace, 0);

        let notes = table
            .apply_action(A, B, TreatyAction::DeclareWar, 2, &players, &mut world)
            .unwrap();
        assert!(notes.contains(&Notification::TreatyBroken { breaker: A, victim: B }));
        assert_eq!(table.state(B, A).has_reason_to_cancel, 2);

        // B retaliating with a standing reason is not a breach.
        table.set_pair(A, B, DiplState::Peace, 0);
        let notes = table
            .apply_action(B, A, TreatyAction::DeclareWar, 2, &players, &mut world)
            .unwrap();
        assert!(!notes
            .iter()
            .any(|n| matches!(n, Notification::TreatyBroken { .. })));
        assert_eq!(table.state(B, A).has_reason_to_cancel, 0);
    }

    #[test]
    fn cancelling_an_alliance_leads_to_armistice() {
        let (mut table, players, mut world) = setup(&[None, None]);
        table.set_pair(A, B, DiplState::Alliance, 0);

        table
            .apply_action(A, B, TreatyAction::CancelAlliance, 1, &players, &mut world)
            .unwrap();
        assert_eq!(table.pact(A, B), DiplState::Armistice);
        assert_eq!(table.state(B, A).turns_left, 16);
    }

    #[test]
    fn alliance_refused_next_to_enemy_of_ally() {
        let (mut table, players, mut world) = setup(&[None, None, None]);
        table.set_pair(A, C, DiplState::Alliance, 0);
        table.set_pair(A, B, DiplState::Peace, 0);
        // B and C still at war.
        assert_eq!(
            table.apply_action(A, B, TreatyAction::ProposeAlliance, 1, &players, &mut world),
            Err(TreatyError::AllianceConflict { ally: C })
        );

        table.set_pair(B, C, DiplState::Peace, 0);
        both(&mut table, &players, &mut world, A, B, TreatyAction::ProposeAlliance);
        assert_eq!(table.pact(A, B), DiplState::Alliance);
    }

    #[test]
    fn declaring_war_on_an_ally_of_an_ally() {
        let (mut table, players, mut world) = setup(&[None, None, None]);
        table.set_pair(A, B, DiplState::Peace, 0);
        table.set_pair(A, C, DiplState::Alliance, 0);
        table.set_pair(B, C, DiplState::Alliance, 0);

        table
            .apply_action(A, B, TreatyAction::DeclareWar, 9, &players, &mut world)
            .unwrap();

        assert_eq!(table.pact(A, B), DiplState::War);
        assert_eq!(table.pact(C, A), DiplState::Armistice);
        assert_eq!(table.pact(C, B), DiplState::Alliance);
        assert_eq!(table.state(C, A).auto_cancel_turn, Some(9));
    }
}

//! In-memory collaborators.
//!
//! `HeadlessWorld` implements every hook trait over a tiny model: units on
//! tiles, cities claiming territory, a few per-player numbers and a journal of
//! hook calls. The binary runs AI-only games on it and the tests use it to
//! observe what the engine asked for.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use concordia_protocol::{Order, PlayerId, TechId, TileId, TreatyAction, UnitId};

use crate::error::HookError;
use crate::game::Upset;
use crate::hooks::{AiEngine, Persistence, Simulation, Vision};

/// One recorded hook invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookCall {
    pub hook: &'static str,
    pub player: Option<PlayerId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadlessUnit {
    pub owner: PlayerId,
    pub tile: TileId,
    pub military: bool,
}

#[derive(Debug)]
pub struct HeadlessWorld {
    units: BTreeMap<UnitId, HeadlessUnit>,
    cities: BTreeMap<TileId, PlayerId>,
    territory: HashMap<TileId, PlayerId>,
    culture: HashMap<PlayerId, i32>,
    scores: HashMap<PlayerId, i32>,
    tech_upkeep: HashMap<PlayerId, i32>,
    bulbs: HashMap<PlayerId, i32>,
    spaceships: HashMap<PlayerId, i32>,
    scenario_victors: Option<Vec<PlayerId>>,
    upset_sources: HashMap<Upset, u32>,
    upsets: Vec<(Upset, u32)>,
    pending_moves: Vec<(PlayerId, UnitId, TileId)>,
    scripted_diplomacy: HashMap<PlayerId, Vec<(PlayerId, TreatyAction)>>,
    failing: HashSet<(&'static str, PlayerId)>,
    seen: BTreeSet<(PlayerId, TileId)>,
    revealed: BTreeSet<PlayerId>,
    saves: Vec<(String, bool)>,
    journal: Vec<HookCall>,
    fog_of_war: bool,
    /// AI players raise a military unit in their first city every phase
    ai_builds_units: bool,
    next_unit: u32,
    unit_id_limit: u32,
}

impl Default for HeadlessWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessWorld {
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            cities: BTreeMap::new(),
            territory: HashMap::new(),
            culture: HashMap::new(),
            scores: HashMap::new(),
            tech_upkeep: HashMap::new(),
            bulbs: HashMap::new(),
            spaceships: HashMap::new(),
            scenario_victors: None,
            upset_sources: HashMap::new(),
            upsets: Vec::new(),
            pending_moves: Vec::new(),
            scripted_diplomacy: HashMap::new(),
            failing: HashSet::new(),
            seen: BTreeSet::new(),
            revealed: BTreeSet::new(),
            saves: Vec::new(),
            journal: Vec::new(),
            fog_of_war: true,
            ai_builds_units: false,
            next_unit: 0,
            unit_id_limit: u32::MAX,
        }
    }

    /// Unit ids stop being available once `limit` units were ever created.
    pub fn with_unit_id_limit(mut self, limit: u32) -> Self {
        self.unit_id_limit = limit;
        self
    }

    pub fn with_ai_builders(mut self) -> Self {
        self.ai_builds_units = true;
        self
    }

    // -- world setup --

    /// Found a city; its tile becomes the owner's territory.
    pub fn add_city(&mut self, owner: PlayerId, tile: TileId) {
        self.cities.insert(tile, owner);
        self.territory.insert(tile, owner);
    }

    pub fn raze_cities(&mut self, owner: PlayerId) {
        self.cities.retain(|_, o| *o != owner);
    }

    pub fn claim_tile(&mut self, tile: TileId, owner: PlayerId) {
        self.territory.insert(tile, owner);
    }

    pub fn spawn_unit(
        &mut self,
        owner: PlayerId,
        tile: TileId,
        military: bool,
    ) -> Result<UnitId, HookError> {
        if self.next_unit >= self.unit_id_limit {
            return Err(HookError::Exhausted("unit ids".to_string()));
        }
        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        self.units.insert(
            id,
            HeadlessUnit {
                owner,
                tile,
                military,
            },
        );
        Ok(id)
    }

    pub fn set_culture(&mut self, player: PlayerId, culture: i32) {
        self.culture.insert(player, culture);
    }

    pub fn set_score(&mut self, player: PlayerId, score: i32) {
        self.scores.insert(player, score);
    }

    pub fn set_tech_upkeep(&mut self, player: PlayerId, bulbs: i32) {
        self.tech_upkeep.insert(player, bulbs);
    }

    pub fn set_spaceship_arrival(&mut self, player: PlayerId, year: i32) {
        self.spaceships.insert(player, year);
    }

    pub fn set_scenario_victors(&mut self, victors: Vec<PlayerId>) {
        self.scenario_victors = Some(victors);
    }

    pub fn set_upset_sources(&mut self, kind: Upset, count: u32) {
        self.upset_sources.insert(kind, count);
    }

    /// Treaty actions the AI of `player` takes at its next phase start.
    pub fn script_diplomacy(&mut self, player: PlayerId, actions: Vec<(PlayerId, TreatyAction)>) {
        self.scripted_diplomacy.insert(player, actions);
    }

    /// Make `hook` fail for `player` from now on.
    pub fn fail_hook(&mut self, hook: &'static str, player: PlayerId) {
        self.failing.insert((hook, player));
    }

    // -- observation --

    pub fn unit(&self, id: UnitId) -> Option<&HeadlessUnit> {
        self.units.get(&id)
    }

    pub fn has_unit(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    pub fn bulbs(&self, player: PlayerId) -> i32 {
        self.bulbs.get(&player).copied().unwrap_or(0)
    }

    pub fn has_seen(&self, player: PlayerId, tile: TileId) -> bool {
        self.revealed.contains(&player) || self.seen.contains(&(player, tile))
    }

    pub fn fog_of_war(&self) -> bool {
        self.fog_of_war
    }

    pub fn upsets(&self) -> &[(Upset, u32)] {
        &self.upsets
    }

    pub fn saves(&self) -> &[(String, bool)] {
        &self.saves
    }

    pub fn journal(&self) -> &[HookCall] {
        &self.journal
    }

    /// Players passed to `hook`, in call order.
    pub fn calls_to(&self, hook: &str) -> Vec<PlayerId> {
        self.journal
            .iter()
            .filter(|call| call.hook == hook)
            .filter_map(|call| call.player)
            .collect()
    }

    fn record(&mut self, hook: &'static str, player: PlayerId) -> Result<(), HookError> {
        self.journal.push(HookCall {
            hook,
            player: Some(player),
        });
        if self.failing.contains(&(hook, player)) {
            return Err(HookError::failed(format!("{hook} failed for {player}")));
        }
        Ok(())
    }

    fn record_global(&mut self, hook: &'static str) {
        self.journal.push(HookCall { hook, player: None });
    }

    fn units_of(&self, owner: PlayerId) -> impl Iterator<Item = (&UnitId, &HeadlessUnit)> {
        self.units.iter().filter(move |(_, u)| u.owner == owner)
    }
}

impl Simulation for HeadlessWorld {
    fn city_count(&self, player: PlayerId) -> u32 {
        self.cities.values().filter(|&&o| o == player).count() as u32
    }

    fn unit_count(&self, player: PlayerId) -> u32 {
        self.units_of(player).count() as u32
    }

    fn resolve_queued_activities(&mut self, player: PlayerId) -> Result<(), HookError> {
        self.record("resolve_queued_activities", player)
    }

    fn execute_queued_orders(&mut self, player: PlayerId) -> Result<(), HookError> {
        self.record("execute_queued_orders", player)?;
        let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_moves)
            .into_iter()
            .partition(|(owner, _, _)| *owner == player);
        self.pending_moves = rest;
        for (_, unit, to) in mine {
            if let Some(u) = self.units.get_mut(&unit) {
                u.tile = to;
            }
        }
        Ok(())
    }

    fn queue_orders(&mut self, player: PlayerId, orders: &[Order]) -> Result<(), HookError> {
        self.record("queue_orders", player)?;
        for order in orders {
            match order {
                Order::MoveUnit { unit, to } => self.pending_moves.push((player, *unit, *to)),
                Order::Disband { unit } => {
                    if self.units.get(unit).is_some_and(|u| u.owner == player) {
                        self.units.remove(unit);
                    }
                }
                Order::Fortify { .. } => {}
                other => {
                    return Err(HookError::failed(format!("not a unit order: {other:?}")));
                }
            }
        }
        Ok(())
    }

    fn refresh_cities(&mut self, player: PlayerId) -> Result<(), HookError> {
        self.record("refresh_cities", player)
    }

    fn update_bulbs(
        &mut self,
        player: PlayerId,
        delta: i32,
        _check_finished: bool,
    ) -> Result<(), HookError> {
        self.record("update_bulbs", player)?;
        *self.bulbs.entry(player).or_insert(0) += delta;
        Ok(())
    }

    fn tech_upkeep(&self, player: PlayerId) -> i32 {
        self.tech_upkeep.get(&player).copied().unwrap_or(0)
    }

    fn score(&self, player: PlayerId) -> i32 {
        self.scores.get(&player).copied().unwrap_or_else(|| {
            (self.city_count(player) * 10 + self.unit_count(player)) as i32
        })
    }

    fn culture(&self, player: PlayerId) -> i32 {
        self.culture.get(&player).copied().unwrap_or(0)
    }

    fn barbarian_units(&self, player: PlayerId) -> Vec<UnitId> {
        self.units_of(player).map(|(id, _)| *id).collect()
    }

    fn units_violating_armistice(&self, owner: PlayerId, territory_of: PlayerId) -> Vec<UnitId> {
        self.units_of(owner)
            .filter(|(_, u)| u.military && self.territory.get(&u.tile) == Some(&territory_of))
            .map(|(id, _)| *id)
            .collect()
    }

    fn disband_unit(&mut self, unit: UnitId) -> Result<(), HookError> {
        match self.units.remove(&unit) {
            Some(removed) => self.record("disband_unit", removed.owner),
            None => Err(HookError::failed(format!("no unit {}", unit.0))),
        }
    }

    fn city_tiles(&self, owner: PlayerId) -> Vec<TileId> {
        self.cities
            .iter()
            .filter(|(_, o)| **o == owner)
            .map(|(tile, _)| *tile)
            .collect()
    }

    fn research_goal_step(&self, _player: PlayerId, goal: TechId) -> Option<TechId> {
        Some(goal)
    }

    fn count_upset_sources(&self, kind: Upset) -> u32 {
        self.upset_sources.get(&kind).copied().unwrap_or(0)
    }

    fn apply_upset(&mut self, kind: Upset, magnitude: u32) -> Result<(), HookError> {
        self.record_global("apply_upset");
        self.upsets.push((kind, magnitude));
        Ok(())
    }

    fn spaceship_arrival(&self, player: PlayerId) -> Option<i32> {
        self.spaceships.get(&player).copied()
    }

    fn scenario_victors(&self) -> Option<Vec<PlayerId>> {
        self.scenario_victors.clone()
    }
}

impl AiEngine for HeadlessWorld {
    fn first_activities(&mut self, player: PlayerId) -> Result<(), HookError> {
        self.record("first_activities", player)?;
        if self.ai_builds_units {
            if let Some(tile) = self.city_tiles(player).first().copied() {
                self.spawn_unit(player, tile, true)?;
            }
        }
        Ok(())
    }

    fn last_activities(&mut self, player: PlayerId) -> Result<(), HookError> {
        self.record("last_activities", player)
    }

    fn diplomacy_actions(
        &mut self,
        player: PlayerId,
    ) -> Result<Vec<(PlayerId, TreatyAction)>, HookError> {
        self.record("diplomacy_actions", player)?;
        Ok(self.scripted_diplomacy.remove(&player).unwrap_or_default())
    }

    fn advisor_activities(&mut self, player: PlayerId) -> Result<(), HookError> {
        self.record("advisor_activities", player)
    }
}

impl Vision for HeadlessWorld {
    fn recompute_city_map(&mut self, player: PlayerId) {
        self.journal.push(HookCall {
            hook: "recompute_city_map",
            player: Some(player),
        });
    }

    fn show_all(&mut self, player: PlayerId) {
        self.revealed.insert(player);
    }

    fn show_tile(&mut self, player: PlayerId, tile: TileId) {
        self.seen.insert((player, tile));
    }

    fn set_fog_of_war(&mut self, enabled: bool) {
        self.record_global("set_fog_of_war");
        self.fog_of_war = enabled;
    }
}

impl Persistence for HeadlessWorld {
    fn save_game(&mut self, reason: &str, is_final: bool) -> Result<(), HookError> {
        self.record_global("save_game");
        self.saves.push((reason.to_string(), is_final));
        Ok(())
    }
}

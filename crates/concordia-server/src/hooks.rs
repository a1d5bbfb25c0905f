//! Collaborator seams.
//!
//! The engine drives turns and diplomacy but owns no map, units or AI. Those
//! live behind these traits. Every method except the asset counts has a
//! no-op default so an embedder only overrides what it models.

use concordia_protocol::{Order, PlayerId, TechId, TileId, TreatyAction, UnitId};
use tracing::warn;

use crate::error::{FatalError, HookError};
use crate::game::Upset;

/// Unit, city and research simulation.
pub trait Simulation {
    fn city_count(&self, player: PlayerId) -> u32;
    fn unit_count(&self, player: PlayerId) -> u32;

    /// Finish terrain work and other multi-turn unit activities.
    fn resolve_queued_activities(&mut self, _player: PlayerId) -> Result<(), HookError> {
        Ok(())
    }

    /// Execute queued movement orders.
    fn execute_queued_orders(&mut self, _player: PlayerId) -> Result<(), HookError> {
        Ok(())
    }

    /// Accept unit orders submitted by a player.
    fn queue_orders(&mut self, _player: PlayerId, _orders: &[Order]) -> Result<(), HookError> {
        Ok(())
    }

    fn refresh_cities(&mut self, _player: PlayerId) -> Result<(), HookError> {
        Ok(())
    }

    fn update_bulbs(
        &mut self,
        _player: PlayerId,
        _delta: i32,
        _check_finished: bool,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Bulbs lost to tech upkeep this phase.
    fn tech_upkeep(&self, _player: PlayerId) -> i32 {
        0
    }

    fn score(&self, _player: PlayerId) -> i32 {
        0
    }

    fn culture(&self, _player: PlayerId) -> i32 {
        0
    }

    fn barbarian_units(&self, _player: PlayerId) -> Vec<UnitId> {
        Vec::new()
    }

    /// Military units of `owner` standing inside `territory_of`'s borders.
    fn units_violating_armistice(&self, _owner: PlayerId, _territory_of: PlayerId) -> Vec<UnitId> {
        Vec::new()
    }

    fn disband_unit(&mut self, _unit: UnitId) -> Result<(), HookError> {
        Ok(())
    }

    fn city_tiles(&self, _owner: PlayerId) -> Vec<TileId> {
        Vec::new()
    }

    /// Next tech on the way to `goal`, if any is researchable.
    fn research_goal_step(&self, _player: PlayerId, _goal: TechId) -> Option<TechId> {
        None
    }

    /// Map features feeding an environmental upset this turn.
    fn count_upset_sources(&self, _kind: Upset) -> u32 {
        0
    }

    fn apply_upset(&mut self, _kind: Upset, _magnitude: u32) -> Result<(), HookError> {
        Ok(())
    }

    /// Year in which the player's spaceship arrives, if launched.
    fn spaceship_arrival(&self, _player: PlayerId) -> Option<i32> {
        None
    }

    /// Players the scenario declares victorious.
    fn scenario_victors(&self) -> Option<Vec<PlayerId>> {
        None
    }
}

/// AI decision engine.
pub trait AiEngine {
    fn first_activities(&mut self, _player: PlayerId) -> Result<(), HookError> {
        Ok(())
    }

    fn last_activities(&mut self, _player: PlayerId) -> Result<(), HookError> {
        Ok(())
    }

    /// Treaty actions the AI wants to take; applied like human input.
    fn diplomacy_actions(
        &mut self,
        _player: PlayerId,
    ) -> Result<Vec<(PlayerId, TreatyAction)>, HookError> {
        Ok(Vec::new())
    }

    /// Advisor and building assistance for human players.
    fn advisor_activities(&mut self, _player: PlayerId) -> Result<(), HookError> {
        Ok(())
    }
}

/// Map knowledge.
pub trait Vision {
    fn recompute_city_map(&mut self, _player: PlayerId) {}

    fn show_all(&mut self, _player: PlayerId) {}

    fn show_tile(&mut self, _player: PlayerId, _tile: TileId) {}

    fn set_fog_of_war(&mut self, _enabled: bool) {}
}

/// Save-game writer.
pub trait Persistence {
    fn save_game(&mut self, _reason: &str, _is_final: bool) -> Result<(), HookError> {
        Ok(())
    }
}

/// Everything the controller needs from the outside world.
pub trait Hooks: Simulation + AiEngine + Vision + Persistence {}

impl<T: Simulation + AiEngine + Vision + Persistence> Hooks for T {}

/// Logs and drops a per-player hook failure; exhaustion stays fatal.
pub(crate) fn absorb<T>(
    hook: &'static str,
    player: Option<PlayerId>,
    result: Result<T, HookError>,
) -> Result<Option<T>, FatalError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(HookError::Failed(reason)) => {
            warn!(hook, ?player, %reason, "hook failed, treating as no-op");
            Ok(None)
        }
        Err(HookError::Exhausted(what)) => Err(FatalError::ResourceExhausted(what)),
    }
}
